use std::{io::Write as _, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    Confirmation, HttpPostStore, LocalPostStore, PostStore, ViewController,
    DELETE_CONFIRMATION_PROMPT,
};
use shared::domain::PostDraft;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{
    compose_fields, is_affirmative, parse_attachments, parse_command, ConsoleCommand, HELP,
};
use config::{Backend, ConsoleConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
struct Args {
    /// REST server to use as the post store.
    #[arg(long)]
    server_url: Option<String>,
    /// JSON file to use as a local post store.
    #[arg(long)]
    local_store: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    admin_username: Option<String>,
    #[arg(long)]
    notification_seconds: Option<u64>,
}

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = ConsoleConfig::load(&args.config)?.overlay(ConsoleConfig {
        server_url: args.server_url,
        local_store: args.local_store,
        admin_username: args.admin_username,
        notification_seconds: args.notification_seconds,
    });

    let store: Arc<dyn PostStore> = match config.backend() {
        Backend::Http(url) => {
            info!(%url, "using REST post store");
            Arc::new(HttpPostStore::new(&url)?)
        }
        Backend::LocalFile(path) => {
            info!(%path, "using local post store");
            Arc::new(LocalPostStore::open(&path).await?)
        }
        Backend::InMemory => Arc::new(LocalPostStore::in_memory()),
    };
    let controller = ViewController::new_with_settings(store, config.controller_settings());

    let _ = controller.load_posts().await;
    show(&controller).await;
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = prompt(&mut lines, "> ").await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(commands::ParseError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        debug!(?command, "console command");
        if !dispatch(&controller, &mut lines, command).await? {
            break;
        }
        show(&controller).await;
    }
    Ok(())
}

/// Runs one command; returns `false` when the session should end.
async fn dispatch(
    controller: &ViewController,
    lines: &mut InputLines,
    command: ConsoleCommand,
) -> Result<bool> {
    // Controller failures are already in its notification state.
    match command {
        ConsoleCommand::Home => controller.go_home().await,
        ConsoleCommand::Open(id) => {
            let _ = controller.open_post(id).await;
        }
        ConsoleCommand::Admin => {
            controller.open_admin().await;
        }
        ConsoleCommand::Login { username, password } => {
            let _ = controller.login(&username, &password).await;
        }
        ConsoleCommand::Logout => controller.logout().await,
        ConsoleCommand::Publish => {
            if let Some(draft) = compose(controller, lines).await? {
                let _ = controller.publish(draft).await;
            }
        }
        ConsoleCommand::Delete(id) => {
            let answer = prompt(lines, &format!("{DELETE_CONFIRMATION_PROMPT} [y/N] ")).await?;
            let confirmation = match answer.as_deref() {
                Some(answer) if is_affirmative(answer) => Confirmation::Confirmed,
                _ => Confirmation::Declined,
            };
            let _ = controller.delete_post(id, confirmation).await;
        }
        ConsoleCommand::Refresh => {
            let _ = controller.load_posts().await;
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

async fn compose(
    controller: &ViewController,
    lines: &mut InputLines,
) -> Result<Option<PostDraft>> {
    let previous = controller.compose().await;
    let mut answers = Vec::with_capacity(3);
    for (label, default) in compose_fields(&previous) {
        let Some(answer) = prompt_with_default(lines, label, default).await? else {
            return Ok(None);
        };
        answers.push(answer);
    }
    let [title, author, content]: [String; 3] = match answers.try_into() {
        Ok(fields) => fields,
        Err(_) => return Ok(None),
    };
    let Some(files) = prompt(lines, "attachments (comma separated): ").await? else {
        return Ok(None);
    };
    let draft = PostDraft::new(title, author, content, parse_attachments(&files));
    controller.set_compose(draft.clone()).await;
    Ok(Some(draft))
}

async fn prompt_with_default(
    lines: &mut InputLines,
    label: &str,
    default: &str,
) -> Result<Option<String>> {
    let text = if default.is_empty() {
        format!("{label}: ")
    } else {
        format!("{label} [{default}]: ")
    };
    Ok(prompt(lines, &text).await?.map(|answer| {
        if answer.trim().is_empty() {
            default.to_string()
        } else {
            answer
        }
    }))
}

async fn prompt(lines: &mut InputLines, text: &str) -> Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

async fn show(controller: &ViewController) {
    let screen = controller.screen().await;
    let notification = controller.notification().await;
    print!("{}", render::render(&screen, notification.as_ref()));
}
