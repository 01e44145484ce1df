use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::hash_password;
use shared::domain::Post;
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/factshield.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run migrations and seed the admin account when it is missing.
    Init {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, default_value = "admin123")]
        password: String,
    },
    SetPassword {
        username: String,
        password: String,
    },
    ListPosts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Init { username, password } => {
            match storage
                .create_user_if_missing(&username, &hash_password(&password))
                .await?
            {
                Some(user_id) => println!("created user {username} user_id={}", user_id.0),
                None => println!("user {username} already exists; left unchanged"),
            }
        }
        Command::SetPassword { username, password } => {
            if password.is_empty() {
                bail!("password must not be empty");
            }
            let user_id = storage
                .upsert_user(&username, &hash_password(&password))
                .await?;
            println!("updated password for {username} user_id={}", user_id.0);
        }
        Command::ListPosts => {
            let posts = storage.list_posts().await?;
            if posts.is_empty() {
                println!("no posts");
            }
            for post in posts.into_iter().map(Post::from) {
                println!(
                    "{}\t{}\t{}\t{}\tfiles={}",
                    post.id.0,
                    post.published_on,
                    post.author,
                    post.title,
                    post.attachments.len()
                );
            }
        }
    }

    Ok(())
}
