use std::fmt::Write as _;

use client_core::{Notification, Screen, Severity};
use shared::domain::Post;

const EXCERPT_CHARS: usize = 96;

pub fn render(screen: &Screen, notification: Option<&Notification>) -> String {
    let mut out = String::new();
    if let Some(notification) = notification {
        let tag = match notification.severity {
            Severity::Success => "OK",
            Severity::Error => "!!",
        };
        let _ = writeln!(out, "[{tag}] {}", notification.message);
    }

    match screen {
        Screen::Home { posts, loading } => {
            let _ = writeln!(out, "== NorthByte Intelligence Feed ==");
            if *loading {
                let _ = writeln!(out, "loading...");
            } else if posts.is_empty() {
                let _ = writeln!(out, "no reports on file");
            }
            for post in posts {
                let _ = writeln!(
                    out,
                    "{:>15}  {}  {}  ({})",
                    post.id.0, post.published_on, post.title, post.author
                );
                let _ = writeln!(out, "{:>15}  {}", "", excerpt(&post.content));
            }
        }
        Screen::PostDetail(post) => render_post(&mut out, post),
        Screen::PostNotFound(id) => {
            let _ = writeln!(out, "Report {id} not found. Type `home` to return.");
        }
        Screen::Login => {
            let _ = writeln!(out, "== Restricted Access ==");
            let _ = writeln!(out, "login <user> <password>");
        }
        Screen::Admin {
            session,
            posts,
            compose,
            publishing,
        } => {
            let _ = writeln!(out, "== Admin Dashboard ({}) ==", session.display_name());
            if *publishing {
                let _ = writeln!(out, "publishing...");
            } else if !compose.title.trim().is_empty() {
                let _ = writeln!(out, "unsent draft: {}", compose.title);
            }
            let _ = writeln!(out, "records: {}", posts.len());
            for post in posts {
                let _ = writeln!(out, "{:>15}  {}  {}", post.id.0, post.published_on, post.title);
            }
        }
    }
    out
}

fn render_post(out: &mut String, post: &Post) {
    let _ = writeln!(out, "== {} ==", post.title);
    let _ = writeln!(
        out,
        "id {}  |  {}  |  {}",
        post.id.0, post.published_on, post.author
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", post.content);
    if !post.attachments.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "attachments:");
        for name in &post.attachments {
            let _ = writeln!(out, "  - {name}");
        }
    }
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
