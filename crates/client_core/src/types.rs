use std::time::Duration;

use shared::domain::{Post, PostDraft, PostId};
use tokio::time::Instant;

pub const DELETE_CONFIRMATION_PROMPT: &str = "Confirm Deletion: This action is irreversible.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Post,
    Login,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

impl Session {
    pub fn display_name(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    raised_at: Instant,
    ttl: Duration,
}

impl Notification {
    pub(crate) fn new(message: impl Into<String>, severity: Severity, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            severity,
            raised_at: Instant::now(),
            ttl,
        }
    }

    pub fn raised_at(&self) -> Instant {
        self.raised_at
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.raised_at) >= self.ttl
    }
}

/// Explicit answer to [`DELETE_CONFIRMATION_PROMPT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Render-ready resolution of the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Home {
        posts: Vec<Post>,
        loading: bool,
    },
    PostDetail(Post),
    PostNotFound(PostId),
    Login,
    Admin {
        session: Session,
        posts: Vec<Post>,
        compose: PostDraft,
        publishing: bool,
    },
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    ViewChanged(View),
    PostsUpdated(Vec<Post>),
    SessionChanged(Option<Session>),
    LoadingChanged(bool),
    PublishingChanged(bool),
    Notified(Notification),
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// The only username allowed through to the store's credential check.
    pub admin_username: String,
    pub notification_ttl: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            notification_ttl: Duration::from_secs(3),
        }
    }
}
