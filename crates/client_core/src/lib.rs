use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{Post, PostDraft, PostId};
use tokio::{
    sync::{broadcast, Mutex, MutexGuard},
    time::Instant,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod local_store;
pub mod transport;
pub mod types;

pub use error::{ControllerError, StoreError};
pub use local_store::LocalPostStore;
pub use transport::HttpPostStore;
pub use types::{
    Confirmation, ControllerEvent, ControllerSettings, DeleteOutcome, Notification, Screen,
    Session, Severity, View, DELETE_CONFIRMATION_PROMPT,
};

pub const MSG_ACCESS_GRANTED: &str = "Access Granted";
pub const MSG_ACCESS_DENIED: &str = "Access Denied: Invalid Credentials";
pub const MSG_LOGGED_OUT: &str = "Logged Out";
pub const MSG_PUBLISHED: &str = "Analysis Published to Network";
pub const MSG_EXPUNGED: &str = "Record Expunged";

/// Backend that owns the authoritative post collection.
///
/// Adapters decide how posts are kept; the controller only ever sees whole
/// collections, created posts with store-assigned ids, and pass/fail answers.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Post>, StoreError>;
    async fn create(&self, draft: &PostDraft) -> Result<Post, StoreError>;
    async fn delete(&self, id: PostId) -> Result<(), StoreError>;
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError>;
    async fn end_session(&self) -> Result<(), StoreError>;
}

/// Store used when no backend is configured. Every call fails as unavailable.
pub struct MissingPostStore;

#[async_trait]
impl PostStore for MissingPostStore {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        Err(StoreError::Unavailable("no post store configured".into()))
    }

    async fn create(&self, _draft: &PostDraft) -> Result<Post, StoreError> {
        Err(StoreError::Write("no post store configured".into()))
    }

    async fn delete(&self, id: PostId) -> Result<(), StoreError> {
        Err(StoreError::Write(format!(
            "no post store configured to delete post {id}"
        )))
    }

    async fn authenticate(&self, _username: &str, _password: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("no post store configured".into()))
    }

    async fn end_session(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct ViewController {
    store: Arc<dyn PostStore>,
    settings: ControllerSettings,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

struct ControllerState {
    view: View,
    active_post_id: Option<PostId>,
    session: Option<Session>,
    posts: Vec<Post>,
    loads_in_flight: usize,
    /// Last sequence number handed to a collection fetch.
    fetch_seq: u64,
    /// Sequence of the newest fetch whose result is on screen. Results from
    /// older fetches are discarded.
    applied_seq: u64,
    publishing: bool,
    compose: PostDraft,
    notification: Option<Notification>,
}

impl ViewController {
    pub fn new(store: Arc<dyn PostStore>) -> Arc<Self> {
        Self::new_with_settings(store, ControllerSettings::default())
    }

    pub fn new_with_settings(store: Arc<dyn PostStore>, settings: ControllerSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            settings,
            inner: Mutex::new(ControllerState {
                view: View::Home,
                active_post_id: None,
                session: None,
                posts: Vec::new(),
                loads_in_flight: 0,
                fetch_seq: 0,
                applied_seq: 0,
                publishing: false,
                compose: PostDraft::default(),
                notification: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Replaces the in-memory collection with the store's current one.
    ///
    /// Overlapping loads are allowed; the loading flag stays up until the
    /// last one settles and a response older than the one already applied is
    /// dropped.
    pub async fn load_posts(&self) -> Result<usize, ControllerError> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.loads_in_flight += 1;
            if guard.loads_in_flight == 1 {
                let _ = self.events.send(ControllerEvent::LoadingChanged(true));
            }
            Self::begin_fetch(&mut guard)
        };

        let result = self.store.list().await;

        let mut guard = self.inner.lock().await;
        guard.loads_in_flight = guard.loads_in_flight.saturating_sub(1);
        if guard.loads_in_flight == 0 {
            let _ = self.events.send(ControllerEvent::LoadingChanged(false));
        }
        if seq < guard.applied_seq {
            debug!(seq, applied = guard.applied_seq, "discarding stale post collection");
            return match result {
                Ok(_) => Ok(guard.posts.len()),
                Err(err) => Err(err.into()),
            };
        }
        guard.applied_seq = seq;
        match result {
            Ok(posts) => {
                self.replace_posts(&mut guard, posts);
                debug!(count = guard.posts.len(), "post collection loaded");
                Ok(guard.posts.len())
            }
            Err(err) => {
                warn!(%err, "failed to load post collection");
                guard.posts.clear();
                let _ = self
                    .events
                    .send(ControllerEvent::PostsUpdated(Vec::new()));
                self.notify(
                    &mut guard,
                    Severity::Error,
                    format!("Intelligence feed unavailable: {err}"),
                );
                Err(err.into())
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ControllerError> {
        let accepted = if username == self.settings.admin_username {
            match self.store.authenticate(username, password).await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "credential check could not reach the store");
                    let mut guard = self.inner.lock().await;
                    self.notify(
                        &mut guard,
                        Severity::Error,
                        format!("Authentication service unavailable: {err}"),
                    );
                    return Err(err.into());
                }
            }
        } else {
            false
        };

        let mut guard = self.inner.lock().await;
        if !accepted {
            info!(%username, "login rejected");
            self.notify(&mut guard, Severity::Error, MSG_ACCESS_DENIED);
            return Err(ControllerError::Auth);
        }

        let session = Session {
            username: username.to_string(),
        };
        guard.session = Some(session.clone());
        let _ = self
            .events
            .send(ControllerEvent::SessionChanged(Some(session)));
        self.set_view(&mut guard, View::Admin, None);
        self.notify(&mut guard, Severity::Success, MSG_ACCESS_GRANTED);
        info!(%username, "session established");
        Ok(())
    }

    /// Clears the local session before telling the store; a failing store
    /// call is logged and never surfaces.
    pub async fn logout(&self) {
        let had_session = {
            let mut guard = self.inner.lock().await;
            let had_session = guard.session.take().is_some();
            if had_session {
                let _ = self.events.send(ControllerEvent::SessionChanged(None));
            }
            self.set_view(&mut guard, View::Home, None);
            self.notify(&mut guard, Severity::Success, MSG_LOGGED_OUT);
            had_session
        };

        if had_session {
            if let Err(err) = self.store.end_session().await {
                warn!(%err, "store did not acknowledge logout");
            }
        }
    }

    /// Validates and submits `draft`, then refreshes the collection so the
    /// new post shows up exactly once.
    pub async fn publish(&self, draft: PostDraft) -> Result<Post, ControllerError> {
        let normalized = {
            let mut guard = self.inner.lock().await;
            if guard.session.is_none() {
                self.notify(&mut guard, Severity::Error, "Authorization required to publish");
                return Err(ControllerError::Unauthorized);
            }
            if guard.publishing {
                return Err(ControllerError::PublishInFlight);
            }
            let normalized = match draft.normalized() {
                Ok(normalized) => normalized,
                Err(err) => {
                    guard.compose = draft;
                    self.notify(&mut guard, Severity::Error, format!("Cannot publish: {err}"));
                    return Err(err.into());
                }
            };
            guard.publishing = true;
            let _ = self.events.send(ControllerEvent::PublishingChanged(true));
            normalized
        };

        let created = self.store.create(&normalized).await;
        let created = match created {
            Ok(post) => post,
            Err(err) => {
                warn!(%err, "publish rejected by store");
                let mut guard = self.inner.lock().await;
                self.finish_publish(&mut guard);
                guard.compose = draft;
                self.notify(&mut guard, Severity::Error, format!("Publish failed: {err}"));
                let message = match err {
                    StoreError::Unavailable(message) | StoreError::Write(message) => message,
                };
                return Err(ControllerError::StoreWrite(message));
            }
        };

        let seq = Self::begin_fetch(&mut *self.inner.lock().await);
        let refreshed = self.store.list().await;
        let mut guard = self.inner.lock().await;
        self.finish_publish(&mut guard);
        match refreshed {
            Ok(posts) if seq >= guard.applied_seq => {
                guard.applied_seq = seq;
                self.replace_posts(&mut guard, posts);
            }
            Ok(_) => {
                let mut posts = std::mem::take(&mut guard.posts);
                posts.push(created.clone());
                self.replace_posts(&mut guard, posts);
            }
            Err(err) => {
                warn!(%err, "refresh after publish failed; merging created post locally");
                guard.applied_seq = guard.fetch_seq;
                let mut posts = std::mem::take(&mut guard.posts);
                posts.push(created.clone());
                self.replace_posts(&mut guard, posts);
            }
        }
        guard.compose = PostDraft::default();
        self.notify(&mut guard, Severity::Success, MSG_PUBLISHED);
        info!(post_id = created.id.0, title = %created.title, "post published");
        Ok(created)
    }

    /// Deletes `id` once the caller has answered [`DELETE_CONFIRMATION_PROMPT`].
    pub async fn delete_post(
        &self,
        id: PostId,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome, ControllerError> {
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Cancelled);
        }
        {
            let mut guard = self.inner.lock().await;
            if guard.session.is_none() {
                self.notify(&mut guard, Severity::Error, "Authorization required to delete");
                return Err(ControllerError::Unauthorized);
            }
        }

        let result = self.store.delete(id).await;
        let mut guard = self.inner.lock().await;
        match result {
            Ok(()) => {
                // Fetches issued before the delete may still list the post.
                guard.applied_seq = guard.fetch_seq;
                let mut posts = std::mem::take(&mut guard.posts);
                posts.retain(|post| post.id != id);
                self.replace_posts(&mut guard, posts);
                if guard.view == View::Post && guard.active_post_id == Some(id) {
                    self.set_view(&mut guard, View::Home, None);
                }
                self.notify(&mut guard, Severity::Success, MSG_EXPUNGED);
                info!(post_id = id.0, "post deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => {
                warn!(post_id = id.0, %err, "delete rejected by store");
                self.notify(&mut guard, Severity::Error, format!("Deletion failed: {err}"));
                let message = match err {
                    StoreError::Unavailable(message) | StoreError::Write(message) => message,
                };
                Err(ControllerError::StoreWrite(message))
            }
        }
    }

    pub async fn go_home(&self) {
        let mut guard = self.inner.lock().await;
        self.set_view(&mut guard, View::Home, None);
    }

    /// Opens the detail view for `id`. An id missing from the loaded
    /// collection still opens the view, which then renders as
    /// [`Screen::PostNotFound`].
    pub async fn open_post(&self, id: PostId) -> Result<(), ControllerError> {
        let mut guard = self.inner.lock().await;
        self.set_view(&mut guard, View::Post, Some(id));
        if !guard.posts.iter().any(|post| post.id == id) {
            self.notify(&mut guard, Severity::Error, format!("Report {id} not found"));
            return Err(ControllerError::PostNotFound(id));
        }
        Ok(())
    }

    /// Opens the admin view when a session exists, otherwise the login view.
    pub async fn open_admin(&self) -> View {
        let mut guard = self.inner.lock().await;
        let view = if guard.session.is_some() {
            View::Admin
        } else {
            View::Login
        };
        self.set_view(&mut guard, view, None);
        view
    }

    pub async fn view(&self) -> View {
        self.inner.lock().await.view
    }

    pub async fn active_post_id(&self) -> Option<PostId> {
        self.inner.lock().await.active_post_id
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.inner.lock().await.posts.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loads_in_flight > 0
    }

    pub async fn is_publishing(&self) -> bool {
        self.inner.lock().await.publishing
    }

    pub async fn compose(&self) -> PostDraft {
        self.inner.lock().await.compose.clone()
    }

    pub async fn set_compose(&self, draft: PostDraft) {
        self.inner.lock().await.compose = draft;
    }

    /// Current notification, dropped once its display window has passed.
    pub async fn notification(&self) -> Option<Notification> {
        let mut guard = self.inner.lock().await;
        if guard
            .notification
            .as_ref()
            .is_some_and(|n| n.is_expired_at(Instant::now()))
        {
            guard.notification = None;
        }
        guard.notification.clone()
    }

    pub async fn dismiss_notification(&self) {
        self.inner.lock().await.notification = None;
    }

    pub async fn screen(&self) -> Screen {
        let guard = self.inner.lock().await;
        match guard.view {
            View::Home => Screen::Home {
                posts: guard.posts.clone(),
                loading: guard.loads_in_flight > 0,
            },
            View::Post => match guard.active_post_id {
                Some(id) => guard
                    .posts
                    .iter()
                    .find(|post| post.id == id)
                    .cloned()
                    .map(Screen::PostDetail)
                    .unwrap_or(Screen::PostNotFound(id)),
                None => Screen::Home {
                    posts: guard.posts.clone(),
                    loading: guard.loads_in_flight > 0,
                },
            },
            View::Login => Screen::Login,
            View::Admin => match &guard.session {
                Some(session) => Screen::Admin {
                    session: session.clone(),
                    posts: guard.posts.clone(),
                    compose: guard.compose.clone(),
                    publishing: guard.publishing,
                },
                None => Screen::Login,
            },
        }
    }

    fn replace_posts(&self, guard: &mut MutexGuard<'_, ControllerState>, mut posts: Vec<Post>) {
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        posts.dedup_by_key(|post| post.id);
        guard.posts = posts;
        let _ = self
            .events
            .send(ControllerEvent::PostsUpdated(guard.posts.clone()));
    }

    fn begin_fetch(guard: &mut ControllerState) -> u64 {
        guard.fetch_seq += 1;
        guard.fetch_seq
    }

    fn finish_publish(&self, guard: &mut MutexGuard<'_, ControllerState>) {
        guard.publishing = false;
        let _ = self.events.send(ControllerEvent::PublishingChanged(false));
    }

    fn set_view(
        &self,
        guard: &mut MutexGuard<'_, ControllerState>,
        view: View,
        active_post_id: Option<PostId>,
    ) {
        guard.active_post_id = active_post_id;
        if guard.view != view {
            guard.view = view;
            let _ = self.events.send(ControllerEvent::ViewChanged(view));
        }
    }

    fn notify(
        &self,
        guard: &mut MutexGuard<'_, ControllerState>,
        severity: Severity,
        message: impl Into<String>,
    ) {
        let notification = Notification::new(message, severity, self.settings.notification_ttl);
        guard.notification = Some(notification.clone());
        let _ = self.events.send(ControllerEvent::Notified(notification));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
