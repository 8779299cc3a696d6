//! Authenticated identity and the lifecycle of everything scoped to it.
//!
//! The session store is the leaf of the store graph. Every collection store
//! registers with it as a [`SessionScoped`] dependent: on sign-in the
//! dependents are attached in registration order, on sign-out or remote
//! expiry they are detached in reverse order, which closes their
//! subscriptions, abandons their in-flight writes and clears their caches.
//!
//! Every transition bumps a session epoch. A sign-in that finds the epoch
//! moved after one of its awaits gives up with [`AuthError::Interrupted`]
//! instead of publishing a session nobody holds any more. A dependent that
//! fails to attach ends the sign-in: the dependents are detached again and
//! the [`SyncError`] is returned.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use teamboard_core::constants::SESSION_EVENT_CAPACITY;
use teamboard_core::{AuthError, ClientError, Credentials, Session, SyncError};
use teamboard_remote::{AuthGrant, AuthState, RemoteStore};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::subscription::Subscription;

/// Sign-in state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// The initial auth state has not been read yet.
    Resolving,
    /// Nobody is signed in.
    SignedOut,
    /// A session is live.
    SignedIn,
}

/// Published on every session transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session started.
    SignedIn(Session),
    /// The user signed out.
    SignedOut,
    /// The remote revoked or expired the token.
    Expired,
}

/// A component whose state only exists while a session does.
#[async_trait]
pub trait SessionScoped: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Start for `session`: open subscriptions, load caches.
    async fn attach(&self, session: &Session) -> Result<(), SyncError>;

    /// Stop: close subscriptions, abandon writes, clear caches.
    async fn detach(&self);
}

struct State {
    status: SessionStatus,
    session: Option<Session>,
    epoch: u64,
}

/// Owns the signed-in identity.
pub struct SessionStore {
    me: Weak<Self>,
    remote: Arc<dyn RemoteStore>,
    state: Mutex<State>,
    dependents: Mutex<Vec<Weak<dyn SessionScoped>>>,
    auth_watch: Mutex<Option<Subscription>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create a store in the `Resolving` state.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            remote,
            state: Mutex::new(State {
                status: SessionStatus::Resolving,
                session: None,
                epoch: 0,
            }),
            dependents: Mutex::new(Vec::new()),
            auth_watch: Mutex::new(None),
            events,
        })
    }

    /// Register a dependent. Dependents attach in registration order on the
    /// next sign-in and detach in reverse order.
    ///
    /// Only a weak reference is kept.
    pub fn register(&self, dependent: &Arc<dyn SessionScoped>) {
        debug!(dependent = dependent.name(), "session dependent registered");
        self.dependents.lock().push(Arc::downgrade(dependent));
    }

    /// Receive session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current sign-in state.
    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// The live session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    /// The live session, or [`AuthError::NotSignedIn`].
    pub fn require_session(&self) -> Result<Session, AuthError> {
        self.current_session().ok_or(AuthError::NotSignedIn)
    }

    /// Resolve the initial state from the remote auth service, restoring a
    /// session that is still valid there.
    ///
    /// If the restored session cannot load its dependents the store ends up
    /// `SignedOut` and the error is returned.
    pub async fn initialize(&self) -> Result<SessionStatus, ClientError> {
        let grant = self.remote.watch_auth_state().borrow().grant().cloned();
        match grant {
            Some(grant) => {
                info!(user_id = %grant.identity.user_id, "restoring remote session");
                let _ = self.establish(grant).await?;
            }
            None => self.state.lock().status = SessionStatus::SignedOut,
        }
        Ok(self.status())
    }

    /// Sign in, replacing any live session.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        credentials.validate()?;

        if self.current_session().is_some() {
            self.sign_out().await;
        }

        match self.remote.authenticate(credentials).await {
            Ok(grant) => self.establish(grant).await,
            Err(err) => {
                let err = err.into_auth_error();
                warn!(error = %err, "sign-in failed");
                let mut state = self.state.lock();
                if state.status == SessionStatus::Resolving {
                    state.status = SessionStatus::SignedOut;
                }
                Err(err.into())
            }
        }
    }

    /// Sign out locally and remotely. Dependents are detached first.
    pub async fn sign_out(&self) {
        self.teardown().await;

        if let Err(err) = self.remote.sign_out().await {
            warn!(error = %err, "remote sign-out failed");
        }
        if self.end_session() {
            info!("signed out");
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    /// Detach everything without touching the remote session.
    pub async fn shutdown(&self) {
        self.teardown().await;
        let _ = self.end_session();
        debug!("session store shut down");
    }

    async fn establish(&self, grant: AuthGrant) -> Result<Session, ClientError> {
        let session = Session {
            user_id: grant.identity.user_id,
            display_name: grant.identity.display_name,
            role: grant.identity.role,
            authenticated: true,
        };
        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.status = SessionStatus::SignedIn;
            state.session = Some(session.clone());
            state.epoch
        };
        self.watch_auth();

        for dependent in self.live_dependents() {
            let attached = dependent.attach(&session).await;
            if !self.is_current(epoch) {
                info!(dependent = dependent.name(), "sign-in interrupted while attaching");
                return Err(AuthError::Interrupted.into());
            }
            if let Err(err) = attached {
                warn!(dependent = dependent.name(), error = %err, "dependent failed to attach, ending session");
                self.teardown().await;
                let _ = self.end_session();
                return Err(err.into());
            }
        }

        info!(user_id = %session.user_id, role = %session.role, "signed in");
        let _ = self.events.send(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().epoch == epoch
    }

    /// Invalidate the live session and detach every dependent.
    async fn teardown(&self) {
        self.state.lock().epoch += 1;
        let watch = self.auth_watch.lock().take();
        if let Some(watch) = watch {
            watch.close().await;
        }
        self.detach_all().await;
    }

    fn watch_auth(&self) {
        let mut rx = self.remote.watch_auth_state();
        let _ = rx.borrow_and_update();
        let token = CancellationToken::new();
        let me = self.me.clone();
        let task = watch_loop(rx, token.clone(), me);
        let previous = self
            .auth_watch
            .lock()
            .replace(Subscription::spawn(token, task));
        drop(previous);
    }

    /// Called from the watch task when the remote ends the session.
    async fn expire(&self) {
        self.state.lock().epoch += 1;
        let watch = self.auth_watch.lock().take();
        if let Some(watch) = watch {
            watch.disarm();
        }
        self.detach_all().await;
        if self.end_session() {
            warn!("session expired remotely");
            let _ = self.events.send(SessionEvent::Expired);
        }
    }

    fn end_session(&self) -> bool {
        let mut state = self.state.lock();
        state.status = SessionStatus::SignedOut;
        state.session.take().is_some()
    }

    fn live_dependents(&self) -> Vec<Arc<dyn SessionScoped>> {
        self.dependents
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    async fn detach_all(&self) {
        for dependent in self.live_dependents().into_iter().rev() {
            dependent.detach().await;
            debug!(dependent = dependent.name(), "dependent detached");
        }
    }
}

#[tracing::instrument(skip_all, name = "auth_watch")]
async fn watch_loop(
    mut rx: watch::Receiver<AuthState>,
    token: CancellationToken,
    store: Weak<SessionStore>,
) {
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("auth state channel closed");
                    break;
                }
                let ended = !matches!(*rx.borrow_and_update(), AuthState::SignedIn(_));
                if ended {
                    if let Some(store) = store.upgrade() {
                        store.expire().await;
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use teamboard_core::{Role, User, UserId};
    use teamboard_remote::MemoryRemote;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        name: &'static str,
        attached: AtomicUsize,
    }

    #[async_trait]
    impl SessionScoped for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attach(&self, _session: &Session) -> Result<(), SyncError> {
            let _ = self.attached.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push(format!("attach {}", self.name));
            Ok(())
        }

        async fn detach(&self) {
            self.log.lock().push(format!("detach {}", self.name));
        }
    }

    fn remote() -> Arc<MemoryRemote> {
        let remote = Arc::new(MemoryRemote::new());
        remote.add_account(
            "mia@example.com",
            "pw",
            User {
                id: UserId::from("u1"),
                name: "Mia".into(),
                role: Role::Member,
                email: None,
            },
        );
        remote
    }

    fn creds() -> Credentials {
        Credentials::new("mia@example.com", "pw")
    }

    #[tokio::test]
    async fn initialize_resolves_signed_out() {
        let store = SessionStore::new(remote());
        assert_eq!(store.status(), SessionStatus::Resolving);
        assert_eq!(store.initialize().await.unwrap(), SessionStatus::SignedOut);
        assert!(store.current_session().is_none());
    }

    #[tokio::test]
    async fn initialize_restores_remote_session() {
        let remote = remote();
        let _ = remote.authenticate(&creds()).await.unwrap();
        let store = SessionStore::new(remote);
        assert_eq!(store.initialize().await.unwrap(), SessionStatus::SignedIn);
        assert_eq!(store.current_session().unwrap().display_name, "Mia");
    }

    #[tokio::test]
    async fn sign_in_and_out_order_dependents() {
        let store = SessionStore::new(remote());
        let log = Arc::new(Mutex::new(Vec::new()));
        let first: Arc<dyn SessionScoped> = Arc::new(Recorder {
            log: log.clone(),
            name: "directory",
            ..Recorder::default()
        });
        let second: Arc<dyn SessionScoped> = Arc::new(Recorder {
            log: log.clone(),
            name: "projects",
            ..Recorder::default()
        });
        store.register(&first);
        store.register(&second);
        let mut events = store.subscribe();

        let session = store.sign_in(&creds()).await.unwrap();
        assert_eq!(session.role, Role::Member);
        assert!(session.authenticated);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedIn(session));

        store.sign_out().await;
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
        assert_eq!(
            *log.lock(),
            ["attach directory", "attach projects", "detach projects", "detach directory"]
        );
        assert_eq!(store.status(), SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn bad_input_never_reaches_remote() {
        let remote = remote();
        let store = SessionStore::new(remote.clone());
        remote.set_offline(true);
        let err = store
            .sign_in(&Credentials::new("not-an-email", "pw"))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Validation(_));
    }

    #[tokio::test]
    async fn failures_are_typed() {
        let remote = remote();
        let store = SessionStore::new(remote.clone());
        let err = store
            .sign_in(&Credentials::new("mia@example.com", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Auth(AuthError::InvalidCredentials));
        assert_eq!(store.status(), SessionStatus::SignedOut);

        remote.set_offline(true);
        let err = store.sign_in(&creds()).await.unwrap_err();
        assert_matches!(err, ClientError::Auth(AuthError::Network(_)));
    }

    #[tokio::test]
    async fn remote_revocation_expires_session() {
        let remote = remote();
        let store = SessionStore::new(remote.clone());
        let recorder = Arc::new(Recorder {
            name: "tasks",
            ..Recorder::default()
        });
        let dependent: Arc<dyn SessionScoped> = recorder.clone();
        store.register(&dependent);
        let mut events = store.subscribe();

        let _ = store.sign_in(&creds()).await.unwrap();
        let _ = events.recv().await.unwrap();
        remote.revoke_session();

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
        assert_eq!(store.status(), SessionStatus::SignedOut);
        assert_eq!(*recorder.log.lock(), ["attach tasks", "detach tasks"]);
    }

    #[tokio::test]
    async fn signing_in_again_replaces_session() {
        let store = SessionStore::new(remote());
        let recorder = Arc::new(Recorder {
            name: "directory",
            ..Recorder::default()
        });
        let dependent: Arc<dyn SessionScoped> = recorder.clone();
        store.register(&dependent);
        let mut events = store.subscribe();

        let _ = store.sign_in(&creds()).await.unwrap();
        let _ = store.sign_in(&creds()).await.unwrap();

        assert_matches!(events.recv().await.unwrap(), SessionEvent::SignedIn(_));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
        assert_matches!(events.recv().await.unwrap(), SessionEvent::SignedIn(_));
        assert_eq!(recorder.attached.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_dependents_are_skipped() {
        let store = SessionStore::new(remote());
        let dependent: Arc<dyn SessionScoped> = Arc::new(Recorder::default());
        store.register(&dependent);
        drop(dependent);
        assert!(store.sign_in(&creds()).await.is_ok());
    }
}
