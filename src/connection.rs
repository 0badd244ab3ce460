use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{ConnectionError, Result};

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, uri: &str) -> Result<Database, ConnectionError>;
}

pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, uri: &str) -> Result<Database, ConnectionError> {
        let uri = uri.to_string();
        tokio::task::spawn_blocking(move || Database::open(&uri))
            .await
            .map_err(|err| ConnectionError::new(format!("connect task failed: {err}")))?
            .map_err(|err| ConnectionError::new(err.to_string()))
    }
}

type PendingConnection = Shared<BoxFuture<'static, Result<Database, ConnectionError>>>;

enum ConnectionState {
    Unconnected,
    Connecting(PendingConnection),
    Connected(Database),
}

enum Checkout {
    Ready(Database),
    Wait(PendingConnection),
}

pub struct ConnectionManager {
    uri: String,
    connector: Arc<dyn Connector>,
    state: Arc<Mutex<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_connector(config.database_uri.clone(), SqliteConnector)
    }

    pub fn with_connector(uri: impl Into<String>, connector: impl Connector) -> Self {
        Self {
            uri: uri.into(),
            connector: Arc::new(connector),
            state: Arc::new(Mutex::new(ConnectionState::Unconnected)),
        }
    }

    pub async fn get(&self) -> Result<Database> {
        match self.checkout() {
            Checkout::Ready(db) => Ok(db),
            Checkout::Wait(pending) => Ok(pending.await?),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*lock(&self.state), ConnectionState::Connected(_))
    }

    fn checkout(&self) -> Checkout {
        let mut state = lock(&self.state);
        match &*state {
            ConnectionState::Connected(db) => return Checkout::Ready(db.clone()),
            // A finished attempt that failed is never handed out again.
            ConnectionState::Connecting(pending) if !has_failed(pending) => {
                return Checkout::Wait(pending.clone())
            }
            _ => {}
        }

        let pending = self.start_attempt();
        *state = ConnectionState::Connecting(pending.clone());
        Checkout::Wait(pending)
    }

    // Called with the state lock held; the spawned task blocks on that lock
    // until the caller has recorded `Connecting`.
    fn start_attempt(&self) -> PendingConnection {
        let connector = Arc::clone(&self.connector);
        let state = Arc::clone(&self.state);
        let uri = self.uri.clone();

        let attempt = tokio::spawn(async move {
            tracing::info!("connecting to document store");
            let result = connector.connect(&uri).await;

            let mut guard = lock(&state);
            match &result {
                Ok(db) => {
                    tracing::info!(session = %db.session_id(), "document store connected");
                    *guard = ConnectionState::Connected(db.clone());
                }
                Err(err) => {
                    tracing::warn!(%err, "document store connection failed");
                    *guard = ConnectionState::Unconnected;
                }
            }
            result
        });

        async move {
            attempt.await.unwrap_or_else(|err| {
                Err(ConnectionError::new(format!("connect task aborted: {err}")))
            })
        }
        .boxed()
        .shared()
    }
}

fn has_failed(pending: &PendingConnection) -> bool {
    matches!(pending.peek(), Some(Err(_)))
}

fn lock(state: &Mutex<ConnectionState>) -> MutexGuard<'_, ConnectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;

    use crate::error::Error;

    struct CountingConnector {
        attempts: Arc<AtomicUsize>,
        delay: Duration,
        failures: usize,
    }

    impl CountingConnector {
        fn new(delay: Duration, failures: usize) -> (Self, Arc<AtomicUsize>) {
            let attempts = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    attempts: Arc::clone(&attempts),
                    delay,
                    failures,
                },
                attempts,
            )
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, uri: &str) -> Result<Database, ConnectionError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if attempt < self.failures {
                return Err(ConnectionError::new(format!("refused #{attempt}")));
            }
            Database::open(uri).map_err(|err| ConnectionError::new(err.to_string()))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let (connector, attempts) = CountingConnector::new(Duration::from_millis(30), 0);
        let manager = Arc::new(ConnectionManager::with_connector(":memory:", connector));

        let handles = (0..16).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get().await })
        });
        let sessions: Vec<Database> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("task").expect("connected"))
            .collect();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        let first = &sessions[0];
        assert!(sessions.iter().all(|db| Database::same_session(db, first)));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn connected_state_is_reused_without_new_attempts() {
        let (connector, attempts) = CountingConnector::new(Duration::from_millis(1), 0);
        let manager = ConnectionManager::with_connector(":memory:", connector);

        let first = manager.get().await.expect("connect");
        let second = manager.get().await.expect("cached");

        assert!(Database::same_session(&first, &second));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_allows_retry() {
        let (connector, attempts) = CountingConnector::new(Duration::from_millis(30), 1);
        let manager = Arc::new(ConnectionManager::with_connector(":memory:", connector));

        let results = join_all((0..4).map(|_| {
            let manager = Arc::clone(&manager);
            async move { manager.get().await }
        }))
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        for result in results {
            match result {
                Err(Error::Connection(err)) => assert_eq!(err.message(), "refused #0"),
                Err(other) => panic!("expected connection error, got {other:?}"),
                Ok(_) => panic!("expected connection error, got a session"),
            }
        }
        assert!(!manager.is_connected());

        manager.get().await.expect("retry succeeds");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_attempt_still_completes_and_is_cached() {
        let (connector, attempts) = CountingConnector::new(Duration::from_millis(50), 0);
        let manager = ConnectionManager::with_connector(":memory:", connector);

        let gave_up = tokio::time::timeout(Duration::from_millis(5), manager.get()).await;
        assert!(gave_up.is_err(), "caller should time out first");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(manager.is_connected());

        manager.get().await.expect("cached session");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sqlite_connector_opens_a_usable_store() {
        let manager = ConnectionManager::with_connector("sqlite::memory:", SqliteConnector);
        let db = manager.get().await.expect("connect");
        assert_eq!(db.count_events().await.expect("count"), 0);
    }
}
