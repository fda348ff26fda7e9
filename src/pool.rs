//! The Session Pool: a fixed-size collection of
//! stateless OPC UA sessions used for browse/read/write, built lazily from
//! an application configuration and a selected endpoint.
//!
//! The available-session queue is a lock-free `crossbeam_channel`; bounded
//! concurrency is a `tokio::sync::Semaphore` sized to the pool.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};

use crate::config::ApplicationConfiguration;
use crate::error::{Result, S7ClientError};
use crate::opcua::{EndpointDescription, OpcUaSession, OpcUaStack};

const INTER_CREATION_PAUSE: Duration = Duration::from_millis(50);

struct PoolState {
    config: ApplicationConfiguration,
    endpoint: EndpointDescription,
}

pub struct SessionPool {
    stack: Arc<dyn OpcUaStack>,
    pool_size: usize,
    semaphore: Semaphore,
    sender: crossbeam_channel::Sender<Arc<dyn OpcUaSession>>,
    receiver: crossbeam_channel::Receiver<Arc<dyn OpcUaSession>>,
    state: RwLock<Option<PoolState>>,
}

impl SessionPool {
    pub fn new(stack: Arc<dyn OpcUaStack>, pool_size: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(pool_size.max(1));
        Self {
            stack,
            pool_size,
            semaphore: Semaphore::new(pool_size),
            sender,
            receiver,
            state: RwLock::new(None),
        }
    }

    /// Pre-creates exactly `pool_size` sessions with a short pause between
    /// creations. On any per-session failure every session created so far is
    /// disposed and the call fails as a whole.
    pub async fn initialize(&self, config: ApplicationConfiguration, endpoint: EndpointDescription) -> Result<()> {
        let mut created = Vec::with_capacity(self.pool_size);
        for i in 0..self.pool_size {
            match self.stack.create_session(&endpoint, &config).await {
                Ok(session) => created.push(session),
                Err(e) => {
                    log::error!("session pool initialize: session {i} failed, disposing {} already created", created.len());
                    for s in created {
                        let _ = s.close(false).await;
                    }
                    return Err(S7ClientError::PoolExhausted {
                        detail: format!("{e} (consider reducing pool size)"),
                    });
                }
            }
            if i + 1 < self.pool_size {
                tokio::time::sleep(INTER_CREATION_PAUSE).await;
            }
        }
        for session in created {
            // capacity == pool_size, this never blocks
            let _ = self.sender.send(session);
        }
        *self.state.write().await = Some(PoolState { config, endpoint });
        Ok(())
    }

    /// Acquires a session, runs `op`, and returns the session to the pool.
    /// A disconnected session is disposed and replaced inline before `op`
    /// runs. The semaphore permit is always released, even if `op` errors.
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn OpcUaSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self.semaphore.acquire().await.map_err(|_| S7ClientError::PoolExhausted {
            detail: "session pool is shutting down".to_string(),
        })?;

        let mut session = self.receiver.try_recv().map_err(|_| S7ClientError::PoolExhausted {
            detail: "no session available despite a granted permit".to_string(),
        })?;

        if !session.is_connected().await {
            log::warn!("session pool: recreating a disconnected session");
            let _ = session.close(false).await;
            session = self.recreate_session().await?;
        }

        let result = op(session.clone()).await;
        let _ = self.sender.send(session);
        result
    }

    async fn recreate_session(&self) -> Result<Arc<dyn OpcUaSession>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(S7ClientError::PoolExhausted {
            detail: "pool has not been initialized".to_string(),
        })?;
        self.stack.create_session(&state.endpoint, &state.config).await
    }

    /// Drains and closes every currently available session. In-flight
    /// sessions finish their current `execute` call and are simply dropped
    /// back onto a pool no longer read from.
    pub async fn dispose(&self) {
        while let Ok(session) = self.receiver.try_recv() {
            let _ = session.close(false).await;
        }
    }

    pub fn available_count(&self) -> usize {
        self.receiver.len()
    }

    pub fn permits_available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcua::*;
    use crate::types::{NodeId, WireValue};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeSession {
        connected: AtomicBool,
    }

    #[async_trait]
    impl OpcUaSession for FakeSession {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn browse(&self, _node_id: &NodeId, _mask: NodeClassMask) -> Result<Vec<BrowseRef>> {
            Ok(Vec::new())
        }
        async fn read_values(&self, _node_ids: &[NodeId]) -> Result<Vec<ReadResult>> {
            Ok(Vec::new())
        }
        async fn write_value(&self, _node_id: &NodeId, _value: WireValue) -> Result<StatusCode> {
            Ok(StatusCode::good())
        }
        async fn create_subscription(&self, _publishing_interval: Duration) -> Result<SubscriptionId> {
            Ok(SubscriptionId(1))
        }
        async fn add_monitored_item(
            &self,
            _subscription: SubscriptionId,
            _node_id: &NodeId,
            _sampling_interval: Duration,
        ) -> Result<MonitoredItemId> {
            Ok(MonitoredItemId(1))
        }
        async fn remove_monitored_item(&self, _subscription: SubscriptionId, _item: MonitoredItemId) -> Result<()> {
            Ok(())
        }
        async fn close(&self, _leave_channel_open: bool) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeStack {
        next_id: AtomicU32,
        fail_after: Option<u32>,
    }

    #[async_trait]
    impl OpcUaStack for FakeStack {
        async fn select_endpoint(&self, url: &str, use_security: bool) -> Result<EndpointDescription> {
            Ok(EndpointDescription {
                url: url.to_string(),
                security_policy: "None".to_string(),
                use_security,
                server_certificate: Vec::new(),
            })
        }

        async fn create_session(
            &self,
            _endpoint: &EndpointDescription,
            _config: &ApplicationConfiguration,
        ) -> Result<Arc<dyn OpcUaSession>> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            if Some(id) == self.fail_after {
                return Err(S7ClientError::ProtocolError { code: 0x8000_0000, symbol: "BadTooManySessions".to_string() });
            }
            Ok(Arc::new(FakeSession { connected: AtomicBool::new(true) }))
        }
    }

    fn endpoint() -> EndpointDescription {
        EndpointDescription {
            url: "opc.tcp://plc".to_string(),
            security_policy: "None".to_string(),
            use_security: false,
            server_certificate: Vec::new(),
        }
    }

    #[tokio::test]
    async fn initialize_creates_exactly_pool_size_sessions() {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0), fail_after: None });
        let pool = SessionPool::new(stack, 3);
        pool.initialize(ApplicationConfiguration::default(), endpoint()).await.unwrap();
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.permits_available(), 3);
    }

    #[tokio::test]
    async fn initialize_fails_atomically_on_any_session_error() {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0), fail_after: Some(1) });
        let pool = SessionPool::new(stack, 3);
        let result = pool.initialize(ApplicationConfiguration::default(), endpoint()).await;
        assert!(result.is_err());
        assert_eq!(pool.available_count(), 0);
    }

    #[tokio::test]
    async fn execute_returns_the_session_after_use() {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0), fail_after: None });
        let pool = SessionPool::new(stack, 2);
        pool.initialize(ApplicationConfiguration::default(), endpoint()).await.unwrap();
        let out = pool.execute(|_session| async move { Ok(42) }).await.unwrap();
        assert_eq!(out, 42);
        assert_eq!(pool.available_count(), 2);
        assert_eq!(pool.permits_available(), 2);
    }

    #[tokio::test]
    async fn execute_recreates_a_disconnected_session() {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0), fail_after: None });
        let pool = SessionPool::new(stack, 1);
        pool.initialize(ApplicationConfiguration::default(), endpoint()).await.unwrap();
        pool.execute(|session| async move {
            session.close(false).await.unwrap();
            Ok(())
        })
        .await
        .unwrap();

        let reconnected = pool
            .execute(|session| async move { Ok(session.is_connected().await) })
            .await
            .unwrap();
        assert!(reconnected);
        assert_eq!(pool.available_count(), 1);
    }

    #[tokio::test]
    async fn permit_is_released_even_when_op_errors() {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0), fail_after: None });
        let pool = SessionPool::new(stack, 1);
        pool.initialize(ApplicationConfiguration::default(), endpoint()).await.unwrap();
        let result: Result<()> = pool
            .execute(|_session| async move { Err(S7ClientError::NotConnected) })
            .await;
        assert!(result.is_err());
        assert_eq!(pool.permits_available(), 1);
        assert_eq!(pool.available_count(), 1);
    }
}
