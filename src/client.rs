//! The Main Client: the single long-lived session that
//! hosts the subscription, with keep-alive and reconnect.
//!
//! The connection lock and the subscription lock are only ever taken nested
//! in that order (connection, then subscription) to rule out deadlock
//! between `connect`/`disconnect` and subscription changes, per the
//! concurrency model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cancel::CancellationToken;
use crate::config::ApplicationConfiguration;
use crate::error::{Result, S7ClientError};
use crate::events::{Callback, ConnectionEvent, EventBus, HandlerId, MonitoredItemChanged};
use crate::opcua::{CertificateValidator, EndpointDescription, MonitoredItemNotification, OpcUaSession, OpcUaStack, SubscriptionId};
use crate::types::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct ConnectionInner {
    state: ConnectionState,
    session: Option<Arc<dyn OpcUaSession>>,
    endpoint: Option<EndpointDescription>,
    last_url: String,
    last_use_security: bool,
}

struct SubscriptionInner {
    subscription_id: Option<SubscriptionId>,
    publishing_interval: Duration,
    monitored_items: HashMap<String, (crate::opcua::MonitoredItemId, String)>,
}

const DEFAULT_PUBLISHING_INTERVAL: Duration = Duration::from_millis(1000);
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(300);

pub struct MainClient {
    stack: Arc<dyn OpcUaStack>,
    cert_validator: Arc<dyn CertificateValidator>,
    config: ApplicationConfiguration,
    connection: Mutex<ConnectionInner>,
    subscription: Mutex<SubscriptionInner>,
    connection_events: EventBus<ConnectionEvent>,
    item_events: EventBus<MonitoredItemChanged>,
}

impl MainClient {
    pub fn new(stack: Arc<dyn OpcUaStack>, cert_validator: Arc<dyn CertificateValidator>, config: ApplicationConfiguration) -> Arc<Self> {
        Arc::new(Self {
            stack,
            cert_validator,
            config,
            connection: Mutex::new(ConnectionInner {
                state: ConnectionState::Disconnected,
                session: None,
                endpoint: None,
                last_url: String::new(),
                last_use_security: false,
            }),
            subscription: Mutex::new(SubscriptionInner {
                subscription_id: None,
                publishing_interval: DEFAULT_PUBLISHING_INTERVAL,
                monitored_items: HashMap::new(),
            }),
            connection_events: EventBus::new(),
            item_events: EventBus::new(),
        })
    }

    pub fn application_configuration(&self) -> &ApplicationConfiguration {
        &self.config
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.lock().await.state
    }

    pub async fn selected_endpoint(&self) -> Option<EndpointDescription> {
        self.connection.lock().await.endpoint.clone()
    }

    pub fn on_connection_event(&self, handler: Callback<ConnectionEvent>) -> HandlerId {
        self.connection_events.subscribe(handler)
    }

    pub fn on_item_changed(&self, handler: Callback<MonitoredItemChanged>) -> HandlerId {
        self.item_events.subscribe(handler)
    }

    pub fn detach_all_handlers(&self) {
        self.connection_events.clear();
        self.item_events.clear();
    }

    /// Selects an endpoint, validates the server certificate when security
    /// is requested, builds a session with the configured identity, arms
    /// keep-alive and the reconnect handler, and transitions to Connected.
    /// A no-op (returns `Ok`) if already connecting/connected/reconnecting.
    pub async fn connect(self: &Arc<Self>, url: &str, use_security: bool, cancel: &CancellationToken) -> Result<()> {
        {
            let mut conn = self.connection.lock().await;
            if conn.state != ConnectionState::Disconnected {
                return Ok(());
            }
            conn.state = ConnectionState::Connecting;
        }
        self.connection_events.emit(&ConnectionEvent::Connecting);

        let endpoint = match cancel.race(self.stack.select_endpoint(url, use_security)).await {
            Some(Ok(endpoint)) => endpoint,
            Some(Err(e)) => return self.fail_connect(e).await,
            None => return self.fail_connect(S7ClientError::NotConnected).await,
        };

        if use_security {
            if let Err(e) = self.cert_validator.validate(
                &endpoint.server_certificate,
                url,
                self.config.security.skip_domain_validation,
            ) {
                return self.fail_connect(e).await;
            }
        }

        let session = match cancel.race(self.stack.create_session(&endpoint, &self.config)).await {
            Some(Ok(session)) => session,
            Some(Err(e)) => return self.fail_connect(e).await,
            None => return self.fail_connect(S7ClientError::NotConnected).await,
        };

        {
            let mut conn = self.connection.lock().await;
            conn.state = ConnectionState::Connected;
            conn.session = Some(session);
            conn.endpoint = Some(endpoint);
            conn.last_url = url.to_string();
            conn.last_use_security = use_security;
        }
        self.spawn_keep_alive();
        self.connection_events.emit(&ConnectionEvent::Connected);
        Ok(())
    }

    async fn fail_connect(&self, err: S7ClientError) -> Result<()> {
        self.connection.lock().await.state = ConnectionState::Disconnected;
        Err(err)
    }

    /// Tears down subscription and monitored items, closes the session, and
    /// transitions to Disconnected. Safe to call from any state.
    pub async fn disconnect(&self, leave_channel_open: bool, cancel: &CancellationToken) -> Result<()> {
        let session = {
            let mut conn = self.connection.lock().await;
            conn.state = ConnectionState::Disconnected;
            conn.endpoint = None;
            conn.session.take()
        };
        {
            let mut sub = self.subscription.lock().await;
            sub.subscription_id = None;
            sub.monitored_items.clear();
        }
        if let Some(session) = session {
            let _ = cancel.race(session.close(leave_channel_open)).await;
        }
        self.connection_events.emit(&ConnectionEvent::Disconnected);
        Ok(())
    }

    fn spawn_keep_alive(self: &Arc<Self>) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(client.config.client.keep_alive_interval).await;
                let session = {
                    let conn = client.connection.lock().await;
                    if conn.state != ConnectionState::Connected {
                        return;
                    }
                    conn.session.clone()
                };
                let alive = match &session {
                    Some(s) => s.is_connected().await,
                    None => false,
                };
                if !alive {
                    client.connection_events.emit(&ConnectionEvent::KeepAliveFailed { status_code: 0x8000_0000 });
                    client.reconnect_loop().await;
                    return;
                }
            }
        });
    }

    async fn reconnect_loop(self: &Arc<Self>) {
        {
            let mut conn = self.connection.lock().await;
            conn.state = ConnectionState::Reconnecting;
        }
        self.connection_events.emit(&ConnectionEvent::Reconnecting);

        let mut delay = self.config.client.reconnect_period;
        loop {
            tokio::time::sleep(delay).await;
            match self.try_reconnect().await {
                Ok(()) => {
                    self.connection_events.emit(&ConnectionEvent::Reconnected);
                    self.spawn_keep_alive();
                    return;
                }
                Err(e) => {
                    log::warn!("main client: reconnect attempt failed: {e}");
                    if self.config.client.reconnect_exponential_backoff {
                        delay = (delay * 2).min(MAX_RECONNECT_BACKOFF);
                    }
                }
            }
        }
    }

    async fn try_reconnect(&self) -> Result<()> {
        let (url, use_security) = {
            let conn = self.connection.lock().await;
            (conn.last_url.clone(), conn.last_use_security)
        };
        let endpoint = self.stack.select_endpoint(&url, use_security).await?;
        let new_session = self.stack.create_session(&endpoint, &self.config).await?;
        let mut conn = self.connection.lock().await;
        conn.session = Some(new_session);
        conn.endpoint = Some(endpoint);
        conn.state = ConnectionState::Connected;
        Ok(())
    }

    /// Idempotent: returns `Ok` immediately if a subscription already exists.
    pub async fn create_subscription(&self, publishing_interval: Duration) -> Result<()> {
        let conn = self.connection.lock().await;
        let session = conn.session.clone().ok_or(S7ClientError::NotConnected)?;
        let mut sub = self.subscription.lock().await;
        if sub.subscription_id.is_some() {
            return Ok(());
        }
        let id = session.create_subscription(publishing_interval).await?;
        sub.subscription_id = Some(id);
        sub.publishing_interval = publishing_interval;
        Ok(())
    }

    /// Requires a live subscription and a non-null node id. Returns `Ok(false)`
    /// without contacting the server when the variable is already subscribed.
    pub async fn subscribe(&self, variable: &Variable) -> Result<bool> {
        let node_id = variable
            .node_id
            .as_ref()
            .ok_or_else(|| S7ClientError::InvalidPath { path: variable.full_path.clone() })?;

        let conn = self.connection.lock().await;
        let session = conn.session.clone().ok_or(S7ClientError::NotConnected)?;
        let mut sub = self.subscription.lock().await;
        let subscription_id = sub.subscription_id.ok_or(S7ClientError::NotConnected)?;

        if sub.monitored_items.contains_key(node_id.as_str()) {
            return Ok(false);
        }
        let sampling_interval = Duration::from_millis(variable.sampling_interval_ms as u64);
        let item_id = session.add_monitored_item(subscription_id, node_id, sampling_interval).await?;
        sub.monitored_items.insert(node_id.as_str().to_string(), (item_id, variable.display_name.clone()));
        Ok(true)
    }

    /// Idempotent when the item is absent.
    pub async fn unsubscribe(&self, variable: &Variable) -> Result<()> {
        let Some(node_id) = &variable.node_id else {
            return Ok(());
        };
        let conn = self.connection.lock().await;
        let session = conn.session.clone();
        let mut sub = self.subscription.lock().await;
        let Some(subscription_id) = sub.subscription_id else {
            return Ok(());
        };
        if let Some((item_id, _)) = sub.monitored_items.remove(node_id.as_str()) {
            if let Some(session) = session {
                let _ = session.remove_monitored_item(subscription_id, item_id).await;
            }
        }
        Ok(())
    }

    /// Extracts `(node_id, raw_value)` from a notification and emits a
    /// monitored-item-changed event carrying the variable's display name.
    pub async fn handle_notification(&self, notification: MonitoredItemNotification) {
        let display_name = {
            let sub = self.subscription.lock().await;
            sub.monitored_items
                .get(notification.node_id.as_str())
                .map(|(_, name)| name.clone())
        }
        .unwrap_or_else(|| notification.node_id.as_str().to_string());

        self.item_events.emit(&MonitoredItemChanged {
            display_name,
            node_id: notification.node_id.as_str().to_string(),
            raw_value: notification.value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcua::*;
    use crate::types::{NodeId, WireValue};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

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
            Ok(SubscriptionId(7))
        }
        async fn add_monitored_item(&self, _subscription: SubscriptionId, _node_id: &NodeId, _sampling_interval: Duration) -> Result<MonitoredItemId> {
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

    struct FakeStack;

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
        async fn create_session(&self, _endpoint: &EndpointDescription, _config: &ApplicationConfiguration) -> Result<Arc<dyn OpcUaSession>> {
            Ok(Arc::new(FakeSession { connected: AtomicBool::new(true) }))
        }
    }

    struct AlwaysValid;
    impl CertificateValidator for AlwaysValid {
        fn validate(&self, _der: &[u8], _expected_host: &str, _skip_domain_validation: bool) -> Result<()> {
            Ok(())
        }
    }

    struct AlwaysRejects;
    impl CertificateValidator for AlwaysRejects {
        fn validate(&self, _der: &[u8], _expected_host: &str, _skip_domain_validation: bool) -> Result<()> {
            Err(S7ClientError::CertificateRejected { detail: "untrusted".to_string() })
        }
    }

    fn client_with(validator: Arc<dyn CertificateValidator>) -> Arc<MainClient> {
        MainClient::new(Arc::new(FakeStack), validator, ApplicationConfiguration::default())
    }

    #[tokio::test]
    async fn connect_transitions_to_connected() {
        let client = client_with(Arc::new(AlwaysValid));
        client.connect("opc.tcp://plc", false, &CancellationToken::new()).await.unwrap();
        assert_eq!(client.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn connect_is_a_noop_when_already_connected() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        assert_eq!(client.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn connect_rejects_an_untrusted_certificate() {
        let client = client_with(Arc::new(AlwaysRejects));
        let result = client.connect("opc.tcp://plc", true, &CancellationToken::new()).await;
        assert!(matches!(result, Err(S7ClientError::CertificateRejected { .. })));
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_from_connected_clears_subscription_state() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        client.create_subscription(Duration::from_millis(500)).await.unwrap();
        client.disconnect(false, &cancel).await.unwrap();
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_from_disconnected() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.disconnect(false, &cancel).await.unwrap();
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn subscribe_rejects_duplicates_with_success() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        client.create_subscription(Duration::from_millis(500)).await.unwrap();

        let mut var = Variable::new("Temp", "DataBlocksGlobal.DB1.Temp");
        var.node_id = Some(NodeId::symbolic(3, "DB1.Temp"));

        assert!(client.subscribe(&var).await.unwrap());
        assert!(!client.subscribe(&var).await.unwrap());
    }

    #[tokio::test]
    async fn subscribe_without_node_id_is_invalid_path() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        client.create_subscription(Duration::from_millis(500)).await.unwrap();
        let var = Variable::new("Temp", "DataBlocksGlobal.DB1.Temp");
        assert!(matches!(client.subscribe(&var).await, Err(S7ClientError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn notification_emits_item_changed_with_display_name() {
        let client = client_with(Arc::new(AlwaysValid));
        let cancel = CancellationToken::new();
        client.connect("opc.tcp://plc", false, &cancel).await.unwrap();
        client.create_subscription(Duration::from_millis(500)).await.unwrap();
        let mut var = Variable::new("Temp", "DataBlocksGlobal.DB1.Temp");
        var.node_id = Some(NodeId::symbolic(3, "DB1.Temp"));
        client.subscribe(&var).await.unwrap();

        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        client.on_item_changed(Arc::new(move |e: &crate::events::MonitoredItemChanged| {
            seen_clone.lock().unwrap().push(e.display_name.clone());
        }));

        client
            .handle_notification(MonitoredItemNotification {
                node_id: NodeId::symbolic(3, "DB1.Temp"),
                value: WireValue::I32(7),
                status: StatusCode::good(),
            })
            .await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["Temp"]);
    }
}
