//! The narrow interface onto the external OPC UA stack.
//!
//! The core never speaks the OPC UA wire protocol directly; it is handed an
//! implementation of [`OpcUaSession`] (a live session) and, for endpoint
//! selection, an implementation of [`OpcUaStack`]. Production code plugs in
//! a real stack (e.g. a session wrapping an `opcua`-crate client); tests use
//! an in-memory fake.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{NodeId, WireValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClassMask {
    Variable,
    Object,
    Any,
}

/// A reference discovered by browsing one node's children.
#[derive(Debug, Clone)]
pub struct BrowseRef {
    pub node_id: NodeId,
    pub display_name: String,
    pub node_class: NodeClassMask,
}

#[derive(Debug, Clone)]
pub struct StatusCode {
    pub code: u32,
    pub symbol: String,
}

impl StatusCode {
    pub fn good() -> Self {
        Self {
            code: 0,
            symbol: "Good".to_string(),
        }
    }

    pub fn is_good(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub node_id: NodeId,
    pub value: Option<WireValue>,
    pub status: StatusCode,
}

#[derive(Debug, Clone)]
pub struct MonitoredItemNotification {
    pub node_id: NodeId,
    pub value: WireValue,
    pub status: StatusCode,
}

/// One live OPC UA session. Implementations are responsible for the actual
/// wire protocol, endpoint channel, and secure-channel renewal; this crate
/// only calls the operations below.
#[async_trait]
pub trait OpcUaSession: Send + Sync {
    async fn is_connected(&self) -> bool;

    async fn browse(&self, node_id: &NodeId, mask: NodeClassMask) -> Result<Vec<BrowseRef>>;

    async fn read_values(&self, node_ids: &[NodeId]) -> Result<Vec<ReadResult>>;

    async fn write_value(&self, node_id: &NodeId, value: WireValue) -> Result<StatusCode>;

    async fn create_subscription(&self, publishing_interval: Duration) -> Result<SubscriptionId>;

    async fn add_monitored_item(
        &self,
        subscription: SubscriptionId,
        node_id: &NodeId,
        sampling_interval: Duration,
    ) -> Result<MonitoredItemId>;

    async fn remove_monitored_item(
        &self,
        subscription: SubscriptionId,
        item: MonitoredItemId,
    ) -> Result<()>;

    async fn close(&self, leave_channel_open: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitoredItemId(pub u32);

/// Endpoint selection and session construction, kept separate from
/// [`OpcUaSession`] because the Session Pool and the Main Client each build
/// their own sessions from the same stack but hold them independently.
#[async_trait]
pub trait OpcUaStack: Send + Sync {
    async fn select_endpoint(&self, url: &str, use_security: bool) -> Result<EndpointDescription>;

    async fn create_session(
        &self,
        endpoint: &EndpointDescription,
        config: &crate::config::ApplicationConfiguration,
    ) -> Result<std::sync::Arc<dyn OpcUaSession>>;
}

#[derive(Debug, Clone)]
pub struct EndpointDescription {
    pub url: String,
    pub security_policy: String,
    pub use_security: bool,
    /// The server's DER-encoded certificate, handed to
    /// [`CertificateValidator`] during the connect handshake when
    /// `use_security` is set.
    pub server_certificate: Vec<u8>,
}

/// Validates a server certificate during the connect handshake
///. `host_name_valid = false` with
/// `skip_domain_validation = false` is fatal.
pub trait CertificateValidator: Send + Sync {
    fn validate(&self, der: &[u8], expected_host: &str, skip_domain_validation: bool) -> Result<()>;
}
