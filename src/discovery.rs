//! The Discovery Engine: turns a half-populated "shell"
//! (node id + display name + variant tag) into a fully materialized
//! structure element by browsing through the Session Pool.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::opcua::NodeClassMask;
use crate::pool::SessionPool;
use crate::types::{InstanceDataBlock, NodeId, StructureElement, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    GlobalDataBlock,
    InstanceDataBlock,
    AreaElement,
    GenericStructureElement,
}

/// A node id, display name, and full path awaiting deep discovery.
#[derive(Debug, Clone)]
pub struct Shell {
    pub node_id: NodeId,
    pub display_name: String,
    pub full_path: String,
    pub kind: ShellKind,
}

#[derive(Clone)]
pub struct DiscoveryEngine {
    pool: Arc<SessionPool>,
}

impl DiscoveryEngine {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    /// Browses a global data block, area element, or generic structure
    /// element's children, wrapping each variable-class reference in a
    /// fresh `Variable` with `s7_type = UNKNOWN`. A failed browse is logged
    /// and the shell comes back with no variables rather than failing the
    /// whole tree. Cancellation is checked at the browse suspension point;
    /// a cancelled call also comes back with no variables, since the caller
    /// is responsible for discarding a partially-cancelled tree rather than
    /// committing it.
    pub async fn discover_structure_element(&self, shell: Shell, cancel: &CancellationToken) -> StructureElement {
        let node_id = shell.node_id.clone();
        let refs = cancel
            .race(self.pool.execute(move |session| {
                let node_id = node_id.clone();
                async move { session.browse(&node_id, NodeClassMask::Variable).await }
            }))
            .await;

        let variables = match refs {
            Some(Ok(refs)) => refs
                .into_iter()
                .map(|r| {
                    let mut v = Variable::new(r.display_name, String::new());
                    v.node_id = Some(r.node_id);
                    v
                })
                .collect(),
            Some(Err(e)) => {
                log::error!("discovery: browse failed for `{}`: {e}", shell.display_name);
                Vec::new()
            }
            None => {
                log::debug!("discovery: browse for `{}` cancelled", shell.display_name);
                Vec::new()
            }
        };

        StructureElement {
            display_name: shell.display_name,
            full_path: shell.full_path,
            node_id: Some(shell.node_id),
            variables,
        }
    }

    /// Browses for up to four named object children (`Input`, `Output`,
    /// `InOut`, `Static`) and recurses into each as a structure element.
    /// Cancellation is re-checked before each section, so a cancellation
    /// that fires mid-loop stops the remaining sections from discovering.
    pub async fn discover_instance_data_block(&self, shell: Shell, cancel: &CancellationToken) -> InstanceDataBlock {
        let node_id = shell.node_id.clone();
        let refs = cancel
            .race(self.pool.execute(move |session| {
                let node_id = node_id.clone();
                async move { session.browse(&node_id, NodeClassMask::Object).await }
            }))
            .await;

        let mut idb = InstanceDataBlock {
            display_name: shell.display_name.clone(),
            full_path: shell.full_path.clone(),
            node_id: Some(shell.node_id),
            input: None,
            output: None,
            in_out: None,
            r#static: None,
        };

        let refs = match refs {
            Some(Ok(refs)) => refs,
            Some(Err(e)) => {
                log::error!("discovery: browse failed for instance db `{}`: {e}", shell.display_name);
                return idb;
            }
            None => {
                log::debug!("discovery: browse for instance db `{}` cancelled", shell.display_name);
                return idb;
            }
        };

        for r in refs {
            if cancel.is_cancelled() {
                break;
            }
            let section_path = format!("{}.{}", shell.full_path, r.display_name);
            let name = r.display_name.to_ascii_lowercase();
            let child_shell = Shell {
                node_id: r.node_id,
                display_name: r.display_name,
                full_path: section_path,
                kind: ShellKind::GenericStructureElement,
            };
            let element = self.discover_structure_element(child_shell, cancel).await;
            match name.as_str() {
                "input" => idb.input = Some(element),
                "output" => idb.output = Some(element),
                "inout" => idb.in_out = Some(element),
                "static" => idb.r#static = Some(element),
                other => log::warn!("discovery: unexpected instance data block child `{other}`"),
            }
        }
        idb
    }

    /// Browses once at a list root (global/instance data block list) and
    /// maps each reference to a shell; full materialization happens
    /// per-shell afterwards.
    pub async fn discover_shell_list(
        &self,
        root_node_id: NodeId,
        root_full_path: &str,
        kind: ShellKind,
        cancel: &CancellationToken,
    ) -> Vec<Shell> {
        let root_full_path = root_full_path.to_string();
        let refs = cancel
            .race(self.pool.execute(move |session| {
                let node_id = root_node_id.clone();
                async move { session.browse(&node_id, NodeClassMask::Object).await }
            }))
            .await;

        match refs {
            Some(Ok(refs)) => refs
                .into_iter()
                .map(|r| Shell {
                    full_path: format!("{root_full_path}.{}", r.display_name),
                    node_id: r.node_id,
                    display_name: r.display_name,
                    kind,
                })
                .collect(),
            Some(Err(e)) => {
                log::error!("discovery: root list browse failed: {e}");
                Vec::new()
            }
            None => {
                log::debug!("discovery: root list browse cancelled");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApplicationConfiguration;
    use crate::error::Result;
    use crate::opcua::*;
    use crate::types::WireValue;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FakeSession;

    #[async_trait]
    impl OpcUaSession for FakeSession {
        async fn is_connected(&self) -> bool {
            true
        }
        async fn browse(&self, node_id: &NodeId, mask: NodeClassMask) -> Result<Vec<BrowseRef>> {
            if node_id.as_str() == "ns=3;s=DB1" && mask == NodeClassMask::Variable {
                return Ok(vec![
                    BrowseRef { node_id: NodeId::symbolic(3, "DB1.A"), display_name: "A".to_string(), node_class: NodeClassMask::Variable },
                    BrowseRef { node_id: NodeId::symbolic(3, "DB1.B"), display_name: "B".to_string(), node_class: NodeClassMask::Variable },
                ]);
            }
            if node_id.as_str() == "ns=3;s=FB1" && mask == NodeClassMask::Object {
                return Ok(vec![
                    BrowseRef { node_id: NodeId::symbolic(3, "FB1.Input"), display_name: "Input".to_string(), node_class: NodeClassMask::Object },
                    BrowseRef { node_id: NodeId::symbolic(3, "FB1.Static"), display_name: "Static".to_string(), node_class: NodeClassMask::Object },
                ]);
            }
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
        async fn add_monitored_item(&self, _subscription: SubscriptionId, _node_id: &NodeId, _sampling_interval: Duration) -> Result<MonitoredItemId> {
            Ok(MonitoredItemId(1))
        }
        async fn remove_monitored_item(&self, _subscription: SubscriptionId, _item: MonitoredItemId) -> Result<()> {
            Ok(())
        }
        async fn close(&self, _leave_channel_open: bool) -> Result<()> {
            Ok(())
        }
    }

    struct FakeStack;

    #[async_trait]
    impl OpcUaStack for FakeStack {
        async fn select_endpoint(&self, url: &str, use_security: bool) -> Result<EndpointDescription> {
            Ok(EndpointDescription { url: url.to_string(), security_policy: "None".to_string(), use_security, server_certificate: Vec::new() })
        }
        async fn create_session(&self, _endpoint: &EndpointDescription, _config: &ApplicationConfiguration) -> Result<std::sync::Arc<dyn OpcUaSession>> {
            Ok(Arc::new(FakeSession))
        }
    }

    async fn engine() -> DiscoveryEngine {
        let pool = Arc::new(SessionPool::new(Arc::new(FakeStack), 1));
        pool.initialize(
            ApplicationConfiguration::default(),
            EndpointDescription { url: "opc.tcp://plc".to_string(), security_policy: "None".to_string(), use_security: false, server_certificate: Vec::new() },
        )
        .await
        .unwrap();
        DiscoveryEngine::new(pool)
    }

    #[tokio::test]
    async fn discovers_variables_in_browse_order() {
        let engine = engine().await;
        let shell = Shell { node_id: NodeId::symbolic(3, "DB1"), display_name: "DB1".to_string(), full_path: "DataBlocksGlobal.DB1".to_string(), kind: ShellKind::GlobalDataBlock };
        let element = engine.discover_structure_element(shell, &CancellationToken::new()).await;
        assert_eq!(element.variables.len(), 2);
        assert_eq!(element.variables[0].display_name, "A");
        assert_eq!(element.variables[1].display_name, "B");
        assert!(element.variables[0].s7_type == crate::types::S7DataType::Unknown);
    }

    #[tokio::test]
    async fn discovers_instance_data_block_sections() {
        let engine = engine().await;
        let shell = Shell { node_id: NodeId::symbolic(3, "FB1"), display_name: "FB1".to_string(), full_path: "DataBlocksInstance.FB1".to_string(), kind: ShellKind::InstanceDataBlock };
        let idb = engine.discover_instance_data_block(shell, &CancellationToken::new()).await;
        assert!(idb.input.is_some());
        assert!(idb.r#static.is_some());
        assert!(idb.output.is_none());
    }

    #[tokio::test]
    async fn cancelled_before_browse_returns_element_with_no_variables() {
        let engine = engine().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let shell = Shell { node_id: NodeId::symbolic(3, "DB1"), display_name: "DB1".to_string(), full_path: "DataBlocksGlobal.DB1".to_string(), kind: ShellKind::GlobalDataBlock };
        let element = engine.discover_structure_element(shell, &cancel).await;
        assert!(element.variables.is_empty());
    }

    #[tokio::test]
    async fn failed_browse_returns_element_with_no_variables() {
        let engine = engine().await;
        let shell = Shell { node_id: NodeId::symbolic(3, "Missing"), display_name: "Missing".to_string(), full_path: "DataBlocksGlobal.Missing".to_string(), kind: ShellKind::GlobalDataBlock };
        let element = engine.discover_structure_element(shell, &CancellationToken::new()).await;
        assert!(element.variables.is_empty());
    }
}
