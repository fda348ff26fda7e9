//! The Service Coordinator: the orchestration layer
//! callers interact with directly. Drives the Main Client for lifecycle and
//! subscriptions, the Session Pool for browse/read/write, the Discovery
//! Engine to walk the tree, and the Data Store as the authoritative model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::cancel::CancellationToken;
use crate::client::{ConnectionState, MainClient};
use crate::codec::CodecRegistry;
use crate::discovery::{DiscoveryEngine, Shell, ShellKind};
use crate::error::{Result, S7ClientError};
use crate::events::{Callback, ConnectionEvent, EventBus, HandlerId, MonitoredItemChanged, VariableValueChanged};
use crate::fs::FileSystem;
use crate::opcua::ReadResult;
use crate::pool::SessionPool;
use crate::snapshot::SnapshotCodec;
use crate::store::DataStore;
use crate::types::{HostValue, InstanceDataBlock, NodeId, S7DataType, StoreRoot, StructureElement, Variable};

const DEFAULT_SUBSCRIPTION_INTERVAL: Duration = Duration::from_millis(1000);

pub struct ServiceCoordinator {
    client: Arc<MainClient>,
    store: Arc<DataStore>,
    pool: Arc<SessionPool>,
    discovery: DiscoveryEngine,
    codecs: CodecRegistry,
    fs: Arc<dyn FileSystem>,
    connection_events: EventBus<ConnectionEvent>,
    change_events: EventBus<VariableValueChanged>,
    forward_handlers: std::sync::Mutex<Option<(HandlerId, HandlerId)>>,
    disposed: AtomicBool,
}

impl ServiceCoordinator {
    pub fn new(client: Arc<MainClient>, store: Arc<DataStore>, pool: Arc<SessionPool>, fs: Arc<dyn FileSystem>) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            client: client.clone(),
            store,
            discovery: DiscoveryEngine::new(pool.clone()),
            pool,
            codecs: CodecRegistry::new(),
            fs,
            connection_events: EventBus::new(),
            change_events: EventBus::new(),
            forward_handlers: std::sync::Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let forward_connection = Arc::clone(&coordinator);
        let connection_handler = client.on_connection_event(Arc::new(move |event: &ConnectionEvent| {
            forward_connection.connection_events.emit(event);
        }));

        let forward_item = Arc::clone(&coordinator);
        let item_handler = client.on_item_changed(Arc::new(move |event: &MonitoredItemChanged| {
            let coordinator = forward_item.clone();
            let event = event.clone();
            tokio::spawn(async move { coordinator.handle_monitored_item_changed(event).await });
        }));

        *coordinator.forward_handlers.lock().unwrap() = Some((connection_handler, item_handler));
        coordinator
    }

    pub fn on_connection_event(&self, handler: Callback<ConnectionEvent>) -> HandlerId {
        self.connection_events.subscribe(handler)
    }

    pub fn on_variable_changed(&self, handler: Callback<VariableValueChanged>) -> HandlerId {
        self.change_events.subscribe(handler)
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(S7ClientError::Disposed);
        }
        Ok(())
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.client.state().await != ConnectionState::Connected {
            return Err(S7ClientError::NotConnected);
        }
        Ok(())
    }

    /// Fetches the seven root shells concurrently, fully discovers each,
    /// then replaces the store's structure and rebuilds the cache. A
    /// cancellation observed by the time the fan-out completes discards the
    /// whole tree rather than committing a partially-discovered one.
    pub async fn discover_structure(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        self.ensure_connected().await?;

        let (globals, instances, inputs, outputs, memory, timers, counters) = tokio::join!(
            self.discover_global_data_blocks(cancel),
            self.discover_instance_data_blocks(cancel),
            self.discover_area("Inputs", cancel),
            self.discover_area("Outputs", cancel),
            self.discover_area("Memory", cancel),
            self.discover_area("Timers", cancel),
            self.discover_area("Counters", cancel),
        );

        if cancel.is_cancelled() {
            return Err(S7ClientError::Cancelled);
        }

        let root = StoreRoot {
            data_blocks_global: globals,
            data_blocks_instance: instances,
            inputs: Some(inputs),
            outputs: Some(outputs),
            memory: Some(memory),
            timers: Some(timers),
            counters: Some(counters),
        };
        self.store.set_structure(root).await;
        self.store.build_cache().await;
        Ok(())
    }

    async fn discover_global_data_blocks(&self, cancel: &CancellationToken) -> Vec<StructureElement> {
        let shells = self
            .discovery
            .discover_shell_list(NodeId::symbolic(3, "DataBlocksGlobal"), "DataBlocksGlobal", ShellKind::GlobalDataBlock, cancel)
            .await;
        join_all(shells.into_iter().map(|shell| self.discovery.discover_structure_element(shell, cancel))).await
    }

    async fn discover_instance_data_blocks(&self, cancel: &CancellationToken) -> Vec<InstanceDataBlock> {
        let shells = self
            .discovery
            .discover_shell_list(NodeId::symbolic(3, "DataBlocksInstance"), "DataBlocksInstance", ShellKind::InstanceDataBlock, cancel)
            .await;
        join_all(shells.into_iter().map(|shell| self.discovery.discover_instance_data_block(shell, cancel))).await
    }

    async fn discover_area(&self, name: &str, cancel: &CancellationToken) -> StructureElement {
        let shell = Shell {
            node_id: NodeId::symbolic(3, name),
            display_name: name.to_string(),
            full_path: name.to_string(),
            kind: ShellKind::AreaElement,
        };
        self.discovery.discover_structure_element(shell, cancel).await
    }

    /// Snapshots the cache, re-reads every populated element concurrently
    /// through the session pool, replaces the store, and diffs old vs new
    /// by `full_path`, emitting `VariableValueChanged` for every mismatch.
    /// A cancellation observed once the fan-out completes discards the
    /// re-read entirely: the store keeps its pre-call structure and no
    /// change events fire.
    pub async fn read_all_variables(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        self.ensure_connected().await?;

        let old_cache = self.store.get_all().await;
        let old_root = self.store.snapshot_root().await;

        let (globals, instances, inputs, outputs, memory, timers, counters) = tokio::join!(
            join_all(old_root.data_blocks_global.iter().map(|el| self.read_element(el, cancel))),
            join_all(old_root.data_blocks_instance.iter().map(|idb| self.read_instance_data_block(idb, cancel))),
            self.read_optional_area(&old_root.inputs, cancel),
            self.read_optional_area(&old_root.outputs, cancel),
            self.read_optional_area(&old_root.memory, cancel),
            self.read_optional_area(&old_root.timers, cancel),
            self.read_optional_area(&old_root.counters, cancel),
        );

        if cancel.is_cancelled() {
            return Err(S7ClientError::Cancelled);
        }

        let new_root = StoreRoot {
            data_blocks_global: globals,
            data_blocks_instance: instances,
            inputs,
            outputs,
            memory,
            timers,
            counters,
        };
        self.store.set_structure(new_root).await;
        self.store.build_cache().await;

        let new_cache = self.store.get_all().await;
        for (path, new_var) in new_cache.iter() {
            if let Some(old_var) = old_cache.get(path) {
                if values_changed(&old_var.value, &new_var.value) {
                    self.change_events.emit(&VariableValueChanged {
                        path: path.clone(),
                        old: old_var.clone(),
                        new: new_var.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn read_optional_area(&self, area: &Option<StructureElement>, cancel: &CancellationToken) -> Option<StructureElement> {
        match area {
            Some(el) => Some(self.read_element(el, cancel).await),
            None => None,
        }
    }

    async fn read_instance_data_block(&self, idb: &InstanceDataBlock, cancel: &CancellationToken) -> InstanceDataBlock {
        let (input, output, in_out, r#static) = tokio::join!(
            self.read_optional_area(&idb.input, cancel),
            self.read_optional_area(&idb.output, cancel),
            self.read_optional_area(&idb.in_out, cancel),
            self.read_optional_area(&idb.r#static, cancel),
        );
        InstanceDataBlock {
            display_name: idb.display_name.clone(),
            full_path: idb.full_path.clone(),
            node_id: idb.node_id.clone(),
            input,
            output,
            in_out,
            r#static,
        }
    }

    /// Batches every node id in `element` (including struct members) into
    /// one read-values call through the session pool. Cancellation is
    /// checked at that call; a cancelled read leaves every variable as it
    /// was (no partial values applied).
    async fn read_element(&self, element: &StructureElement, cancel: &CancellationToken) -> StructureElement {
        let mut node_ids = Vec::new();
        collect_node_ids(&element.variables, &mut node_ids);

        let results = if node_ids.is_empty() {
            Vec::new()
        } else {
            match cancel
                .race(self.pool.execute(move |session| {
                    let node_ids = node_ids.clone();
                    async move { session.read_values(&node_ids).await }
                }))
                .await
            {
                Some(Ok(results)) => results,
                Some(Err(e)) => {
                    log::error!("read_all_variables: `{}` failed: {e}", element.full_path);
                    Vec::new()
                }
                None => {
                    log::debug!("read_all_variables: `{}` cancelled", element.full_path);
                    Vec::new()
                }
            }
        };

        let by_node_id: HashMap<String, ReadResult> = results.into_iter().map(|r| (r.node_id.as_str().to_string(), r)).collect();
        let variables = element.variables.iter().map(|v| self.apply_read_result(v, &by_node_id)).collect();

        StructureElement {
            display_name: element.display_name.clone(),
            full_path: element.full_path.clone(),
            node_id: element.node_id.clone(),
            variables,
        }
    }

    fn apply_read_result(&self, variable: &Variable, results: &HashMap<String, ReadResult>) -> Variable {
        let mut updated = variable.clone();
        if let Some(node_id) = &variable.node_id {
            if let Some(r) = results.get(node_id.as_str()) {
                updated.quality = crate::types::VariableQuality::from_status(r.status.code, r.status.symbol.clone());
                updated.raw_wire_value = r.value.clone();
                updated.value = r.value.as_ref().and_then(|w| match self.codecs.get(variable.s7_type).decode(w) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        log::warn!("read `{}`: decode failed: {e}", variable.full_path);
                        None
                    }
                });
            }
        }
        updated.struct_members = variable.struct_members.iter().map(|m| self.apply_read_result(m, results)).collect();
        updated
    }

    /// Resolves `path`, encodes `value` with the variable's codec, and
    /// issues the write through the session pool. Returns `false` (logged)
    /// on any failure, including cancellation, rather than propagating.
    pub async fn write_variable(&self, path: &str, value: HostValue, cancel: &CancellationToken) -> bool {
        if self.ensure_not_disposed().is_err() {
            log::warn!("write_variable: coordinator is disposed");
            return false;
        }
        let Some(variable) = self.store.try_get_by_path(path).await else {
            log::warn!("write_variable: no variable at `{path}`");
            return false;
        };
        let Some(node_id) = variable.node_id.clone() else {
            log::warn!("write_variable: `{path}` has no node id");
            return false;
        };
        let wire = match self.codecs.get(variable.s7_type).encode(&value) {
            Ok(w) => w,
            Err(e) => {
                log::warn!("write_variable: encode failed for `{path}`: {e}");
                return false;
            }
        };
        let result = cancel
            .race(self.pool.execute(move |session| {
                let node_id = node_id.clone();
                async move { session.write_value(&node_id, wire).await }
            }))
            .await;
        match result {
            Some(Ok(status)) if status.is_good() => true,
            Some(Ok(status)) => {
                log::warn!("write_variable: `{path}` returned {}", status.symbol);
                false
            }
            Some(Err(e)) => {
                log::error!("write_variable: `{path}` failed: {e}");
                false
            }
            None => {
                log::debug!("write_variable: `{path}` cancelled");
                false
            }
        }
    }

    /// Re-types a variable, optionally re-discovering struct members
    /// online, and re-runs the codec over the retained raw wire value. A
    /// cancellation observed after the (possible) re-discovery leaves the
    /// variable untouched in the store.
    pub async fn update_variable_type(&self, path: &str, new_type: S7DataType, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        let Some(mut variable) = self.store.try_get_by_path(path).await else {
            return Err(S7ClientError::InvalidPath { path: path.to_string() });
        };
        let old_value = variable.value.clone();
        variable.s7_type = new_type;

        if new_type == S7DataType::Struct && self.client.state().await == ConnectionState::Connected {
            if let Some(node_id) = variable.node_id.clone() {
                let shell = Shell {
                    node_id,
                    display_name: variable.display_name.clone(),
                    full_path: variable.full_path.clone(),
                    kind: ShellKind::GenericStructureElement,
                };
                let element = self.discovery.discover_structure_element(shell, cancel).await;
                variable.struct_members = element.variables;
            }
        }

        if cancel.is_cancelled() {
            return Err(S7ClientError::Cancelled);
        }

        variable.value = match &variable.raw_wire_value {
            Some(wire) => match self.codecs.get(new_type).decode(wire) {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!("update_variable_type: `{path}` conversion failed: {e}");
                    variable.system_type = None;
                    None
                }
            },
            None => None,
        };

        if !self.store.update_variable(path, variable.clone()).await {
            return Err(S7ClientError::InvalidPath { path: path.to_string() });
        }
        self.store.build_cache().await;

        if values_changed(&old_value, &variable.value) {
            let mut old_variable = variable.clone();
            old_variable.value = old_value;
            self.change_events.emit(&VariableValueChanged {
                path: path.to_string(),
                old: old_variable,
                new: variable,
            });
        }
        Ok(())
    }

    /// Upserts `is_subscribed`/`sampling_interval`, lazily creates the
    /// subscription, and registers the monitored item. A cancellation
    /// observed at either suspension point leaves the store untouched.
    pub async fn subscribe(&self, path: &str, sampling_interval_ms: Option<u32>, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        self.ensure_connected().await?;
        let Some(mut variable) = self.store.try_get_by_path(path).await else {
            return Err(S7ClientError::InvalidPath { path: path.to_string() });
        };
        variable.is_subscribed = true;
        if let Some(ms) = sampling_interval_ms {
            variable.sampling_interval_ms = ms;
        }

        match cancel.race(self.client.create_subscription(DEFAULT_SUBSCRIPTION_INTERVAL)).await {
            Some(result) => result?,
            None => return Err(S7ClientError::Cancelled),
        }
        match cancel.race(self.client.subscribe(&variable)).await {
            Some(result) => result.map(|_| ())?,
            None => return Err(S7ClientError::Cancelled),
        }

        self.store.update_variable(path, variable).await;
        self.store.build_cache().await;
        Ok(())
    }

    /// The monitored-item push path: resolves path from node id, runs the
    /// codec, and emits a change event if the decoded value differs.
    async fn handle_monitored_item_changed(&self, event: MonitoredItemChanged) {
        let Some(path) = self.store.try_get_by_node_id(&event.node_id).await else {
            log::warn!("push: unknown node id `{}`", event.node_id);
            return;
        };
        let Some(mut variable) = self.store.try_get_by_path(&path).await else {
            log::warn!("push: node id `{}` maps to missing path `{path}`", event.node_id);
            return;
        };

        let old_value = variable.value.clone();
        let new_value = match self.codecs.get(variable.s7_type).decode(&event.raw_value) {
            Ok(h) => Some(h),
            Err(e) => {
                log::warn!("push: decode failed for `{path}`: {e}");
                None
            }
        };

        if values_changed(&old_value, &new_value) {
            let old_variable = variable.clone();
            variable.value = new_value;
            variable.raw_wire_value = Some(event.raw_value);
            self.store.update_variable(&path, variable.clone()).await;
            self.store.build_cache().await;
            self.change_events.emit(&VariableValueChanged { path, old: old_variable, new: variable });
        }
    }

    pub async fn save_structure(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        let root = self.store.snapshot_root().await;
        match cancel.race(SnapshotCodec::save_structure(self.fs.as_ref(), path, &root)).await {
            Some(result) => result,
            None => Err(S7ClientError::Cancelled),
        }
    }

    /// A cancellation observed after the file is read discards the loaded
    /// root rather than committing it to the store.
    pub async fn load_structure(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        let root = match cancel.race(SnapshotCodec::load_structure(self.fs.as_ref(), path)).await {
            Some(result) => result?,
            None => return Err(S7ClientError::Cancelled),
        };
        if cancel.is_cancelled() {
            return Err(S7ClientError::Cancelled);
        }
        self.store.set_structure(root).await;
        self.store.build_cache().await;
        Ok(())
    }

    /// Detaches every event handler registered on the Main Client, tears
    /// down the Session Pool, then disconnects. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.client.detach_all_handlers();
        self.pool.dispose().await;
        let _ = self.client.disconnect(false, &CancellationToken::new()).await;
    }
}

impl Drop for ServiceCoordinator {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            log::warn!("ServiceCoordinator dropped without calling dispose(): handlers and the session pool were not torn down");
        }
    }
}

fn collect_node_ids(vars: &[Variable], out: &mut Vec<NodeId>) {
    for v in vars {
        if let Some(nid) = &v.node_id {
            out.push(nid.clone());
        }
        collect_node_ids(&v.struct_members, out);
    }
}

fn values_changed(old: &Option<HostValue>, new: &Option<HostValue>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => a.changed_from(b),
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApplicationConfiguration;
    use crate::opcua::*;
    use crate::types::{S7DataType, StructureElement, WireValue};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;

    struct FakeSession {
        values: StdMutex<HashMap<String, i32>>,
    }

    #[async_trait]
    impl OpcUaSession for FakeSession {
        async fn is_connected(&self) -> bool {
            true
        }
        async fn browse(&self, _node_id: &NodeId, _mask: NodeClassMask) -> Result<Vec<BrowseRef>> {
            Ok(Vec::new())
        }
        async fn read_values(&self, node_ids: &[NodeId]) -> Result<Vec<ReadResult>> {
            let values = self.values.lock().unwrap();
            Ok(node_ids
                .iter()
                .map(|nid| {
                    let v = values.get(nid.as_str()).copied().unwrap_or(0);
                    ReadResult { node_id: nid.clone(), value: Some(WireValue::I32(v)), status: StatusCode::good() }
                })
                .collect())
        }
        async fn write_value(&self, node_id: &NodeId, value: WireValue) -> Result<StatusCode> {
            if let WireValue::I32(v) = value {
                self.values.lock().unwrap().insert(node_id.as_str().to_string(), v);
            }
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

    struct FakeStack {
        next_id: AtomicU32,
    }

    #[async_trait]
    impl OpcUaStack for FakeStack {
        async fn select_endpoint(&self, url: &str, use_security: bool) -> Result<EndpointDescription> {
            Ok(EndpointDescription { url: url.to_string(), security_policy: "None".to_string(), use_security, server_certificate: Vec::new() })
        }
        async fn create_session(&self, _endpoint: &EndpointDescription, _config: &ApplicationConfiguration) -> Result<Arc<dyn OpcUaSession>> {
            self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeSession { values: StdMutex::new(HashMap::new()) }))
        }
    }

    struct AlwaysValid;
    impl CertificateValidator for AlwaysValid {
        fn validate(&self, _der: &[u8], _expected_host: &str, _skip_domain_validation: bool) -> Result<()> {
            Ok(())
        }
    }

    async fn connected_coordinator() -> Arc<ServiceCoordinator> {
        let stack = Arc::new(FakeStack { next_id: AtomicU32::new(0) });
        let client = MainClient::new(stack.clone(), Arc::new(AlwaysValid), ApplicationConfiguration::default());
        client.connect("opc.tcp://plc", false, &CancellationToken::new()).await.unwrap();

        let pool = Arc::new(SessionPool::new(stack, 2));
        pool.initialize(
            ApplicationConfiguration::default(),
            EndpointDescription { url: "opc.tcp://plc".to_string(), security_policy: "None".to_string(), use_security: false, server_certificate: Vec::new() },
        )
        .await
        .unwrap();

        let store = Arc::new(DataStore::new());
        let mut root = StoreRoot::default();
        let mut db1 = StructureElement::empty("DB1", "DataBlocksGlobal.DB1");
        let mut test_var = Variable::new("TestVar", "DataBlocksGlobal.DB1.TestVar");
        test_var.node_id = Some(NodeId::symbolic(3, "DB1.TestVar"));
        test_var.s7_type = S7DataType::DInt;
        db1.variables.push(test_var);
        root.data_blocks_global.push(db1);
        store.set_structure(root).await;
        store.build_cache().await;

        ServiceCoordinator::new(client, store, pool, Arc::new(crate::fs::TokioFileSystem))
    }

    #[tokio::test]
    async fn read_all_variables_emits_change_event_on_value_change() {
        let coordinator = connected_coordinator().await;

        let cancel = CancellationToken::new();
        // prime the fake session's stored value to 100, matching the store's initial None->100 read.
        coordinator.write_variable("DataBlocksGlobal.DB1.TestVar", HostValue::I32(100), &cancel).await;
        coordinator.read_all_variables(&cancel).await.unwrap();

        let seen: Arc<StdMutex<Vec<(i32, i32)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        coordinator.on_variable_changed(Arc::new(move |e: &VariableValueChanged| {
            if let (Some(HostValue::I32(old)), Some(HostValue::I32(new))) = (&e.old.value, &e.new.value) {
                seen_clone.lock().unwrap().push((*old, *new));
            }
        }));

        coordinator.write_variable("DataBlocksGlobal.DB1.TestVar", HostValue::I32(200), &cancel).await;
        coordinator.read_all_variables(&cancel).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), [(100, 200)]);
    }

    #[tokio::test]
    async fn read_all_variables_is_silent_when_nothing_changed() {
        let coordinator = connected_coordinator().await;
        let cancel = CancellationToken::new();
        coordinator.read_all_variables(&cancel).await.unwrap();

        let seen = Arc::new(StdMutex::new(0usize));
        let seen_clone = seen.clone();
        coordinator.on_variable_changed(Arc::new(move |_: &VariableValueChanged| {
            *seen_clone.lock().unwrap() += 1;
        }));

        coordinator.read_all_variables(&cancel).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn write_variable_fails_gracefully_for_unknown_path() {
        let coordinator = connected_coordinator().await;
        assert!(!coordinator.write_variable("DataBlocksGlobal.DB1.Missing", HostValue::I32(1), &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn subscribe_upserts_subscription_state() {
        let coordinator = connected_coordinator().await;
        coordinator
            .subscribe("DataBlocksGlobal.DB1.TestVar", Some(250), &CancellationToken::new())
            .await
            .unwrap();
        let variable = coordinator.store.try_get_by_path("DataBlocksGlobal.DB1.TestVar").await.unwrap();
        assert!(variable.is_subscribed);
        assert_eq!(variable.sampling_interval_ms, 250);
    }

    #[tokio::test]
    async fn subscribe_fails_when_already_cancelled() {
        let coordinator = connected_coordinator().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = coordinator.subscribe("DataBlocksGlobal.DB1.TestVar", Some(250), &cancel).await;
        assert!(matches!(result, Err(S7ClientError::Cancelled)));
        let variable = coordinator.store.try_get_by_path("DataBlocksGlobal.DB1.TestVar").await.unwrap();
        assert!(!variable.is_subscribed);
    }

    #[tokio::test]
    async fn operations_fail_after_dispose() {
        let coordinator = connected_coordinator().await;
        coordinator.dispose().await;
        let result = coordinator.read_all_variables(&CancellationToken::new()).await;
        assert!(matches!(result, Err(S7ClientError::Disposed)));
    }
}
