//! The Data Store: the in-memory address-space tree,
//! the flat case-insensitive Path Cache, and the node-id→path index, all
//! guarded by one reader-writer lock. The store owns its
//! tree; callers get owned clones back, never live references into it.

use std::collections::HashMap;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::types::{path_key, InstanceDataBlock, NodeId, StoreRoot, StructureElement, Variable};

struct Inner {
    root: StoreRoot,
    cache: IndexMap<String, Variable>,
    node_id_map: HashMap<String, String>,
}

pub struct DataStore {
    inner: RwLock<Inner>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                root: StoreRoot::default(),
                cache: IndexMap::new(),
                node_id_map: HashMap::new(),
            }),
        }
    }

    /// Atomically replaces the Store Root. Absent area elements are
    /// materialized as empty placeholders. Does not touch the cache.
    pub async fn set_structure(&self, mut root: StoreRoot) {
        root.fill_area_placeholders();
        let mut inner = self.inner.write().await;
        inner.root = root;
    }

    pub async fn snapshot_root(&self) -> StoreRoot {
        self.inner.read().await.root.clone()
    }

    /// Clears and repopulates the Path Cache by walking the Store Root
    /// depth-first. Idempotent.
    pub async fn build_cache(&self) {
        let mut inner = self.inner.write().await;
        let Inner { root, cache, node_id_map } = &mut *inner;
        cache.clear();
        node_id_map.clear();

        for db in &root.data_blocks_global {
            walk_element(db, cache, node_id_map);
        }
        for idb in &root.data_blocks_instance {
            for section in [&idb.input, &idb.output, &idb.in_out, &idb.r#static] {
                if let Some(section) = section {
                    walk_element(section, cache, node_id_map);
                }
            }
        }
        for area in [&root.inputs, &root.outputs, &root.memory, &root.timers, &root.counters] {
            if let Some(area) = area {
                walk_element(area, cache, node_id_map);
            }
        }
    }

    pub async fn try_get_by_path(&self, path: &str) -> Option<Variable> {
        self.inner.read().await.cache.get(&path_key(path)).cloned()
    }

    pub async fn try_get_by_node_id(&self, node_id: &str) -> Option<String> {
        self.inner.read().await.node_id_map.get(node_id).cloned()
    }

    pub async fn get_all(&self) -> IndexMap<String, Variable> {
        self.inner.read().await.cache.clone()
    }

    pub async fn find_where<F>(&self, predicate: F) -> Vec<Variable>
    where
        F: Fn(&Variable) -> bool,
    {
        self.inner
            .read()
            .await
            .cache
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    /// Inserts a new variable at the location implied by its `full_path`.
    /// Synthesizes a node id when the container's rule calls for one and
    /// the variable did not already carry one; recursively registers every
    /// struct member so all descendants become cache-addressable.
    pub async fn register_variable(&self, mut variable: Variable) -> bool {
        let full_path = variable.full_path.clone();
        let segments: Vec<&str> = full_path.split('.').collect();
        let mut inner = self.inner.write().await;

        let (container, synth_body) = match resolve_container_and_rule(&mut inner.root, &segments) {
            Some(v) => v,
            None => {
                log::warn!("register_variable: no parent container for `{full_path}`");
                return false;
            }
        };
        let last = segments.last().copied().unwrap_or_default();
        if container.iter().any(|v| v.display_name.eq_ignore_ascii_case(last)) {
            log::warn!("register_variable: `{full_path}` already exists");
            return false;
        }

        if variable.node_id.is_none() {
            if let Some(body) = &synth_body {
                variable.node_id = Some(NodeId::symbolic(3, body));
            }
        }
        let apply_struct_synthesis = synth_body.is_some();
        let parent_body = variable.node_id.as_ref().and_then(node_id_body);
        finalize_struct_members(&mut variable, parent_body.as_deref(), apply_struct_synthesis);

        let mut cache_entries = Vec::new();
        let mut node_id_entries = Vec::new();
        collect_cache_entries(&variable, "", &mut cache_entries, &mut node_id_entries);

        container.push(variable);
        for (k, v) in cache_entries {
            inner.cache.insert(k, v);
        }
        for (nid, path) in node_id_entries {
            inner.node_id_map.insert(nid, path);
        }
        true
    }

    /// Adds a top-level global data block. Rejects a `full_path` without
    /// exactly two segments (`DataBlocksGlobal.<Name>`) and duplicate
    /// paths.
    pub async fn register_global_datablock(&self, db: StructureElement) -> bool {
        let segments: Vec<&str> = db.full_path.split('.').collect();
        if segments.len() != 2 || !segments[0].eq_ignore_ascii_case("DataBlocksGlobal") {
            log::warn!("register_global_datablock: invalid path `{}`", db.full_path);
            return false;
        }
        let mut inner = self.inner.write().await;
        if inner.root.find_global_db(segments[1]).is_some() {
            log::warn!("register_global_datablock: `{}` already exists", db.full_path);
            return false;
        }

        let mut cache_entries = Vec::new();
        let mut node_id_entries = Vec::new();
        for v in &db.variables {
            collect_cache_entries(v, &db.full_path, &mut cache_entries, &mut node_id_entries);
        }
        cache_entries.push((path_key(&db.full_path), placeholder_variable(&db)));

        inner.root.data_blocks_global.push(db);
        for (k, v) in cache_entries {
            inner.cache.insert(k, v);
        }
        for (nid, path) in node_id_entries {
            inner.node_id_map.insert(nid, path);
        }
        true
    }

    /// Replaces the variable at `path`. Fails if `path` is unknown.
    /// Preserves siblings and ancestors.
    pub async fn update_variable(&self, path: &str, mut new_variable: Variable) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        let mut inner = self.inner.write().await;

        let (container, synth_body) = match resolve_container_and_rule(&mut inner.root, &segments) {
            Some(v) => v,
            None => {
                log::warn!("update_variable: `{path}` not found");
                return false;
            }
        };
        let last = segments.last().copied().unwrap_or_default();
        let idx = match container.iter().position(|v| v.display_name.eq_ignore_ascii_case(last)) {
            Some(i) => i,
            None => {
                log::warn!("update_variable: `{path}` not found");
                return false;
            }
        };

        new_variable.full_path = container[idx].full_path.clone();
        new_variable.display_name = container[idx].display_name.clone();
        if new_variable.node_id.is_none() {
            if let Some(body) = &synth_body {
                new_variable.node_id = Some(NodeId::symbolic(3, body));
            } else {
                new_variable.node_id = container[idx].node_id.clone();
            }
        }
        let apply_struct_synthesis = synth_body.is_some();
        let parent_body = new_variable.node_id.as_ref().and_then(node_id_body);
        finalize_struct_members(&mut new_variable, parent_body.as_deref(), apply_struct_synthesis);

        let mut cache_entries = Vec::new();
        let mut node_id_entries = Vec::new();
        collect_cache_entries(&new_variable, "", &mut cache_entries, &mut node_id_entries);

        container[idx] = new_variable;
        for (k, v) in cache_entries {
            inner.cache.insert(k, v);
        }
        for (nid, path) in node_id_entries {
            inner.node_id_map.insert(nid, path);
        }
        true
    }
}

/// A cache entry standing in for the data-block container itself, so
/// `try_get_by_path("DataBlocksGlobal.DB1")` resolves even though a data
/// block is a container rather than a leaf variable.
fn placeholder_variable(db: &StructureElement) -> Variable {
    let mut v = Variable::new(db.display_name.clone(), db.full_path.clone());
    v.s7_type = crate::types::S7DataType::Struct;
    v.node_id = db.node_id.clone();
    v
}

/// Walks one container (a global data block, an instance data block
/// section, or an area element), inserting a placeholder for the container
/// itself alongside every variable it holds, so the container's own path
/// resolves through `try_get_by_path` the same way `register_global_datablock`
/// makes a freshly registered data block resolve.
fn walk_element(el: &StructureElement, cache: &mut IndexMap<String, Variable>, node_id_map: &mut HashMap<String, String>) {
    cache.insert(path_key(&el.full_path), placeholder_variable(el));
    for v in &el.variables {
        let mut entries = Vec::new();
        let mut node_ids = Vec::new();
        collect_cache_entries(v, &el.full_path, &mut entries, &mut node_ids);
        for (k, v) in entries {
            cache.insert(k, v);
        }
        for (nid, path) in node_ids {
            node_id_map.insert(nid, path);
        }
    }
}

/// `parent_path` is only consulted when `var.full_path` is empty (as
/// discovery leaves it): the fallback path is `<parent_path>.<display_name>`.
/// A variable registered through `register_variable`/`update_variable`
/// always carries its own `full_path` already, so those call sites pass "".
fn collect_cache_entries(
    var: &Variable,
    parent_path: &str,
    cache: &mut Vec<(String, Variable)>,
    node_ids: &mut Vec<(String, String)>,
) {
    let mut var = var.clone();
    if var.full_path.is_empty() {
        var.full_path = format!("{parent_path}.{}", var.display_name);
    }
    if let Some(nid) = &var.node_id {
        node_ids.push((nid.as_str().to_string(), var.full_path.clone()));
    }
    let this_path = var.full_path.clone();
    cache.push((path_key(&this_path), var.clone()));
    for member in &var.struct_members {
        collect_cache_entries(member, &this_path, cache, node_ids);
    }
}

fn finalize_struct_members(var: &mut Variable, parent_node_body: Option<&str>, synthesize: bool) {
    if synthesize && var.node_id.is_none() {
        if let Some(pb) = parent_node_body {
            var.node_id = Some(NodeId::symbolic(3, format!("{pb}.{}", var.display_name)));
        }
    }
    let this_body = var.node_id.as_ref().and_then(node_id_body);
    let this_path = var.full_path.clone();
    for member in &mut var.struct_members {
        member.full_path = format!("{this_path}.{}", member.display_name);
        finalize_struct_members(member, this_body.as_deref(), synthesize);
    }
}

fn node_id_body(node_id: &NodeId) -> Option<String> {
    node_id.as_str().split_once(";s=").map(|(_, body)| body.to_string())
}

/// Resolves the `Vec<Variable>` a variable named by the final path segment
/// should live in, plus the node-id synthesis body (if any) for that
/// variable:
/// stripped root for globals, area-name-prefixed for area elements, none
/// for instance data block sections.
fn resolve_container_and_rule<'a>(
    root: &'a mut StoreRoot,
    segments: &[&str],
) -> Option<(&'a mut Vec<crate::types::Variable>, Option<String>)> {
    if segments.len() < 2 {
        return None;
    }
    let head = segments[0];
    if head.eq_ignore_ascii_case("DataBlocksGlobal") {
        if segments.len() < 3 {
            return None;
        }
        let db = root.find_global_db_mut(segments[1])?;
        let container = db.resolve_container_mut(&segments[2..segments.len() - 1])?;
        Some((container, Some(segments[1..].join("."))))
    } else if StoreRoot::is_area_name(head) {
        let area = root.area_mut(head)?;
        let container = area.resolve_container_mut(&segments[1..segments.len() - 1])?;
        Some((container, Some(segments.join("."))))
    } else if head.eq_ignore_ascii_case("DataBlocksInstance") {
        if segments.len() < 4 {
            return None;
        }
        let idb: &mut InstanceDataBlock = root.find_instance_db_mut(segments[1])?;
        let section = idb.section_mut(segments[2])?;
        let container = section.resolve_container_mut(&segments[3..segments.len() - 1])?;
        Some((container, None))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::S7DataType;

    fn db1_root() -> StoreRoot {
        let mut root = StoreRoot::default();
        root.data_blocks_global.push(StructureElement::empty("DB1", "DataBlocksGlobal.DB1"));
        root.fill_area_placeholders();
        root
    }

    #[tokio::test]
    async fn register_synthesizes_global_node_id() {
        let store = DataStore::new();
        store.set_structure(db1_root()).await;
        let var = Variable::new("Temp", "DataBlocksGlobal.DB1.Temp");
        assert!(store.register_variable(var).await);
        store.build_cache().await;
        let stored = store.try_get_by_path("DataBlocksGlobal.DB1.Temp").await.unwrap();
        assert_eq!(stored.node_id.unwrap().as_str(), "ns=3;s=DB1.Temp");
    }

    #[tokio::test]
    async fn register_fails_on_duplicate() {
        let store = DataStore::new();
        store.set_structure(db1_root()).await;
        let var = Variable::new("Temp", "DataBlocksGlobal.DB1.Temp");
        assert!(store.register_variable(var.clone()).await);
        assert!(!store.register_variable(var).await);
    }

    #[tokio::test]
    async fn register_fails_on_missing_parent() {
        let store = DataStore::new();
        store.set_structure(StoreRoot::default()).await;
        let var = Variable::new("Temp", "DataBlocksGlobal.Missing.Temp");
        assert!(!store.register_variable(var).await);
    }

    #[tokio::test]
    async fn build_cache_is_case_insensitive_and_idempotent() {
        let store = DataStore::new();
        store.set_structure(db1_root()).await;
        store.register_variable(Variable::new("Temp", "DataBlocksGlobal.DB1.Temp")).await;
        store.build_cache().await;
        store.build_cache().await;
        assert!(store.try_get_by_path("datablocksglobal.db1.temp").await.is_some());
        // DB1 placeholder + Temp + one placeholder per area container (Inputs/Outputs/Memory/Timers/Counters)
        assert_eq!(store.get_all().await.len(), 7);
    }

    #[tokio::test]
    async fn struct_members_become_addressable() {
        let store = DataStore::new();
        store.set_structure(db1_root()).await;
        let mut motor = Variable::new("Motor", "DataBlocksGlobal.DB1.Motor");
        motor.s7_type = S7DataType::Struct;
        motor.struct_members.push(Variable::new("Speed", "DataBlocksGlobal.DB1.Motor.Speed"));
        assert!(store.register_variable(motor).await);
        let speed = store.try_get_by_path("DataBlocksGlobal.DB1.Motor.Speed").await.unwrap();
        assert_eq!(speed.node_id.unwrap().as_str(), "ns=3;s=DB1.Motor.Speed");
    }
}
