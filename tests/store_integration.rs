//! Multi-threaded concurrency scenarios for the Data Store, run against the
//! crate's public API rather than its internals.

use std::sync::Arc;

use s7_opcua_client::{DataStore, StoreRoot, StructureElement, Variable};

fn db1_root() -> StoreRoot {
    let mut root = StoreRoot::default();
    root.data_blocks_global.push(StructureElement::empty("DB1", "DataBlocksGlobal.DB1"));
    root.fill_area_placeholders();
    root
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_all_land_without_duplicates() {
    let store = Arc::new(DataStore::new());
    store.set_structure(db1_root()).await;

    let mut handles = Vec::new();
    for i in 0..100 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let path = format!("DataBlocksGlobal.DB1.Var{i}");
            store.register_variable(Variable::new(format!("Var{i}"), path)).await
        }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap() {
            ok += 1;
        }
    }
    assert_eq!(ok, 100);

    store.build_cache().await;
    // 100 vars + DB1 placeholder + one placeholder per area container
    // (Inputs/Outputs/Memory/Timers/Counters).
    assert_eq!(store.get_all().await.len(), 106);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_and_read_never_observe_a_torn_cache() {
    let store = Arc::new(DataStore::new());
    store.set_structure(db1_root()).await;
    store.build_cache().await;

    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        for i in 0..50 {
            let path = format!("DataBlocksGlobal.DB1.Var{i}");
            writer_store.register_variable(Variable::new(format!("Var{i}"), path)).await;
            writer_store.build_cache().await;
        }
    });

    let reader_store = store.clone();
    let reader = tokio::spawn(async move {
        for _ in 0..50 {
            // `get_all` must always return a consistent snapshot, never a
            // partially-written map, even while the writer is rebuilding it.
            let _ = reader_store.get_all().await;
        }
    });

    writer.await.unwrap();
    reader.await.unwrap();
    assert!(store.try_get_by_path("DataBlocksGlobal.DB1.Var49").await.is_some());
}
