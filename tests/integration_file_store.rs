//! Integration Tests for the On-Disk Persistent Store
//!
//! Evicted records land as JSON files under `<root>/<namespace>/`, are
//! read back on search and survive the substrate that wrote them.

use std::path::Path;

use strata_memory::{
    MemoryError, Metadata, PersistentConfig, SearchOptions, Substrate, SubstrateConfig, Tier,
    VectorRecord,
};

fn disk_substrate(root: &Path, namespace: &str, capacity: usize) -> Substrate {
    Substrate::sim_with_config(
        42,
        SubstrateConfig::default()
            .with_dimensions(8)
            .with_capacity(capacity)
            .with_persistent(PersistentConfig::on_disk(root).with_namespace(namespace)),
    )
    .unwrap()
}

fn record_on_disk(root: &Path, namespace: &str, id: &str) -> VectorRecord {
    let bytes = std::fs::read(root.join(namespace).join(format!("{id}.json"))).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Eviction to Disk
// =============================================================================

#[tokio::test]
async fn test_eviction_writes_record_file() {
    let root = tempfile::tempdir().unwrap();
    let mut substrate = disk_substrate(root.path(), "agent-1", 1);

    let first = substrate
        .store("written to disk", Metadata::new().with("source", "test"))
        .await
        .unwrap();
    substrate.store("pushes the first out", Metadata::new()).await.unwrap();

    let path = root.path().join("agent-1").join(format!("{}.json", first.id));
    assert!(path.exists(), "missing {}", path.display());

    let bytes = std::fs::read(&path).unwrap();
    let record: VectorRecord = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(record.id, first.id);
    assert_eq!(record.content, "written to disk");
    assert_eq!(record.metadata.get("source"), Some("test"));
    assert_eq!(substrate.locate(&first.id), Some(Tier::Persistent));
}

#[tokio::test]
async fn test_search_rehydrates_from_disk() {
    let root = tempfile::tempdir().unwrap();
    let mut substrate = disk_substrate(root.path(), "agent-1", 1);

    let first = substrate.store("cold coffee", Metadata::new()).await.unwrap();
    let second = substrate.store("warm tea", Metadata::new()).await.unwrap();

    let results = substrate
        .search("cold coffee", SearchOptions::new().with_k(1))
        .await
        .unwrap();

    assert_eq!(results[0].id, first.id);
    assert_eq!(results[0].content, "cold coffee");
    assert_eq!(substrate.locate(&first.id), Some(Tier::Fast));
    // The victim of the rehydration went to disk in turn.
    assert_eq!(substrate.locate(&second.id), Some(Tier::Persistent));
    assert!(root
        .path()
        .join("agent-1")
        .join(format!("{}.json", second.id))
        .exists());
}

#[tokio::test]
async fn test_namespaces_share_a_root() {
    let root = tempfile::tempdir().unwrap();
    let mut left = disk_substrate(root.path(), "left", 1);
    let mut right = disk_substrate(root.path(), "right", 1);

    for substrate in [&mut left, &mut right] {
        substrate.store("one", Metadata::new()).await.unwrap();
        substrate.store("two", Metadata::new()).await.unwrap();
    }

    let count = |ns: &str| std::fs::read_dir(root.path().join(ns)).unwrap().count();
    assert_eq!(count("left"), 1);
    assert_eq!(count("right"), 1);

    let stats = left.stats().persistent.unwrap();
    assert_eq!(stats.backend, "file");
    assert_eq!(stats.namespace, "left");
    assert_eq!(stats.record_count, 1);
}

// =============================================================================
// Reopening a Namespace
// =============================================================================

#[tokio::test]
async fn test_reopened_substrate_keeps_earlier_records() {
    let root = tempfile::tempdir().unwrap();

    let durable = {
        let mut first = disk_substrate(root.path(), "ns", 1);
        let durable = first
            .store("original durable record", Metadata::new())
            .await
            .unwrap();
        first.store("evicts the original", Metadata::new()).await.unwrap();
        assert_eq!(first.locate(&durable.id), Some(Tier::Persistent));
        durable
    };

    let mut second = disk_substrate(root.path(), "ns", 1);
    assert_eq!(second.stats().persistent.unwrap().record_count, 1);
    assert_eq!(second.locate(&durable.id), Some(Tier::Persistent));

    // The new index starts its ids over and hands out the durable id again.
    let err = second.store("new one", Metadata::new()).await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::BackendUnavailable {
            operation: "store",
            ..
        }
    ));

    let next = second.store("new one", Metadata::new()).await.unwrap();
    assert_ne!(next.id, durable.id);
    second.store("and another", Metadata::new()).await.unwrap();

    assert_eq!(second.locate(&next.id), Some(Tier::Persistent));
    assert_eq!(second.stats().persistent.unwrap().record_count, 2);
    let kept = record_on_disk(root.path(), "ns", &durable.id);
    assert_eq!(kept.content, "original durable record");
}
