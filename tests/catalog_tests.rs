//! Catalog integration tests
//!
//! Covers query semantics and behaviour under concurrent writers and
//! readers.

mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use modcat::module::{Catalog, ModuleError, ModuleRecord};

#[test]
fn test_add_then_get_returns_equal_record() {
    let catalog = Catalog::new();
    let record = unary_record("Sample", "1.0.0", &["Greet", "Wave"]);
    catalog.add_or_update(record.clone()).unwrap();

    assert_eq!(*catalog.get_by_id("Sample").unwrap().unwrap(), record);
    assert_eq!(catalog.get_all().unwrap().len(), 1);
}

#[test]
fn test_re_adding_identical_record_keeps_count() {
    let catalog = Catalog::new();
    let record = simple_record("Sample", "1.0.0", &["Greet"]);
    catalog.add_or_update(record.clone()).unwrap();
    catalog.add_or_update(record).unwrap();
    assert_eq!(catalog.count(), 1);
}

#[test]
fn test_remove_present_and_absent() {
    let catalog = Catalog::new();
    catalog
        .add_or_update(simple_record("Alpha", "1.0", &[]))
        .unwrap();
    catalog
        .add_or_update(simple_record("Beta", "1.0", &[]))
        .unwrap();

    assert!(catalog.remove("Alpha").unwrap());
    assert_eq!(catalog.count(), 1);
    assert!(!catalog.remove("Alpha").unwrap());
    assert_eq!(catalog.count(), 1);
}

#[test]
fn test_find_members_by_name_ignores_case() {
    let catalog = Catalog::new();
    catalog
        .add_or_update(simple_record("Alpha", "1.0", &["Greet"]))
        .unwrap();
    catalog
        .add_or_update(simple_record("Beta", "1.0", &["greet", "Wave"]))
        .unwrap();

    for query in ["greet", "GREET", "Greet"] {
        let found: Vec<_> = catalog.find_members_by_name(query).unwrap().collect();
        assert_eq!(found.len(), 2, "query {query}");
        assert_eq!(found[0].module_id, "Alpha");
        assert_eq!(found[1].module_id, "Beta");
    }
}

#[test]
fn test_find_members_by_owner_type() {
    let catalog = Catalog::new();
    catalog
        .add_or_update(simple_record("Alpha", "1.0", &["One", "Two"]))
        .unwrap();
    catalog
        .add_or_update(simple_record("Beta", "1.0", &["Three"]))
        .unwrap();

    let names: Vec<_> = catalog
        .find_members_by_owner_type("alpha.api")
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["One", "Two"]);
}

#[test]
fn test_get_by_id_and_version_ignores_case() {
    let catalog = Catalog::new();
    catalog
        .add_or_update(simple_record("Sample", "1.0.0-Beta", &[]))
        .unwrap();
    assert!(catalog
        .get_by_id_and_version("sample", "1.0.0-beta")
        .unwrap()
        .is_some());
    assert!(catalog
        .get_by_id_and_version("sample", "1.0.0")
        .unwrap()
        .is_none());
}

#[test]
fn test_empty_catalog_queries() {
    let catalog = Catalog::new();
    assert_eq!(catalog.count(), 0);
    assert!(catalog.get_all().unwrap().is_empty());
    assert_eq!(catalog.find_members_by_name("Greet").unwrap().count(), 0);
    assert!(catalog.find_types_by_name("Widget").unwrap().is_empty());
    assert!(catalog.get_by_id("Sample").unwrap().is_none());
    assert!(catalog.member_names().is_empty());
}

#[test]
fn test_empty_arguments_fail_validation() {
    let catalog = Catalog::new();
    assert!(matches!(
        catalog.get_by_id_and_version("Sample", ""),
        Err(ModuleError::Validation(_))
    ));
    assert!(matches!(
        catalog.find_members_by_owner_type(""),
        Err(ModuleError::Validation(_))
    ));
    assert!(matches!(
        catalog.add_or_update(simple_record("Sample", "  ", &[])),
        Err(ModuleError::Validation(_))
    ));
}

#[test]
fn test_padded_id_is_rejected_instead_of_stranded() {
    let catalog = Catalog::new();
    let padded = ModuleRecord::new(" Sample ", "1.0.0", "/m");
    assert!(matches!(
        catalog.add_or_update(padded),
        Err(ModuleError::Validation(_))
    ));
    assert_eq!(catalog.count(), 0);

    let clean = ModuleRecord::new("Sample", "1.0.0", "/m");
    catalog.add_or_update(clean.clone()).unwrap();
    assert_eq!(*catalog.get_by_id(" Sample ").unwrap().unwrap(), clean);
    assert!(catalog
        .get_by_id_and_version(" Sample ", "1.0.0")
        .unwrap()
        .is_some());
    assert!(catalog.remove(" Sample ").unwrap());
    assert_eq!(catalog.count(), 0);
}

#[test]
fn test_concurrent_distinct_adds() {
    let catalog = Arc::new(Catalog::new());
    let writers: Vec<_> = (0..100)
        .map(|i| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                let id = format!("Module{:03}", i);
                catalog
                    .add_or_update(simple_record(&id, "1.0", &["Run", "Stop"]))
                    .unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(catalog.count(), 100);
    for record in catalog.get_all().unwrap() {
        assert_eq!(record.types.len(), 1);
        assert_eq!(record.members.len(), 2);
    }
    assert_eq!(catalog.find_members_by_name("run").unwrap().count(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_records() {
    let catalog = Arc::new(Catalog::new());
    catalog
        .add_or_update(simple_record("Sample", "0", &[]))
        .unwrap();

    let writer = {
        let catalog = Arc::clone(&catalog);
        tokio::task::spawn_blocking(move || {
            for n in 1..=50usize {
                let members: Vec<String> = (0..n).map(|i| format!("M{}", i)).collect();
                let names: Vec<&str> = members.iter().map(String::as_str).collect();
                catalog
                    .add_or_update(simple_record("Sample", &n.to_string(), &names))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            tokio::task::spawn_blocking(move || {
                for _ in 0..200 {
                    let record = catalog.get_by_id("Sample").unwrap().unwrap();
                    let expected: usize = record.version.parse().unwrap();
                    assert_eq!(record.members.len(), expected);
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(catalog.get_by_id("Sample").unwrap().unwrap().version, "50");
}
