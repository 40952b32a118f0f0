//! Property-based tests for product containers

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::json;

use inventory_sync::store::Fields;
use inventory_sync::{ProductDraft, ProductPatch, StoreOp, SyncError};

use crate::common::*;

#[derive(Debug, Clone)]
enum Op {
    Create { stock: i64 },
    Update { index: usize, stock: i64 },
    Delete { index: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..100).prop_map(|stock| Op::Create { stock }),
        (0usize..8, 0i64..100).prop_map(|(index, stock)| Op::Update { index, stock }),
        (0usize..8).prop_map(|index| Op::Delete { index }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A failed write leaves the container exactly as it was
    #[test]
    fn test_failed_writes_change_nothing(ops in prop::collection::vec((op(), any::<bool>()), 1..20)) {
        runtime().block_on(async {
            let harness = Harness::new();
            harness.sign_in(&ana()).await;
            let products = harness.inventory.products();

            for (op, fail) in ops {
                let before = products.all();
                let ids: Vec<_> = before.iter().map(|p| p.id).collect();
                let target = |index: usize| ids.get(index % ids.len().max(1)).copied();

                let failed = match op {
                    Op::Create { stock } => {
                        if fail {
                            harness.store.fail_next(StoreOp::Create, SyncError::unavailable("down"));
                        }
                        products.create(&ProductDraft::new("P", 1.0, stock)).await.is_err()
                    }
                    Op::Update { index, stock } => match target(index) {
                        Some(id) => {
                            if fail {
                                harness.store.fail_next(StoreOp::Update, SyncError::unavailable("down"));
                            }
                            products.update(id, ProductPatch::stock(stock)).await.is_err()
                        }
                        None => continue,
                    },
                    Op::Delete { index } => match target(index) {
                        Some(id) => {
                            if fail {
                                harness.store.fail_next(StoreOp::Delete, SyncError::unavailable("down"));
                            }
                            products.delete(id).await.is_err()
                        }
                        None => continue,
                    },
                };

                prop_assert_eq!(failed, fail);
                if failed {
                    prop_assert_eq!(&products.all(), &before);
                }
            }
            Ok(())
        })?;
    }

    /// Local ids stay unique whatever ids the stored documents carry
    #[test]
    fn test_reload_assigns_unique_ids(stored_ids in prop::collection::vec(prop::option::of(0i64..5), 0..12)) {
        runtime().block_on(async {
            let harness = Harness::new();
            let owner = ana().uid;
            for (i, id) in stored_ids.iter().enumerate() {
                let mut fields = Fields::new();
                fields.insert("nombre".into(), json!(format!("P{}", i)));
                fields.insert("precio".into(), json!(1.0));
                fields.insert("stock".into(), json!(1));
                if let Some(id) = id {
                    fields.insert("id".into(), json!(id));
                }
                harness.store.seed("productos", &owner, fields);
            }

            harness.sign_in(&ana()).await;
            let products = harness.inventory.products().all();
            let unique: HashSet<_> = products.iter().map(|p| p.id).collect();
            prop_assert_eq!(products.len(), stored_ids.len());
            prop_assert_eq!(unique.len(), products.len());
            Ok(())
        })?;
    }
}
