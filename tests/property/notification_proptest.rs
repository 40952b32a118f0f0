//! Property-based tests for the notification window

use proptest::prelude::*;
use serde_json::json;

use inventory_sync::store::to_fields;

use crate::common::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The unread count always matches the window contents
    #[test]
    fn test_unread_count_matches_window(flags in prop::collection::vec(prop::option::of(any::<bool>()), 0..80)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let harness = Harness::new();
            for (i, read) in flags.iter().enumerate() {
                let mut value = json!({ "tipo": "info", "titulo": format!("N{}", i), "mensaje": "" });
                if let Some(read) = read {
                    value["leida"] = json!(read);
                }
                harness.store.seed("notificaciones", &ana().uid, to_fields(&value).unwrap());
            }

            harness.sign_in(&ana()).await;
            let notifications = harness.inventory.notifications();
            let window = notifications.notifications();

            prop_assert_eq!(window.len(), flags.len().min(50));
            prop_assert_eq!(
                notifications.unread_count(),
                window.iter().filter(|n| !n.read).count()
            );

            notifications.mark_all_read().await.unwrap();
            harness.settle().await;
            prop_assert_eq!(notifications.unread_count(), 0);
            Ok(())
        })?;
    }
}
