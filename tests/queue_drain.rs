mod util;

use hearthlist_lib::queue::{PendingQueue, QueueOptions, WriteKind};
use hearthlist_lib::remote::RemoteError;
use hearthlist_lib::store::StoreHandle;
use serde_json::json;

use util::MockRemote;

#[tokio::test]
async fn offline_shopping_item_replays_after_reconnect() {
    let queue = PendingQueue::new(StoreHandle::in_memory());
    let remote = MockRemote::new();
    remote.set_offline(true);

    // The item was created while offline: it shows up locally with a
    // temporary id and goes into the queue.
    queue.enqueue(
        WriteKind::AddShoppingItem,
        json!({"id": "tmp-42", "name": "Milk", "qty": 1}),
        "h1",
    );
    assert_eq!(queue.len(), 1);

    // Still offline: the drain halts and keeps the entry.
    let report = queue.drain(&remote).await;
    assert!(report.halted);
    assert_eq!(queue.len(), 1);

    // Connectivity returns; the replay submits one insert, stripped of
    // the temporary id.
    remote.set_offline(false);
    let report = queue.drain(&remote).await;
    assert_eq!(report.submitted, 1);
    assert_eq!(queue.len(), 0);

    let inserted = remote.inserted();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].0, "shopping_items");
    assert_eq!(inserted[0].1, json!({"name": "Milk", "qty": 1}));
}

#[tokio::test]
async fn drain_respects_insertion_order_across_kinds() {
    let queue = PendingQueue::new(StoreHandle::in_memory());
    let remote = MockRemote::new();

    queue.enqueue(WriteKind::AddExpense, json!({"amount": 1}), "h1");
    queue.enqueue(WriteKind::AddShoppingItem, json!({"name": "Tea"}), "h1");
    queue.enqueue(WriteKind::AddCredit, json!({"amount": 2}), "h1");
    queue.enqueue(WriteKind::AddWishlistItem, json!({"name": "Bike"}), "h1");

    queue.drain(&remote).await;

    let collections: Vec<String> = remote
        .inserted()
        .into_iter()
        .map(|(collection, _)| collection)
        .collect();
    assert_eq!(
        collections,
        vec!["expenses", "shopping_items", "credits", "wishlist_items"]
    );
}

#[tokio::test]
async fn permanent_rejection_drops_only_the_bad_entry() {
    let queue = PendingQueue::new(StoreHandle::in_memory());
    let remote = MockRemote::new();
    remote
        .insert_responses
        .lock()
        .unwrap()
        .push_back(Err(RemoteError::validation(
            "23503",
            "list_id is not present in table lists",
        )));

    queue.enqueue(WriteKind::AddShoppingItem, json!({"name": "Ghost"}), "h1");
    queue.enqueue(WriteKind::AddShoppingItem, json!({"name": "Milk"}), "h1");

    let report = queue.drain(&remote).await;

    assert_eq!(report.dropped, 1);
    assert_eq!(report.submitted, 1);
    assert!(!report.halted);
    assert_eq!(queue.len(), 0);
}

#[tokio::test]
async fn queue_survives_process_restart() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("store.json");

    {
        let queue = PendingQueue::new(StoreHandle::file(&path)?);
        queue.enqueue(WriteKind::AddExpense, json!({"amount": 7}), "h1");
    }

    // A new process opens the same store and still sees the entry.
    let queue = PendingQueue::new(StoreHandle::file(&path)?);
    assert_eq!(queue.len(), 1);

    let remote = MockRemote::new();
    queue.drain(&remote).await;
    assert_eq!(queue.len(), 0);
    assert_eq!(remote.inserted().len(), 1);
    Ok(())
}

#[tokio::test]
async fn ceiling_parks_a_poison_entry_and_frees_the_queue() {
    let queue = PendingQueue::with_options(
        StoreHandle::in_memory(),
        QueueOptions {
            max_attempts: Some(1),
        },
    );
    let remote = MockRemote::new();
    remote.set_offline(true);

    queue.enqueue(WriteKind::AddCredit, json!({"amount": 3}), "h1");
    queue.enqueue(WriteKind::AddCredit, json!({"amount": 4}), "h1");

    let report = queue.drain(&remote).await;
    assert_eq!(report.parked, 1);
    assert_eq!(queue.dead_letters().len(), 1);
    assert_eq!(queue.len(), 1);

    remote.set_offline(false);
    queue.drain(&remote).await;
    assert_eq!(queue.len(), 0);
}
