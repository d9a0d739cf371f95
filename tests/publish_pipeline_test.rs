//! Publish pipeline: rows are persisted, linked and idempotent before the
//! message leaves the process.

mod common;

use common::{result_envelope, system_with, test_config, RecordingMessagingService};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tasker_tracking::messaging::{MessagingService, TaskMessage, TransportKind};
use tasker_tracking::models::{InMemoryTaskStore, TaskStore};
use tasker_tracking::publish::{Chain, OptionResolver, PublishInterceptor, Signature};
use tasker_tracking::TaskStatus;

#[tokio::test]
async fn test_chain_rows_exist_and_are_linked_before_execution() {
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(test_config(), transport.clone());

    let chain = Signature::new("exports.generate")
        .with_id("A")
        .then(Signature::new("exports.deliver").with_id("B"))
        .then(Signature::new("notify.email").with_id("C").immutable(true));
    let handle = system.publisher().apply_async(chain).await.unwrap();

    assert_eq!(handle.task_id, "C");
    assert_eq!(handle.root_id.as_deref(), Some("A"));
    assert_eq!(store.len(), 3);

    let a = store.find("A").await.unwrap().unwrap();
    let b = store.find("B").await.unwrap().unwrap();
    let c = store.find("C").await.unwrap().unwrap();
    assert_eq!((a.root_id.as_deref(), a.parent_id.as_deref()), (Some("A"), None));
    assert_eq!((b.root_id.as_deref(), b.parent_id.as_deref()), (Some("A"), Some("A")));
    assert_eq!((c.root_id.as_deref(), c.parent_id.as_deref()), (Some("A"), Some("B")));
    assert_eq!(c.immutable, Some(true));
    assert!([&a, &b, &c].iter().all(|r| r.status == TaskStatus::Pending));

    // Only the head travels; the rest rides in its headers
    assert_eq!(transport.queue_length("default").await, 1);
    let sent = transport
        .receive_messages("default", 1, std::time::Duration::from_secs(30))
        .await
        .unwrap();
    let message = TaskMessage::from_value(sent[0].payload.clone()).unwrap();
    assert_eq!(message.id(), "A");
    let carried: Vec<_> = message.headers.chain.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(carried, vec!["C", "B"]);
}

#[tokio::test]
async fn test_chain_status_follows_results() {
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(test_config(), transport);
    let consumer = system.result_consumer().unwrap();

    let chain = Signature::new("jobs.a").then(Signature::new("jobs.b"));
    let ids = chain.ids();
    let handle = system.publisher().apply_async(chain).await.unwrap();
    let store_ref: &dyn TaskStore = store.as_ref();

    assert_eq!(handle.chain_status(store_ref).await.unwrap(), TaskStatus::Pending);

    consumer
        .handler()
        .process(result_envelope(&ids[0], "SUCCESS", json!({"file": "a.csv"})))
        .await
        .unwrap();
    assert_eq!(handle.chain_status(store_ref).await.unwrap(), TaskStatus::Started);
    assert_eq!(handle.output(store_ref).await.unwrap(), None);

    consumer
        .handler()
        .process(result_envelope(&ids[1], "SUCCESS", json!("sent")))
        .await
        .unwrap();
    assert_eq!(handle.chain_status(store_ref).await.unwrap(), TaskStatus::Success);
    assert_eq!(handle.status(store_ref).await.unwrap(), TaskStatus::Success);
    assert_eq!(handle.output(store_ref).await.unwrap(), Some(json!("sent")));
}

#[tokio::test]
async fn test_republishing_same_ids_keeps_one_row_each() {
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(test_config(), transport.clone());

    for _ in 0..3 {
        let chain = Signature::new("jobs.a")
            .with_id("same-a")
            .then(Signature::new("jobs.b").with_id("same-b"));
        system.publisher().apply_async(chain).await.unwrap();
    }
    assert_eq!(store.len(), 2);
    assert_eq!(transport.queue_length("default").await, 3);
}

#[tokio::test]
async fn test_routing_table_selects_queue() {
    let mut config = test_config();
    config
        .messaging
        .routes
        .insert("exports.generate".into(), "exports".into());
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(config, transport.clone());

    let handle = system
        .publisher()
        .apply_async(Signature::new("exports.generate"))
        .await
        .unwrap();
    assert_eq!(handle.queue, "exports");
    assert_eq!(transport.queue_length("exports").await, 1);

    let record = store.find(&handle.task_id).await.unwrap().unwrap();
    assert_eq!(record.options.queue.as_deref(), Some("exports"));
    assert_eq!(record.options.reply_to.as_deref(), Some("task_results"));
    assert_eq!(record.parent_id, None);
    assert_eq!(record.root_id, None);
}

#[tokio::test]
async fn test_broker_outage_becomes_publish_unavailable() {
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(test_config(), transport.clone());
    transport.set_available(false);

    for _ in 0..3 {
        let err = system
            .publisher()
            .apply_async(Signature::new("jobs.a"))
            .await
            .unwrap_err();
        assert!(!err.is_publish_unavailable());
    }

    let err = system
        .publisher()
        .apply_async(Signature::new("jobs.a"))
        .await
        .unwrap_err();
    assert!(err.is_publish_unavailable());
    // Rows were written before each send was attempted
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn test_store_failure_aborts_publish() {
    let transport = Arc::new(RecordingMessagingService::new(TransportKind::Pgmq));
    let (system, store) = system_with(test_config(), transport.clone());
    store.inject_failure(tasker_tracking::models::StoreError::ConnectionLost("down".into()));

    assert!(system
        .publisher()
        .apply_async(Signature::new("jobs.a"))
        .await
        .is_err());
    assert_eq!(transport.queue_length("default").await, 0);
}

proptest! {
    #[test]
    fn prop_chain_linkage_holds_for_any_length(len in 1usize..12) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryTaskStore::new());
            let interceptor = PublishInterceptor::new(
                store.clone(),
                OptionResolver::from_config(&Default::default()),
            );
            let transport = Arc::new(RecordingMessagingService::new(TransportKind::InMemory));
            let (system, _) = system_with(test_config(), transport);

            let mut chain = Chain::from(Signature::new("jobs.step"));
            for _ in 1..len {
                chain = chain.then(Signature::new("jobs.step"));
            }
            let ids = chain.ids();
            let message = system.publisher().encode(&chain).unwrap();
            interceptor.before_publish(&message).await.unwrap();

            for (k, id) in ids.iter().enumerate() {
                let record = store.find(id).await.unwrap().unwrap();
                if len == 1 {
                    prop_assert_eq!(record.root_id, None);
                    prop_assert_eq!(record.parent_id, None);
                    continue;
                }
                prop_assert_eq!(record.root_id.as_deref(), Some(ids[0].as_str()));
                let expected_parent = if k == 0 { None } else { Some(ids[k - 1].as_str()) };
                prop_assert_eq!(record.parent_id.as_deref(), expected_parent);
                prop_assert_eq!(record.chain_position, Some(k as i32));
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
