//! Integration tests for buffering and pushing command batches.
//!
//! Verification command: `cargo test --test provider`

use chrono_tz::UTC;
use serde_json::json;
use tasksync::model::{Priority, Status, TaskSnapshot};
use tasksync::provider::{Provider, ProviderError, SyncSettings};
use tasksync::store::{CacheStore, Collection, LookupStore, MemoryStore};
use tasksync::transport::{RecordingTransport, TransportError};
use tasksync_proto::command::{Command, ItemRef};
use tasksync_proto::sync::PullResponse;
use uuid::Uuid;

fn provider() -> Provider<MemoryStore, RecordingTransport> {
    let store = MemoryStore::new().with_project("1", "Inbox");
    Provider::new(store, RecordingTransport::new(), SyncSettings::default())
}

fn task(description: &str) -> TaskSnapshot {
    TaskSnapshot::new(Uuid::new_v4(), description, Status::Pending)
}

#[tokio::test]
async fn events_are_batched_into_one_push() {
    let mut provider = provider();
    let first = task("First");
    let second = task("Second");
    provider.on_add(&first);
    provider.on_add(&second);
    let old = task("Third").with_remote_id(ItemRef::resolved("77"));
    let new = old.clone().with_status(Status::Completed);
    provider.on_modify(&old, &new).unwrap();
    assert_eq!(provider.pending(), 3);

    let outcome = provider.push().await.unwrap();
    assert_eq!(outcome.pushed, 3);
    assert!(outcome.failures.is_empty());
    assert_eq!(provider.pending(), 0);

    let batches = provider.transport().batches();
    assert_eq!(batches.len(), 1);
    let names: Vec<_> = batches[0].iter().map(Command::name).collect();
    assert_eq!(names, ["item_add", "item_add", "item_complete"]);

    let mut tasks: Vec<_> = outcome.writebacks.iter().map(|w| w.task).collect();
    tasks.sort();
    let mut expected = vec![first.uuid(), second.uuid()];
    expected.sort();
    assert_eq!(tasks, expected);
    assert!(outcome.writebacks.iter().all(|w| w.remote_id.parse::<u64>().is_ok()));
}

#[tokio::test]
async fn failed_push_keeps_buffer_for_retry() {
    let mut provider = provider();
    provider.on_add(&task("Retry me"));

    provider.transport().fail_with(Some(503));
    let err = provider.push().await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Transport(TransportError::Status { status: 503, .. })
    ));
    assert_eq!(provider.pending(), 1);
    assert!(provider.transport().batches().is_empty());

    provider.transport().fail_with(None);
    let outcome = provider.push().await.unwrap();
    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.writebacks.len(), 1);
    assert_eq!(provider.pending(), 0);
}

#[tokio::test]
async fn empty_buffer_is_not_pushed() {
    let mut provider = provider();
    let outcome = provider.push().await.unwrap();
    assert_eq!(outcome.pushed, 0);
    assert!(provider.transport().batches().is_empty());
}

#[test]
fn failed_translation_buffers_nothing() {
    let store = MemoryStore::new();
    let mut provider = Provider::new(store, RecordingTransport::new(), SyncSettings::default());
    let old = task("Orphan")
        .with_project("Gone")
        .with_remote_id(ItemRef::resolved("9"));
    let new = task("Orphan renamed").with_remote_id(ItemRef::resolved("9"));

    let err = provider.on_modify(&old, &new).unwrap_err();
    assert!(matches!(err, ProviderError::Translate(_)));
    assert_eq!(provider.pending(), 0);
}

#[test]
fn settings_drive_translation() {
    let store = MemoryStore::new().with_project("5", "Someday");
    let settings = SyncSettings {
        timezone: UTC,
        default_project: "Someday".into(),
    };
    let mut provider = Provider::new(store, RecordingTransport::new(), settings);
    let old = task("Idea")
        .with_project("Work")
        .with_remote_id(ItemRef::resolved("9"));
    let new = task("Idea").with_remote_id(ItemRef::resolved("9"));

    let batch = provider.on_modify(&old, &new).unwrap();
    let json = serde_json::to_value(&batch.commands).unwrap();
    assert_eq!(json[0]["args"]["project_id"], "5");
}

fn synced(description: &str, id: &str) -> TaskSnapshot {
    task(description).with_remote_id(ItemRef::resolved(id))
}

fn names(commands: &[Command]) -> Vec<&'static str> {
    commands.iter().map(Command::name).collect()
}

#[tokio::test]
async fn modify_before_push_edits_the_buffered_add() {
    let mut provider = provider();
    let added = task("Draft");
    provider.on_add(&added);
    let edited = added.clone().with_priority(Priority::High);
    provider.on_modify(&added, &edited).unwrap();

    let pending = serde_json::to_value(provider.pending_commands()).unwrap();
    assert_eq!(names(provider.pending_commands()), ["item_add", "item_update"]);
    assert_eq!(pending[1]["args"]["id"], pending[0]["temp_id"]);

    let outcome = provider.push().await.unwrap();
    assert_eq!(outcome.writebacks.len(), 1);
    assert_eq!(outcome.writebacks[0].task, added.uuid());
}

#[tokio::test]
async fn moves_share_one_created_project() {
    let mut provider = provider();
    for (description, id) in [("Passport", "1"), ("Tickets", "2")] {
        let old = synced(description, id);
        let new = old.clone().with_project("Travel");
        provider.on_modify(&old, &new).unwrap();
    }

    let pending = serde_json::to_value(provider.pending_commands()).unwrap();
    assert_eq!(
        names(provider.pending_commands()),
        ["project_add", "item_move", "item_move"]
    );
    assert_eq!(pending[1]["args"]["project_id"], pending[0]["temp_id"]);
    assert_eq!(pending[2]["args"]["project_id"], pending[0]["temp_id"]);

    provider.push().await.unwrap();
    assert_eq!(
        provider.created_objects().project("Travel"),
        Some(&ItemRef::resolved("1000"))
    );

    // The cache has not been refreshed yet; the pushed project is reused.
    let old = synced("Visa", "3");
    let batch = provider.on_modify(&old, &old.clone().with_project("Travel")).unwrap();
    assert_eq!(names(&batch.commands), ["item_move"]);
    let json = serde_json::to_value(&batch.commands).unwrap();
    assert_eq!(json[0]["args"]["project_id"], "1000");
}

#[test]
fn section_move_creates_the_section_once() {
    let store = MemoryStore::new()
        .with_project("1", "Inbox")
        .with_project("42", "Work");
    let mut provider = Provider::new(store, RecordingTransport::new(), SyncSettings::default());
    for (description, id) in [("Report", "7"), ("Slides", "8")] {
        let old = synced(description, id).with_project("Work");
        let new = old.clone().with_section("Review");
        provider.on_modify(&old, &new).unwrap();
    }

    let pending = serde_json::to_value(provider.pending_commands()).unwrap();
    assert_eq!(
        names(provider.pending_commands()),
        ["section_add", "item_move", "item_move"]
    );
    assert_eq!(pending[0]["args"], json!({"name": "Review", "project_id": "42"}));
    for command in &pending.as_array().unwrap()[1..] {
        assert_eq!(command["args"]["section_id"], pending[0]["temp_id"]);
        assert!(command["args"].get("project_id").is_none());
    }
}

#[tokio::test]
async fn pull_forgets_projects_the_cache_now_lists() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::load(dir.path()).unwrap();
    let mut provider = Provider::new(store, RecordingTransport::new(), SyncSettings::default());
    provider.transport().queue_pull(PullResponse {
        sync_token: "t1".into(),
        full_sync: true,
        projects: vec![json!({"id": "1", "name": "Inbox", "inbox_project": true})],
        ..PullResponse::default()
    });
    assert_eq!(provider.pull(false).await.unwrap(), 1);

    let old = synced("Passport", "5");
    provider
        .on_modify(&old, &old.clone().with_project("Travel"))
        .unwrap();
    provider.push().await.unwrap();
    assert!(!provider.created_objects().is_empty());

    provider.transport().queue_pull(PullResponse {
        sync_token: "t2".into(),
        projects: vec![json!({"id": "1000", "name": "Travel"})],
        ..PullResponse::default()
    });
    assert_eq!(provider.pull(false).await.unwrap(), 1);
    assert!(provider.created_objects().is_empty());
    assert!(provider
        .store()
        .find(Collection::Projects, "name", "Travel")
        .is_some());
    assert_eq!(provider.transport().pull_tokens(), ["*", "t1"]);

    let reloaded = CacheStore::load(dir.path()).unwrap();
    assert_eq!(reloaded.sync_token(), "t2");
    assert_eq!(reloaded.records(Collection::Projects).len(), 2);
}
