//! Integration tests for translating host edits into command batches.
//!
//! Each test feeds a before/after pair (or a single added task) through the
//! translator against an in-memory project cache and checks the JSON the
//! remote service would receive.
//!
//! Verification command: `cargo test --test scenarios`

use chrono::{TimeZone, Utc};
use chrono_tz::{Europe, UTC};
use serde_json::{Value, json};
use tasksync::model::{Priority, Status, Tags, TaskSnapshot};
use tasksync::store::MemoryStore;
use tasksync::translate::{Action, NewProject, TranslateError, Translator, create_project};
use tasksync_proto::command::{Command, ItemRef, TempId, check_order};
use uuid::Uuid;

// =============================================================================
// Test helpers
// =============================================================================

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_project("1", "Inbox")
        .with_project("42", "Work")
        .with_project("99", "Errands")
}

/// A task already known to the remote service as item `"7"`.
fn synced(description: &str) -> TaskSnapshot {
    TaskSnapshot::new(Uuid::new_v4(), description, Status::Pending)
        .with_remote_id(ItemRef::resolved("7"))
}

fn to_json(commands: &[Command]) -> Vec<Value> {
    commands
        .iter()
        .map(|c| serde_json::to_value(c).unwrap())
        .collect()
}

fn arg_keys(command: &Value) -> Vec<String> {
    let mut keys: Vec<String> = command["args"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    keys.sort();
    keys
}

// =============================================================================
// Builder scenarios
// =============================================================================

#[test]
fn moving_into_known_project_emits_single_move() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Buy stamps");
    let new = old.clone().with_project("Errands");

    let commands = to_json(&tr.move_item(&old, &new).unwrap());
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["type"], "item_move");
    assert_eq!(commands[0]["args"], json!({"id": "7", "project_id": "99"}));
    assert!(commands[0].get("temp_id").is_none());
}

#[test]
fn moving_into_unknown_project_creates_it_first() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Book flights").with_project("Work");
    let new = old.clone().with_project("Travel");

    let commands = tr.move_item(&old, &new).unwrap();
    check_order(&commands).unwrap();
    let json = to_json(&commands);
    assert_eq!(json.len(), 2);
    assert_eq!(json[0]["type"], "project_add");
    assert_eq!(json[0]["args"], json!({"name": "Travel"}));
    let temp_id = json[0]["temp_id"].as_str().unwrap();
    assert_eq!(json[1]["type"], "item_move");
    assert_eq!(json[1]["args"], json!({"id": "7", "project_id": temp_id}));
}

#[test]
fn deletion_emits_only_delete() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Old chore");
    let new = old.clone().with_status(Status::Deleted);

    let delete = tr.delete_item(&old, &new).unwrap().unwrap();
    let json = serde_json::to_value(&delete).unwrap();
    assert_eq!(json["type"], "item_delete");
    assert_eq!(json["args"], json!({"id": "7"}));
    assert!(tr.complete_item(&old, &new).unwrap().is_none());
    assert!(tr.uncomplete_item(&old, &new).unwrap().is_none());
}

#[test]
fn new_top_priority_updates_only_priority() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Pay rent");
    let new = old.clone().with_priority(Priority::High);

    let update = tr.update_item(&old, &new).unwrap().unwrap();
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["type"], "item_update");
    assert_eq!(arg_keys(&json), ["id", "priority"]);
    assert_eq!(json["args"]["priority"], 4);
}

#[test]
fn removed_due_is_sent_as_null() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let due = Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap();
    let old = synced("Dentist").with_due(due);
    let new = synced("Dentist");

    let update = tr.update_item(&old, &new).unwrap().unwrap();
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(arg_keys(&json), ["due", "id"]);
    assert!(json["args"]["due"].is_null());
}

#[test]
fn removed_priority_and_tags_are_reset() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Review PR")
        .with_priority(Priority::Low)
        .with_tags(Tags::new(["work", "code"]));
    let new = synced("Review PR");

    let json = serde_json::to_value(tr.update_item(&old, &new).unwrap().unwrap()).unwrap();
    assert_eq!(json["args"]["priority"], 1);
    assert_eq!(json["args"]["labels"], json!([]));
}

#[test]
fn reordered_tags_are_unchanged() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Review PR").with_tags(Tags::new(["work", "code"]));
    let new = old.clone().with_tags(Tags::new(["code", "work"]));
    assert!(tr.update_item(&old, &new).unwrap().is_none());
}

#[test]
fn removing_project_moves_to_default() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Call bank").with_project("Work");
    let new = synced("Call bank");

    let json = to_json(&tr.move_item(&old, &new).unwrap());
    assert_eq!(json[0]["args"], json!({"id": "7", "project_id": "1"}));
}

#[test]
fn removing_project_without_default_fails() {
    let store = MemoryStore::new().with_project("42", "Work");
    let tr = Translator::new(&store, UTC);
    let old = synced("Call bank").with_project("Work");
    let new = synced("Call bank");

    let err = tr.move_item(&old, &new).unwrap_err();
    assert_eq!(
        err,
        TranslateError::DefaultProjectMissing {
            name: "Inbox".into()
        }
    );
}

#[test]
fn custom_default_project_is_used() {
    let store = store();
    let tr = Translator::new(&store, UTC).with_default_project("Errands");
    let old = synced("Call bank").with_project("Work");
    let new = synced("Call bank");

    let json = to_json(&tr.move_item(&old, &new).unwrap());
    assert_eq!(json[0]["args"]["project_id"], "99");
}

#[test]
fn change_without_remote_id_is_missing_target() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = TaskSnapshot::new(Uuid::new_v4(), "Draft", Status::Pending);
    let new = old.clone().with_status(Status::Completed);

    let err = tr.complete_item(&old, &new).unwrap_err();
    assert_eq!(
        err,
        TranslateError::MissingTarget {
            command: "item_complete"
        }
    );
}

#[test]
fn create_project_sends_only_set_attributes() {
    let bare = serde_json::to_value(create_project(NewProject::named("Garden"))).unwrap();
    assert_eq!(bare["type"], "project_add");
    assert_eq!(bare["args"], json!({"name": "Garden"}));
    assert!(bare["temp_id"].is_string());

    let full = serde_json::to_value(create_project(NewProject {
        temp_id: Some(TempId::from_string("tmp-garden")),
        color: Some("green".into()),
        parent_id: Some(ItemRef::resolved("42")),
        child_order: Some(3),
        is_favorite: Some(true),
        view_style: Some("board".into()),
        ..NewProject::named("Garden")
    }))
    .unwrap();
    assert_eq!(full["temp_id"], "tmp-garden");
    assert_eq!(
        full["args"],
        json!({
            "name": "Garden",
            "color": "green",
            "parent_id": "42",
            "child_order": 3,
            "is_favorite": true,
            "view_style": "board",
        })
    );
}

// =============================================================================
// Whole-event batches
// =============================================================================

#[test]
fn added_task_carries_all_set_fields() {
    let store = store();
    let tr = Translator::new(&store, Europe::Berlin);
    let due = Utc.with_ymd_and_hms(2024, 6, 10, 22, 0, 0).unwrap();
    let task = TaskSnapshot::new(Uuid::new_v4(), "Water plants", Status::Pending)
        .with_project("Errands")
        .with_priority(Priority::Medium)
        .with_tags(Tags::new(["home"]))
        .with_due(due);

    let batch = tr.on_add(&task);
    let json = to_json(&batch.commands);
    assert_eq!(json.len(), 1);
    assert_eq!(json[0]["type"], "item_add");
    // 22:00 UTC is local midnight in Berlin summer time.
    assert_eq!(
        json[0]["args"],
        json!({
            "content": "Water plants",
            "project_id": "99",
            "priority": 3,
            "labels": ["home"],
            "due": {"date": "2024-06-11", "is_recurring": false},
        })
    );
    assert_eq!(batch.feedback(), "Todoist: item created");
}

#[test]
fn added_task_in_unknown_project_omits_project() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let task = TaskSnapshot::new(Uuid::new_v4(), "Sketch", Status::Pending).with_project("Art");
    let json = to_json(&tr.on_add(&task).commands);
    assert_eq!(arg_keys(&json[0]), ["content"]);
}

#[test]
fn timed_due_carries_zone() {
    let store = store();
    let tr = Translator::new(&store, Europe::Berlin);
    let due = Utc.with_ymd_and_hms(2024, 1, 5, 8, 15, 0).unwrap();
    let task = TaskSnapshot::new(Uuid::new_v4(), "Standup", Status::Pending).with_due(due);
    let json = to_json(&tr.on_add(&task).commands);
    assert_eq!(
        json[0]["args"]["due"],
        json!({
            "date": "2024-01-05T08:15:00.000000Z",
            "timezone": "Europe/Berlin",
            "is_recurring": false,
        })
    );
}

#[test]
fn combined_edit_orders_update_move_complete() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Ship release").with_project("Work");
    let end = Utc.with_ymd_and_hms(2024, 2, 2, 12, 0, 0).unwrap();
    let new = old
        .clone()
        .with_priority(Priority::High)
        .with_project("Launch")
        .with_status(Status::Completed)
        .with_completed_at(end);

    let batch = tr.on_modify(&old, &new).unwrap();
    check_order(&batch.commands).unwrap();
    let names: Vec<_> = batch.commands.iter().map(Command::name).collect();
    assert_eq!(
        names,
        ["item_update", "project_add", "item_move", "item_complete"]
    );
    assert_eq!(
        batch.actions,
        [Action::Updated, Action::Moved, Action::Completed]
    );
    let json = to_json(&batch.commands);
    assert_eq!(
        json[3]["args"]["date_completed"],
        "2024-02-02T12:00:00.000000Z"
    );
    assert_eq!(
        batch.feedback(),
        "Todoist: item updated, moved, and completed"
    );
}

#[test]
fn reopened_task_is_uncompleted() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Fix bike").with_status(Status::Completed);
    let new = old.clone().with_status(Status::Pending);

    let batch = tr.on_modify(&old, &new).unwrap();
    let json = to_json(&batch.commands);
    assert_eq!(json.len(), 1);
    assert_eq!(json[0]["type"], "item_uncomplete");
    assert_eq!(json[0]["args"], json!({"id": "7"}));
}

#[test]
fn modified_task_without_remote_id_is_created() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = TaskSnapshot::new(Uuid::new_v4(), "Untracked", Status::Pending);
    let new = old.clone().with_priority(Priority::Low);

    let batch = tr.on_modify(&old, &new).unwrap();
    assert_eq!(batch.actions, [Action::Created]);
    assert_eq!(batch.created.unwrap().task, new.uuid());
}

#[test]
fn deleting_untracked_task_needs_nothing() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = TaskSnapshot::new(Uuid::new_v4(), "Untracked", Status::Pending);
    let new = old.clone().with_status(Status::Deleted);

    let batch = tr.on_modify(&old, &new).unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.feedback(), "Todoist: update not required");
}

#[test]
fn every_command_has_a_distinct_uuid() {
    let store = store();
    let tr = Translator::new(&store, UTC);
    let old = synced("Many edits");
    let new = old
        .clone()
        .with_priority(Priority::Low)
        .with_project("Nowhere")
        .with_status(Status::Deleted);

    let batch = tr.on_modify(&old, &new).unwrap();
    let mut uuids: Vec<_> = batch.commands.iter().map(|c| c.uuid.to_string()).collect();
    let count = uuids.len();
    uuids.sort();
    uuids.dedup();
    assert_eq!(uuids.len(), count);
}
