//! Integration tests for the `tasksyncd` socket server.
//!
//! Starts a server on a temporary socket with a recording transport and a
//! recording writeback sink, then talks to it with `DaemonClient` the way
//! the hooks do.
//!
//! Verification command: `cargo test --test daemon_roundtrip`

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tasksync::client::DaemonClient;
use tasksync::provider::{Provider, SyncSettings, Writeback};
use tasksync::store::CacheStore;
use tasksync::transport::RecordingTransport;
use tasksync_daemon::server::{DaemonError, Server, Timing};
use tasksync_daemon::writeback::{WritebackError, WritebackSink};
use tasksync_proto::command::Command;
use tasksync_proto::daemon::{DaemonRequest, DaemonResponse};
use tasksync_proto::sync::PullResponse;
use tempfile::TempDir;
use uuid::Uuid;

// =============================================================================
// Test helpers
// =============================================================================

/// Sink that remembers every writeback instead of running the host.
#[derive(Clone, Default)]
struct RecordingSink {
    applied: Arc<Mutex<Vec<Writeback>>>,
}

impl RecordingSink {
    fn applied(&self) -> Vec<Writeback> {
        self.applied.lock().unwrap().clone()
    }
}

impl WritebackSink for RecordingSink {
    async fn apply(&self, writeback: &Writeback) -> Result<(), WritebackError> {
        self.applied.lock().unwrap().push(writeback.clone());
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    socket: PathBuf,
    transport: Arc<RecordingTransport>,
    sink: RecordingSink,
    handle: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn client(&self) -> DaemonClient {
        DaemonClient::new(&self.socket, Duration::from_secs(2))
    }

    async fn request(&self, request: DaemonRequest) -> DaemonResponse {
        self.client().request(&request).await.expect("daemon request")
    }

    async fn stop(self) {
        assert_eq!(self.request(DaemonRequest::Stop).await, DaemonResponse::Stopping);
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("server exits")
            .expect("server task");
        assert!(!self.socket.exists(), "socket removed on exit");
    }
}

fn write_projects(dir: &Path) {
    let projects = json!([
        {"id": "1", "name": "Inbox"},
        {"id": "42", "name": "Work"},
    ]);
    std::fs::write(dir.join("projects.json"), projects.to_string()).unwrap();
}

async fn start(flush_interval: Duration) -> Harness {
    start_with(Timing {
        flush_interval,
        max_batch_age: Duration::from_secs(600),
        connection_timeout: Duration::from_secs(2),
    })
    .await
}

async fn start_with(timing: Timing) -> Harness {
    let dir = TempDir::new().unwrap();
    write_projects(dir.path());
    // Parent directory does not exist yet; the server creates it.
    let socket = dir.path().join("run").join("tasksync.sock");

    let transport = Arc::new(RecordingTransport::new());
    let sink = RecordingSink::default();
    let store = CacheStore::load(dir.path()).unwrap();
    let provider = Provider::new(store, Arc::clone(&transport), SyncSettings::default());
    let server = Server::bind(&socket, provider, sink.clone(), timing)
        .await
        .expect("bind daemon socket");
    let handle = tokio::spawn(server.run());

    Harness {
        _dir: dir,
        socket,
        transport,
        sink,
        handle,
    }
}

fn task_line(uuid: Uuid, extra: &serde_json::Value) -> String {
    let mut task = json!({
        "uuid": uuid.to_string(),
        "description": "Write changelog",
        "status": "pending",
    });
    for (key, value) in extra.as_object().unwrap() {
        task[key] = value.clone();
    }
    task.to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn added_task_is_pushed_when_idle_and_written_back() {
    let harness = start(Duration::from_millis(200)).await;
    let uuid = Uuid::new_v4();

    let response = harness
        .request(DaemonRequest::OnAdd {
            task: task_line(uuid, &json!({"project": "Work"})),
        })
        .await;
    let DaemonResponse::Feedback { task, message } = response else {
        panic!("expected feedback, got {response:?}");
    };
    assert_eq!(message, "Todoist: item created");
    let printed: serde_json::Value = serde_json::from_str(&task).unwrap();
    assert_eq!(printed["uuid"], uuid.to_string());
    assert_eq!(printed["timezone"], "UTC");

    assert_eq!(
        harness.request(DaemonRequest::Status).await,
        DaemonResponse::Status {
            pid: std::process::id(),
            pending: 1,
        }
    );

    tokio::time::sleep(Duration::from_millis(600)).await;

    let batches = harness.transport.batches();
    assert_eq!(batches.len(), 1);
    let pushed = serde_json::to_value(&batches[0]).unwrap();
    assert_eq!(pushed[0]["type"], "item_add");
    assert_eq!(pushed[0]["args"]["project_id"], "42");
    assert_eq!(
        harness.sink.applied(),
        vec![Writeback {
            task: uuid,
            remote_id: "1000".into(),
        }]
    );

    assert!(matches!(
        harness.request(DaemonRequest::Status).await,
        DaemonResponse::Status { pending: 0, .. }
    ));
    // Once at startup, once after the push.
    assert_eq!(harness.transport.pull_tokens().len(), 2);
    harness.stop().await;
}

#[tokio::test]
async fn steady_requests_do_not_hold_back_an_old_batch() {
    let harness = start_with(Timing {
        flush_interval: Duration::from_secs(60),
        max_batch_age: Duration::from_millis(300),
        connection_timeout: Duration::from_secs(2),
    })
    .await;

    let response = harness
        .request(DaemonRequest::OnAdd {
            task: task_line(Uuid::new_v4(), &json!({})),
        })
        .await;
    assert!(matches!(response, DaemonResponse::Feedback { .. }));

    // Never idle for the flush interval.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.request(DaemonRequest::Status).await;
    }

    assert_eq!(harness.transport.batches().len(), 1);
    assert_eq!(harness.sink.applied().len(), 1);
    harness.stop().await;
}

#[tokio::test]
async fn sync_request_pushes_then_refreshes_the_cache() {
    let harness = start(Duration::from_secs(60)).await;
    // The startup pull has happened once the first request is answered.
    harness.request(DaemonRequest::Status).await;
    assert_eq!(harness.transport.pull_tokens(), ["*"]);

    let first = Uuid::new_v4();
    let response = harness
        .request(DaemonRequest::OnModify {
            old: task_line(first, &json!({"todoist": "500"})),
            new: task_line(first, &json!({"todoist": "500", "project": "Travel"})),
        })
        .await;
    assert!(matches!(
        response,
        DaemonResponse::Feedback { ref message, .. } if message == "Todoist: item moved"
    ));

    harness.transport.queue_pull(PullResponse {
        sync_token: "t1".into(),
        projects: vec![json!({"id": "77", "name": "Travel"})],
        ..PullResponse::default()
    });
    assert_eq!(
        harness.request(DaemonRequest::Sync { full: false }).await,
        DaemonResponse::Synced { changed: 1 }
    );
    let batches = harness.transport.batches();
    assert_eq!(batches.len(), 1);
    let names: Vec<_> = batches[0].iter().map(Command::name).collect();
    assert_eq!(names, ["project_add", "item_move"]);

    let second = Uuid::new_v4();
    harness
        .request(DaemonRequest::OnModify {
            old: task_line(second, &json!({"todoist": "501"})),
            new: task_line(second, &json!({"todoist": "501", "project": "Travel"})),
        })
        .await;
    assert_eq!(
        harness.request(DaemonRequest::Sync { full: false }).await,
        DaemonResponse::Synced { changed: 0 }
    );

    let batches = harness.transport.batches();
    assert_eq!(batches.len(), 2);
    let pushed = serde_json::to_value(&batches[1]).unwrap();
    assert_eq!(pushed.as_array().unwrap().len(), 1);
    assert_eq!(pushed[0]["args"]["project_id"], "77");
    assert_eq!(harness.transport.pull_tokens(), ["*", "*", "t1"]);
    harness.stop().await;
}

#[tokio::test]
async fn invalid_task_line_gets_error_response() {
    let harness = start(Duration::from_secs(60)).await;
    let response = harness
        .request(DaemonRequest::OnAdd {
            task: "{\"description\": \"no uuid\"}".into(),
        })
        .await;
    assert!(matches!(response, DaemonResponse::Error { .. }));
    harness.stop().await;
}

#[tokio::test]
async fn second_daemon_on_same_socket_is_refused() {
    let harness = start(Duration::from_secs(60)).await;

    let dir = TempDir::new().unwrap();
    let store = CacheStore::load(dir.path()).unwrap();
    let provider = Provider::new(store, RecordingTransport::new(), SyncSettings::default());
    let timing = Timing {
        flush_interval: Duration::from_secs(60),
        max_batch_age: Duration::from_secs(600),
        connection_timeout: Duration::from_secs(2),
    };
    let result = Server::bind(&harness.socket, provider, RecordingSink::default(), timing).await;
    assert!(matches!(result, Err(DaemonError::AlreadyRunning(_))));

    harness.stop().await;
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("tasksync.sock");
    std::fs::write(&socket, b"stale").unwrap();

    let store = CacheStore::load(dir.path()).unwrap();
    let provider = Provider::new(store, RecordingTransport::new(), SyncSettings::default());
    let timing = Timing {
        flush_interval: Duration::from_secs(60),
        max_batch_age: Duration::from_secs(600),
        connection_timeout: Duration::from_secs(2),
    };
    let server = Server::bind(&socket, provider, RecordingSink::default(), timing)
        .await
        .expect("bind over stale socket");
    assert_eq!(server.socket_path(), socket);
    drop(server);
    assert!(!socket.exists());
}

#[tokio::test]
async fn client_reports_unavailable_daemon() {
    let dir = TempDir::new().unwrap();
    let client = DaemonClient::new(dir.path().join("absent.sock"), Duration::from_secs(1));
    let err = client.request(&DaemonRequest::Status).await.unwrap_err();
    assert!(matches!(err, tasksync::client::ClientError::Unavailable(_)));
}
