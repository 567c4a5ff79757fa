use std::io::Cursor;

use checkmark_core::backend::{BackendKind, LocalBackend, RemoteBackend, RemoteConfig};
use checkmark_core::cli::Invocation;
use checkmark_core::commands::{Flow, Session};
use checkmark_core::config::Config;
use checkmark_core::datastore::{KeyValueStore, MemoryStore};
use checkmark_core::render::Renderer;
use checkmark_core::store::TaskStore;
use checkmark_core::task::Task;

fn session(storage: &MemoryStore, ask_confirmation: bool) -> Session {
    let local = LocalBackend::new(Box::new(storage.clone()), "tasks");
    let remote = RemoteBackend::new(RemoteConfig::default().with_base_url("http://127.0.0.1:9"))
        .expect("client");
    let store = TaskStore::new(Box::new(local), Box::new(remote), BackendKind::Local);
    Session::new(store, Renderer::plain(), ask_confirmation)
}

fn stored(storage: &MemoryStore) -> Vec<Task> {
    serde_json::from_str(&storage.get_item("tasks").unwrap().unwrap_or_default()).unwrap_or_default()
}

async fn run_shell(session: &mut Session, script: &str) -> String {
    let cfg = Config::default();
    let mut input = Cursor::new(script.as_bytes().to_vec());
    let mut out = Vec::new();
    session.start(&mut out).await.unwrap();
    session.run_shell(&cfg, &mut input, &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn shell_drives_add_toggle_edit_and_filter() {
    let storage = MemoryStore::new();
    let mut session = session(&storage, false);

    let out = run_shell(
        &mut session,
        "add buy milk\nadd walk   the dog\nadd    \nfilter active\nquit\nadd never\n",
    )
    .await;

    assert!(out.contains("Created task"));
    assert!(out.contains("(filter: active)"));
    assert!(out.contains("2 tasks, 0 completed, 2 pending"));

    let tasks = session.store().tasks().to_vec();
    assert_eq!(tasks.len(), 2, "blank add ignored and input after quit unread");
    assert_eq!(tasks[0].text, "walk the dog");
    assert_eq!(stored(&storage), tasks);

    let id = tasks[1].id;
    let cfg = Config::default();
    let mut input = Cursor::new(Vec::new());
    let mut out = Vec::new();
    for line in [format!("toggle {id}"), format!("edit {id} buy oat milk")] {
        let inv = Invocation::from_line(&cfg, &line).unwrap();
        let flow = session.dispatch(&inv, &mut input, &mut out).await.unwrap();
        assert_eq!(flow, Flow::Continue);
    }

    let task = session.store().get(id).unwrap();
    assert!(task.completed);
    assert_eq!(task.text, "buy oat milk");
}

#[tokio::test]
async fn declined_confirmation_keeps_tasks() {
    let storage = MemoryStore::new();
    storage
        .set_item(
            "tasks",
            r#"[{"id":2,"text":"b","completed":true},{"id":1,"text":"a","completed":false}]"#,
        )
        .unwrap();
    let mut session = session(&storage, true);

    let out = run_shell(&mut session, "delete 1\nno\nclear\nn\n").await;
    assert!(out.contains("Are you sure you want to delete this task? (yes/no)"));
    assert!(out.contains("Are you sure you want to clear all completed tasks? (yes/no)"));
    assert_eq!(session.store().tasks().len(), 2);

    let out = run_shell(&mut session, "clear\nyes\ndelete 1\ny\n").await;
    assert!(out.contains("0 tasks, 0 completed, 0 pending"));
    assert!(session.store().tasks().is_empty());
    assert!(stored(&storage).is_empty());
}

#[tokio::test]
async fn bad_input_is_reported_and_the_shell_continues() {
    let storage = MemoryStore::new();
    let mut session = session(&storage, false);

    let out = run_shell(
        &mut session,
        "toggle abc\nfilter someday\nfrobnicate\nstats\n",
    )
    .await;
    assert!(out.contains("error: invalid task id: abc"));
    assert!(out.contains("error: unknown filter: someday"));
    assert!(out.contains("error: unknown or ambiguous command: frobnicate"));
    assert!(out.contains("0 tasks, 0 completed, 0 pending"));
}

#[tokio::test]
async fn unreachable_remote_is_reported_not_fatal() {
    let storage = MemoryStore::new();
    let mut session = session(&storage, false);

    let out = run_shell(&mut session, "add local task\nbackend remote\nbackend local\n").await;
    assert!(out.contains("failed to load tasks"));
    assert!(out.contains("Currently using: API Storage"));
    assert_eq!(session.store().active_backend(), BackendKind::Local);
    assert_eq!(session.store().tasks().len(), 1);
}
