use std::sync::Arc;

use parking_lot::Mutex;
use workbench_core::grt::{GrtObject, MetaClassRegistry, Value};
use workbench_core::idle::{IdleQueue, UiScheduler};
use workbench_core::undo::{DEFAULT_MAX_UNDO, UndoManager};
use workbench_core::validation::{MessageType, ValidationManager, ValidationMessage};

// ---------------------------------------------------------------------------
// Object graph + undo manager
// ---------------------------------------------------------------------------

#[test]
fn schema_edit_session_round_trip() {
    let classes = MetaClassRegistry::with_db_classes();
    let manager = UndoManager::new(DEFAULT_MAX_UNDO);

    let schema = classes.instantiate("db.Schema").unwrap();
    schema.set_member("name", "shop");
    manager.track(&schema);

    let table = classes.instantiate("db.Table").unwrap();
    table.set_member("name", "orders");
    manager.track(&table);

    let group = manager.open_group(None, false).unwrap();
    schema.add_owned("tables", &table);
    table.set_member("comment", "all orders");
    schema.set_custom_data("sqlMode", "ANSI_QUOTES");
    manager.commit_group(group, "Add table").unwrap();

    assert_eq!(manager.undo_count(), 1);
    assert!(table.is_owned_by(&schema));

    manager.undo().unwrap();
    assert_eq!(schema.list_len("tables"), 0);
    assert_eq!(table.member("comment"), Value::None);
    assert!(!schema.has_custom_data("sqlMode"));

    manager.redo().unwrap();
    assert_eq!(schema.object_list("tables").len(), 1);
    assert_eq!(table.string_member("comment"), "all orders");
    assert_eq!(
        schema.custom_string("sqlMode").as_deref(),
        Some("ANSI_QUOTES")
    );
}

#[test]
fn edits_from_worker_thread_are_recorded() {
    let manager = UndoManager::new(DEFAULT_MAX_UNDO);
    let table = GrtObject::new("db.Table");
    manager.track(&table);

    let t = table.clone();
    std::thread::spawn(move || {
        t.set_member("name", "from worker");
    })
    .join()
    .unwrap();

    assert_eq!(manager.undo_count(), 1);
    manager.undo().unwrap();
    assert_eq!(table.name(), "");
}

// ---------------------------------------------------------------------------
// Validation broadcast + ownership walk
// ---------------------------------------------------------------------------

#[test]
fn validation_messages_reach_listeners_of_ancestors() {
    let classes = Arc::new(MetaClassRegistry::with_db_classes());
    let validation = ValidationManager::new(classes.clone());

    let table = classes.instantiate("db.Table").unwrap();
    let column = classes.instantiate("db.Column").unwrap();
    table.add_owned("columns", &column);

    let latched: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let l = latched.clone();
    let watched = table.clone();
    let _conn = validation.signal_notify().connect(move |m: &ValidationMessage| {
        if m.object.as_ref().is_some_and(|o| o.is_owned_by(&watched)) {
            *l.lock() = Some(m.message.clone());
        }
    });

    validation.notify(ValidationMessage {
        tag: "columns".into(),
        object: Some(column),
        message: "Column has no type".into(),
        level: MessageType::Warning,
    });
    assert_eq!(latched.lock().as_deref(), Some("Column has no type"));
}

// ---------------------------------------------------------------------------
// Idle queue
// ---------------------------------------------------------------------------

#[test]
fn rescheduling_replaces_pending_task() {
    let queue = IdleQueue::new();
    let runs = Arc::new(Mutex::new(Vec::new()));

    let r = runs.clone();
    let mut slot = Some(queue.run_once_when_idle(Box::new(move || r.lock().push(1))));
    assert!(slot.as_ref().is_some_and(|h| !h.is_cancelled()));

    let r = runs.clone();
    // Replacing the stored handle drops the previous one, which cancels its task.
    slot.replace(queue.run_once_when_idle(Box::new(move || r.lock().push(2))));

    assert_eq!(queue.run_pending(), 1);
    assert_eq!(*runs.lock(), vec![2]);
}
