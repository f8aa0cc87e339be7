use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use workbench_core::grt::{GrtObjectRef, MetaClassRegistry};
use workbench_core::idle::IdleQueue;
use workbench_editor::config::load_or_default;
use workbench_editor::db_object_editor::LIVE_RDBMS_KEY;
use workbench_editor::prompt::FixedPrompt;
use workbench_editor::refresh_ui::REFRESH_TITLE;
use workbench_editor::{
    AutoUndoEdit, DbObjectEditor, EditorConfig, EditorContext, ObjectEditor, PromptChoice,
    UserPrompt, logging,
};

struct CountingPrompt {
    choice: PromptChoice,
    calls: AtomicUsize,
}

impl UserPrompt for CountingPrompt {
    fn confirm_save(&self, _title: &str, _message: &str) -> PromptChoice {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.choice
    }
}

fn context_with(queue: &Arc<IdleQueue>, config: EditorConfig) -> EditorContext {
    EditorContext::new(
        config,
        queue.clone(),
        Arc::new(FixedPrompt(PromptChoice::Cancel)),
    )
}

fn table_in_schema(classes: &MetaClassRegistry) -> (GrtObjectRef, GrtObjectRef) {
    let catalog = classes.instantiate("db.Catalog").unwrap();
    catalog.set_member("version", "8.0.16");
    let schema = classes.instantiate("db.Schema").unwrap();
    schema.set_member("name", "shop");
    catalog.add_owned("schemata", &schema);
    let table = classes.instantiate("db.Table").unwrap();
    table.set_member("name", "orders");
    schema.add_owned("tables", &table);
    (schema, table)
}

fn count_refreshes(editor: &DbObjectEditor) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    editor.base().refresh_ui().set_refresh_callback(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn configured_session_uses_file_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "max_undo = 2\nextra_ignored_fields = [\"modelVersion\"]\nlog_filter = \"debug\""
    )
    .unwrap();
    let config = load_or_default(file.path());
    logging::init(&config.log_filter);

    let queue = Arc::new(IdleQueue::new());
    let context = context_with(&queue, config);
    let classes = MetaClassRegistry::with_db_classes();
    let (_, table) = table_in_schema(&classes);
    let editor = DbObjectEditor::new(&context, table.clone(), None);
    let refreshes = count_refreshes(&editor);

    table.set_member("modelVersion", 3_i64);
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);

    editor.set_name("a");
    editor.set_comment("b");
    editor.set_sql_commented(true);
    assert_eq!(context.undo.undo_count(), 2);
}

// ---------------------------------------------------------------------------
// Editing sessions
// ---------------------------------------------------------------------------

#[test]
fn batch_edit_refreshes_once_and_undoes_as_one_step() {
    let queue = Arc::new(IdleQueue::new());
    let context = context_with(&queue, EditorConfig::default());
    let classes = MetaClassRegistry::with_db_classes();
    let (_, table) = table_in_schema(&classes);
    let editor = DbObjectEditor::new(&context, table.clone(), None);
    let refreshes = count_refreshes(&editor);

    editor.base().freeze_refresh_on_object_change();
    {
        let mut undo = AutoUndoEdit::new(editor.as_ref());
        for name in ["id", "total", "placed_at"] {
            let column = classes.instantiate("db.Column").unwrap();
            column.set_member("name", name);
            table.add_owned("columns", &column);
        }
        table.set_member("comment", "customer orders");
        undo.end("Add Columns");
    }
    editor.base().thaw_refresh_on_object_change(false);

    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(context.undo.undo_description().as_deref(), Some("Add Columns"));

    context.undo.undo().unwrap();
    assert_eq!(table.list_len("columns"), 0);
    assert_eq!(editor.comment(), "");
}

#[test]
fn two_editors_on_one_object_see_each_others_edits() {
    let queue = Arc::new(IdleQueue::new());
    let context = context_with(&queue, EditorConfig::default());
    let classes = MetaClassRegistry::with_db_classes();
    let (_, table) = table_in_schema(&classes);
    let first = DbObjectEditor::new(&context, table.clone(), None);
    let second = DbObjectEditor::new(&context, table.clone(), None);
    let first_refreshes = count_refreshes(&first);
    let second_refreshes = count_refreshes(&second);

    first.set_comment("from first");
    second.set_comment("from second");

    assert_eq!(first.comment(), "from second");
    assert_eq!(first_refreshes.load(Ordering::SeqCst), 2);
    assert_eq!(second_refreshes.load(Ordering::SeqCst), 2);
    // Both editors record into the one shared stack, coalesced per member.
    assert_eq!(context.undo.undo_count(), 1);
}

#[test]
fn rename_from_worker_thread_refreshes_on_idle() {
    let queue = Arc::new(IdleQueue::new());
    let context = context_with(&queue, EditorConfig::default());
    let classes = MetaClassRegistry::with_db_classes();
    let (_, table) = table_in_schema(&classes);
    let editor = DbObjectEditor::new(&context, table.clone(), None);
    let refreshes = count_refreshes(&editor);
    let titles = Arc::new(Mutex::new(Vec::new()));
    let t = titles.clone();
    editor
        .base()
        .refresh_ui()
        .set_partial_refresh_callback(move |reason| t.lock().push(reason));

    std::thread::scope(|scope| {
        scope.spawn(|| editor.set_name("invoices"));
    });

    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(*titles.lock(), vec![REFRESH_TITLE]);
    assert_eq!(queue.run_pending(), 1);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(editor.name(), "invoices");
}

#[test]
fn deleting_the_schema_closes_the_editor() {
    let queue = Arc::new(IdleQueue::new());
    let context = context_with(&queue, EditorConfig::default());
    let classes = MetaClassRegistry::with_db_classes();
    let (schema, table) = table_in_schema(&classes);
    let editor = DbObjectEditor::new(&context, table, None);

    assert!(editor.should_close_on_delete_of(schema.id()));
    assert!(editor.can_close());
}

// ---------------------------------------------------------------------------
// Live objects
// ---------------------------------------------------------------------------

#[test]
fn live_session_apply_then_close() {
    let queue = Arc::new(IdleQueue::new());
    let prompt = Arc::new(CountingPrompt {
        choice: PromptChoice::Save,
        calls: AtomicUsize::new(0),
    });
    let context = EditorContext::new(EditorConfig::default(), queue.clone(), prompt.clone());
    let classes = MetaClassRegistry::with_db_classes();
    let (_, table) = table_in_schema(&classes);
    let rdbms = classes.instantiate("db.mgmt.Rdbms").unwrap();
    table.set_custom_data(LIVE_RDBMS_KEY, rdbms);

    let editor = DbObjectEditor::new(&context, table.clone(), None);
    let applied = Arc::new(Mutex::new(table.name()));
    let a = applied.clone();
    editor.set_on_apply_changes_to_live_object(move |editor, dry_run| {
        let mut server_name = a.lock();
        if dry_run {
            return *server_name != editor.name();
        }
        *server_name = editor.name();
        true
    });

    editor.set_name("orders_v2");
    assert_eq!(context.undo.undo_count(), 0);

    assert!(editor.can_close());
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*applied.lock(), "orders_v2");

    assert!(editor.can_close());
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
}
