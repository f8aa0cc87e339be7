//! Change tracking shared by every object editor.
//!
//! A [`BaseEditor`] watches one edited object. Each effective change of that
//! object asks the UI layer to repaint, unless the change only touched an
//! ignored bookkeeping field or refreshes are frozen. Freezing nests; the
//! outermost thaw fires one refresh if anything changed meanwhile.
//!
//! # Thread affinity
//!
//! Changes may arrive on any thread. [`BaseEditor::request_refresh`] repaints
//! synchronously when called on the UI thread and otherwise defers the
//! repaint to the UI thread's next idle cycle. A newer deferred repaint
//! replaces an older one that has not run yet.
//!
//! # Capabilities
//!
//! Concrete editors implement [`ObjectEditor`]. Its provided methods carry
//! the generic apply/revert/close protocol; editors override the hooks they
//! need and call [`apply_changes`], [`revert_changes`] or [`can_close`] when
//! extending the generic behavior.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use workbench_core::grt::GrtObjectRef;
use workbench_core::idle::{IdleHandle, UiScheduler};
use workbench_core::signal::Connection;
use workbench_core::undo::{GroupId, UndoManager};

use crate::context::EditorContext;
use crate::refresh_ui::RefreshUi;
use crate::sql::CodeEditorControl;

/// Member written on every edit; never triggers a refresh.
pub const LAST_CHANGE_DATE: &str = "lastChangeDate";

static NEXT_FORM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Suppression {
    depth: usize,
    pending: usize,
}

struct Shared {
    form_id: String,
    object: RwLock<GrtObjectRef>,
    object_connections: Mutex<Vec<Connection>>,
    ignored_fields: RwLock<HashSet<String>>,
    suppression: Mutex<Suppression>,
    refresh: RefreshUi,
    scheduler: Arc<dyn UiScheduler>,
    undo: Arc<UndoManager>,
    pending_idle: Mutex<Option<IdleHandle>>,
    undo_connections: Mutex<HashMap<GroupId, Vec<Connection>>>,
}

impl Shared {
    fn object_member_changed(self: &Arc<Self>, member: &str) {
        if self.ignored_fields.read().contains(member) {
            return;
        }
        self.on_object_changed();
    }

    fn on_object_changed(self: &Arc<Self>) {
        {
            let mut suppression = self.suppression.lock();
            if suppression.depth > 0 {
                suppression.pending += 1;
                return;
            }
        }
        self.request_refresh();
    }

    fn request_refresh(self: &Arc<Self>) {
        if self.scheduler.is_ui_thread() {
            self.refresh.request_full_refresh();
            return;
        }
        let weak: Weak<Shared> = Arc::downgrade(self);
        let handle = self.scheduler.run_once_when_idle(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.refresh.request_full_refresh();
            }
        }));
        // The previous handle is dropped here, cancelling its task if it has
        // not run yet.
        let previous = self.pending_idle.lock().replace(handle);
        drop(previous);
    }
}

/// Change tracking and refresh coordination for one edited object.
pub struct BaseEditor {
    shared: Arc<Shared>,
}

impl BaseEditor {
    /// Creates an editor for `object` wired to the services in `context`.
    pub fn new(context: &EditorContext, object: GrtObjectRef) -> Self {
        let form_id = format!("editor:{}", NEXT_FORM_ID.fetch_add(1, Ordering::Relaxed));
        let editor = Self {
            shared: Arc::new(Shared {
                form_id,
                object: RwLock::new(object.clone()),
                object_connections: Mutex::new(Vec::new()),
                ignored_fields: RwLock::new(HashSet::from([LAST_CHANGE_DATE.to_owned()])),
                suppression: Mutex::new(Suppression::default()),
                refresh: RefreshUi::new(),
                scheduler: context.scheduler.clone(),
                undo: context.undo.clone(),
                pending_idle: Mutex::new(None),
                undo_connections: Mutex::new(HashMap::new()),
            }),
        };
        editor.connect_object(&object);
        editor
    }

    /// Identity used for notification registrations.
    pub fn form_id(&self) -> &str {
        &self.shared.form_id
    }

    /// The edited object.
    pub fn object(&self) -> GrtObjectRef {
        self.shared.object.read().clone()
    }

    /// Replaces the edited object and moves the change subscriptions to it.
    ///
    /// Undo tracking is left alone; editors that record undo steps switch
    /// objects through their own `set_object`, such as
    /// [`DbObjectEditor::set_object`](crate::DbObjectEditor::set_object).
    pub fn set_object(&self, object: GrtObjectRef) {
        self.connect_object(&object);
        *self.shared.object.write() = object;
    }

    fn connect_object(&self, object: &GrtObjectRef) {
        let weak = Arc::downgrade(&self.shared);
        let member_conn = object.signal_changed().connect({
            let weak = weak.clone();
            move |change| {
                if let Some(shared) = weak.upgrade() {
                    shared.object_member_changed(&change.member);
                }
            }
        });
        let list_conn = object.signal_list_changed().connect({
            let weak = weak.clone();
            move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_object_changed();
                }
            }
        });
        let dict_conn = object.signal_dict_changed().connect(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.on_object_changed();
            }
        });

        log::debug!(
            "{} now edits {} {}",
            self.shared.form_id,
            object.class_name(),
            object.id()
        );
        let previous = std::mem::replace(
            &mut *self.shared.object_connections.lock(),
            vec![member_conn, list_conn, dict_conn],
        );
        drop(previous);
    }

    /// Changes of `member` no longer trigger a refresh.
    pub fn add_ignored_field(&self, member: &str) {
        self.shared.ignored_fields.write().insert(member.to_owned());
    }

    pub fn is_ignored_field(&self, member: &str) -> bool {
        self.shared.ignored_fields.read().contains(member)
    }

    pub fn refresh_ui(&self) -> &RefreshUi {
        &self.shared.refresh
    }

    pub fn undo_manager(&self) -> &Arc<UndoManager> {
        &self.shared.undo
    }

    pub fn scheduler(&self) -> &Arc<dyn UiScheduler> {
        &self.shared.scheduler
    }

    // -----------------------------------------------------------------------
    // Refresh suppression
    // -----------------------------------------------------------------------

    /// Stops change notifications from refreshing the UI until the matching
    /// [`thaw_refresh_on_object_change`](Self::thaw_refresh_on_object_change).
    pub fn freeze_refresh_on_object_change(&self) {
        self.shared.suppression.lock().depth += 1;
    }

    /// Undoes one freeze.
    ///
    /// The outermost thaw fires a single refresh if changes arrived while
    /// frozen, unless `discard` is set. A thaw without a freeze is ignored.
    pub fn thaw_refresh_on_object_change(&self, discard: bool) {
        let fire = {
            let mut suppression = self.shared.suppression.lock();
            if suppression.depth == 0 {
                log::warn!(
                    "{}: thaw_refresh_on_object_change() without matching freeze",
                    self.shared.form_id
                );
                return;
            }
            suppression.depth -= 1;
            if suppression.depth > 0 {
                return;
            }
            std::mem::take(&mut suppression.pending) > 0 && !discard
        };
        if fire {
            self.request_refresh();
        }
    }

    pub fn suppression_depth(&self) -> usize {
        self.shared.suppression.lock().depth
    }

    /// Number of changes swallowed by the current freeze.
    pub fn pending_changes(&self) -> usize {
        self.shared.suppression.lock().pending
    }

    // -----------------------------------------------------------------------
    // Change handling
    // -----------------------------------------------------------------------

    /// Reacts to a change of the edited object.
    pub fn on_object_changed(&self) {
        self.shared.on_object_changed();
    }

    /// Reacts to a change of `member` unless it is an ignored field.
    pub fn object_member_changed(&self, member: &str) {
        self.shared.object_member_changed(member);
    }

    /// Called after an undo or redo touched this editor's edits. Always
    /// refreshes, frozen or not.
    pub fn undo_applied(&self) {
        self.request_refresh();
    }

    /// Repaints now on the UI thread, or on its next idle cycle otherwise.
    pub fn request_refresh(&self) {
        self.shared.request_refresh();
    }

    // -----------------------------------------------------------------------
    // Undo subscriptions
    // -----------------------------------------------------------------------

    /// Weak handle used by undo subscriptions to reach this editor.
    pub(crate) fn downgrade(&self) -> WeakBaseEditor {
        WeakBaseEditor(Arc::downgrade(&self.shared))
    }

    /// Keeps the undo/redo subscriptions of `group` alive while the group
    /// can still be replayed. A group that already has subscriptions keeps
    /// the old ones. Subscriptions of groups that fell off both stacks are
    /// dropped here.
    pub(crate) fn keep_undo_connections(&self, group: GroupId, connections: Vec<Connection>) {
        let live = self.shared.undo.live_group_ids();
        let stale: Vec<Vec<Connection>> = {
            let mut kept = self.shared.undo_connections.lock();
            kept.entry(group).or_insert(connections);
            let dead: Vec<GroupId> = kept
                .keys()
                .filter(|id| !live.contains(id))
                .copied()
                .collect();
            dead.iter().filter_map(|id| kept.remove(id)).collect()
        };
        if !stale.is_empty() {
            log::trace!(
                "{}: dropped subscriptions of {} expired undo groups",
                self.shared.form_id,
                stale.len()
            );
        }
    }

    /// Number of undo groups this editor still listens to.
    pub fn undo_subscription_count(&self) -> usize {
        self.shared.undo_connections.lock().len()
    }

    pub fn has_undo_subscription(&self, group: GroupId) -> bool {
        self.shared.undo_connections.lock().contains_key(&group)
    }
}

impl fmt::Debug for BaseEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suppression = self.shared.suppression.lock();
        f.debug_struct("BaseEditor")
            .field("form_id", &self.shared.form_id)
            .field("object", &self.object().id())
            .field("suppression_depth", &suppression.depth)
            .field("pending_changes", &suppression.pending)
            .finish()
    }
}

/// Non-owning handle to a [`BaseEditor`]'s state.
#[derive(Clone)]
pub(crate) struct WeakBaseEditor(Weak<Shared>);

impl WeakBaseEditor {
    /// Runs [`BaseEditor::undo_applied`] if the editor is still alive.
    pub(crate) fn undo_applied(&self) {
        if let Some(shared) = self.0.upgrade() {
            shared.request_refresh();
        }
    }
}

// ---------------------------------------------------------------------------
// Capability interface
// ---------------------------------------------------------------------------

/// Hooks and protocol of a concrete editor kind.
pub trait ObjectEditor: Send + Sync {
    fn base(&self) -> &BaseEditor;

    /// Whether the edited object lives on a server connection rather than
    /// in the design model.
    fn is_editing_live_object(&self) -> bool {
        false
    }

    /// Flushes editor-side state into the edited object.
    fn commit_changes(&self) {}

    /// Reloads the edited object from its live source.
    fn refresh_live_object(&self) {}

    /// Forgets editor-local undo history.
    fn reset_editor_undo_stack(&self) {}

    /// Embedded text editor, if any.
    fn code_editor(&self) -> Option<Arc<dyn CodeEditorControl>> {
        None
    }

    fn apply_changes_to_live_object(&self) {
        apply_changes(self);
    }

    fn revert_changes_to_live_object(&self) {
        revert_changes(self);
    }

    /// Returns `true` if the embedded text editor holds unsaved text.
    fn is_editor_dirty(&self) -> bool {
        self.code_editor().is_some_and(|editor| editor.is_dirty())
    }

    /// Whether the editor may close now. UI thread only.
    fn can_close(&self) -> bool {
        can_close(self)
    }
}

impl ObjectEditor for BaseEditor {
    fn base(&self) -> &BaseEditor {
        self
    }
}

/// Generic apply: commit, then reset the local undo history.
pub fn apply_changes<E: ObjectEditor + ?Sized>(editor: &E) {
    editor.commit_changes();
    editor.reset_editor_undo_stack();
}

/// Generic revert: reload, then reset the local undo history.
pub fn revert_changes<E: ObjectEditor + ?Sized>(editor: &E) {
    editor.refresh_live_object();
    editor.reset_editor_undo_stack();
}

/// Generic close check: closeable unless the text editor is dirty.
pub fn can_close<E: ObjectEditor + ?Sized>(editor: &E) -> bool {
    if !editor.base().scheduler().is_ui_thread() {
        log::warn!("{}: can_close() called off the UI thread", editor.base().form_id());
    }
    !editor.is_editor_dirty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::prompt::{FixedPrompt, PromptChoice};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use workbench_core::grt::GrtObject;
    use workbench_core::idle::IdleQueue;

    fn setup() -> (Arc<IdleQueue>, BaseEditor, GrtObjectRef, Arc<AtomicUsize>) {
        let queue = Arc::new(IdleQueue::new());
        let context = EditorContext::new(
            EditorConfig::default(),
            queue.clone(),
            Arc::new(FixedPrompt(PromptChoice::Cancel)),
        );
        let table = GrtObject::new("db.Table");
        let editor = BaseEditor::new(&context, table.clone());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let r = refreshes.clone();
        editor.refresh_ui().set_refresh_callback(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        (queue, editor, table, refreshes)
    }

    fn count(refreshes: &AtomicUsize) -> usize {
        refreshes.load(Ordering::SeqCst)
    }

    #[test]
    fn change_on_ui_thread_refreshes_synchronously() {
        let (_queue, _editor, table, refreshes) = setup();
        table.set_member("name", "t1");
        assert_eq!(count(&refreshes), 1);
    }

    #[test]
    fn change_off_ui_thread_is_deferred_to_idle() {
        let (queue, editor, table, refreshes) = setup();
        std::thread::scope(|s| {
            s.spawn(|| table.set_member("name", "t1"));
        });
        assert_eq!(count(&refreshes), 0);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count(&refreshes), 1);
        drop(editor);
    }

    #[test]
    fn newer_deferred_refresh_replaces_older() {
        let (queue, _editor, table, refreshes) = setup();
        std::thread::scope(|s| {
            s.spawn(|| {
                table.set_member("name", "t1");
                table.set_member("name", "t2");
            });
        });
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count(&refreshes), 1);
    }

    #[test]
    fn dropped_editor_cancels_deferred_refresh() {
        let (queue, editor, table, refreshes) = setup();
        std::thread::scope(|s| {
            s.spawn(|| table.set_member("name", "t1"));
        });
        drop(editor);
        assert_eq!(queue.run_pending(), 0);
        assert_eq!(count(&refreshes), 0);
    }

    #[test]
    fn ignored_fields_never_refresh() {
        let (_queue, editor, table, refreshes) = setup();
        editor.add_ignored_field("modelOnly");
        table.set_member(LAST_CHANGE_DATE, "2024-01-01 10:00");
        table.set_member("modelOnly", 1_i64);
        assert_eq!(count(&refreshes), 0);

        editor.freeze_refresh_on_object_change();
        table.set_member(LAST_CHANGE_DATE, "2024-01-01 10:01");
        assert_eq!(editor.pending_changes(), 0);
        editor.thaw_refresh_on_object_change(false);
        assert_eq!(count(&refreshes), 0);
    }

    #[test]
    fn freeze_collects_and_thaw_fires_once() {
        let (_queue, editor, table, refreshes) = setup();
        editor.freeze_refresh_on_object_change();
        editor.freeze_refresh_on_object_change();
        table.set_member("name", "a");
        table.list_append("columns", "c1");
        assert_eq!(editor.pending_changes(), 2);

        editor.thaw_refresh_on_object_change(false);
        assert_eq!(count(&refreshes), 0);
        assert_eq!(editor.suppression_depth(), 1);

        editor.thaw_refresh_on_object_change(false);
        assert_eq!(count(&refreshes), 1);
        assert_eq!(editor.pending_changes(), 0);
        assert_eq!(editor.suppression_depth(), 0);
    }

    #[test]
    fn thaw_with_discard_never_fires() {
        let (_queue, editor, table, refreshes) = setup();
        editor.freeze_refresh_on_object_change();
        table.set_member("name", "a");
        table.set_member("comment", "b");
        editor.thaw_refresh_on_object_change(true);
        assert_eq!(count(&refreshes), 0);
        assert_eq!(editor.pending_changes(), 0);
    }

    #[test]
    fn thaw_without_changes_is_silent() {
        let (_queue, editor, _table, refreshes) = setup();
        editor.freeze_refresh_on_object_change();
        editor.thaw_refresh_on_object_change(false);
        assert_eq!(count(&refreshes), 0);
    }

    #[test]
    fn unbalanced_thaw_stays_at_zero() {
        let (_queue, editor, table, refreshes) = setup();
        editor.thaw_refresh_on_object_change(false);
        assert_eq!(editor.suppression_depth(), 0);
        table.set_member("name", "a");
        assert_eq!(count(&refreshes), 1);
    }

    #[test]
    fn undo_applied_ignores_freeze() {
        let (_queue, editor, _table, refreshes) = setup();
        editor.freeze_refresh_on_object_change();
        editor.undo_applied();
        assert_eq!(count(&refreshes), 1);
    }

    #[test]
    fn undo_applied_off_ui_thread_is_deferred_to_idle() {
        let (queue, editor, _table, refreshes) = setup();
        editor.freeze_refresh_on_object_change();
        std::thread::scope(|s| {
            s.spawn(|| editor.undo_applied());
        });
        assert_eq!(count(&refreshes), 0);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count(&refreshes), 1);
    }

    #[test]
    fn set_object_moves_subscriptions() {
        let (_queue, editor, old, refreshes) = setup();
        let new = GrtObject::new("db.Table");
        editor.set_object(new.clone());

        old.set_member("name", "x");
        assert_eq!(count(&refreshes), 0);
        new.set_member("name", "y");
        assert_eq!(count(&refreshes), 1);
        assert!(editor.object().same_object(&new));
    }

    struct DirtyText(AtomicBool);

    impl CodeEditorControl for DirtyText {
        fn is_dirty(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
        fn reset_dirty(&self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    struct TextEditor {
        base: BaseEditor,
        text: Arc<DirtyText>,
        log: Mutex<Vec<&'static str>>,
    }

    impl ObjectEditor for TextEditor {
        fn base(&self) -> &BaseEditor {
            &self.base
        }
        fn commit_changes(&self) {
            self.log.lock().push("commit");
        }
        fn refresh_live_object(&self) {
            self.log.lock().push("refresh");
        }
        fn reset_editor_undo_stack(&self) {
            self.log.lock().push("reset");
            self.text.reset_dirty();
        }
        fn code_editor(&self) -> Option<Arc<dyn CodeEditorControl>> {
            Some(self.text.clone())
        }
    }

    #[test]
    fn generic_protocol_runs_hooks_in_order() {
        let (_queue, base, _table, _refreshes) = setup();
        let editor = TextEditor {
            base,
            text: Arc::new(DirtyText(AtomicBool::new(true))),
            log: Mutex::new(Vec::new()),
        };

        assert!(editor.is_editor_dirty());
        assert!(!editor.can_close());

        editor.apply_changes_to_live_object();
        editor.revert_changes_to_live_object();
        assert_eq!(*editor.log.lock(), vec!["commit", "reset", "refresh", "reset"]);
        assert!(!editor.is_editor_dirty());
        assert!(editor.can_close());
    }

    #[test]
    fn plain_editor_has_no_text_editor() {
        let (_queue, editor, _table, _refreshes) = setup();
        assert!(!editor.is_editor_dirty());
        assert!(editor.can_close());
        assert!(!editor.is_editing_live_object());
    }
}
