//! Scoped undo groups for editor mutations.

use std::fmt;

use workbench_core::grt::GrtObjectRef;
use workbench_core::signal::Connection;
use workbench_core::undo::{GroupId, UndoGroupMatcher};

use crate::base_editor::{BaseEditor, ObjectEditor};
use crate::undo_group::UndoObjectChangeGroup;

/// Opens an undo group on construction and commits it on [`end`](Self::end)
/// or when dropped.
///
/// While the group exists, undoing or redoing it refreshes the owning
/// editor. Editing a live object records nothing: the group handle is `None`
/// and ending the scope is a no-op.
///
/// ```ignore
/// let mut undo = AutoUndoEdit::for_member(editor, &object, "name");
/// object.set_member("name", new_name);
/// undo.end(&format!("Rename to '{new_name}'"));
/// ```
pub struct AutoUndoEdit<'a> {
    editor: &'a BaseEditor,
    group: Option<GroupId>,
    connections: Vec<Connection>,
    ended: bool,
}

impl<'a> AutoUndoEdit<'a> {
    /// Opens a group without a matcher.
    pub fn new<E: ObjectEditor + ?Sized>(editor: &'a E) -> Self {
        Self::open(editor.base(), None, editor.is_editing_live_object())
    }

    /// Opens a group that coalesces with a preceding edit of the same
    /// `member` of `object`.
    pub fn for_member<E: ObjectEditor + ?Sized>(
        editor: &'a E,
        object: &GrtObjectRef,
        member: &str,
    ) -> Self {
        let matcher = UndoObjectChangeGroup::new(object.id(), member);
        Self::open(
            editor.base(),
            Some(Box::new(matcher)),
            editor.is_editing_live_object(),
        )
    }

    fn open(
        editor: &'a BaseEditor,
        matcher: Option<Box<dyn UndoGroupMatcher>>,
        live: bool,
    ) -> Self {
        let undo = editor.undo_manager();
        let group = undo.open_group(matcher, live);
        let connections = match group {
            Some(id) => {
                let weak = editor.downgrade();
                let on_undo = undo.signal_undo_performed().connect({
                    let weak = weak.clone();
                    move |replayed| {
                        if *replayed == id {
                            weak.undo_applied();
                        }
                    }
                });
                let on_redo = undo.signal_redo_performed().connect(move |replayed| {
                    if *replayed == id {
                        weak.undo_applied();
                    }
                });
                vec![on_undo, on_redo]
            }
            None => Vec::new(),
        };
        Self {
            editor,
            group,
            connections,
            ended: false,
        }
    }

    /// The open group, `None` when nothing is recorded.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Commits the group with `description`. Later calls do nothing.
    ///
    /// Returns `true` if an undo step was recorded or extended.
    pub fn end(&mut self, description: &str) -> bool {
        if std::mem::replace(&mut self.ended, true) {
            return false;
        }
        let Some(id) = self.group else {
            return false;
        };
        match self.editor.undo_manager().commit_group(id, description) {
            Ok(true) => {
                let connections = std::mem::take(&mut self.connections);
                self.editor.keep_undo_connections(id, connections);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("{}: cannot commit undo group: {e}", self.editor.form_id());
                false
            }
        }
    }

    /// Closes the group and reverts what it recorded.
    pub fn cancel(mut self) {
        self.ended = true;
        if let Some(id) = self.group
            && let Err(e) = self.editor.undo_manager().cancel_group(id)
        {
            log::warn!("{}: cannot cancel undo group: {e}", self.editor.form_id());
        }
    }
}

impl Drop for AutoUndoEdit<'_> {
    fn drop(&mut self) {
        if !self.ended {
            self.end("");
        }
    }
}

impl fmt::Debug for AutoUndoEdit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoUndoEdit")
            .field("editor", &self.editor.form_id())
            .field("group", &self.group)
            .field("ended", &self.ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::context::EditorContext;
    use crate::prompt::{FixedPrompt, PromptChoice};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use workbench_core::grt::GrtObject;
    use workbench_core::idle::IdleQueue;

    struct Fixture {
        context: EditorContext,
        editor: BaseEditor,
        table: GrtObjectRef,
        refreshes: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let context = EditorContext::new(
            EditorConfig::default(),
            Arc::new(IdleQueue::new()),
            Arc::new(FixedPrompt(PromptChoice::Cancel)),
        );
        let table = GrtObject::new("db.Table");
        context.undo.track(&table);
        let editor = BaseEditor::new(&context, table.clone());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let r = refreshes.clone();
        editor.refresh_ui().set_refresh_callback(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        Fixture {
            context,
            editor,
            table,
            refreshes,
        }
    }

    struct LiveEditor(BaseEditor);

    impl ObjectEditor for LiveEditor {
        fn base(&self) -> &BaseEditor {
            &self.0
        }
        fn is_editing_live_object(&self) -> bool {
            true
        }
    }

    #[test]
    fn end_commits_with_description() {
        let f = fixture();
        let mut undo = AutoUndoEdit::for_member(&f.editor, &f.table, "name");
        f.table.set_member("name", "a");
        assert!(undo.end("Rename to 'a'"));
        assert!(!undo.end("again"));

        assert_eq!(f.context.undo.undo_count(), 1);
        assert_eq!(
            f.context.undo.undo_description().as_deref(),
            Some("Rename to 'a'")
        );
    }

    #[test]
    fn drop_commits_open_group() {
        let f = fixture();
        {
            let _undo = AutoUndoEdit::new(&f.editor);
            f.table.set_member("comment", "c");
        }
        assert_eq!(f.context.undo.undo_count(), 1);
        assert!(f.context.undo.open_group_id().is_none());
    }

    #[test]
    fn undo_and_redo_refresh_the_editor() {
        let f = fixture();
        let mut undo = AutoUndoEdit::for_member(&f.editor, &f.table, "name");
        f.table.set_member("name", "a");
        undo.end("Rename");
        drop(undo);

        let before = f.refreshes.load(Ordering::SeqCst);
        f.context.undo.undo().unwrap();
        // One refresh from the reverted member change, one from undo_applied.
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before + 2);
        f.context.undo.redo().unwrap();
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before + 4);
    }

    #[test]
    fn nested_edit_refreshes_on_every_replay_while_frozen() {
        let f = fixture();
        let outer = f.context.undo.open_group(None, false).unwrap();
        {
            let mut undo = AutoUndoEdit::for_member(&f.editor, &f.table, "name");
            f.table.set_member("name", "a");
            undo.end("Rename");
        }
        f.context.undo.commit_group(outer, "Batch").unwrap();

        f.editor.freeze_refresh_on_object_change();
        let before = f.refreshes.load(Ordering::SeqCst);
        f.context.undo.undo().unwrap();
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before + 1);
        f.context.undo.redo().unwrap();
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before + 2);
        f.context.undo.undo().unwrap();
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before + 3);
        assert_eq!(f.table.name(), "");
    }

    #[test]
    fn expired_groups_drop_their_subscriptions() {
        let f = fixture();
        f.context.undo.set_max_undo(1);
        let mut rename = AutoUndoEdit::for_member(&f.editor, &f.table, "name");
        f.table.set_member("name", "a");
        rename.end("Rename");
        let first = rename.group().unwrap();
        drop(rename);
        assert!(f.editor.has_undo_subscription(first));

        let mut comment = AutoUndoEdit::for_member(&f.editor, &f.table, "comment");
        f.table.set_member("comment", "c");
        comment.end("Edit Comment");
        let second = comment.group().unwrap();
        drop(comment);

        assert!(!f.editor.has_undo_subscription(first));
        assert!(f.editor.has_undo_subscription(second));
        assert_eq!(f.editor.undo_subscription_count(), 1);
    }

    #[test]
    fn unrelated_group_does_not_trigger_undo_applied() {
        let f = fixture();
        let other = GrtObject::new("db.Table");
        f.context.undo.track(&other);
        other.set_member("name", "x");

        let before = f.refreshes.load(Ordering::SeqCst);
        f.context.undo.undo().unwrap();
        assert_eq!(f.refreshes.load(Ordering::SeqCst), before);
    }

    #[test]
    fn live_object_records_nothing() {
        let f = fixture();
        let live = LiveEditor(BaseEditor::new(&f.context, f.table.clone()));
        let mut undo = AutoUndoEdit::for_member(&live, &f.table, "name");
        assert!(undo.group().is_none());
        assert!(!undo.end("Rename"));
        assert!(f.context.undo.open_group_id().is_none());
    }

    #[test]
    fn coalesced_groups_share_one_subscription() {
        let f = fixture();
        for name in ["a", "ab"] {
            let mut undo = AutoUndoEdit::for_member(&f.editor, &f.table, "name");
            f.table.set_member("name", name);
            undo.end(&format!("Rename to '{name}'"));
        }
        assert_eq!(f.context.undo.undo_count(), 1);
        let group = f.context.undo.last_undo_group().unwrap();
        assert!(f.editor.has_undo_subscription(group));
    }

    #[test]
    fn cancel_reverts() {
        let f = fixture();
        let undo = AutoUndoEdit::new(&f.editor);
        f.table.set_member("name", "temp");
        undo.cancel();
        assert_eq!(f.table.name(), "");
        assert_eq!(f.context.undo.undo_count(), 0);
    }
}
