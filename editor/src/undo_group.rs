//! Coalescing of consecutive edits to one object field.

use workbench_core::undo::{AsAny, UndoGroupMatcher};

/// Matches undo groups that edit the same member of the same object.
///
/// Rapid edits of a single field (typing into the name box, say) reopen the
/// previous undo entry instead of creating one entry per keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoObjectChangeGroup {
    object_id: String,
    member: String,
}

impl UndoObjectChangeGroup {
    pub fn new(object_id: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            member: member.into(),
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl UndoGroupMatcher for UndoObjectChangeGroup {
    fn matches(&self, other: &dyn UndoGroupMatcher) -> bool {
        other
            .as_any()
            .downcast_ref::<UndoObjectChangeGroup>()
            .is_some_and(|other| other == self)
    }
}
