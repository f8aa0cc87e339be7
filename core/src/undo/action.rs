//! Undoable actions recorded from object-graph notifications.
//!
//! Each action captures enough state to revert one mutation. Reverting goes
//! through the regular object API, so the revert itself emits a change
//! notification; the [`UndoManager`](super::UndoManager) records that
//! notification as the inverse action. This is how redo entries come into
//! existence without any action having to know how to "re-apply" itself.

use std::any::Any;
use std::fmt;

use crate::grt::{GrtObjectRef, Value};

/// Helper trait for downcasting trait objects to concrete types.
///
/// Automatically implemented for all `'static` types. Used by
/// [`UndoGroupMatcher::matches`](super::UndoGroupMatcher::matches) to
/// compare matchers of the same concrete kind.
pub trait AsAny: 'static {
    /// Returns a reference to `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A revertible mutation stored in the undo or redo stack.
///
/// The trait is dyn-compatible so heterogeneous actions can share one stack
/// as `Box<dyn UndoAction>`.
pub trait UndoAction: fmt::Debug + Send {
    /// Reverts the mutation.
    fn undo(&mut self);

    /// A short, human-readable description for the edit menu.
    fn description(&self) -> &str;

    /// Replaces the description. Ignored by actions with a fixed label.
    fn set_description(&mut self, _description: &str) {}

    /// Collects the ids of any groups nested in this action.
    fn collect_group_ids(&self, _out: &mut Vec<super::GroupId>) {}
}

/// A scalar member was overwritten.
#[derive(Debug)]
pub struct ObjectChangeAction {
    object: GrtObjectRef,
    member: String,
    old: Value,
    description: String,
}

impl ObjectChangeAction {
    pub fn new(object: GrtObjectRef, member: &str, old: Value) -> Self {
        let description = format!("Change {}", member);
        Self {
            object,
            member: member.to_owned(),
            old,
            description,
        }
    }

    pub fn object(&self) -> &GrtObjectRef {
        &self.object
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl UndoAction for ObjectChangeAction {
    fn undo(&mut self) {
        self.object.set_member(&self.member, self.old.clone());
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn set_description(&mut self, description: &str) {
        self.description = description.to_owned();
    }
}

/// An item was inserted into a list member.
#[derive(Debug)]
pub struct ListInsertAction {
    object: GrtObjectRef,
    member: String,
    index: usize,
}

impl ListInsertAction {
    pub fn new(object: GrtObjectRef, member: &str, index: usize) -> Self {
        Self {
            object,
            member: member.to_owned(),
            index,
        }
    }
}

impl UndoAction for ListInsertAction {
    fn undo(&mut self) {
        if self.object.list_remove(&self.member, self.index).is_none() {
            log::warn!(
                "undo of insert into {}.{} found no item at {}",
                self.object.id(),
                self.member,
                self.index
            );
        }
    }

    fn description(&self) -> &str {
        "Insert item"
    }
}

/// An item was removed from a list member.
#[derive(Debug)]
pub struct ListRemoveAction {
    object: GrtObjectRef,
    member: String,
    index: usize,
    value: Value,
}

impl ListRemoveAction {
    pub fn new(object: GrtObjectRef, member: &str, index: usize, value: Value) -> Self {
        Self {
            object,
            member: member.to_owned(),
            index,
            value,
        }
    }
}

impl UndoAction for ListRemoveAction {
    fn undo(&mut self) {
        self.object
            .list_insert(&self.member, self.index, self.value.clone());
    }

    fn description(&self) -> &str {
        "Remove item"
    }
}

/// A custom-data entry was set or removed.
#[derive(Debug)]
pub struct DictChangeAction {
    object: GrtObjectRef,
    key: String,
    old: Value,
}

impl DictChangeAction {
    pub fn new(object: GrtObjectRef, key: &str, old: Value) -> Self {
        Self {
            object,
            key: key.to_owned(),
            old,
        }
    }
}

impl UndoAction for DictChangeAction {
    fn undo(&mut self) {
        self.object.set_custom_data(&self.key, self.old.clone());
    }

    fn description(&self) -> &str {
        "Change option"
    }
}

/// Arbitrary revert closure.
///
/// The closure runs once per undo. It is responsible for recording its own
/// inverse if the edit should be redoable.
pub struct SimpleUndoAction {
    slot: Box<dyn FnMut() + Send>,
    description: String,
}

impl SimpleUndoAction {
    pub fn new(description: &str, slot: impl FnMut() + Send + 'static) -> Self {
        Self {
            slot: Box::new(slot),
            description: description.to_owned(),
        }
    }
}

impl fmt::Debug for SimpleUndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleUndoAction")
            .field("description", &self.description)
            .finish()
    }
}

impl UndoAction for SimpleUndoAction {
    fn undo(&mut self) {
        (self.slot)();
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn set_description(&mut self, description: &str) {
        self.description = description.to_owned();
    }
}
