//! Undo coordination for the observed object graph.
//!
//! Objects registered with [`UndoManager::track`] report every effective
//! mutation; the manager turns those reports into [`UndoAction`]s and files
//! them into [`UndoGroup`]s. Editors never build actions by hand for member,
//! list or custom-data edits.
//!
//! - [`UndoAction`]: a revertible mutation (Command pattern)
//! - [`UndoGroup`]: actions undone and redone as one step, identified by a [`GroupId`]
//! - [`UndoGroupMatcher`]: decides whether a new group continues the previous one
//! - [`UndoManager`]: bounded undo stack, redo stack and save point
//!
//! # Coalescing
//!
//! A group opened with a matcher that the newest undo entry accepts reopens
//! that entry, so typing into one field produces a single undo step. The
//! coalesced entry keeps its [`GroupId`] and therefore its subscribers.

mod action;
mod group;
mod manager;

pub use action::{
    AsAny, DictChangeAction, ListInsertAction, ListRemoveAction, ObjectChangeAction,
    SimpleUndoAction, UndoAction,
};
pub use group::{GroupId, UndoGroup, UndoGroupMatcher};
pub use manager::{DEFAULT_MAX_UNDO, UndoError, UndoManager};
