//! Undo groups and group matchers.

use std::fmt;

use super::action::{AsAny, UndoAction};

/// Stable handle of an undo group.
///
/// A group keeps its id when it moves between the undo and redo stacks, so
/// subscribers can recognise "their" group on every replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

impl GroupId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Decides whether a newly opened group continues the previous one.
///
/// Implementations usually downcast `other` with [`AsAny::as_any`] and
/// compare fields; a matcher of a different concrete kind must never match.
pub trait UndoGroupMatcher: fmt::Debug + AsAny + Send + Sync {
    fn matches(&self, other: &dyn UndoGroupMatcher) -> bool;
}

/// A batch of actions undone and redone as one step.
///
/// Groups are actions themselves and may nest.
#[derive(Debug)]
pub struct UndoGroup {
    id: GroupId,
    description: String,
    matcher: Option<Box<dyn UndoGroupMatcher>>,
    actions: Vec<Box<dyn UndoAction>>,
    /// Ids of nested groups whose actions a replay flattened into this one.
    folded: Vec<GroupId>,
}

impl UndoGroup {
    pub(crate) fn new(id: GroupId, matcher: Option<Box<dyn UndoGroupMatcher>>) -> Self {
        Self {
            id,
            description: String::new(),
            matcher,
            actions: Vec::new(),
            folded: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn matcher(&self) -> Option<&dyn UndoGroupMatcher> {
        self.matcher.as_deref()
    }

    /// Returns `true` if both groups carry matchers and they match.
    pub fn matches(&self, matcher: &dyn UndoGroupMatcher) -> bool {
        self.matcher
            .as_deref()
            .is_some_and(|own| own.matches(matcher))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Box<dyn UndoAction>] {
        &self.actions
    }

    /// Keeps reporting `ids` as nested groups after their actions were
    /// flattened into this group.
    pub(crate) fn fold_group_ids(&mut self, ids: impl IntoIterator<Item = GroupId>) {
        for id in ids {
            if id != self.id && !self.folded.contains(&id) {
                self.folded.push(id);
            }
        }
    }

    pub(crate) fn push(&mut self, action: Box<dyn UndoAction>) {
        self.actions.push(action);
    }

    pub(crate) fn split_off(&mut self, at: usize) -> Vec<Box<dyn UndoAction>> {
        self.actions.split_off(at.min(self.actions.len()))
    }
}

impl UndoAction for UndoGroup {
    fn undo(&mut self) {
        for action in self.actions.iter_mut().rev() {
            action.undo();
        }
    }

    fn description(&self) -> &str {
        if self.description.is_empty() {
            // An unnamed group with a single action borrows its label.
            if let [only] = self.actions.as_slice() {
                return only.description();
            }
        }
        &self.description
    }

    fn set_description(&mut self, description: &str) {
        self.description = description.to_owned();
    }

    fn collect_group_ids(&self, out: &mut Vec<GroupId>) {
        out.push(self.id);
        out.extend_from_slice(&self.folded);
        for action in &self.actions {
            action.collect_group_ids(out);
        }
    }
}
