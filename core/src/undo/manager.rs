//! Shared undo/redo stack fed by object-graph notifications.
//!
//! [`UndoManager`] keeps a bounded undo stack of [`UndoGroup`]s and an
//! unbounded redo stack. Tracked objects report every effective mutation;
//! the manager files each one into the innermost open group, into the
//! inverse group being collected during a replay, or, with no group open,
//! as a standalone entry.
//!
//! # Coalescing
//!
//! [`open_group`](UndoManager::open_group) with a matcher reopens the newest
//! undo entry instead of starting a new one when that entry's matcher
//! accepts the new matcher. Rapid edits of one field thus collapse into a
//! single undo step.
//!
//! # Replay
//!
//! Undo pops the newest entry and reverts it. The reverts emit ordinary
//! change notifications, which the manager collects into an inverse group
//! carrying the same [`GroupId`]; that group lands on the redo stack. Redo
//! works the same way in the other direction.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::action::{
    DictChangeAction, ListInsertAction, ListRemoveAction, ObjectChangeAction, SimpleUndoAction,
    UndoAction,
};
use super::group::{GroupId, UndoGroup, UndoGroupMatcher};
use crate::grt::{GrtObject, GrtObjectRef, ListChangeKind};
use crate::signal::{Connection, Signal};

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Errors reported by [`UndoManager`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UndoError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("an undo or redo is already in progress")]
    ReplayInProgress,
    #[error("cannot replay while group {0} is still open")]
    GroupOpen(GroupId),
    #[error("no undo group is open")]
    NoOpenGroup,
    #[error("group {got} is not the innermost open group ({expected})")]
    GroupMismatch { expected: GroupId, got: GroupId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayKind {
    Undo,
    Redo,
}

struct Replay {
    kind: ReplayKind,
    collected: UndoGroup,
}

struct OpenFrame {
    group: UndoGroup,
    /// Action count of a reopened entry at reopen time; `None` for fresh groups.
    reopened_len: Option<usize>,
    /// Whether the reopened entry was the save point.
    reopened_at_save: bool,
}

struct Inner {
    undo_stack: VecDeque<UndoGroup>,
    redo_stack: Vec<UndoGroup>,
    open: Vec<OpenFrame>,
    replay: Option<Replay>,
    blocks: usize,
    max_undo: usize,
    next_id: u64,
    /// Distance from the saved state.
    ///
    /// - `Some(0)`: the current state matches the last save.
    /// - `Some(n)` where `n > 0`: `n` undos needed to reach the saved state.
    /// - `Some(n)` where `n < 0`: `|n|` redos needed to reach the saved state.
    /// - `None`: never reachable again.
    save_distance: Option<i64>,
}

impl Inner {
    fn allocate_id(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Pushes a closed, non-empty group as a new undo step.
    fn push_new_entry(&mut self, group: UndoGroup) {
        self.clear_redo();
        if let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        self.undo_stack.push_back(group);
        self.trim();
    }

    fn clear_redo(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }
        log::trace!("redo stack cleared ({} entries)", self.redo_stack.len());
        self.redo_stack.clear();
        if let Some(d) = self.save_distance
            && d < 0
        {
            self.save_distance = None;
        }
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_undo {
            self.undo_stack.pop_front();
            // If the save point was beyond the oldest surviving entry, it's gone.
            if let Some(d) = self.save_distance
                && d > self.undo_stack.len() as i64
            {
                self.save_distance = None;
            }
        }
    }
}

struct Tracked {
    count: usize,
    _connections: Vec<Connection>,
}

/// Process-wide undo/redo stack shared by all editors of a document.
pub struct UndoManager {
    inner: Mutex<Inner>,
    tracked: Mutex<HashMap<String, Tracked>>,
    undo_performed: Signal<GroupId>,
    redo_performed: Signal<GroupId>,
    changed: Signal<()>,
}

impl UndoManager {
    /// Creates an empty manager with the given maximum undo depth.
    pub fn new(max_undo: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                undo_stack: VecDeque::new(),
                redo_stack: Vec::new(),
                open: Vec::new(),
                replay: None,
                blocks: 0,
                max_undo,
                next_id: 1,
                save_distance: Some(0),
            }),
            tracked: Mutex::new(HashMap::new()),
            undo_performed: Signal::new(),
            redo_performed: Signal::new(),
            changed: Signal::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Object tracking
    // -----------------------------------------------------------------------

    /// Starts recording the mutations of `object`.
    ///
    /// Tracking is counted: tracking an already tracked object keeps its
    /// subscriptions and needs one more [`untrack`](Self::untrack) to stop.
    pub fn track(self: &Arc<Self>, object: &GrtObjectRef) {
        if let Some(entry) = self.tracked.lock().get_mut(object.id()) {
            entry.count += 1;
            return;
        }
        let manager = Arc::downgrade(self);
        let target = Arc::downgrade(object);
        let member_conn = object.signal_changed().connect({
            let (manager, target) = (manager.clone(), target.clone());
            move |change| {
                // An empty member name is a "reload everything" ping, not an edit.
                if change.member.is_empty() {
                    return;
                }
                record_for(&manager, &target, |object| {
                    Box::new(ObjectChangeAction::new(object, &change.member, change.old.clone()))
                });
            }
        });
        let list_conn = object.signal_list_changed().connect({
            let (manager, target) = (manager.clone(), target.clone());
            move |change| {
                record_for(&manager, &target, |object| match &change.kind {
                    ListChangeKind::Inserted { index } => {
                        Box::new(ListInsertAction::new(object, &change.member, *index))
                    }
                    ListChangeKind::Removed { index, value } => Box::new(ListRemoveAction::new(
                        object,
                        &change.member,
                        *index,
                        value.clone(),
                    )),
                });
            }
        });
        let dict_conn = object.signal_dict_changed().connect(move |change| {
            record_for(&manager, &target, |object| {
                Box::new(DictChangeAction::new(object, &change.key, change.old.clone()))
            });
        });

        self.tracked.lock().insert(
            object.id().to_owned(),
            Tracked {
                count: 1,
                _connections: vec![member_conn, list_conn, dict_conn],
            },
        );
    }

    /// Releases one [`track`](Self::track) of the object with `object_id`.
    /// Recording stops when the last one is released.
    ///
    /// Returns `false` if the object was not tracked.
    pub fn untrack(&self, object_id: &str) -> bool {
        let released = {
            let mut tracked = self.tracked.lock();
            let Some(entry) = tracked.get_mut(object_id) else {
                return false;
            };
            entry.count -= 1;
            if entry.count > 0 {
                return true;
            }
            tracked.remove(object_id)
        };
        drop(released);
        log::trace!("stopped tracking {object_id}");
        true
    }

    pub fn is_tracking(&self, object_id: &str) -> bool {
        self.tracked.lock().contains_key(object_id)
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Records an action into the innermost open group, the running replay,
    /// or as a standalone entry.
    pub fn add_undo(&self, action: Box<dyn UndoAction>) {
        let standalone = {
            let mut inner = self.inner.lock();
            if inner.blocks > 0 {
                return;
            }
            if let Some(replay) = inner.replay.as_mut() {
                replay.collected.push(action);
                return;
            }
            if let Some(frame) = inner.open.last_mut() {
                frame.group.push(action);
                return;
            }
            let id = inner.allocate_id();
            let mut group = UndoGroup::new(id, None);
            group.push(action);
            inner.push_new_entry(group);
            id
        };
        log::trace!("standalone undo entry {standalone}");
        self.changed.emit(&());
    }

    /// Records a closure-based action.
    pub fn add_simple_undo(&self, description: &str, slot: impl FnMut() + Send + 'static) {
        self.add_undo(Box::new(SimpleUndoAction::new(description, slot)));
    }

    /// Suspends recording. Calls nest; each must be paired with [`enable`](Self::enable).
    pub fn disable(&self) {
        self.inner.lock().blocks += 1;
    }

    pub fn enable(&self) {
        let mut inner = self.inner.lock();
        if inner.blocks == 0 {
            log::warn!("UndoManager::enable() called without matching disable()");
            return;
        }
        inner.blocks -= 1;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().blocks == 0
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Opens an undo group.
    ///
    /// Returns `None` without side effects when `suppressed` is set or
    /// recording is disabled. With a `matcher` and no group open, the newest
    /// undo entry is reopened if its matcher accepts `matcher`; its id is
    /// returned in that case.
    pub fn open_group(
        &self,
        matcher: Option<Box<dyn UndoGroupMatcher>>,
        suppressed: bool,
    ) -> Option<GroupId> {
        if suppressed {
            return None;
        }
        let mut inner = self.inner.lock();
        if inner.blocks > 0 {
            return None;
        }
        if inner.replay.is_some() {
            log::debug!("undo group requested during replay, ignored");
            return None;
        }

        if inner.open.is_empty()
            && let Some(matcher) = matcher.as_deref()
            && inner.undo_stack.back().is_some_and(|last| last.matches(matcher))
            && let Some(group) = inner.undo_stack.pop_back()
        {
            let id = group.id();
            let reopened_at_save = inner.save_distance == Some(0);
            if let Some(d) = &mut inner.save_distance {
                *d -= 1;
            }
            log::trace!("undo group {id} reopened for coalescing");
            inner.open.push(OpenFrame {
                reopened_len: Some(group.len()),
                reopened_at_save,
                group,
            });
            return Some(id);
        }

        let id = inner.allocate_id();
        log::trace!("undo group {id} opened (depth {})", inner.open.len() + 1);
        inner.open.push(OpenFrame {
            group: UndoGroup::new(id, matcher),
            reopened_len: None,
            reopened_at_save: false,
        });
        Some(id)
    }

    /// Closes the innermost open group, which must be `id`.
    ///
    /// A non-empty `description` replaces the group's current one. Returns
    /// `Ok(false)` if the group was empty and got discarded.
    pub fn commit_group(&self, id: GroupId, description: &str) -> Result<bool, UndoError> {
        let recorded = {
            let mut inner = self.inner.lock();
            let mut frame = pop_frame(&mut inner, id)?;
            if !description.is_empty() {
                frame.group.set_description(description);
            }

            if let Some(parent) = inner.open.last_mut() {
                let recorded = !frame.group.is_empty();
                if recorded {
                    parent.group.push(Box::new(frame.group));
                }
                return Ok(recorded);
            }

            match frame.reopened_len {
                Some(base_len) => {
                    let grew = frame.group.len() > base_len;
                    if grew {
                        inner.clear_redo();
                        if frame.reopened_at_save {
                            inner.save_distance = None;
                        }
                    }
                    if let Some(d) = &mut inner.save_distance {
                        *d += 1;
                    }
                    inner.undo_stack.push_back(frame.group);
                    true
                }
                None if frame.group.is_empty() => {
                    log::trace!("undo group {id} was empty, discarded");
                    false
                }
                None => {
                    inner.push_new_entry(frame.group);
                    true
                }
            }
        };
        if recorded {
            self.changed.emit(&());
        }
        Ok(recorded)
    }

    /// Closes the innermost open group (which must be `id`) and reverts what
    /// it recorded. A reopened entry keeps the actions it had before reopening.
    pub fn cancel_group(&self, id: GroupId) -> Result<(), UndoError> {
        let (mut reverted, restore) = {
            let mut inner = self.inner.lock();
            let mut frame = pop_frame(&mut inner, id)?;
            let reverted = frame.group.split_off(frame.reopened_len.unwrap_or(0));
            inner.blocks += 1;
            let restore = frame.reopened_len.map(|_| {
                if let Some(d) = &mut inner.save_distance {
                    *d += 1;
                }
                frame.group
            });
            (reverted, restore)
        };

        for action in reverted.iter_mut().rev() {
            action.undo();
        }

        let mut inner = self.inner.lock();
        inner.blocks = inner.blocks.saturating_sub(1);
        if let Some(group) = restore {
            inner.undo_stack.push_back(group);
        }
        log::trace!("undo group {id} cancelled");
        Ok(())
    }

    /// Id of the innermost open group.
    pub fn open_group_id(&self) -> Option<GroupId> {
        self.inner.lock().open.last().map(|frame| frame.group.id())
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Reverts the newest undo entry and moves its inverse to the redo stack.
    pub fn undo(&self) -> Result<(), UndoError> {
        self.replay(ReplayKind::Undo)
    }

    /// Re-applies the newest redo entry.
    pub fn redo(&self) -> Result<(), UndoError> {
        self.replay(ReplayKind::Redo)
    }

    fn replay(&self, kind: ReplayKind) -> Result<(), UndoError> {
        let (mut group, ids) = {
            let mut inner = self.inner.lock();
            if inner.replay.is_some() {
                return Err(UndoError::ReplayInProgress);
            }
            if let Some(frame) = inner.open.last() {
                return Err(UndoError::GroupOpen(frame.group.id()));
            }
            let group = match kind {
                ReplayKind::Undo => inner.undo_stack.pop_back().ok_or(UndoError::NothingToUndo)?,
                ReplayKind::Redo => inner.redo_stack.pop().ok_or(UndoError::NothingToRedo)?,
            };
            let mut ids = Vec::new();
            group.collect_group_ids(&mut ids);
            let mut collected = UndoGroup::new(group.id(), None);
            collected.set_description(group.description());
            // The inverse is recorded flat; it still answers to every nested id.
            collected.fold_group_ids(ids.iter().copied());
            inner.replay = Some(Replay { kind, collected });
            (group, ids)
        };

        log::debug!("{:?} of group {}: {}", kind, group.id(), group.description());
        group.undo();

        {
            let mut inner = self.inner.lock();
            let Some(replay) = inner.replay.take() else {
                log::error!("{kind:?} of group {} lost its replay state", group.id());
                return Ok(());
            };
            debug_assert_eq!(replay.kind, kind);
            match kind {
                ReplayKind::Undo => {
                    inner.redo_stack.push(replay.collected);
                    if let Some(d) = &mut inner.save_distance {
                        *d -= 1;
                    }
                }
                ReplayKind::Redo => {
                    inner.undo_stack.push_back(replay.collected);
                    if let Some(d) = &mut inner.save_distance {
                        *d += 1;
                    }
                    inner.trim();
                }
            }
        }

        let signal = match kind {
            ReplayKind::Undo => &self.undo_performed,
            ReplayKind::Redo => &self.redo_performed,
        };
        for id in ids {
            signal.emit(&id);
        }
        self.changed.emit(&());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        !self.inner.lock().undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.inner.lock().redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.inner.lock().undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.inner.lock().redo_stack.len()
    }

    /// Description of the entry [`undo`](Self::undo) would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.inner
            .lock()
            .undo_stack
            .back()
            .map(|g| g.description().to_owned())
    }

    /// Description of the entry [`redo`](Self::redo) would re-apply.
    pub fn redo_description(&self) -> Option<String> {
        self.inner
            .lock()
            .redo_stack
            .last()
            .map(|g| g.description().to_owned())
    }

    /// Undo descriptions, most recent first.
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.inner
            .lock()
            .undo_stack
            .iter()
            .rev()
            .map(|g| g.description().to_owned())
            .collect()
    }

    /// Id of the newest undo entry.
    pub fn last_undo_group(&self) -> Option<GroupId> {
        self.inner.lock().undo_stack.back().map(UndoGroup::id)
    }

    /// Ids of every group still reachable through undo or redo, including
    /// nested ones and those inside open groups.
    pub fn live_group_ids(&self) -> HashSet<GroupId> {
        let inner = self.inner.lock();
        let mut ids = Vec::new();
        for group in inner.undo_stack.iter().chain(&inner.redo_stack) {
            group.collect_group_ids(&mut ids);
        }
        for frame in &inner.open {
            frame.group.collect_group_ids(&mut ids);
        }
        if let Some(replay) = &inner.replay {
            replay.collected.collect_group_ids(&mut ids);
        }
        ids.into_iter().collect()
    }

    pub fn max_undo(&self) -> usize {
        self.inner.lock().max_undo
    }

    /// Changes the undo depth, dropping the oldest entries if needed.
    pub fn set_max_undo(&self, max_undo: usize) {
        let mut inner = self.inner.lock();
        inner.max_undo = max_undo;
        inner.trim();
    }

    // -----------------------------------------------------------------------
    // Save point
    // -----------------------------------------------------------------------

    /// Records the current state as the saved state.
    pub fn mark_saved(&self) {
        self.inner.lock().save_distance = Some(0);
    }

    /// Returns `true` if the current state differs from the last saved state.
    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.lock().save_distance != Some(0)
    }

    /// Drops both stacks and any open group.
    ///
    /// If the current state was the saved state it remains so; otherwise the
    /// save point is permanently lost.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.undo_stack.clear();
            inner.redo_stack.clear();
            inner.open.clear();
            if inner.save_distance != Some(0) {
                inner.save_distance = None;
            }
        }
        self.changed.emit(&());
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    /// Fires with the id of every group reverted by [`undo`](Self::undo).
    pub fn signal_undo_performed(&self) -> &Signal<GroupId> {
        &self.undo_performed
    }

    /// Fires with the id of every group re-applied by [`redo`](Self::redo).
    pub fn signal_redo_performed(&self) -> &Signal<GroupId> {
        &self.redo_performed
    }

    /// Fires whenever the stacks change.
    pub fn signal_changed(&self) -> &Signal<()> {
        &self.changed
    }
}

fn pop_frame(inner: &mut Inner, id: GroupId) -> Result<OpenFrame, UndoError> {
    let frame = inner.open.pop().ok_or(UndoError::NoOpenGroup)?;
    if frame.group.id() != id {
        let expected = frame.group.id();
        inner.open.push(frame);
        return Err(UndoError::GroupMismatch { expected, got: id });
    }
    Ok(frame)
}

fn record_for(
    manager: &Weak<UndoManager>,
    target: &Weak<GrtObject>,
    make: impl FnOnce(GrtObjectRef) -> Box<dyn UndoAction>,
) {
    if let (Some(manager), Some(object)) = (manager.upgrade(), target.upgrade()) {
        manager.add_undo(make(object));
    }
}

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("UndoManager")
            .field("undo_count", &inner.undo_stack.len())
            .field("redo_count", &inner.redo_stack.len())
            .field("open_groups", &inner.open.len())
            .field("max_undo", &inner.max_undo)
            .field("blocks", &inner.blocks)
            .field("save_distance", &inner.save_distance)
            .finish()
    }
}
