//! Observable graph objects.
//!
//! A [`GrtObject`] is a node with a stable identity, named members, list
//! members, a free-form custom-data dictionary and a weak back-reference to
//! its owner. Every effective mutation is announced on one of three signals:
//!
//! - [`signal_changed`](GrtObject::signal_changed): a scalar member changed
//! - [`signal_list_changed`](GrtObject::signal_list_changed): a list member
//!   gained or lost an item
//! - [`signal_dict_changed`](GrtObject::signal_dict_changed): a custom-data
//!   key changed
//!
//! Signals fire after the internal locks are released, so observers may read
//! or mutate the object from inside their slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::metaclass::MetaClass;
use super::value::Value;
use crate::signal::Signal;

/// Shared handle to a graph object.
pub type GrtObjectRef = Arc<GrtObject>;

/// Upper bound for owner-chain walks.
pub const MAX_OWNER_DEPTH: usize = 64;

/// Payload of [`GrtObject::signal_changed`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemberChange {
    /// Name of the changed member. Empty for a forced "re-read everything"
    /// notification.
    pub member: String,
    /// Value before the change.
    pub old: Value,
}

/// What happened to a list member.
#[derive(Debug, Clone, PartialEq)]
pub enum ListChangeKind {
    Inserted { index: usize },
    Removed { index: usize, value: Value },
}

/// Payload of [`GrtObject::signal_list_changed`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListChange {
    pub member: String,
    pub kind: ListChangeKind,
}

/// Payload of [`GrtObject::signal_dict_changed`].
#[derive(Debug, Clone, PartialEq)]
pub struct DictChange {
    pub key: String,
    /// Previous value, [`Value::None`] if the key was absent.
    pub old: Value,
}

/// A node in the observed object graph.
pub struct GrtObject {
    id: String,
    class: Arc<MetaClass>,
    owner: RwLock<Weak<GrtObject>>,
    members: RwLock<HashMap<String, Value>>,
    custom_data: RwLock<HashMap<String, Value>>,
    changed: Signal<MemberChange>,
    list_changed: Signal<ListChange>,
    dict_changed: Signal<DictChange>,
}

impl GrtObject {
    /// Creates an object of a parentless class named `class_name`.
    pub fn new(class_name: &str) -> GrtObjectRef {
        Self::with_class(MetaClass::root(class_name))
    }

    /// Creates an object of `class` with a fresh UUID.
    pub fn with_class(class: Arc<MetaClass>) -> GrtObjectRef {
        Self::with_id(class, uuid::Uuid::new_v4().to_string())
    }

    /// Creates an object with a caller-supplied id.
    pub fn with_id(class: Arc<MetaClass>, id: impl Into<String>) -> GrtObjectRef {
        Arc::new(Self {
            id: id.into(),
            class,
            owner: RwLock::new(Weak::new()),
            members: RwLock::new(HashMap::new()),
            custom_data: RwLock::new(HashMap::new()),
            changed: Signal::new(),
            list_changed: Signal::new(),
            dict_changed: Signal::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn meta_class(&self) -> &Arc<MetaClass> {
        &self.class
    }

    /// Returns `true` if the object's class is `class_name` or derives from it.
    pub fn is_instance(&self, class_name: &str) -> bool {
        self.class.is_a(class_name)
    }

    /// Identity comparison.
    pub fn same_object(&self, other: &GrtObject) -> bool {
        std::ptr::eq(self, other)
    }

    // -----------------------------------------------------------------------
    // Ownership
    // -----------------------------------------------------------------------

    pub fn owner(&self) -> Option<GrtObjectRef> {
        self.owner.read().upgrade()
    }

    /// Sets or clears the owner.
    ///
    /// Returns `false` and leaves the owner untouched if `owner` is this
    /// object or one of its descendants.
    pub fn set_owner(&self, owner: Option<&GrtObjectRef>) -> bool {
        match owner {
            Some(owner) => {
                if owner.same_object(self) || owner.is_owned_by(self) {
                    log::warn!(
                        "refusing to make {} {} owner of itself",
                        self.class_name(),
                        self.id
                    );
                    return false;
                }
                *self.owner.write() = Arc::downgrade(owner);
            }
            None => *self.owner.write() = Weak::new(),
        }
        true
    }

    /// Owner chain, nearest first, at most [`MAX_OWNER_DEPTH`] entries.
    pub fn ancestors(&self) -> Vec<GrtObjectRef> {
        let mut chain = Vec::new();
        let mut current = self.owner();
        while let Some(object) = current {
            if chain.len() == MAX_OWNER_DEPTH {
                log::warn!("owner chain of {} exceeds {MAX_OWNER_DEPTH}", self.id);
                break;
            }
            current = object.owner();
            chain.push(object);
        }
        chain
    }

    /// Returns `true` if `ancestor` appears in this object's owner chain.
    pub fn is_owned_by(&self, ancestor: &GrtObject) -> bool {
        self.ancestors().iter().any(|a| a.same_object(ancestor))
    }

    /// Returns this object or its nearest ancestor of class `class_name`.
    pub fn find_self_or_ancestor(self: &Arc<Self>, class_name: &str) -> Option<GrtObjectRef> {
        if self.is_instance(class_name) {
            return Some(self.clone());
        }
        self.ancestors()
            .into_iter()
            .find(|a| a.is_instance(class_name))
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    /// Returns a member's value, [`Value::None`] if unset.
    pub fn member(&self, name: &str) -> Value {
        self.members.read().get(name).cloned().unwrap_or_default()
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.read().contains_key(name)
    }

    /// Returns a string member, empty if unset or not a string.
    pub fn string_member(&self, name: &str) -> String {
        self.member(name).as_str().unwrap_or_default().to_owned()
    }

    pub fn int_member(&self, name: &str, default: i64) -> i64 {
        self.member(name).as_int().unwrap_or(default)
    }

    /// Shorthand for the `name` member.
    pub fn name(&self) -> String {
        self.string_member("name")
    }

    /// Stores `value` and emits [`signal_changed`](Self::signal_changed).
    ///
    /// Returns `false` without notifying if the value is unchanged.
    pub fn set_member(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let old = {
            let mut members = self.members.write();
            let old = members.get(name).cloned().unwrap_or_default();
            if old == value {
                return false;
            }
            members.insert(name.to_owned(), value);
            old
        };
        self.changed.emit(&MemberChange {
            member: name.to_owned(),
            old,
        });
        true
    }

    // -----------------------------------------------------------------------
    // List members
    // -----------------------------------------------------------------------

    pub fn list_len(&self, member: &str) -> usize {
        self.members
            .read()
            .get(member)
            .and_then(|v| v.as_list().map(|l| l.len()))
            .unwrap_or(0)
    }

    pub fn list_item(&self, member: &str, index: usize) -> Option<Value> {
        self.members
            .read()
            .get(member)
            .and_then(|v| v.as_list().and_then(|l| l.get(index).cloned()))
    }

    /// Objects stored in a list member, skipping non-object items.
    pub fn object_list(&self, member: &str) -> Vec<GrtObjectRef> {
        self.members
            .read()
            .get(member)
            .and_then(|v| v.as_list())
            .map(|items| items.iter().filter_map(|v| v.as_object().cloned()).collect())
            .unwrap_or_default()
    }

    /// Inserts `value` at `index` (clamped to the list length).
    ///
    /// Turns a missing or non-list member into a list.
    pub fn list_insert(&self, member: &str, index: usize, value: impl Into<Value>) -> usize {
        let value = value.into();
        let index = {
            let mut members = self.members.write();
            let slot = members.entry(member.to_owned()).or_insert(Value::List(Vec::new()));
            if !matches!(slot, Value::List(_)) {
                *slot = Value::List(Vec::new());
            }
            let Value::List(items) = slot else {
                unreachable!("slot was just turned into a list")
            };
            let index = index.min(items.len());
            items.insert(index, value);
            index
        };
        self.list_changed.emit(&ListChange {
            member: member.to_owned(),
            kind: ListChangeKind::Inserted { index },
        });
        index
    }

    pub fn list_append(&self, member: &str, value: impl Into<Value>) -> usize {
        self.list_insert(member, usize::MAX, value)
    }

    /// Appends `child` to a list member and makes this object its owner.
    pub fn add_owned(self: &Arc<Self>, member: &str, child: &GrtObjectRef) -> usize {
        child.set_owner(Some(self));
        self.list_append(member, child.clone())
    }

    /// Removes the item at `index`, returning it.
    pub fn list_remove(&self, member: &str, index: usize) -> Option<Value> {
        let value = {
            let mut members = self.members.write();
            match members.get_mut(member) {
                Some(Value::List(items)) if index < items.len() => items.remove(index),
                _ => return None,
            }
        };
        self.list_changed.emit(&ListChange {
            member: member.to_owned(),
            kind: ListChangeKind::Removed {
                index,
                value: value.clone(),
            },
        });
        Some(value)
    }

    // -----------------------------------------------------------------------
    // Custom data
    // -----------------------------------------------------------------------

    /// Returns a custom-data entry, [`Value::None`] if absent.
    pub fn custom_data(&self, key: &str) -> Value {
        self.custom_data.read().get(key).cloned().unwrap_or_default()
    }

    pub fn has_custom_data(&self, key: &str) -> bool {
        self.custom_data.read().contains_key(key)
    }

    pub fn custom_int(&self, key: &str, default: i64) -> i64 {
        self.custom_data(key).as_int().unwrap_or(default)
    }

    pub fn custom_string(&self, key: &str) -> Option<String> {
        self.custom_data(key).as_str().map(str::to_owned)
    }

    /// Stores a custom-data entry; [`Value::None`] removes the key.
    ///
    /// Emits [`signal_dict_changed`](Self::signal_dict_changed) when the
    /// entry actually changes.
    pub fn set_custom_data(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let old = {
            let mut data = self.custom_data.write();
            let old = data.get(key).cloned().unwrap_or_default();
            if old == value {
                return false;
            }
            if value.is_none() {
                data.remove(key);
            } else {
                data.insert(key.to_owned(), value);
            }
            old
        };
        self.dict_changed.emit(&DictChange {
            key: key.to_owned(),
            old,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    pub fn signal_changed(&self) -> &Signal<MemberChange> {
        &self.changed
    }

    pub fn signal_list_changed(&self) -> &Signal<ListChange> {
        &self.list_changed
    }

    pub fn signal_dict_changed(&self) -> &Signal<DictChange> {
        &self.dict_changed
    }
}

impl fmt::Debug for GrtObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrtObject")
            .field("class", &self.class.name())
            .field("id", &self.id)
            .field("members", &self.members.read().len())
            .finish()
    }
}
