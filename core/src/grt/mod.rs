//! Observed object graph.
//!
//! - [`GrtObject`]: identity, members, lists, custom data, owner back-reference
//! - [`Value`]: dynamically typed member value
//! - [`MetaClass`] / [`MetaClassRegistry`]: single-inheritance class descriptors
//!
//! Owners are held weakly and [`GrtObject::set_owner`] refuses cycles, so the
//! ownership structure is a forest by construction.

mod metaclass;
mod object;
mod value;

pub use metaclass::{MetaClass, MetaClassRegistry};
pub use object::{
    DictChange, GrtObject, GrtObjectRef, ListChange, ListChangeKind, MAX_OWNER_DEPTH,
    MemberChange,
};
pub use value::Value;
