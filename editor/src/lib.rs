//! # Workbench Editor
//!
//! Back ends of the object editors: change tracking, refresh scheduling and
//! undo coordination between an edited object, its UI and the shared undo
//! manager.
//!
//! - [`BaseEditor`] coalesces object change notifications into UI refreshes
//! - [`AutoUndoEdit`] scopes a group of edits into one undo step
//! - [`DbObjectEditor`] adds schema-object properties, parser wiring and the
//!   live-object protocol
//! - [`EditorContext`] bundles the services every editor is built from

pub mod auto_undo;
pub mod base_editor;
pub mod config;
pub mod context;
pub mod db_object_editor;
pub mod logging;
pub mod prompt;
pub mod refresh_ui;
pub mod sql;
pub mod undo_group;
pub mod version;

pub use auto_undo::AutoUndoEdit;
pub use base_editor::{BaseEditor, ObjectEditor};
pub use config::{ConfigError, EditorConfig};
pub use context::EditorContext;
pub use db_object_editor::DbObjectEditor;
pub use prompt::{PromptChoice, UserPrompt};
pub use refresh_ui::{RefreshBlocker, RefreshUi};
pub use undo_group::UndoObjectChangeGroup;
pub use version::ServerVersion;
