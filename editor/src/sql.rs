//! Interfaces of the SQL parsing and code-editing services.
//!
//! Editors only hold these behind trait objects; the concrete parser and
//! text widget live in other crates.

use std::fmt;
use std::sync::Arc;

use workbench_core::grt::GrtObjectRef;

use crate::version::ServerVersion;

/// Everything needed to set up a parser for one target server.
#[derive(Debug, Clone)]
pub struct ParserContextSpec {
    /// Names of the character sets the server knows.
    pub charsets: Vec<String>,
    pub version: ServerVersion,
    pub sql_mode: Option<String>,
    pub case_sensitive: bool,
}

/// Parser state bound to one server version and SQL mode.
pub trait ParserContext: Send + Sync {
    fn server_version(&self) -> ServerVersion;
    fn update_server_version(&self, version: ServerVersion);
    fn sql_mode(&self) -> String;
    fn set_sql_mode(&self, sql_mode: &str);
    fn case_sensitive(&self) -> bool;
}

/// Checks SQL text for syntax errors.
pub trait SyntaxValidator: Send + Sync {
    fn set_sql_mode(&self, sql_mode: &str);
}

/// Any embedded text-editing control that can hold unsaved text.
pub trait CodeEditorControl: Send + Sync {
    fn is_dirty(&self) -> bool;
    fn reset_dirty(&self);
}

/// The SQL text editor embedded in object editors.
pub trait SqlEditor: CodeEditorControl {
    fn set_server_version(&self, version: ServerVersion);
    fn set_sql_mode(&self, sql_mode: &str);
    fn set_text(&self, text: &str);
    fn text(&self) -> String;
}

/// Factory for the parser-side collaborators.
pub trait ParserServices: Send + Sync {
    /// Builds a parser context for `spec`.
    fn create_parser_context(&self, spec: ParserContextSpec) -> Arc<dyn ParserContext>;

    /// Builds a syntax validator for the server family described by `rdbms`.
    fn create_syntax_validator(&self, rdbms: &GrtObjectRef) -> Arc<dyn SyntaxValidator>;

    /// Builds an SQL editor that parses with `context`.
    fn create_sql_editor(&self, context: Arc<dyn ParserContext>) -> Arc<dyn SqlEditor>;
}

/// Severity of a parser log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserLogLevel {
    Error,
    Warning,
    Note,
}

/// A message produced by a background parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserLogEntry {
    pub level: ParserLogLevel,
    pub message: String,
}

impl ParserLogEntry {
    pub fn new(level: ParserLogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParserLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.level, self.message)
    }
}
