//! # Workbench Core
//!
//! Collaborators shared by all object editors: the observed object graph,
//! signals with scoped connections, the undo manager, UI idle scheduling,
//! the notification center and the validation broadcast.
//!
//! Nothing in this crate is a process-wide singleton. The application
//! constructs each service once and hands it to the editors that need it.

pub mod grt;
pub mod idle;
pub mod notifications;
pub mod signal;
pub mod undo;
pub mod validation;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
