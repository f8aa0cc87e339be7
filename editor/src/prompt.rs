//! Modal questions put to the user.

/// Answer to the "save changes?" question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Save,
    Cancel,
    DontSave,
}

/// Synchronous modal prompts. Called on the UI thread only.
pub trait UserPrompt: Send + Sync {
    /// Asks whether pending changes should be saved before closing.
    fn confirm_save(&self, title: &str, message: &str) -> PromptChoice;
}

/// A prompt that answers every question the same way. Useful for headless
/// runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompt(pub PromptChoice);

impl UserPrompt for FixedPrompt {
    fn confirm_save(&self, title: &str, _message: &str) -> PromptChoice {
        log::debug!("auto-answering '{title}' with {:?}", self.0);
        self.0
    }
}
