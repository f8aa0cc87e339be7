//! Services shared by every editor of a document.

use std::sync::Arc;

use workbench_core::grt::MetaClassRegistry;
use workbench_core::idle::UiScheduler;
use workbench_core::notifications::NotificationCenter;
use workbench_core::undo::UndoManager;
use workbench_core::validation::ValidationManager;

use crate::config::EditorConfig;
use crate::prompt::UserPrompt;
use crate::sql::ParserServices;

/// Everything an editor needs from the application, constructed once at
/// startup and cloned into each editor.
#[derive(Clone)]
pub struct EditorContext {
    pub undo: Arc<UndoManager>,
    pub scheduler: Arc<dyn UiScheduler>,
    pub notifications: Arc<NotificationCenter>,
    pub validation: Arc<ValidationManager>,
    pub parser_services: Option<Arc<dyn ParserServices>>,
    pub prompt: Arc<dyn UserPrompt>,
    pub config: Arc<EditorConfig>,
}

impl EditorContext {
    /// Builds a context with fresh core services and no parser services.
    pub fn new(
        config: EditorConfig,
        scheduler: Arc<dyn UiScheduler>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        let classes = Arc::new(MetaClassRegistry::with_db_classes());
        Self {
            undo: UndoManager::new(config.max_undo),
            scheduler,
            notifications: Arc::new(NotificationCenter::new()),
            validation: Arc::new(ValidationManager::new(classes)),
            parser_services: None,
            prompt,
            config: Arc::new(config),
        }
    }

    pub fn with_parser_services(mut self, services: Arc<dyn ParserServices>) -> Self {
        self.parser_services = Some(services);
        self
    }
}

impl std::fmt::Debug for EditorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorContext")
            .field("undo", &self.undo)
            .field("notifications", &self.notifications)
            .field("validation", &self.validation)
            .field("has_parser_services", &self.parser_services.is_some())
            .field("config", &self.config)
            .finish()
    }
}
