//! Validation of objects and broadcasting of the results.
//!
//! Validators are registered per metaclass. Validating an object runs the
//! validators of its class and of every ancestor class, and broadcasts each
//! produced [`ValidationMessage`] through [`ValidationManager::signal_notify`].
//! Editors listen to that signal and keep the messages that concern them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::grt::{GrtObjectRef, MetaClassRegistry};
use crate::signal::Signal;

/// Tag that addresses every listener at once.
pub const CLEAR_ALL_TAG: &str = "*";

/// Severity of a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Output,
}

/// A validation result as broadcast to listeners.
#[derive(Debug, Clone)]
pub struct ValidationMessage {
    pub tag: String,
    pub object: Option<GrtObjectRef>,
    pub message: String,
    pub level: MessageType,
}

impl ValidationMessage {
    /// Returns `true` for the broadcast that resets all listeners.
    pub fn is_clear_all(&self) -> bool {
        self.tag == CLEAR_ALL_TAG && self.object.is_none()
    }
}

/// Collects messages produced by a [`Validator`].
pub type ValidationSink<'a> = &'a mut dyn FnMut(ValidationMessage);

/// Checks objects of one metaclass.
pub trait Validator: Send + Sync {
    /// Validates `object` for `tag`, pushing findings into `sink`. Returns
    /// the number of messages produced.
    fn validate(&self, tag: &str, object: &GrtObjectRef, sink: ValidationSink<'_>) -> usize;
}

/// Implementation language of a validator plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginLanguage {
    Native,
    Python,
    Lua,
}

/// A validator plugin discovered by the plugin scanner.
#[derive(Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub language: PluginLanguage,
    pub class_name: String,
    pub validator: Option<Arc<dyn Validator>>,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("language", &self.language)
            .field("class_name", &self.class_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("validator plugin '{name}' is implemented in {language:?}, only native plugins are supported")]
    UnsupportedPluginLanguage {
        name: String,
        language: PluginLanguage,
    },
    #[error("native validator plugin '{0}' carries no validator")]
    MissingValidator(String),
}

/// Registry of validators and the validation broadcast channel.
pub struct ValidationManager {
    classes: Arc<MetaClassRegistry>,
    validators: RwLock<HashMap<String, Vec<Arc<dyn Validator>>>>,
    notify: Signal<ValidationMessage>,
}

impl ValidationManager {
    pub fn new(classes: Arc<MetaClassRegistry>) -> Self {
        Self {
            classes,
            validators: RwLock::new(HashMap::new()),
            notify: Signal::new(),
        }
    }

    /// Broadcast channel of validation results.
    pub fn signal_notify(&self) -> &Signal<ValidationMessage> {
        &self.notify
    }

    /// Registers `validator` for objects of `class_name` and its subclasses.
    ///
    /// An unknown class is a configuration mistake: it is logged and the
    /// validator is dropped.
    pub fn register_validator(&self, class_name: &str, validator: Arc<dyn Validator>) -> bool {
        if !self.classes.contains(class_name) {
            log::warn!("cannot register validator for unknown metaclass '{class_name}'");
            return false;
        }
        self.validators
            .write()
            .entry(class_name.to_owned())
            .or_default()
            .push(validator);
        true
    }

    /// Registers the validators of `plugins`.
    ///
    /// Fails on the first non-native plugin; plugins before it stay
    /// registered. Returns the number of registered validators.
    pub fn scan(&self, plugins: &[PluginDescriptor]) -> Result<usize, ValidationError> {
        let mut registered = 0;
        for plugin in plugins {
            if plugin.language != PluginLanguage::Native {
                return Err(ValidationError::UnsupportedPluginLanguage {
                    name: plugin.name.clone(),
                    language: plugin.language,
                });
            }
            let validator = plugin
                .validator
                .clone()
                .ok_or_else(|| ValidationError::MissingValidator(plugin.name.clone()))?;
            if self.register_validator(&plugin.class_name, validator) {
                log::debug!("validator plugin '{}' registered", plugin.name);
                registered += 1;
            }
        }
        Ok(registered)
    }

    /// Runs every validator applicable to `object` and broadcasts the
    /// findings. Returns the number of messages produced.
    pub fn validate_instance(&self, object: &GrtObjectRef, tag: &str) -> usize {
        let applicable: Vec<Arc<dyn Validator>> = {
            let validators = self.validators.read();
            object
                .meta_class()
                .lineage()
                .filter_map(|class| validators.get(class.name()))
                .flatten()
                .cloned()
                .collect()
        };

        let mut messages = Vec::new();
        let mut sink = |message: ValidationMessage| messages.push(message);
        let mut count = 0;
        for validator in &applicable {
            count += validator.validate(tag, object, &mut sink);
        }
        for message in &messages {
            self.notify.emit(message);
        }
        count
    }

    /// Tells every listener to forget all previous results.
    pub fn notify_clear_all(&self) {
        self.notify_clear(CLEAR_ALL_TAG);
    }

    /// Tells listeners to forget previous results for `tag`.
    pub fn notify_clear(&self, tag: &str) {
        self.notify.emit(&ValidationMessage {
            tag: tag.to_owned(),
            object: None,
            message: String::new(),
            level: MessageType::Info,
        });
    }

    /// Broadcasts a single message.
    pub fn notify(&self, message: ValidationMessage) {
        self.notify.emit(&message);
    }

    /// Drops every registered validator.
    pub fn clear(&self) {
        self.validators.write().clear();
    }

    pub fn validator_count(&self) -> usize {
        self.validators.read().values().map(Vec::len).sum()
    }
}

impl fmt::Debug for ValidationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationManager")
            .field("validators", &self.validator_count())
            .field("listeners", &self.notify.slot_count())
            .finish()
    }
}
