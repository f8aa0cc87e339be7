//! Class descriptors for graph objects.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::object::{GrtObject, GrtObjectRef};

/// Name and single-inheritance parent of an object class.
#[derive(Debug)]
pub struct MetaClass {
    name: String,
    parent: Option<Arc<MetaClass>>,
}

impl MetaClass {
    /// Creates a class with no parent.
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: None,
        })
    }

    /// Creates a class deriving from `parent`.
    pub fn derived(name: impl Into<String>, parent: &Arc<MetaClass>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<MetaClass>> {
        self.parent.as_ref()
    }

    /// Returns `true` if this class is `class_name` or derives from it.
    pub fn is_a(&self, class_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == class_name {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// Iterates this class and its ancestors, most derived first.
    pub fn lineage(&self) -> impl Iterator<Item = &MetaClass> {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
    }
}

/// Registry of known classes, keyed by name.
#[derive(Debug, Default)]
pub struct MetaClassRegistry {
    classes: RwLock<HashMap<String, Arc<MetaClass>>>,
}

impl MetaClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the database object classes.
    pub fn with_db_classes() -> Self {
        let registry = Self::new();
        let object = registry.register("GrtObject", None);
        let db_object = registry.register("db.DatabaseObject", Some(&object));
        let ddl = registry.register("db.DatabaseDdlObject", Some(&db_object));
        registry.register("db.Catalog", Some(&db_object));
        registry.register("db.Schema", Some(&db_object));
        registry.register("db.Table", Some(&db_object));
        registry.register("db.Column", Some(&db_object));
        registry.register("db.Index", Some(&db_object));
        registry.register("db.View", Some(&ddl));
        registry.register("db.Routine", Some(&ddl));
        registry.register("db.Trigger", Some(&ddl));
        registry.register("db.CharacterSet", Some(&object));
        registry.register("db.mgmt.Rdbms", Some(&object));
        registry
    }

    /// Registers a class. Re-registering a name replaces the previous entry.
    pub fn register(&self, name: &str, parent: Option<&Arc<MetaClass>>) -> Arc<MetaClass> {
        let class = match parent {
            Some(parent) => MetaClass::derived(name, parent),
            None => MetaClass::root(name),
        };
        self.classes.write().insert(name.to_owned(), class.clone());
        class
    }

    /// Registers `name` as a subclass of the already registered `parent`.
    ///
    /// Returns `None` if `parent` is unknown.
    pub fn register_subclass(&self, name: &str, parent: &str) -> Option<Arc<MetaClass>> {
        let parent = self.get(parent)?;
        Some(self.register(name, Some(&parent)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<MetaClass>> {
        self.classes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Creates a new object of a registered class.
    pub fn instantiate(&self, name: &str) -> Option<GrtObjectRef> {
        self.get(name).map(GrtObject::with_class)
    }
}
