//! Module catalog for resolving module types
//!
//! The controller never constructs behaviors itself: it asks an injected
//! `ModuleFactory` for a module type's description and a fresh behavior.
//! `ModuleRegistry` is the stock implementation.
//!
//! # Usage
//!
//! ```ignore
//! use dataflow_engine::{ModuleRegistry, NetworkController};
//!
//! let mut registry = ModuleRegistry::with_builtins();
//! registry.register_fn(MyModule::descriptor(), || Box::new(MyModule::default()));
//!
//! let controller = NetworkController::new(Arc::new(registry));
//! ```
//!
//! Built-in modules register at link time:
//!
//! ```ignore
//! inventory::submit!(dataflow_engine::ModuleRegistration {
//!     descriptor: MyModule::descriptor,
//!     create: || Box::new(MyModule::default()),
//! });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::descriptor::ModuleDescription;
use crate::error::{NetworkError, Result};
use crate::module::ModuleBehavior;
use crate::types::ModuleTypeId;

/// Source of module descriptions and behaviors
pub trait ModuleFactory: Send + Sync {
    /// Description of a module type, if known
    fn lookup_description(&self, type_id: &ModuleTypeId) -> Option<ModuleDescription>;

    /// Create a fresh behavior for a module type
    fn create(&self, description: &ModuleDescription) -> Result<Box<dyn ModuleBehavior>>;

    /// Every known description, ordered by type id
    fn descriptions(&self) -> Vec<ModuleDescription>;
}

/// Creates behaviors for exactly one module type
pub trait BehaviorFactory: Send + Sync {
    fn create_behavior(&self) -> Box<dyn ModuleBehavior>;
}

/// Closure-backed `BehaviorFactory`
struct FnBehaviorFactory<F>(F);

impl<F> BehaviorFactory for FnBehaviorFactory<F>
where
    F: Fn() -> Box<dyn ModuleBehavior> + Send + Sync,
{
    fn create_behavior(&self) -> Box<dyn ModuleBehavior> {
        (self.0)()
    }
}

/// Link-time registration of a built-in module type
///
/// Both fields are plain function pointers so records can be built in a
/// `static` context by `inventory::submit!`.
pub struct ModuleRegistration {
    /// Returns the module's description
    pub descriptor: fn() -> ModuleDescription,
    /// Creates a behavior instance
    pub create: fn() -> Box<dyn ModuleBehavior>,
}

inventory::collect!(ModuleRegistration);

/// A registration entry combining a description with an optional factory
struct RegistryEntry {
    description: ModuleDescription,
    factory: Option<Arc<dyn BehaviorFactory>>,
}

/// Registry of module types with their descriptions and behaviors
///
/// Registries compose by merging, later entries overriding earlier ones.
pub struct ModuleRegistry {
    entries: HashMap<ModuleTypeId, RegistryEntry>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry pre-populated with every linked `ModuleRegistration`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for registration in inventory::iter::<ModuleRegistration> {
            registry.register_fn((registration.descriptor)(), registration.create);
        }
        log::debug!("Registered {} built-in module types", registry.len());
        registry
    }

    /// Register a module type with its behavior factory
    pub fn register(&mut self, description: ModuleDescription, factory: Arc<dyn BehaviorFactory>) {
        self.entries.insert(
            description.type_id.clone(),
            RegistryEntry {
                description,
                factory: Some(factory),
            },
        );
    }

    /// Register a module type backed by a closure
    pub fn register_fn<F>(&mut self, description: ModuleDescription, create: F)
    where
        F: Fn() -> Box<dyn ModuleBehavior> + Send + Sync + 'static,
    {
        self.register(description, Arc::new(FnBehaviorFactory(create)));
    }

    /// Register a description only (palette listing, replacement lookup)
    pub fn register_metadata(&mut self, description: ModuleDescription) {
        self.entries.insert(
            description.type_id.clone(),
            RegistryEntry {
                description,
                factory: None,
            },
        );
    }

    pub fn get_description(&self, type_id: &ModuleTypeId) -> Option<&ModuleDescription> {
        self.entries.get(type_id).map(|e| &e.description)
    }

    /// Find a description by bare module name
    pub fn find_by_name(&self, name: &str) -> Option<&ModuleDescription> {
        self.entries
            .values()
            .map(|e| &e.description)
            .filter(|d| d.type_id.name == name)
            .min_by(|a, b| a.type_id.cmp(&b.type_id))
    }

    pub fn has_module_type(&self, type_id: &ModuleTypeId) -> bool {
        self.entries.contains_key(type_id)
    }

    /// Descriptions grouped by category, each group ordered by type id
    pub fn descriptions_by_category(&self) -> BTreeMap<String, Vec<&ModuleDescription>> {
        let mut grouped: BTreeMap<String, Vec<&ModuleDescription>> = BTreeMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.description.type_id.category.clone())
                .or_default()
                .push(&entry.description);
        }
        for group in grouped.values_mut() {
            group.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        }
        grouped
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` with the same type id.
    pub fn merge(&mut self, other: ModuleRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleFactory for ModuleRegistry {
    fn lookup_description(&self, type_id: &ModuleTypeId) -> Option<ModuleDescription> {
        self.get_description(type_id).cloned()
    }

    fn create(&self, description: &ModuleDescription) -> Result<Box<dyn ModuleBehavior>> {
        let entry = self
            .entries
            .get(&description.type_id)
            .ok_or_else(|| NetworkError::UnknownModuleType(description.type_id.clone()))?;
        let factory = entry.factory.as_ref().ok_or_else(|| {
            NetworkError::failed(format!(
                "No behavior registered for module type '{}'",
                description.type_id
            ))
        })?;
        Ok(factory.create_behavior())
    }

    fn descriptions(&self) -> Vec<ModuleDescription> {
        let mut all: Vec<ModuleDescription> =
            self.entries.values().map(|e| e.description.clone()).collect();
        all.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PortDescription;
    use crate::module::tests::Noop;

    fn description(name: &str, category: &str) -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new(name, category, "Test"))
            .with_output(PortDescription::fixed("out", "Scalar"))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ModuleRegistry::new();
        registry.register_fn(description("Source", "Data"), || Box::new(Noop));

        let type_id = ModuleTypeId::new("Source", "Data", "Test");
        assert!(registry.has_module_type(&type_id));
        assert!(registry.lookup_description(&type_id).is_some());
        assert!(registry.create(&description("Source", "Data")).is_ok());
        assert_eq!(
            registry.find_by_name("Source").map(|d| &d.type_id),
            Some(&type_id)
        );
    }

    #[test]
    fn test_metadata_only_cannot_create() {
        let mut registry = ModuleRegistry::new();
        registry.register_metadata(description("Viewer", "Render"));

        assert!(matches!(
            registry.create(&description("Viewer", "Render")),
            Err(NetworkError::ExecutionFailed(_))
        ));
        assert!(matches!(
            registry.create(&description("Missing", "Render")),
            Err(NetworkError::UnknownModuleType(_))
        ));
    }

    #[test]
    fn test_merge_and_group_by_category() {
        let mut first = ModuleRegistry::new();
        first.register_metadata(description("B", "Math"));

        let mut second = ModuleRegistry::new();
        second.register_metadata(description("A", "Math"));
        second.register_metadata(description("Source", "Data"));

        first.merge(second);
        assert_eq!(first.len(), 3);

        let grouped = first.descriptions_by_category();
        let math: Vec<_> = grouped["Math"].iter().map(|d| d.type_id.name.as_str()).collect();
        assert_eq!(math, vec!["A", "B"]);
        assert_eq!(grouped["Data"].len(), 1);

        let names: Vec<_> = first.descriptions().into_iter().map(|d| d.type_id.name).collect();
        assert_eq!(names, vec!["A", "B", "Source"]);
    }
}
