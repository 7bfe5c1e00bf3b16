//! Operation registry: the set of operation names a run may use.

use crate::core::config::OperationParameters;
use crate::core::error::{ConfigError, ConfigResult};
use crate::filters::operation::{OpChain, Operation, OperationKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category for grouping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Background estimation and subtraction.
    Background,
    /// Histogram-based contrast adjustment.
    Histogram,
    /// Segmentation into region maps.
    Threshold,
    /// Spatial filters.
    Filter,
    /// Point-wise intensity mappings.
    Intensity,
    /// Extent-changing operations.
    Geometry,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Background => "Background",
            Category::Histogram => "Histogram",
            Category::Threshold => "Threshold",
            Category::Filter => "Filter",
            Category::Intensity => "Intensity",
            Category::Geometry => "Geometry",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Static description of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Kind the name resolves to.
    pub kind: OperationKind,
    /// Human-readable name.
    pub display_name: String,
    /// Category for listing.
    pub category: Category,
    /// Detailed description.
    pub description: String,
    /// Parameter keys the operation reads.
    pub parameters: Vec<String>,
    /// Alternative names accepted in configuration.
    pub aliases: Vec<String>,
}

impl OperationDescriptor {
    /// Create a descriptor builder.
    pub fn builder(kind: OperationKind, display_name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(kind, display_name)
    }

    /// Configuration name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Builder for [`OperationDescriptor`].
pub struct DescriptorBuilder {
    descriptor: OperationDescriptor,
}

impl DescriptorBuilder {
    /// Create a new builder with required fields.
    pub fn new(kind: OperationKind, display_name: impl Into<String>) -> Self {
        Self {
            descriptor: OperationDescriptor {
                kind,
                display_name: display_name.into(),
                category: Category::Filter,
                description: String::new(),
                parameters: Vec::new(),
                aliases: Vec::new(),
            },
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.descriptor.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    /// Add a parameter key.
    pub fn parameter(mut self, key: impl Into<String>) -> Self {
        self.descriptor.parameters.push(key.into());
        self
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor.aliases.push(alias.into());
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> OperationDescriptor {
        self.descriptor
    }
}

/// Registry entry containing a descriptor and its state.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Static description.
    pub descriptor: OperationDescriptor,
    /// Whether this operation may be resolved.
    pub enabled: bool,
}

/// Registry of available operations.
///
/// Maps configuration names (and aliases) to operation kinds. Resolution turns
/// a name plus the run's parameters into a concrete [`Operation`], failing on
/// unknown or disabled names.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    /// Operations indexed by their configuration name.
    entries: IndexMap<String, RegistryEntry>,
    /// Alias → configuration name.
    aliases: IndexMap<String, String>,
    /// Operations grouped by category.
    categories: IndexMap<Category, Vec<String>>,
}

impl OperationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            aliases: IndexMap::new(),
            categories: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::builtin::register_all(&mut registry);
        registry
    }

    /// Register an operation.
    pub fn register(&mut self, descriptor: OperationDescriptor) {
        let name = descriptor.name().to_string();
        for alias in &descriptor.aliases {
            self.aliases.insert(alias.clone(), name.clone());
        }
        let ids = self.categories.entry(descriptor.category).or_default();
        if !ids.contains(&name) {
            ids.push(name.clone());
        }
        self.entries.insert(
            name,
            RegistryEntry {
                descriptor,
                enabled: true,
            },
        );
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Look up an entry by name or alias.
    pub fn get_entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(self.canonical(name))
    }

    /// Look up a descriptor by name or alias.
    pub fn get_descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.get_entry(name).map(|e| &e.descriptor)
    }

    /// Configuration name that a name or alias refers to.
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        self.get_entry(name).map(|e| e.descriptor.name())
    }

    /// Check if a name or alias is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get_entry(name).is_some()
    }

    /// Resolve a name to its kind, failing on unknown or disabled entries.
    pub fn resolve_kind(&self, name: &str) -> ConfigResult<OperationKind> {
        match self.get_entry(name) {
            Some(entry) if entry.enabled => Ok(entry.descriptor.kind),
            Some(_) => Err(ConfigError::DisabledOperation {
                name: name.to_string(),
            }),
            None => Err(ConfigError::UnknownOperation {
                name: name.to_string(),
                context: "operation registry".to_string(),
            }),
        }
    }

    /// Resolve a name into a concrete operation using the run's parameters.
    pub fn resolve(&self, name: &str, params: &OperationParameters) -> ConfigResult<Operation> {
        self.resolve_kind(name)?.build(params)
    }

    /// Resolve an ordered list of names into a chain.
    ///
    /// `context` names where the list came from and is reported with
    /// unknown names.
    pub fn resolve_chain<S: AsRef<str>>(
        &self,
        names: &[S],
        params: &OperationParameters,
        context: &str,
    ) -> ConfigResult<OpChain> {
        names
            .iter()
            .map(|name| {
                self.resolve(name.as_ref(), params).map_err(|err| match err {
                    ConfigError::UnknownOperation { name, .. } => ConfigError::UnknownOperation {
                        name,
                        context: context.to_string(),
                    },
                    other => other,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()
            .map(OpChain::new)
    }

    /// Get all registered configuration names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Get all registered entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get names by category.
    pub fn names_by_category(&self, category: &Category) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|ids| ids.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Get all categories.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.keys()
    }

    /// Search operations by name, alias, display name or description.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.entries
            .iter()
            .filter(|(name, entry)| {
                let d = &entry.descriptor;
                name.to_lowercase().contains(&query)
                    || d.display_name.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
                    || d.aliases.iter().any(|a| a.to_lowercase().contains(&query))
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Enable or disable an operation.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let name = self.canonical(name).to_string();
        if let Some(entry) = self.entries.get_mut(&name) {
            entry.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Unregister an operation and its aliases.
    pub fn unregister(&mut self, name: &str) -> bool {
        let name = self.canonical(name).to_string();
        if let Some(entry) = self.entries.shift_remove(&name) {
            if let Some(ids) = self.categories.get_mut(&entry.descriptor.category) {
                ids.retain(|i| *i != name);
            }
            self.aliases.retain(|_, target| *target != name);
            true
        } else {
            false
        }
    }

    /// Get the total number of registered operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get count of enabled operations.
    pub fn enabled_count(&self) -> usize {
        self.entries.values().filter(|e| e.enabled).count()
    }

    /// Get enabled descriptors grouped by category, sorted by name.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&OperationDescriptor>> {
        let mut grouped: IndexMap<Category, Vec<&OperationDescriptor>> = IndexMap::new();

        for entry in self.entries.values() {
            if entry.enabled {
                grouped
                    .entry(entry.descriptor.category)
                    .or_default()
                    .push(&entry.descriptor);
            }
        }

        for descriptors in grouped.values_mut() {
            descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        }

        grouped
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Builder for creating a customized registry.
pub struct RegistryBuilder {
    registry: OperationRegistry,
    include_builtins: bool,
    only: Option<Vec<OperationKind>>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            include_builtins: true,
            only: None,
        }
    }

    /// Include or exclude built-in operations.
    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    /// Keep only the listed built-in kinds.
    pub fn only(mut self, kinds: &[OperationKind]) -> Self {
        self.only = Some(kinds.to_vec());
        self
    }

    /// Register a custom descriptor.
    pub fn register(mut self, descriptor: OperationDescriptor) -> Self {
        self.registry.register(descriptor);
        self
    }

    /// Build the registry.
    pub fn build(mut self) -> OperationRegistry {
        if self.include_builtins {
            let mut builtins = OperationRegistry::new();
            crate::filters::builtin::register_all(&mut builtins);
            for (_, entry) in builtins.entries {
                let keep = self
                    .only
                    .as_ref()
                    .map(|kinds| kinds.contains(&entry.descriptor.kind))
                    .unwrap_or(true);
                if keep && !self.registry.contains(entry.descriptor.name()) {
                    self.registry.register(entry.descriptor);
                }
            }
        }
        self.registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = OperationRegistry::with_builtins();
        assert_eq!(registry.len(), OperationKind::all().len());
        for kind in OperationKind::all() {
            assert!(registry.contains(kind.name()), "missing {}", kind);
        }
    }

    #[test]
    fn test_alias_lookup() {
        let registry = OperationRegistry::with_builtins();
        assert_eq!(
            registry.resolve_kind("eq_ada_hist").unwrap(),
            OperationKind::AdaptiveHist
        );
        assert_eq!(
            registry.get_descriptor("eq_ada_hist").unwrap().name(),
            "ada_hist"
        );
    }

    #[test]
    fn test_unknown_operation() {
        let registry = OperationRegistry::with_builtins();
        let params = OperationParameters::default();
        let err = registry.resolve("sharpen", &params).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperation { ref name, .. } if name == "sharpen"));

        let err = registry
            .resolve_chain(&["blur", "sharpen"], &params, "channel 'dapi'")
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOperation {
                name: "sharpen".to_string(),
                context: "channel 'dapi'".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_chain_in_order() {
        let registry = OperationRegistry::with_builtins();
        let chain = registry
            .resolve_chain(&["blur", "rescale", "resize"], &OperationParameters::default(), "test")
            .unwrap();
        assert_eq!(chain.names(), vec!["blur", "rescale", "resize"]);
    }

    #[test]
    fn test_category_grouping() {
        let registry = OperationRegistry::with_builtins();
        let background = registry.names_by_category(&Category::Background);
        assert!(background.contains(&"ball"));
        assert!(background.contains(&"dilate_s"));
        let grouped = registry.grouped_by_category();
        assert!(grouped[&Category::Geometry].iter().any(|d| d.name() == "resize"));
    }

    #[test]
    fn test_search() {
        let registry = OperationRegistry::with_builtins();
        assert!(registry.search("gauss").contains(&"blur"));
        assert!(registry.search("eq_ada").contains(&"ada_hist"));
        assert!(registry.search("nonexistent").is_empty());
    }

    #[test]
    fn test_enable_disable() {
        let mut registry = OperationRegistry::with_builtins();
        let params = OperationParameters::default();
        assert!(registry.set_enabled("otsu", false));
        assert_eq!(
            registry.resolve("otsu", &params).unwrap_err(),
            ConfigError::DisabledOperation {
                name: "otsu".to_string()
            }
        );
        assert_eq!(registry.enabled_count(), registry.len() - 1);
        registry.set_enabled("otsu", true);
        assert!(registry.resolve("otsu", &params).is_ok());
        assert!(!registry.set_enabled("missing", false));
    }

    #[test]
    fn test_unregister() {
        let mut registry = OperationRegistry::with_builtins();
        assert!(registry.unregister("eq_ada_hist"));
        assert!(!registry.contains("ada_hist"));
        assert!(!registry.contains("eq_ada_hist"));
        assert!(!registry
            .names_by_category(&Category::Histogram)
            .contains(&"ada_hist"));
    }

    #[test]
    fn test_builder_restricted_set() {
        let registry = RegistryBuilder::new()
            .only(&[OperationKind::GaussianBlur, OperationKind::Rescale])
            .build();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("blur"));
        assert!(!registry.contains("ball"));

        let empty = RegistryBuilder::new().with_builtins(false).build();
        assert!(empty.is_empty());
    }
}
