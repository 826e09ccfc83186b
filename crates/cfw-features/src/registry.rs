//! `ExtractorRegistry`: the closed set of eight named extractors,
//! looked up by string key the way `gat-algo`'s solver registry looks up
//! formulations and backends.

use std::collections::HashMap;
use std::sync::Arc;

use cfw_core::{CfwError, CfwResult};

use crate::extractor::Extractor;
use crate::indices::{Evi, Ndvi, Ndwi, Savi};
use crate::temporal::Temporal;
use crate::texture::{Brightness, Shadow, WaterDetection};

#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the closed set of eight extractors named in the
    /// Feature Engineer's contract.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Ndvi));
        registry.register(Arc::new(Evi));
        registry.register(Arc::new(Savi));
        registry.register(Arc::new(Ndwi));
        registry.register(Arc::new(WaterDetection));
        registry.register(Arc::new(Brightness));
        registry.register(Arc::new(Shadow));
        registry.register(Arc::new(Temporal));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(extractor.name().to_string(), extractor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.extractors.keys().map(String::as_str).collect()
    }

    /// Resolves an ordered name list into the ordered extractor list a
    /// `FeatureEngineer` drives, failing fast on an unregistered name
    /// (a config error: the registry is validated at startup, per the
    /// re-architecture guidance for plugin-style registries).
    pub fn resolve(&self, names: &[String]) -> CfwResult<Vec<Arc<dyn Extractor>>> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    CfwError::Config(format!(
                        "unknown feature extractor '{name}'; registered: {:?}",
                        self.list()
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_eight_extractors() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.list().len(), 8);
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let registry = ExtractorRegistry::with_defaults();
        let result = registry.resolve(&["ndvi".to_string(), "bogus".to_string()]);
        assert!(matches!(result, Err(CfwError::Config(_))));
    }

    #[test]
    fn resolve_preserves_requested_order() {
        let registry = ExtractorRegistry::with_defaults();
        let resolved = registry
            .resolve(&["evi".to_string(), "ndvi".to_string()])
            .unwrap();
        assert_eq!(resolved[0].name(), "evi");
        assert_eq!(resolved[1].name(), "ndvi");
    }
}
