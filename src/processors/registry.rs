use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;

use super::default::DefaultProcessor;
use super::image::ImageProcessor;
use super::traits::Processor;
use crate::object_url::ObjectUrlFacility;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("processor not found: {0}")]
    NotFound(String),
}

/// Registry mapping resource kinds to processors
#[derive(Clone)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Rc<dyn Processor>>,
    fallback: Rc<dyn Processor>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: BTreeMap::new(),
            fallback: Rc::new(DefaultProcessor::new()),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, processor: Rc<dyn Processor>) {
        self.processors.insert(kind.into(), processor);
    }

    pub fn get(&self, kind: &str) -> Result<Rc<dyn Processor>, RegistryError> {
        self.processors
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(kind.to_string()))
    }

    /// Registered processor for `kind`, or the default one
    pub fn resolve(&self, kind: &str) -> Rc<dyn Processor> {
        self.get(kind).unwrap_or_else(|_| self.fallback.clone())
    }

    pub fn has_processor(&self, kind: &str) -> bool {
        self.processors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    /// Built-in processors; images fall back to `data:` URLs
    pub fn with_defaults() -> Self {
        Self::with_facility(None)
    }

    /// Built-in processors, minting image references through `facility`
    pub fn with_facility(facility: Option<Rc<dyn ObjectUrlFacility>>) -> Self {
        let mut registry = Self::new();

        let default_processor: Rc<dyn Processor> = Rc::new(DefaultProcessor::new());
        for kind in ["binary", "text", "json"] {
            registry.register(kind, default_processor.clone());
        }
        registry.register("image", Rc::new(ImageProcessor::new(facility)));

        registry
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
