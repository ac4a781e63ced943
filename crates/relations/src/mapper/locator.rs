//! Mapper Locator - runtime lookup of mappers by class tag

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::Mapper;
use crate::error::{RelationResult, RelationshipError};

/// Shared registry of mappers keyed by class tag.
///
/// Cloning the locator clones the handle, not the registry, so relationships
/// built against a locator see mappers registered after them.
#[derive(Clone, Default)]
pub struct MapperLocator {
    mappers: Arc<DashMap<String, Arc<dyn Mapper>>>,
}

impl MapperLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper under its class tag, returning any mapper it replaced
    pub fn register(&self, mapper: Arc<dyn Mapper>) -> Option<Arc<dyn Mapper>> {
        let class = mapper.mapper_class().to_string();
        debug!("Registering mapper {}", class);
        self.mappers.insert(class, mapper)
    }

    pub fn get(&self, class: &str) -> RelationResult<Arc<dyn Mapper>> {
        self.mappers
            .get(class)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RelationshipError::MapperNotFound {
                mapper: class.to_string(),
            })
    }

    pub fn has(&self, class: &str) -> bool {
        self.mappers.contains_key(class)
    }

    /// Registered class tags, sorted
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self
            .mappers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        classes.sort();
        classes
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Check that every relationship of every mapper resolves its foreign mappers
    pub fn validate_all(&self) -> RelationResult<()> {
        let mappers: Vec<Arc<dyn Mapper>> = self
            .mappers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for mapper in mappers {
            mapper.relationships().validate().map_err(|e| {
                RelationshipError::Configuration(format!(
                    "Validation failed for mapper '{}': {}",
                    mapper.mapper_class(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Drop every registered mapper.
    ///
    /// Mappers hold relationships that hold this locator, so a locator and its
    /// mappers keep each other alive until cleared.
    pub fn clear(&self) {
        self.mappers.clear();
    }
}

impl fmt::Debug for MapperLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperLocator")
            .field("classes", &self.classes())
            .finish()
    }
}
