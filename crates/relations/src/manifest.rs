//! Relationship Manifest - YAML declaration of mappers and their relationships
//!
//! ```yaml
//! mappers:
//!   - class: Comments
//!     columns: [id, commentable_type, commentable_id, body]
//!     relationships:
//!       - kind: many_to_one_by_reference
//!         name: commentable
//!         reference_column: commentable_type
//!         references:
//!           - value: post
//!             foreign: Posts
//!             on: [{ native: commentable_id, foreign: id }]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RelationResult, RelationshipError};
use crate::relationships::{MapperRelationships, RelationshipDefinition};

fn default_primary() -> Vec<String> {
    vec!["id".to_string()]
}

/// One mapper: its table shape and declared relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperDefinition {
    pub class: String,

    #[serde(default = "default_primary")]
    pub primary: Vec<String>,

    pub columns: Vec<String>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

impl MapperDefinition {
    /// Declare this mapper's relationships on a relationship set
    pub fn apply(&self, relationships: &mut MapperRelationships) -> RelationResult<()> {
        for definition in &self.relationships {
            relationships.define(definition)?;
        }
        Ok(())
    }

    fn validate(&self) -> RelationResult<()> {
        if self.class.is_empty() {
            return Err(RelationshipError::Configuration(
                "Mapper class cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for definition in &self.relationships {
            definition.validate()?;

            if !definition.native.is_empty() && definition.native != self.class {
                return Err(RelationshipError::Configuration(format!(
                    "Relationship '{}' is listed under {} but declared for {}",
                    definition.name, self.class, definition.native
                )));
            }
            if !names.insert(definition.name.as_str()) {
                return Err(RelationshipError::RelationshipExists {
                    mapper: self.class.clone(),
                    name: definition.name.clone(),
                });
            }

            let mut values = HashSet::new();
            for reference in &definition.references {
                if !values.insert(reference.value.as_str()) {
                    warn!(
                        "Reference value '{}' of {}.{} is declared twice; the last one wins",
                        reference.value, self.class, definition.name
                    );
                }
            }
        }
        Ok(())
    }
}

/// Every mapper of an application, as loaded from a manifest file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipManifest {
    #[serde(default)]
    pub mappers: Vec<MapperDefinition>,
}

impl RelationshipManifest {
    pub fn from_yaml_str(content: &str) -> RelationResult<Self> {
        let manifest: Self = serde_yaml::from_str(content)?;
        Ok(manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> RelationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let manifest = Self::from_yaml_str(&content)?;
        debug!(
            "Loaded relationship manifest {} with {} mapper(s)",
            path.display(),
            manifest.mappers.len()
        );
        Ok(manifest)
    }

    pub fn to_yaml_string(&self) -> RelationResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate every mapper and relationship declaration
    pub fn validate(&self) -> RelationResult<()> {
        let mut classes = HashSet::new();
        for mapper in &self.mappers {
            if !classes.insert(mapper.class.as_str()) {
                return Err(RelationshipError::Configuration(format!(
                    "Mapper {} is declared twice",
                    mapper.class
                )));
            }
            mapper.validate()?;
        }
        Ok(())
    }

    pub fn mapper(&self, class: &str) -> Option<&MapperDefinition> {
        self.mappers.iter().find(|mapper| mapper.class == class)
    }

    /// Declare the manifest's relationships for the set's native mapper
    pub fn apply(&self, relationships: &mut MapperRelationships) -> RelationResult<()> {
        let class = relationships.native_mapper_class().to_string();
        let mapper = self.mapper(&class).ok_or(RelationshipError::MapperNotFound {
            mapper: class,
        })?;
        mapper.apply(relationships)
    }
}
