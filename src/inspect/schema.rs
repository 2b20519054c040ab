//! Declarative entity mappings
//!
//! A schema names each entity type and classifies its attributes:
//!
//! ```json
//! { "entities": {
//!     "plant": { "name": "terminal",
//!                "site": { "entity": "site" },
//!                "plantings": { "aggregate": "planting" } },
//!     "site": { "name": "terminal" },
//!     "planting": { "year": "terminal" } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EntityMapping, EntityType, MappedAttribute};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Attribute '{entity}.{attribute}' targets undeclared entity '{target}'")]
    UnknownTarget {
        entity: String,
        attribute: String,
        target: String,
    },
}

/// How one attribute is mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeDecl {
    Terminal,
    Entity(String),
    Aggregate(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    entities: BTreeMap<String, BTreeMap<String, AttributeDecl>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Every relationship must target a declared entity
    fn validate(&self) -> Result<(), SchemaError> {
        for (entity, attributes) in &self.entities {
            for (attribute, decl) in attributes {
                let target = match decl {
                    AttributeDecl::Terminal => continue,
                    AttributeDecl::Entity(t) | AttributeDecl::Aggregate(t) => t,
                };
                if !self.entities.contains_key(target) {
                    return Err(SchemaError::UnknownTarget {
                        entity: entity.clone(),
                        attribute: attribute.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl EntityMapping for Schema {
    fn classify(&self, entity: &EntityType, attribute: &str) -> Option<MappedAttribute> {
        let decl = self.entities.get(entity.name())?.get(attribute)?;
        Some(match decl {
            AttributeDecl::Terminal => MappedAttribute::terminal(attribute),
            AttributeDecl::Entity(target) => MappedAttribute::entity(attribute, target.as_str()),
            AttributeDecl::Aggregate(target) => {
                MappedAttribute::aggregate(attribute, target.as_str())
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: BTreeMap<String, BTreeMap<String, AttributeDecl>>,
}

impl SchemaBuilder {
    pub fn entity(
        mut self,
        name: impl Into<String>,
        attributes: impl FnOnce(EntityBuilder) -> EntityBuilder,
    ) -> Self {
        let built = attributes(EntityBuilder::default());
        self.entities.insert(name.into(), built.attributes);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let schema = Schema {
            entities: self.entities,
        };
        schema.validate()?;
        Ok(schema)
    }
}

#[derive(Debug, Default)]
pub struct EntityBuilder {
    attributes: BTreeMap<String, AttributeDecl>,
}

impl EntityBuilder {
    pub fn terminal(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeDecl::Terminal);
        self
    }

    pub fn entity(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeDecl::Entity(target.into()));
        self
    }

    pub fn aggregate(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeDecl::Aggregate(target.into()));
        self
    }
}
