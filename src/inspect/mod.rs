//! Resolution of dotted attribute paths against mapped entity types
//!
//! The inspector knows nothing about any particular persistence technology.
//! It asks an [`EntityMapping`] to classify one attribute at a time and walks
//! the path from the root entity type through its relationships.

pub mod schema;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use slog::{debug, o, trace, Logger};

use crate::parser::{InvalidAttributeReason, QueryError};

pub use schema::{Schema, SchemaBuilder, SchemaError};

/// Name of a mapped entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        EntityType(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        EntityType::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        EntityType::new(name)
    }
}

/// Classification of a single mapped attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Scalar, non-relational attribute
    Terminal,
    /// To-one relationship
    Entity,
    /// To-many relationship
    Aggregate,
}

impl AttributeKind {
    pub fn is_relational(&self) -> bool {
        !matches!(self, AttributeKind::Terminal)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Terminal => write!(f, "terminal"),
            AttributeKind::Entity => write!(f, "entity"),
            AttributeKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Descriptor of one attribute as reported by an [`EntityMapping`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAttribute {
    pub name: String,
    pub kind: AttributeKind,
    /// Target entity type of a relationship; `None` for terminals
    pub target: Option<EntityType>,
}

impl MappedAttribute {
    pub fn terminal(name: impl Into<String>) -> Self {
        MappedAttribute {
            name: name.into(),
            kind: AttributeKind::Terminal,
            target: None,
        }
    }

    pub fn entity(name: impl Into<String>, target: impl Into<EntityType>) -> Self {
        MappedAttribute {
            name: name.into(),
            kind: AttributeKind::Entity,
            target: Some(target.into()),
        }
    }

    pub fn aggregate(name: impl Into<String>, target: impl Into<EntityType>) -> Self {
        MappedAttribute {
            name: name.into(),
            kind: AttributeKind::Aggregate,
            target: Some(target.into()),
        }
    }
}

/// Capability supplied by a storage backend's mapping layer
pub trait EntityMapping: Send + Sync {
    /// Classify `attribute` of `entity`, or `None` when it is not mapped
    fn classify(&self, entity: &EntityType, attribute: &str) -> Option<MappedAttribute>;
}

impl<M: EntityMapping + ?Sized> EntityMapping for Arc<M> {
    fn classify(&self, entity: &EntityType, attribute: &str) -> Option<MappedAttribute> {
        (**self).classify(entity, attribute)
    }
}

/// One descriptor per path segment, in path order
pub type AttributeInspection = Arc<[MappedAttribute]>;

/// Memoized inspection results keyed by `(entity type, path)`
///
/// Entries are never invalidated: mappings are static once the process is up.
/// Concurrent misses on the same key recompute the same value and the last
/// write wins.
#[derive(Debug, Default)]
pub struct InspectionCache {
    entries: RwLock<HashMap<EntityType, HashMap<String, AttributeInspection>>>,
}

impl InspectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &EntityType, path: &str) -> Option<AttributeInspection> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(entity)?.get(path).cloned()
    }

    pub fn insert(&self, entity: &EntityType, path: &str, inspection: AttributeInspection) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(entity.clone())
            .or_default()
            .insert(path.to_string(), inspection);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves dotted attribute paths, caching the results
#[derive(Clone)]
pub struct AttributeInspector {
    mapping: Arc<dyn EntityMapping>,
    cache: Arc<InspectionCache>,
    traverse_aggregates: bool,
    logger: Logger,
}

impl AttributeInspector {
    pub fn new<M: EntityMapping + 'static>(mapping: M) -> Self {
        AttributeInspector {
            mapping: Arc::new(mapping),
            cache: Arc::new(InspectionCache::new()),
            traverse_aggregates: true,
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    /// When disabled, a to-many relationship may not appear before the last segment
    pub fn with_aggregate_traversal(mut self, enabled: bool) -> Self {
        self.traverse_aggregates = enabled;
        self
    }

    /// Share a cache across inspectors built over the same mapping
    pub fn with_cache(mut self, cache: Arc<InspectionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.new(o!("component" => "inspector"));
        self
    }

    pub fn cache(&self) -> &Arc<InspectionCache> {
        &self.cache
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Resolve `path` against `entity`, one descriptor per segment
    ///
    /// # Errors
    /// Returns `QueryError::InvalidAttribute` when a segment is not mapped, a
    /// non-final segment is a terminal, or the final segment is an aggregate.
    /// With aggregate traversal disabled, a non-final aggregate fails as well.
    pub fn inspect(
        &self,
        entity: &EntityType,
        path: &str,
    ) -> Result<AttributeInspection, QueryError> {
        let inspection = match self.cache.get(entity, path) {
            Some(hit) => {
                trace!(self.logger, "inspection cache hit"; "entity" => %entity, "path" => path);
                hit
            }
            None => {
                let inspection = self.resolve(entity, path)?;
                debug!(self.logger, "inspected attribute path";
                    "entity" => %entity, "path" => path, "segments" => inspection.len());
                self.cache.insert(entity, path, inspection.clone());
                inspection
            }
        };

        // The cache may be shared with inspectors using the other policy
        if !self.traverse_aggregates {
            if let Some(hop) = inspection
                .split_last()
                .and_then(|(_, init)| init.iter().find(|a| a.kind == AttributeKind::Aggregate))
            {
                return Err(QueryError::invalid_attribute(
                    entity,
                    path,
                    InvalidAttributeReason::ThroughAggregate {
                        segment: hop.name.clone(),
                    },
                ));
            }
        }

        Ok(inspection)
    }

    fn resolve(&self, entity: &EntityType, path: &str) -> Result<AttributeInspection, QueryError> {
        let invalid = |reason| QueryError::invalid_attribute(entity, path, reason);

        let segments: Vec<&str> = path.split('.').collect();
        let last = segments.len() - 1;
        let mut current = entity.clone();
        let mut resolved = Vec::with_capacity(segments.len());

        for (idx, segment) in segments.into_iter().enumerate() {
            let attribute = self.mapping.classify(&current, segment).ok_or_else(|| {
                invalid(InvalidAttributeReason::NotMapped {
                    segment: segment.to_string(),
                    entity: current.clone(),
                })
            })?;

            if idx == last {
                // The last segment must be a terminal or an entity
                if attribute.kind == AttributeKind::Aggregate {
                    return Err(invalid(InvalidAttributeReason::EndsOnAggregate {
                        segment: segment.to_string(),
                    }));
                }
            } else {
                if attribute.kind == AttributeKind::Terminal {
                    return Err(invalid(InvalidAttributeReason::ThroughTerminal {
                        segment: segment.to_string(),
                    }));
                }
                current = attribute.target.clone().ok_or_else(|| {
                    invalid(InvalidAttributeReason::MissingTarget {
                        segment: segment.to_string(),
                    })
                })?;
            }

            resolved.push(attribute);
        }

        Ok(resolved.into())
    }
}
