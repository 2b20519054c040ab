//! Compiler for the filter and order expressions carried in URL query
//! parameters.
//!
//! ```text
//! raw string -> parser -> criteria -> factory (+ inspector) -> specification -> backend
//! ```
//!
//! ```
//! use filterspec::{compile_filter, AttributeInspector, EntityType, Schema};
//!
//! let schema = Schema::builder()
//!     .entity("plant", |e| e.terminal("name").entity("site", "site"))
//!     .entity("site", |e| e.terminal("name"))
//!     .build()
//!     .unwrap();
//! let inspector = AttributeInspector::new(schema);
//! let spec = compile_filter(
//!     &inspector,
//!     &EntityType::new("plant"),
//!     r#"name:starts-with:"Ro"~site.name:equal-to:North"#,
//! )
//! .unwrap();
//! assert_eq!(
//!     spec.to_string(),
//!     r#"(name:starts-with:"Ro" AND site.name:equal-to:"North")"#
//! );
//! ```

pub mod backend;
pub mod cli;
pub mod inspect;
pub mod output;
pub mod parser;
pub mod spec;

pub use inspect::{
    AttributeInspection, AttributeInspector, AttributeKind, EntityMapping, EntityType,
    InspectionCache, MappedAttribute, Schema, SchemaError,
};
pub use parser::{parse, parse_order, Criterion, ParseResult, QueryError, Value};
pub use spec::{
    Direction, FilterSpec, FilterSpecificationFactory, Operator, OrderSpec,
    OrderSpecificationFactory,
};

/// Parse `expression` and build its filter specification for `entity`
pub fn compile_filter(
    inspector: &AttributeInspector,
    entity: &EntityType,
    expression: &str,
) -> Result<FilterSpec, QueryError> {
    let parsed = parse(expression)?;
    FilterSpecificationFactory::new(inspector.clone()).build(&parsed, entity)
}

/// Parse `expression` and build its order specification for `entity`
pub fn compile_order(
    inspector: &AttributeInspector,
    entity: &EntityType,
    expression: &str,
) -> Result<OrderSpec, QueryError> {
    let parsed = parse_order(expression)?;
    OrderSpecificationFactory::new(inspector.clone()).build(&parsed, entity)
}
