//! Building specifications from parsed criteria
//!
//! Every criterion's attribute path is resolved with the
//! [`AttributeInspector`] before a leaf is built, so a tree that comes out of
//! a factory only references paths valid for its entity type.

use slog::{debug, o, Logger};

use super::{AttributePath, Comparison, Direction, FilterSpec, Operator, OrderSpec, Ordering};
use crate::inspect::{AttributeInspector, EntityType};
use crate::parser::{Criterion, ParseResult, QueryError};

/// Builds filter specifications from parsed filter expressions
#[derive(Clone)]
pub struct FilterSpecificationFactory {
    inspector: AttributeInspector,
    logger: Logger,
}

impl FilterSpecificationFactory {
    pub fn new(inspector: AttributeInspector) -> Self {
        let logger = inspector.logger().new(o!("factory" => "filter"));
        FilterSpecificationFactory { inspector, logger }
    }

    /// Build a filter tree for `entity`; criteria are AND-ed in input order
    ///
    /// # Errors
    /// Returns `QueryError` for unresolvable attribute paths, unknown
    /// operators, malformed ranges, or an empty criteria list.
    pub fn build(&self, parsed: &ParseResult, entity: &EntityType) -> Result<FilterSpec, QueryError> {
        let mut leaves = parsed
            .criteria
            .iter()
            .map(|criterion| self.build_criterion(criterion, &parsed.source, entity));

        let first = leaves.next().ok_or(QueryError::EmptyCriteria)??;
        let spec = leaves.try_fold(first, |acc, leaf| leaf.map(|leaf| FilterSpec::and(acc, leaf)))?;

        debug!(self.logger, "built filter specification"; "entity" => %entity, "spec" => %spec);
        Ok(spec)
    }

    fn build_criterion(
        &self,
        criterion: &Criterion,
        source: &str,
        entity: &EntityType,
    ) -> Result<FilterSpec, QueryError> {
        let (operator, negated) =
            Operator::from_name(&criterion.operator).ok_or_else(|| QueryError::UnknownOperator {
                operator: criterion.operator.clone(),
                span: criterion.operator_span.to_source_span(),
                src: source.to_string(),
            })?;

        let path = resolve_path(&self.inspector, criterion, source, entity)?;

        if operator == Operator::InRange && criterion.value.len() != 2 {
            return Err(QueryError::InvalidValue {
                expected: "exactly two values (low, high) for in-range".to_string(),
                found: format!("{} value(s)", criterion.value.len()),
                span: criterion.span.to_source_span(),
                src: source.to_string(),
            });
        }

        let leaf = FilterSpec::Comparison(Comparison {
            path,
            operator,
            values: criterion.value.clone(),
        });

        Ok(if negated { FilterSpec::not(leaf) } else { leaf })
    }
}

/// Builds order specifications from parsed order expressions
#[derive(Clone)]
pub struct OrderSpecificationFactory {
    inspector: AttributeInspector,
    logger: Logger,
}

impl OrderSpecificationFactory {
    pub fn new(inspector: AttributeInspector) -> Self {
        let logger = inspector.logger().new(o!("factory" => "order"));
        OrderSpecificationFactory { inspector, logger }
    }

    /// Build an ordering chain for `entity`; the first criterion is the primary key
    ///
    /// # Errors
    /// Returns `QueryError` for unresolvable attribute paths, unknown
    /// directions, or an empty criteria list.
    pub fn build(&self, parsed: &ParseResult, entity: &EntityType) -> Result<OrderSpec, QueryError> {
        let mut orderings = parsed
            .criteria
            .iter()
            .map(|criterion| self.build_ordering(criterion, &parsed.source, entity));

        let primary = orderings.next().ok_or(QueryError::EmptyCriteria)??;
        let spec = orderings.try_fold(OrderSpec::new(primary), |acc, next| next.map(|o| acc.then(o)))?;

        debug!(self.logger, "built order specification"; "entity" => %entity, "spec" => %spec);
        Ok(spec)
    }

    fn build_ordering(
        &self,
        criterion: &Criterion,
        source: &str,
        entity: &EntityType,
    ) -> Result<Ordering, QueryError> {
        let direction =
            Direction::from_name(&criterion.operator).ok_or_else(|| QueryError::UnknownDirection {
                direction: criterion.operator.clone(),
                span: criterion.operator_span.to_source_span(),
                src: source.to_string(),
            })?;

        let path = resolve_path(&self.inspector, criterion, source, entity)?;
        Ok(Ordering { path, direction })
    }
}

fn resolve_path(
    inspector: &AttributeInspector,
    criterion: &Criterion,
    source: &str,
    entity: &EntityType,
) -> Result<AttributePath, QueryError> {
    let inspection = inspector
        .inspect(entity, &criterion.name)
        .map_err(|e| e.in_criterion(criterion, source))?;
    Ok(AttributePath::from(&inspection[..]))
}
