use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use super::{
    ast::{Criterion, ExpressionKind, ParseResult},
    error::QueryError,
    literal::{unescape, Value},
};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct CriteriaParser;

impl CriteriaParser {
    /// Parse a filter expression (`name:operator:values~...`)
    pub fn parse_filter(input: &str) -> Result<ParseResult, QueryError> {
        Self::parse_criteria(Rule::filter, ExpressionKind::Filter, input)
    }

    /// Parse an order expression (`name:direction~...`)
    pub fn parse_order(input: &str) -> Result<ParseResult, QueryError> {
        Self::parse_criteria(Rule::order, ExpressionKind::Order, input)
    }

    fn parse_criteria(
        rule: Rule,
        kind: ExpressionKind,
        input: &str,
    ) -> Result<ParseResult, QueryError> {
        let mut pairs = Self::parse(rule, input)
            .map_err(|e| QueryError::from_pest(Box::new(e), input.to_string()))?;

        let root = pairs
            .next()
            .ok_or_else(|| QueryError::internal("Grammar guarantees a root rule"))?;

        let criteria = root
            .into_inner()
            .filter(|pair| pair.as_rule() != Rule::EOI)
            .map(Self::parse_criterion)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.with_source(input.to_string()))?;

        Ok(ParseResult {
            criteria,
            kind,
            source: input.to_string(),
        })
    }

    fn parse_criterion(pair: Pair<'_, Rule>) -> Result<Criterion, QueryError> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();

        let name_pair = inner
            .next()
            .ok_or_else(|| QueryError::internal("Grammar guarantees criterion has name"))?;

        let operator_pair = inner
            .next()
            .ok_or_else(|| QueryError::internal("Grammar guarantees criterion has operator"))?;

        // Order criteria have no value list
        let value = match inner.next() {
            Some(values) => Self::parse_values(values)?,
            None => Vec::new(),
        };

        Ok(Criterion {
            name: name_pair.as_str().to_string(),
            operator: operator_pair.as_str().to_string(),
            value,
            span: span.into(),
            name_span: name_pair.as_span().into(),
            operator_span: operator_pair.as_span().into(),
        })
    }

    fn parse_values(pair: Pair<'_, Rule>) -> Result<Vec<Value>, QueryError> {
        pair.into_inner().map(Self::parse_value).collect()
    }

    fn parse_value(pair: Pair<'_, Rule>) -> Result<Value, QueryError> {
        match pair.as_rule() {
            Rule::quoted => {
                // Grammar already parsed inner content without quotes
                let inner = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str())
                    .unwrap_or_default();
                Ok(Value::from_quoted(&unescape(inner)))
            }
            Rule::bareword => Ok(Value::from_bareword(pair.as_str())),
            rule => Err(QueryError::internal(format!(
                "Unexpected value rule: {:?}",
                rule
            ))),
        }
    }
}
