pub mod ast;
pub mod error;
pub mod literal;
pub mod raw;

// Re-exports for clean API
pub use ast::{test_utils, Criterion, ExpressionKind, ParseResult, Span};
pub use error::{InvalidAttributeReason, QueryError};
pub use literal::Value;
pub use raw::CriteriaParser;

/// Parse a filter expression into its criteria
pub fn parse(expression: &str) -> Result<ParseResult, QueryError> {
    CriteriaParser::parse_filter(expression)
}

/// Parse an order expression into its criteria; the operator slot holds the direction
pub fn parse_order(expression: &str) -> Result<ParseResult, QueryError> {
    CriteriaParser::parse_order(expression)
}
