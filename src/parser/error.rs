use itertools::Itertools;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use super::ast::{Criterion, Span};
use super::raw::Rule;
use crate::inspect::EntityType;

/// Why an attribute path could not be resolved against an entity type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAttributeReason {
    #[error("'{segment}' is not a mapped attribute of '{entity}'")]
    NotMapped { segment: String, entity: EntityType },

    #[error("'{segment}' references a terminal attribute and cannot be traversed")]
    ThroughTerminal { segment: String },

    #[error("the last element '{segment}' references an aggregate attribute")]
    EndsOnAggregate { segment: String },

    #[error("'{segment}' references an aggregate attribute and traversal is disabled")]
    ThroughAggregate { segment: String },

    #[error("relationship '{segment}' has no target entity type")]
    MissingTarget { segment: String },
}

/// Errors raised while compiling filter and order expressions
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum QueryError {
    // Syntax errors from pest
    #[error("Syntax error at line {line}, column {col}")]
    #[diagnostic(code(filterspec::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{expected_msg}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        expected_msg: String,
        offset: usize,
        line: usize,
        col: usize,
    },

    #[error("Invalid attribute '{path}' on entity '{entity}': {reason}")]
    #[diagnostic(code(filterspec::invalid_attribute))]
    InvalidAttribute {
        entity: EntityType,
        path: String,
        reason: InvalidAttributeReason,
        /// Text of the criterion the path was taken from, when known
        criterion: Option<String>,
        #[label("invalid attribute")]
        span: Option<SourceSpan>,
        #[source_code]
        src: String,
    },

    #[error("Unknown operator: {operator}")]
    #[diagnostic(
        code(filterspec::unknown_operator),
        help("Valid operators: equal-to, not-equal-to, starts-with, not-starts-with, ends-with, not-ends-with, contains, not-contains, less-than, less-than-or-equal-to, greater-than, greater-than-or-equal-to, in-range, not-in-range")
    )]
    UnknownOperator {
        operator: String,
        #[label("unknown operator")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unknown sort direction: {direction}")]
    #[diagnostic(
        code(filterspec::unknown_direction),
        help("Valid directions: asc, ascending, desc, descending")
    )]
    UnknownDirection {
        direction: String,
        #[label("unknown direction")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Expected {expected}, found: {found}")]
    #[diagnostic(code(filterspec::invalid_value))]
    InvalidValue {
        expected: String,
        found: String,
        #[label("invalid value")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Expression contains no criteria")]
    #[diagnostic(code(filterspec::empty))]
    EmptyCriteria,

    // Internal errors
    #[error("Internal parser error: {message}")]
    #[diagnostic(code(filterspec::internal))]
    Internal {
        message: String,
        #[source_code]
        src: String,
    },
}

fn describe(rule: &Rule) -> &'static str {
    match rule {
        Rule::criterion => "criterion (name:operator:values)",
        Rule::ordering => "ordering (name:direction)",
        Rule::name | Rule::identifier => "attribute name",
        Rule::operator => "operator",
        Rule::value_list | Rule::quoted | Rule::bareword => "value",
        Rule::quoted_inner | Rule::escaped => "closing quote",
        Rule::EOI => "'~' or end of input",
        _ => "input",
    }
}

/// Whether a `"` opened in `src` is never closed
fn has_open_quote(src: &str) -> bool {
    let mut open = false;
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if open => {
                chars.next();
            }
            '"' => open = !open,
            _ => {}
        }
    }
    open
}

/// Help text keyed on what sits around the failure point
fn explain(src: &str, offset: usize, expected: &[Rule]) -> Option<&'static str> {
    let before = src.get(..offset).unwrap_or(src);
    let rest = src.get(offset..).unwrap_or("");

    if src.trim().is_empty() {
        Some("Expression is empty. Add a criterion, like: name:equal-to:\"Nikos\"")
    } else if has_open_quote(src) {
        Some("A quoted value is not terminated. Close it with '\"'.")
    } else if before.ends_with('.') || rest.starts_with('.') {
        Some("Attribute names are dot-separated identifiers without empty segments (e.g., user.address.street)")
    } else if rest.starts_with(':') {
        Some("Filter criteria take the form name:operator:values and orderings name:direction")
    } else if expected.contains(&Rule::operator) {
        Some("Expected an operator after ':' (e.g., equal-to, less-than, asc)")
    } else if rest.is_empty() {
        Some("Expression is incomplete. Criteria take the form name:operator:values")
    } else if expected.contains(&Rule::EOI) {
        Some("Separate criteria with '~'. Quote values that contain spaces.")
    } else {
        None
    }
}

impl QueryError {
    /// Create a syntax error from a pest failure, pointing at one character
    pub fn from_pest(pest_err: Box<pest::error::Error<Rule>>, src: String) -> Self {
        use pest::error::{ErrorVariant, InputLocation, LineColLocation};

        let offset = match pest_err.location {
            InputLocation::Pos(pos) | InputLocation::Span((pos, _)) => pos,
        };
        // step back onto the last character when the failure is at the end
        let span = match (offset.min(src.len().saturating_sub(1)), src.is_empty()) {
            (_, true) => (0, 0).into(),
            (at, false) => (at, 1).into(),
        };
        let (line, col) = match pest_err.line_col {
            LineColLocation::Pos(at) | LineColLocation::Span(at, _) => at,
        };

        let (expected_msg, help) = match &pest_err.variant {
            ErrorVariant::ParsingError { positives, .. } => {
                let expected_msg = match positives.iter().map(describe).unique().join(" or ") {
                    names if names.is_empty() => "Unexpected input".to_string(),
                    names => format!("Expected {}", names),
                };
                (expected_msg, explain(&src, offset, positives).map(str::to_string))
            }
            ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        QueryError::Syntax {
            src,
            span,
            help,
            expected_msg,
            offset,
            line,
            col,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        QueryError::Internal {
            message: msg.into(),
            src: String::new(),
        }
    }

    /// Create an invalid attribute error not yet tied to a criterion
    pub fn invalid_attribute(
        entity: &EntityType,
        path: &str,
        reason: InvalidAttributeReason,
    ) -> Self {
        QueryError::InvalidAttribute {
            entity: entity.clone(),
            path: path.to_string(),
            reason,
            criterion: None,
            span: None,
            src: String::new(),
        }
    }

    /// Point an attribute error at the criterion it was raised for
    pub fn in_criterion(mut self, criterion: &Criterion, source: &str) -> Self {
        if let QueryError::InvalidAttribute {
            criterion: c,
            span,
            src,
            ..
        } = &mut self
        {
            *c = Some(criterion.span.slice(source).unwrap_or(&criterion.name).to_string());
            *span = Some(criterion.name_span.to_source_span());
            *src = source.to_string();
        }
        self
    }

    /// Byte offset of a syntax error within the expression
    pub fn position(&self) -> Option<usize> {
        match self {
            QueryError::Syntax { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, QueryError::Syntax { .. })
    }

    pub fn is_invalid_attribute(&self) -> bool {
        matches!(self, QueryError::InvalidAttribute { .. })
    }

    /// Add source code to the error
    pub fn with_source(mut self, source: String) -> Self {
        match &mut self {
            QueryError::Syntax { src: s, .. }
            | QueryError::InvalidAttribute { src: s, .. }
            | QueryError::UnknownOperator { src: s, .. }
            | QueryError::UnknownDirection { src: s, .. }
            | QueryError::InvalidValue { src: s, .. }
            | QueryError::Internal { src: s, .. } => {
                *s = source;
            }
            QueryError::EmptyCriteria => {}
        }
        self
    }
}

impl Span {
    pub fn to_source_span(&self) -> SourceSpan {
        (self.start, self.end - self.start).into()
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        span.to_source_span()
    }
}
