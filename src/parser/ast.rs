use std::fmt;

use itertools::Itertools;

use super::literal::Value;

/// Byte range within the parsed expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// The text this span covers, if it lies within `source`
    pub fn slice<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.start..self.end)
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Span::new(span.start(), span.end())
    }
}

/// One `name:operator:values` unit of an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    /// Dotted attribute path
    pub name: String,
    pub operator: String,
    pub value: Vec<Value>,
    pub span: Span,
    // Subcomponent spans for precise error reporting
    pub name_span: Span,
    pub operator_span: Span,
}

impl Criterion {
    /// Convert to test-friendly criterion without spans
    pub fn to_test_criterion(&self) -> test_utils::TestCriterion {
        test_utils::TestCriterion {
            name: self.name.clone(),
            operator: self.operator.clone(),
            value: self.value.clone(),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.name,
            self.operator,
            self.value.iter().join(",")
        )
    }
}

/// Which grammar an expression was parsed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Filter,
    Order,
}

/// Criteria of one parsed expression, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub criteria: Vec<Criterion>,
    pub kind: ExpressionKind,
    /// The expression the criteria were parsed from
    pub source: String,
}

impl ParseResult {
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criterion> {
        self.criteria.iter()
    }

    pub fn to_test_criteria(&self) -> Vec<test_utils::TestCriterion> {
        self.criteria.iter().map(Criterion::to_test_criterion).collect()
    }
}

impl<'a> IntoIterator for &'a ParseResult {
    type Item = &'a Criterion;
    type IntoIter = std::slice::Iter<'a, Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.criteria.iter()
    }
}

impl fmt::Display for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExpressionKind::Filter => write!(f, "{}", self.criteria.iter().join("~")),
            ExpressionKind::Order => write!(
                f,
                "{}",
                self.criteria
                    .iter()
                    .format_with("~", |c, f| f(&format_args!("{}:{}", c.name, c.operator)))
            ),
        }
    }
}

pub mod test_utils {
    use crate::parser::literal::Value;

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestCriterion {
        pub name: String,
        pub operator: String,
        pub value: Vec<Value>,
    }

    impl TestCriterion {
        /// Helper constructor for comparing parsed criteria without spans
        pub fn new(name: &str, operator: &str, value: Vec<Value>) -> Self {
            TestCriterion {
                name: name.to_string(),
                operator: operator.to_string(),
                value,
            }
        }
    }
}
