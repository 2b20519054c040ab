pub mod factory;
pub mod frame;

use std::fmt::{self, Display};

use itertools::Itertools;

use crate::inspect::{AttributeKind, MappedAttribute};
use crate::parser::Value;

pub use factory::{FilterSpecificationFactory, OrderSpecificationFactory};
pub use frame::FilterFrame;

/// Comparison operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    EqualTo,
    StartsWith,
    EndsWith,
    Contains,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    /// Inclusive range; the comparison holds exactly `[low, high]`
    InRange,
}

impl Operator {
    /// Look up an operator word; the flag is set for the `not-` forms
    pub fn from_name(name: &str) -> Option<(Operator, bool)> {
        use Operator::*;
        let parsed = match name {
            "equal-to" => (EqualTo, false),
            "not-equal-to" => (EqualTo, true),
            "starts-with" => (StartsWith, false),
            "not-starts-with" => (StartsWith, true),
            "ends-with" => (EndsWith, false),
            "not-ends-with" => (EndsWith, true),
            "contains" => (Contains, false),
            "not-contains" => (Contains, true),
            "less-than" => (LessThan, false),
            "less-than-or-equal-to" => (LessThanOrEqualTo, false),
            "greater-than" => (GreaterThan, false),
            "greater-than-or-equal-to" => (GreaterThanOrEqualTo, false),
            "in-range" => (InRange, false),
            "not-in-range" => (InRange, true),
            _ => return None,
        };
        Some(parsed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::EqualTo => "equal-to",
            Operator::StartsWith => "starts-with",
            Operator::EndsWith => "ends-with",
            Operator::Contains => "contains",
            Operator::LessThan => "less-than",
            Operator::LessThanOrEqualTo => "less-than-or-equal-to",
            Operator::GreaterThan => "greater-than",
            Operator::GreaterThanOrEqualTo => "greater-than-or-equal-to",
            Operator::InRange => "in-range",
        }
    }

    /// String matching operators, as opposed to value comparisons
    pub fn is_string_match(&self) -> bool {
        matches!(
            self,
            Operator::StartsWith | Operator::EndsWith | Operator::Contains
        )
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    pub kind: AttributeKind,
}

/// Attribute path validated against an entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub segments: Vec<PathSegment>,
}

impl AttributePath {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.name.as_str())
    }

    /// True when any hop is a to-many relationship
    pub fn through_aggregate(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.kind == AttributeKind::Aggregate)
    }
}

impl From<&[MappedAttribute]> for AttributePath {
    fn from(attributes: &[MappedAttribute]) -> Self {
        AttributePath {
            segments: attributes
                .iter()
                .map(|a| PathSegment {
                    name: a.name.clone(),
                    kind: a.kind,
                })
                .collect(),
        }
    }
}

impl Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join("."))
    }
}

/// Leaf of a filter specification
///
/// Several values are alternatives: the comparison holds when it holds for
/// any one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub path: AttributePath,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.path,
            self.operator,
            self.values.iter().join(",")
        )
    }
}

/// Backend-agnostic boolean filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Conjunction(Box<Self>, Box<Self>),
    Disjunction(Box<Self>, Box<Self>),
    Negation(Box<Self>),
    Comparison(Comparison),
}

impl FilterSpec {
    pub fn and(a: Self, b: Self) -> Self {
        Self::Conjunction(Box::new(a), Box::new(b))
    }

    pub fn or(a: Self, b: Self) -> Self {
        Self::Disjunction(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(a: Self) -> Self {
        Self::Negation(Box::new(a))
    }

    pub fn comparison(path: AttributePath, operator: Operator, values: Vec<Value>) -> Self {
        Self::Comparison(Comparison {
            path,
            operator,
            values,
        })
    }

    /// Leaves in left-to-right order
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                FilterSpec::Conjunction(a, b) | FilterSpec::Disjunction(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                FilterSpec::Negation(a) => stack.push(a),
                FilterSpec::Comparison(c) => out.push(c),
            }
        }
        out
    }
}

impl Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conjunction(a, b) => write!(f, "({} AND {})", a, b),
            Self::Disjunction(a, b) => write!(f, "({} OR {})", a, b),
            Self::Negation(a) => write!(f, "NOT {}", a),
            Self::Comparison(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn from_name(name: &str) -> Option<Direction> {
        match name {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "asc"),
            Direction::Descending => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ordering {
    pub path: AttributePath,
    pub direction: Direction,
}

impl Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.direction)
    }
}

/// Chain of orderings; later keys only break ties left by earlier ones
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    primary: Ordering,
    tie_breakers: Vec<Ordering>,
}

impl OrderSpec {
    pub fn new(primary: Ordering) -> Self {
        OrderSpec {
            primary,
            tie_breakers: Vec::new(),
        }
    }

    pub fn then(mut self, next: Ordering) -> Self {
        self.tie_breakers.push(next);
        self
    }

    pub fn primary(&self) -> &Ordering {
        &self.primary
    }

    pub fn tie_breakers(&self) -> &[Ordering] {
        &self.tie_breakers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ordering> {
        std::iter::once(&self.primary).chain(self.tie_breakers.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.tie_breakers.len()
    }
}

impl Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iter().join("~"))
    }
}
