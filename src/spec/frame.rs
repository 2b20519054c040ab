use recursion::{Collapsible, MappableFrame, PartiallyApplied};

use super::{Comparison, FilterSpec};

/// short-lived single layer of a filter specification, used for expressing
/// recursive algorithms over a single layer of a borrowed FilterSpec
pub enum FilterFrame<'a, X> {
    // borrowed leaf
    Comparison(&'a Comparison),
    // boolean operators
    Negation(X),
    Conjunction(X, X),
    Disjunction(X, X),
}

impl<'a> MappableFrame for FilterFrame<'a, PartiallyApplied> {
    type Frame<X> = FilterFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, mut f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use FilterFrame::*;
        match input {
            Comparison(c) => Comparison(c),
            Negation(a) => Negation(f(a)),
            Conjunction(a, b) => Conjunction(f(a), f(b)),
            Disjunction(a, b) => Disjunction(f(a), f(b)),
        }
    }
}

impl<'a> Collapsible for &'a FilterSpec {
    type FrameToken = FilterFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> FilterFrame<'a, Self> {
        match self {
            FilterSpec::Comparison(c) => FilterFrame::Comparison(c),
            FilterSpec::Negation(x) => FilterFrame::Negation(x),
            FilterSpec::Conjunction(a, b) => FilterFrame::Conjunction(a, b),
            FilterSpec::Disjunction(a, b) => FilterFrame::Disjunction(a, b),
        }
    }
}
