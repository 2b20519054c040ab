//! Translation of specification trees into backend predicates
//!
//! A backend implements [`FilterTranslator`] with one method per node kind and
//! gets the bottom-up fold for free. Two reference backends ship with the
//! crate: [`memory`] evaluates specifications against JSON records and [`sql`]
//! renders parameterised SQL.

pub mod memory;
pub mod sql;

use recursion::CollapsibleExt;

use crate::spec::{Comparison, FilterFrame, FilterSpec, OrderSpec, Ordering};

pub use memory::{MemoryFilter, MemoryOrder};
pub use sql::{SqlFilter, SqlFragment, SqlOrder};

pub trait FilterTranslator {
    type Output;

    fn comparison(&self, comparison: &Comparison) -> Self::Output;
    fn conjunction(&self, left: Self::Output, right: Self::Output) -> Self::Output;
    fn disjunction(&self, left: Self::Output, right: Self::Output) -> Self::Output;
    fn negation(&self, inner: Self::Output) -> Self::Output;

    /// Fold `spec` bottom-up, children before parents
    fn translate(&self, spec: &FilterSpec) -> Self::Output {
        spec.collapse_frames(|frame| match frame {
            FilterFrame::Comparison(c) => self.comparison(c),
            FilterFrame::Negation(x) => self.negation(x),
            FilterFrame::Conjunction(a, b) => self.conjunction(a, b),
            FilterFrame::Disjunction(a, b) => self.disjunction(a, b),
        })
    }
}

pub trait OrderTranslator {
    type Output;

    fn ordering(&self, ordering: &Ordering) -> Self::Output;
    /// Combine an ordering with the key that breaks its ties
    fn chain(&self, primary: Self::Output, tie_breaker: Self::Output) -> Self::Output;

    fn translate(&self, spec: &OrderSpec) -> Self::Output {
        spec.tie_breakers()
            .iter()
            .fold(self.ordering(spec.primary()), |acc, next| {
                self.chain(acc, self.ordering(next))
            })
    }
}
