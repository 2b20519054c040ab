//! In-memory evaluation of specifications against JSON records
//!
//! Attribute paths are followed through nested objects. An array met on the
//! way is a to-many hop: the comparison holds when it holds for any element.
//! A missing attribute or `null` never satisfies a comparison.

use std::borrow::Borrow;
use std::cmp::Ordering as CmpOrdering;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use slog::{debug, o, trace, Logger};

use super::{FilterTranslator, OrderTranslator};
use crate::parser::Value;
use crate::spec::{
    AttributePath, Comparison, Direction, FilterSpec, Operator, OrderSpec, Ordering, PathSegment,
};

/// A compiled filter over JSON records
pub struct MemoryFilter {
    spec: FilterSpec,
    logger: Logger,
}

impl MemoryFilter {
    pub fn new(spec: FilterSpec) -> Self {
        MemoryFilter {
            spec,
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.new(o!("backend" => "memory"));
        self
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn matches(&self, record: &Json) -> bool {
        let matched = RecordMatcher { record }.translate(&self.spec);
        trace!(self.logger, "evaluated record"; "matched" => matched);
        matched
    }

    /// Records that satisfy the filter, in input order
    pub fn filter<'r>(&self, records: &'r [Json]) -> Vec<&'r Json> {
        let matched: Vec<&Json> = records.iter().filter(|r| self.matches(r)).collect();
        debug!(self.logger, "filtered records";
            "spec" => %self.spec, "total" => records.len(), "matched" => matched.len());
        matched
    }
}

/// Evaluates one record; the translation output is the verdict itself
struct RecordMatcher<'r> {
    record: &'r Json,
}

impl FilterTranslator for RecordMatcher<'_> {
    type Output = bool;

    fn comparison(&self, comparison: &Comparison) -> bool {
        let candidates = resolve(self.record, &comparison.path);
        candidates
            .iter()
            .any(|candidate| holds(candidate, comparison.operator, &comparison.values))
    }

    fn conjunction(&self, left: bool, right: bool) -> bool {
        left && right
    }

    fn disjunction(&self, left: bool, right: bool) -> bool {
        left || right
    }

    fn negation(&self, inner: bool) -> bool {
        !inner
    }
}

/// A compiled ordering over JSON records
pub struct MemoryOrder {
    spec: OrderSpec,
    logger: Logger,
}

type Comparator = Box<dyn Fn(&Json, &Json) -> CmpOrdering>;

impl MemoryOrder {
    pub fn new(spec: OrderSpec) -> Self {
        MemoryOrder {
            spec,
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.new(o!("backend" => "memory"));
        self
    }

    pub fn compare(&self, a: &Json, b: &Json) -> CmpOrdering {
        (ComparatorBuilder.translate(&self.spec))(a, b)
    }

    /// Stable sort; records with a missing key come first in ascending order
    pub fn sort<R: Borrow<Json>>(&self, records: &mut [R]) {
        let comparator = ComparatorBuilder.translate(&self.spec);
        records.sort_by(|a, b| {
            comparator(<R as Borrow<Json>>::borrow(a), <R as Borrow<Json>>::borrow(b))
        });
        debug!(self.logger, "sorted records"; "order" => %self.spec, "total" => records.len());
    }
}

struct ComparatorBuilder;

impl OrderTranslator for ComparatorBuilder {
    type Output = Comparator;

    fn ordering(&self, ordering: &Ordering) -> Comparator {
        let path = ordering.path.clone();
        let direction = ordering.direction;
        Box::new(move |a, b| {
            let by_key = sort_key(a, &path).cmp_key(&sort_key(b, &path));
            match direction {
                Direction::Ascending => by_key,
                Direction::Descending => by_key.reverse(),
            }
        })
    }

    fn chain(&self, primary: Comparator, tie_breaker: Comparator) -> Comparator {
        Box::new(move |a, b| primary(a, b).then_with(|| tie_breaker(a, b)))
    }
}

/// Every value reachable along `path`, flattening arrays
pub fn resolve<'r>(record: &'r Json, path: &AttributePath) -> Vec<&'r Json> {
    let mut out = Vec::new();
    collect(record, &path.segments, &mut out);
    out
}

fn collect<'r>(value: &'r Json, segments: &[PathSegment], out: &mut Vec<&'r Json>) {
    match (value, segments.split_first()) {
        (Json::Array(items), _) => {
            for item in items {
                collect(item, segments, out);
            }
        }
        (Json::Null, _) => {}
        (_, None) => out.push(value),
        (Json::Object(fields), Some((head, rest))) => {
            if let Some(next) = fields.get(&head.name) {
                collect(next, rest, out);
            }
        }
        _ => {}
    }
}

fn holds(candidate: &Json, operator: Operator, values: &[Value]) -> bool {
    match operator {
        Operator::EqualTo => values
            .iter()
            .any(|v| compare(candidate, v) == Some(CmpOrdering::Equal)),
        Operator::LessThan => values
            .iter()
            .any(|v| compare(candidate, v) == Some(CmpOrdering::Less)),
        Operator::LessThanOrEqualTo => values.iter().any(|v| {
            matches!(
                compare(candidate, v),
                Some(CmpOrdering::Less | CmpOrdering::Equal)
            )
        }),
        Operator::GreaterThan => values
            .iter()
            .any(|v| compare(candidate, v) == Some(CmpOrdering::Greater)),
        Operator::GreaterThanOrEqualTo => values.iter().any(|v| {
            matches!(
                compare(candidate, v),
                Some(CmpOrdering::Greater | CmpOrdering::Equal)
            )
        }),
        Operator::InRange => match values {
            [low, high] => {
                matches!(
                    compare(candidate, low),
                    Some(CmpOrdering::Greater | CmpOrdering::Equal)
                ) && matches!(
                    compare(candidate, high),
                    Some(CmpOrdering::Less | CmpOrdering::Equal)
                )
            }
            _ => false,
        },
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => {
            let Some(text) = text_of(candidate) else {
                return false;
            };
            values.iter().any(|v| {
                let needle = v.to_text();
                match operator {
                    Operator::StartsWith => text.starts_with(&needle),
                    Operator::EndsWith => text.ends_with(&needle),
                    _ => text.contains(&needle),
                }
            })
        }
    }
}

/// Order `candidate` relative to a literal, `None` when the two are incomparable
fn compare(candidate: &Json, value: &Value) -> Option<CmpOrdering> {
    match (candidate, value) {
        (Json::Number(n), Value::Integer(i)) => match n.as_i64() {
            Some(c) => Some(c.cmp(i)),
            None => n.as_f64()?.partial_cmp(&(*i as f64)),
        },
        (Json::Number(n), Value::Float(f)) => n.as_f64()?.partial_cmp(f),
        (Json::String(s), Value::DateTime(dt)) => Some(parse_date_time(s)?.cmp(dt)),
        (Json::String(s), Value::String(v)) => Some(s.as_str().cmp(v.as_str())),
        // numeric text stored as a string, or a bareword against a boolean
        (other, value) => Some(text_of(other)?.as_str().cmp(value.to_text().as_str())),
    }
}

fn text_of(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// First value along the path; `None` sorts before everything
struct SortKey<'r>(Option<&'r Json>);

fn sort_key<'r>(record: &'r Json, path: &AttributePath) -> SortKey<'r> {
    SortKey(resolve(record, path).into_iter().next())
}

impl SortKey<'_> {
    fn cmp_key(&self, other: &Self) -> CmpOrdering {
        match (self.0, other.0) {
            (None, None) => CmpOrdering::Equal,
            (None, Some(_)) => CmpOrdering::Less,
            (Some(_), None) => CmpOrdering::Greater,
            (Some(a), Some(b)) => compare_json(a, b),
        }
    }
}

fn compare_json(a: &Json, b: &Json) -> CmpOrdering {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
        },
        // date-times rank ahead of other strings so the order stays total
        (Json::String(x), Json::String(y)) => match (parse_date_time(x), parse_date_time(y)) {
            (Some(dx), Some(dy)) => dx.cmp(&dy).then_with(|| x.cmp(y)),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => x.cmp(y),
        },
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Json) -> u8 {
    match value {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::AttributeKind;
    use crate::spec::test_utils::{path, terminal};
    use serde_json::json;

    fn plants() -> Vec<Json> {
        vec![
            json!({"name": "Rose", "height": 1.2, "site": {"name": "North"},
                   "planted": "2019-04-01T00:00:00Z", "plantings": [{"year": 2019}, {"year": 2021}]}),
            json!({"name": "Tulip", "height": 0.4, "site": {"name": "South"},
                   "planted": "2020-03-15T12:00:00Z", "plantings": [{"year": 2020}]}),
            json!({"name": "Oak", "height": 12, "site": null, "plantings": []}),
        ]
    }

    fn names(records: &[&Json]) -> Vec<String> {
        records
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn site_name() -> AttributePath {
        path(&[("site", AttributeKind::Entity), ("name", AttributeKind::Terminal)])
    }

    #[test]
    fn test_equality_is_any_of() {
        let filter = MemoryFilter::new(FilterSpec::comparison(
            terminal("name"),
            Operator::EqualTo,
            vec!["Rose".into(), "Oak".into()],
        ));
        let data = plants();
        assert_eq!(names(&filter.filter(&data)), vec!["Rose", "Oak"]);
    }

    #[test]
    fn test_numeric_comparison_mixes_integers_and_floats() {
        let filter = MemoryFilter::new(FilterSpec::comparison(
            terminal("height"),
            Operator::GreaterThan,
            vec![1i64.into()],
        ));
        let data = plants();
        assert_eq!(names(&filter.filter(&data)), vec!["Rose", "Oak"]);
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let filter = MemoryFilter::new(FilterSpec::comparison(
            terminal("height"),
            Operator::InRange,
            vec![0.4f64.into(), 12i64.into()],
        ));
        let data = plants();
        assert_eq!(filter.filter(&data).len(), 3);
    }

    #[test]
    fn test_dates_compare_chronologically() {
        let cutoff = "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let filter = MemoryFilter::new(FilterSpec::comparison(
            terminal("planted"),
            Operator::LessThan,
            vec![cutoff.into()],
        ));
        let data = plants();
        assert_eq!(names(&filter.filter(&data)), vec!["Rose"]);
    }

    #[test]
    fn test_relationship_and_null_hop() {
        let filter = MemoryFilter::new(FilterSpec::not(FilterSpec::comparison(
            site_name(),
            Operator::StartsWith,
            vec!["No".into()],
        )));
        let data = plants();
        // Oak has no site, so the inner comparison fails and the negation holds
        assert_eq!(names(&filter.filter(&data)), vec!["Tulip", "Oak"]);
    }

    #[test]
    fn test_aggregate_hop_matches_any_element() {
        let filter = MemoryFilter::new(FilterSpec::comparison(
            path(&[("plantings", AttributeKind::Aggregate), ("year", AttributeKind::Terminal)]),
            Operator::EqualTo,
            vec![2021i64.into()],
        ));
        let data = plants();
        assert_eq!(names(&filter.filter(&data)), vec!["Rose"]);
    }

    #[test]
    fn test_boolean_composition() {
        let spec = FilterSpec::or(
            FilterSpec::and(
                FilterSpec::comparison(terminal("name"), Operator::Contains, vec!["o".into()]),
                FilterSpec::comparison(terminal("height"), Operator::LessThan, vec![2i64.into()]),
            ),
            FilterSpec::comparison(terminal("name"), Operator::EndsWith, vec!["lip".into()]),
        );
        let data = plants();
        assert_eq!(names(&MemoryFilter::new(spec).filter(&data)), vec!["Rose", "Tulip"]);
    }

    #[test]
    fn test_empty_values_never_match() {
        let filter = MemoryFilter::new(FilterSpec::comparison(
            terminal("name"),
            Operator::EqualTo,
            vec![],
        ));
        assert!(filter.filter(&plants()).is_empty());
    }

    #[test]
    fn test_multi_key_sort() {
        let mut data = vec![
            json!({"name": "b", "height": 1}),
            json!({"name": "a", "height": 2}),
            json!({"name": "c", "height": 2}),
            json!({"name": "d"}),
        ];
        let order = MemoryOrder::new(
            OrderSpec::new(Ordering {
                path: terminal("height"),
                direction: Direction::Descending,
            })
            .then(Ordering {
                path: terminal("name"),
                direction: Direction::Ascending,
            }),
        );
        order.sort(&mut data);
        let sorted: Vec<&str> = data.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(sorted, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_sort_mixes_dates_and_text() {
        let mut data = vec![
            json!({"name": "c", "at": "2020-01-01T07 not a date"}),
            json!({"name": "a", "at": "2020-01-01T10:00:00+09:00"}),
            json!({"name": "d", "at": "1999 party"}),
            json!({"name": "b", "at": "2020-01-01T05:00:00Z"}),
        ];
        let order = MemoryOrder::new(OrderSpec::new(Ordering {
            path: terminal("at"),
            direction: Direction::Ascending,
        }));
        for (x, y, z) in [(0, 1, 2), (1, 3, 0), (2, 3, 1)] {
            let ab = order.compare(&data[x], &data[y]);
            let bc = order.compare(&data[y], &data[z]);
            if ab == bc && ab != CmpOrdering::Equal {
                assert_eq!(order.compare(&data[x], &data[z]), ab);
            }
        }
        order.sort(&mut data);
        let sorted: Vec<&str> = data.iter().map(|r| r["name"].as_str().unwrap()).collect();
        // 10:00+09:00 is 01:00Z, before 05:00Z
        assert_eq!(sorted, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_sort_by_relationship() {
        let mut data = plants();
        MemoryOrder::new(OrderSpec::new(Ordering {
            path: site_name(),
            direction: Direction::Ascending,
        }))
        .sort(&mut data);
        let sorted: Vec<&str> = data.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(sorted, vec!["Oak", "Rose", "Tulip"]);
    }
}
