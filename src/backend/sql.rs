//! Parameterised SQL rendering
//!
//! Literals never appear in the SQL text. Each one becomes a `$n` placeholder
//! and is returned alongside the clause, numbered in the order the
//! placeholders appear.

use std::fmt::Write;

use itertools::Itertools;

use super::{FilterTranslator, OrderTranslator};
use crate::parser::Value;
use crate::spec::{AttributePath, Comparison, Direction, FilterSpec, Operator, OrderSpec, Ordering};

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Param(Value),
}

/// SQL text with unnumbered parameter slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pieces: Vec<Piece>,
}

impl SqlFragment {
    pub fn text(text: impl Into<String>) -> Self {
        SqlFragment {
            pieces: vec![Piece::Text(text.into())],
        }
    }

    pub fn param(value: Value) -> Self {
        SqlFragment {
            pieces: vec![Piece::Param(value)],
        }
    }

    pub fn push_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.pieces.push(Piece::Text(text.into()));
        self
    }

    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.pieces.push(Piece::Param(value));
        self
    }

    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        self.pieces.extend(other.pieces);
        self
    }

    /// Join fragments with `separator`
    pub fn join(fragments: impl IntoIterator<Item = SqlFragment>, separator: &str) -> Self {
        let mut out = SqlFragment::default();
        for (idx, fragment) in fragments.into_iter().enumerate() {
            if idx > 0 {
                out.push_text(separator);
            }
            out.append(fragment);
        }
        out
    }

    fn wrapped(prefix: &str, inner: SqlFragment, suffix: &str) -> Self {
        let mut out = SqlFragment::text(prefix);
        out.append(inner).push_text(suffix);
        out
    }

    pub fn param_count(&self) -> usize {
        self.pieces
            .iter()
            .filter(|p| matches!(p, Piece::Param(_)))
            .count()
    }

    /// Number the placeholders starting at `first_placeholder`
    pub fn render(self, first_placeholder: usize) -> SqlFilter {
        let mut clause = String::new();
        let mut params = Vec::with_capacity(self.param_count());
        for piece in self.pieces {
            match piece {
                Piece::Text(text) => clause.push_str(&text),
                Piece::Param(value) => {
                    let _ = write!(clause, "${}", first_placeholder + params.len());
                    params.push(value);
                }
            }
        }
        SqlFilter { clause, params }
    }
}

/// A rendered `WHERE` clause and its parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

impl SqlFilter {
    pub fn from_spec(spec: &FilterSpec) -> Self {
        Self::from_spec_at(spec, 1)
    }

    /// Render with placeholders numbered from `first_placeholder`, for
    /// splicing into a statement that already binds parameters
    pub fn from_spec_at(spec: &FilterSpec, first_placeholder: usize) -> Self {
        FilterTranslator::translate(&SqlTranslator, spec).render(first_placeholder)
    }
}

/// A rendered `ORDER BY` list, without the keywords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOrder {
    pub clause: String,
}

impl SqlOrder {
    pub fn from_spec(spec: &OrderSpec) -> Self {
        SqlOrder {
            clause: OrderTranslator::translate(&SqlTranslator, spec),
        }
    }
}

struct SqlTranslator;

impl FilterTranslator for SqlTranslator {
    type Output = SqlFragment;

    fn comparison(&self, comparison: &Comparison) -> SqlFragment {
        let column = quote_path(&comparison.path);
        let values = &comparison.values;

        if values.is_empty() {
            return SqlFragment::text("1 = 0");
        }

        match comparison.operator {
            Operator::EqualTo if values.len() == 1 => binary(&column, "=", values[0].clone()),
            Operator::EqualTo => {
                let mut out = SqlFragment::text(format!("{} IN (", column));
                out.append(SqlFragment::join(
                    values.iter().cloned().map(SqlFragment::param),
                    ", ",
                ))
                .push_text(")");
                out
            }
            Operator::InRange => match values.as_slice() {
                [low, high] => {
                    let mut out = SqlFragment::text(format!("{} BETWEEN ", column));
                    out.push_param(low.clone())
                        .push_text(" AND ")
                        .push_param(high.clone());
                    out
                }
                _ => SqlFragment::text("1 = 0"),
            },
            op @ (Operator::StartsWith | Operator::EndsWith | Operator::Contains) => {
                any_of(values.iter().map(|v| {
                    let escaped = escape_like(&v.to_text());
                    let pattern = match op {
                        Operator::StartsWith => format!("{}%", escaped),
                        Operator::EndsWith => format!("%{}", escaped),
                        _ => format!("%{}%", escaped),
                    };
                    let mut out = SqlFragment::text(format!("{} LIKE ", column));
                    out.push_param(Value::String(pattern))
                        .push_text(" ESCAPE '\\'");
                    out
                }))
            }
            op => {
                let symbol = match op {
                    Operator::LessThan => "<",
                    Operator::LessThanOrEqualTo => "<=",
                    Operator::GreaterThan => ">",
                    _ => ">=",
                };
                any_of(values.iter().map(|v| binary(&column, symbol, v.clone())))
            }
        }
    }

    fn conjunction(&self, left: SqlFragment, right: SqlFragment) -> SqlFragment {
        SqlFragment::wrapped("(", SqlFragment::join([left, right], " AND "), ")")
    }

    fn disjunction(&self, left: SqlFragment, right: SqlFragment) -> SqlFragment {
        SqlFragment::wrapped("(", SqlFragment::join([left, right], " OR "), ")")
    }

    fn negation(&self, inner: SqlFragment) -> SqlFragment {
        SqlFragment::wrapped("NOT (", inner, ")")
    }
}

impl OrderTranslator for SqlTranslator {
    type Output = String;

    fn ordering(&self, ordering: &Ordering) -> String {
        let direction = match ordering.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        format!("{} {}", quote_path(&ordering.path), direction)
    }

    fn chain(&self, primary: String, tie_breaker: String) -> String {
        format!("{}, {}", primary, tie_breaker)
    }
}

fn binary(column: &str, symbol: &str, value: Value) -> SqlFragment {
    let mut out = SqlFragment::text(format!("{} {} ", column, symbol));
    out.push_param(value);
    out
}

/// Alternatives of one comparison; parenthesised only when there are several
fn any_of(alternatives: impl Iterator<Item = SqlFragment>) -> SqlFragment {
    let alternatives: Vec<SqlFragment> = alternatives.collect();
    if alternatives.len() == 1 {
        alternatives.into_iter().next().unwrap_or_default()
    } else {
        SqlFragment::wrapped("(", SqlFragment::join(alternatives, " OR "), ")")
    }
}

fn quote_path(path: &AttributePath) -> String {
    path.names()
        .map(|name| format!("\"{}\"", name.replace('"', "\"\"")))
        .join(".")
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::AttributeKind;
    use crate::spec::test_utils::{path, terminal};

    #[test]
    fn test_single_equality() {
        let sql = SqlFilter::from_spec(&FilterSpec::comparison(
            path(&[("site", AttributeKind::Entity), ("name", AttributeKind::Terminal)]),
            Operator::EqualTo,
            vec!["North".into()],
        ));
        assert_eq!(sql.clause, r#""site"."name" = $1"#);
        assert_eq!(sql.params, vec![Value::from("North")]);
    }

    #[test]
    fn test_multi_valued_equality_is_in_list() {
        let sql = SqlFilter::from_spec(&FilterSpec::comparison(
            terminal("age"),
            Operator::EqualTo,
            vec![34i64.into(), 44i64.into()],
        ));
        assert_eq!(sql.clause, r#""age" IN ($1, $2)"#);
        assert_eq!(sql.params, vec![Value::Integer(34), Value::Integer(44)]);
    }

    #[test]
    fn test_placeholders_numbered_across_tree() {
        let spec = FilterSpec::and(
            FilterSpec::comparison(terminal("name"), Operator::StartsWith, vec!["R".into()]),
            FilterSpec::not(FilterSpec::comparison(
                terminal("height"),
                Operator::InRange,
                vec![1i64.into(), 5i64.into()],
            )),
        );
        let sql = SqlFilter::from_spec(&spec);
        assert_eq!(
            sql.clause,
            r#"("name" LIKE $1 ESCAPE '\' AND NOT ("height" BETWEEN $2 AND $3))"#
        );
        assert_eq!(
            sql.params,
            vec![Value::from("R%"), Value::Integer(1), Value::Integer(5)]
        );
    }

    #[test]
    fn test_like_wildcards_escaped() {
        let sql = SqlFilter::from_spec(&FilterSpec::comparison(
            terminal("label"),
            Operator::Contains,
            vec!["50%_off".into()],
        ));
        assert_eq!(sql.params, vec![Value::from(r"%50\%\_off%")]);
    }

    #[test]
    fn test_ordering_alternatives_are_disjoined() {
        let sql = SqlFilter::from_spec(&FilterSpec::comparison(
            terminal("age"),
            Operator::LessThan,
            vec![12i64.into(), 5.5f64.into()],
        ));
        assert_eq!(sql.clause, r#"("age" < $1 OR "age" < $2)"#);
    }

    #[test]
    fn test_empty_values_render_false() {
        let spec = FilterSpec::or(
            FilterSpec::comparison(terminal("name"), Operator::EqualTo, vec![]),
            FilterSpec::comparison(terminal("name"), Operator::EndsWith, vec!["x".into()]),
        );
        let sql = SqlFilter::from_spec(&spec);
        assert_eq!(sql.clause, r#"(1 = 0 OR "name" LIKE $1 ESCAPE '\')"#);
        assert_eq!(sql.params, vec![Value::from("%x")]);
    }

    #[test]
    fn test_first_placeholder_offset() {
        let sql = SqlFilter::from_spec_at(
            &FilterSpec::comparison(terminal("age"), Operator::GreaterThan, vec![3i64.into()]),
            4,
        );
        assert_eq!(sql.clause, r#""age" > $4"#);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let sql = SqlFilter::from_spec(&FilterSpec::comparison(
            terminal(r#"we"ird"#),
            Operator::EqualTo,
            vec![1i64.into()],
        ));
        assert_eq!(sql.clause, r#""we""ird" = $1"#);
    }

    #[test]
    fn test_order_by() {
        let order = OrderSpec::new(Ordering {
            path: path(&[("site", AttributeKind::Entity), ("name", AttributeKind::Terminal)]),
            direction: Direction::Ascending,
        })
        .then(Ordering {
            path: terminal("height"),
            direction: Direction::Descending,
        });
        assert_eq!(
            SqlOrder::from_spec(&order).clause,
            r#""site"."name" ASC, "height" DESC"#
        );
    }
}
