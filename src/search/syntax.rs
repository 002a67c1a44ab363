//! Constructors for the search engine's query language.
//!
//! Fragments compose as `@field:value` scoped sub-expressions joined by the
//! engine's implicit AND; values are tag sets `{…}`, numeric ranges
//! `[min max]` with literal bounds, `$name` parameter references, and
//! token-prefix groups `(…*)`. Negation prepends `-` to a whole
//! sub-expression.

/// A `@name` field reference.
pub fn named_field(name: &str) -> String {
    format!("@{}", name)
}

/// A `field:value` scoped sub-expression.
pub fn expression(field: &str, value: &str) -> String {
    format!("{}:{}", field, value)
}

/// Negate a sub-expression.
pub fn negative(expr: &str) -> String {
    format!("-{}", expr)
}

/// A `{value}` tag match.
pub fn tag(value: &str) -> String {
    format!("{{{}}}", value)
}

/// A `$name` parameter reference, resolved from the parameter map at
/// execution time.
pub fn param_ref(name: &str) -> String {
    format!("${}", name)
}

/// A `[min max]` numeric range with literal bounds. A missing bound is
/// open on that side.
pub fn numeric_range(gte: Option<f64>, lte: Option<f64>) -> String {
    format!("[{} {}]", bound(gte, "-inf"), bound(lte, "+inf"))
}

/// A `(value*)` group matching any token starting with the value.
pub fn contains_any(value: &str) -> String {
    format!("({}*)", value)
}

fn bound(value: Option<f64>, open: &str) -> String {
    match value {
        Some(value) => format!("{}", value),
        None => open.to_string(),
    }
}
