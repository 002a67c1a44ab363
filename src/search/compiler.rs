//! Compilation of property filters into query fragments and bindings.
//!
//! Each filter compiles independently; callers join the fragments with the
//! engine's boolean operators and merge all bindings into one parameter
//! map. Parameter names are pure functions of the property and operation,
//! so repeated compilation of the same filter is byte-identical and
//! bindings from independently compiled filters never collide.

use serde_json::Value;

use crate::error::Result;

use super::filter::{FilterExpression, SearchFilter};
use super::syntax::{
    contains_any, expression, named_field, negative, numeric_range, param_ref, tag,
};

/// Prefix of every generated parameter name.
const FIELD_PREFIX: &str = "f";

/// Placeholder the indexer stores for absent values. An empty string cannot
/// be used, the query parser rejects it.
const EMPTY_VALUE: &str = "object";

const SUFFIX_EQ: &str = "eq";
const SUFFIX_NE: &str = "ne";
const SUFFIX_MATCH: &str = "m";

/// One compiled filter: a query fragment plus the parameter bindings its
/// `$name` references resolve through.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Sub-expression to be joined with other fragments
    pub fragment: String,
    /// `(name, value)` pairs to merge into the execution parameter map
    pub bindings: Vec<(String, Value)>,
}

/// Compile one `(property, filter)` pair into a fragment and its bindings.
pub fn compile(property: &str, filter: &SearchFilter) -> CompiledQuery {
    let field = named_field(property);

    match filter {
        SearchFilter::Value(value) => {
            let name = param_name(&[FIELD_PREFIX, property]);
            CompiledQuery {
                fragment: expression(&field, &param_ref(&name)),
                bindings: vec![(name, Value::String(value.clone()))],
            }
        }
        SearchFilter::Expr(expr) => match expr {
            FilterExpression::NumericRange { gte, lte } => CompiledQuery {
                fragment: expression(&field, &numeric_range(*gte, *lte)),
                bindings: Vec::new(),
            },
            FilterExpression::Exists => CompiledQuery {
                fragment: negative(&expression(&field, EMPTY_VALUE)),
                bindings: Vec::new(),
            },
            FilterExpression::IsEmpty => CompiledQuery {
                fragment: expression(&field, EMPTY_VALUE),
                bindings: Vec::new(),
            },
            FilterExpression::Equals(value) => {
                let name = param_name(&[FIELD_PREFIX, property, SUFFIX_EQ]);
                CompiledQuery {
                    fragment: expression(&field, &tag(&param_ref(&name))),
                    bindings: vec![(name, value.clone())],
                }
            }
            FilterExpression::NotEquals(value) => {
                let name = param_name(&[FIELD_PREFIX, property, SUFFIX_NE]);
                CompiledQuery {
                    fragment: negative(&expression(&field, &tag(&param_ref(&name)))),
                    bindings: vec![(name, value.clone())],
                }
            }
            FilterExpression::Match(value) => {
                // the parameter name is normalized, the field reference is not
                let normalized = normalize_property(property);
                let name = param_name(&[FIELD_PREFIX, &normalized, SUFFIX_MATCH]);
                CompiledQuery {
                    fragment: expression(&field, &contains_any(&param_ref(&name))),
                    bindings: vec![(name, value.clone())],
                }
            }
        },
    }
}

/// Parse a raw JSON filter and compile it in one step.
pub fn compile_value(property: &str, raw: &Value) -> Result<CompiledQuery> {
    Ok(compile(property, &SearchFilter::parse(raw)?))
}

/// `|` is the field-path separator in composite property names and cannot
/// appear in a parameter name.
fn normalize_property(property: &str) -> String {
    property.replace('|', "_")
}

fn param_name(parts: &[&str]) -> String {
    parts.join("_")
}
