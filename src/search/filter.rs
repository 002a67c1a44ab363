//! Filter model for search queries.
//!
//! Action handlers receive filters as raw JSON; [`SearchFilter::parse`] is
//! the boundary where that open shape becomes a closed set of operations,
//! so every later stage dispatches exhaustively.

use serde_json::Value;

use crate::error::{Result, UsersCoreError};

/// Routing hint key allowed alongside an operation, consumed by the caller
/// and ignored by dispatch.
pub(crate) const FIELDS_KEY: &str = "fields";

/// One filter applied to a property: either a bare value (equality
/// shorthand) or an explicit operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// Bare string shorthand for equality
    Value(String),
    /// An explicit filter operation
    Expr(FilterExpression),
}

/// The closed set of filter operations.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// Field equals the bound value
    Equals(Value),
    /// Field differs from the bound value
    NotEquals(Value),
    /// Field contains the bound value
    Match(Value),
    /// Field lies within the numeric range; a missing bound is open
    NumericRange {
        /// Lower bound, inclusive
        gte: Option<f64>,
        /// Upper bound, inclusive
        lte: Option<f64>,
    },
    /// Field carries a real value
    Exists,
    /// Field carries the empty-value placeholder
    IsEmpty,
}

impl SearchFilter {
    /// Parse a raw JSON filter into the closed operation set.
    ///
    /// A bare string is equality shorthand. An object dispatches on its
    /// first key after the `fields` routing hint is stripped. Anything
    /// else fails with [`UsersCoreError::UnsupportedOperation`] carrying
    /// the offending value.
    pub fn parse(raw: &Value) -> Result<Self> {
        if let Value::String(value) = raw {
            return Ok(SearchFilter::Value(value.clone()));
        }

        let Some(object) = raw.as_object() else {
            return Err(UsersCoreError::UnsupportedOperation(raw.clone()));
        };

        let (operation, value) = object
            .iter()
            .find(|(key, _)| key.as_str() != FIELDS_KEY)
            .ok_or_else(|| UsersCoreError::UnsupportedOperation(raw.clone()))?;

        let expr = match (operation.as_str(), value) {
            ("gte", _) | ("lte", _) => FilterExpression::NumericRange {
                gte: object.get("gte").and_then(Value::as_f64),
                lte: object.get("lte").and_then(Value::as_f64),
            },
            ("exists", _) => FilterExpression::Exists,
            ("isempty", _) => FilterExpression::IsEmpty,
            ("eq", value) => FilterExpression::Equals(value.clone()),
            ("ne", value) => FilterExpression::NotEquals(value.clone()),
            ("match", value) => FilterExpression::Match(value.clone()),
            _ => return Err(UsersCoreError::UnsupportedOperation(raw.clone())),
        };

        Ok(SearchFilter::Expr(expr))
    }
}
