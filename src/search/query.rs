//! Assembly of complete search queries from filter maps.

use serde_json::{Map, Value};

use crate::error::{Result, UsersCoreError};

use super::compiler::{compile_value, CompiledQuery};
use super::filter::FIELDS_KEY;

/// Property name selecting a multi-field text search. Its expression object
/// carries the target fields in the `fields` routing hint.
pub const MULTI_FIELD_PROPERTY: &str = "#multi";

/// Query the engine's implicit AND of all filters resolves to when the
/// filter map is empty.
const MATCH_ALL: &str = "*";

/// A complete query string plus its merged parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The assembled query
    pub query: String,
    /// `(name, value)` pairs for the execution parameter map
    pub params: Vec<(String, Value)>,
}

impl SearchQuery {
    /// Fold every `(property, filter)` pair of a filter map into one query.
    ///
    /// Fragments join with the engine's implicit AND; bindings merge into
    /// one parameter list. Property iteration follows the map's
    /// deterministic order, so the assembled query is reproducible.
    pub fn build(filters: &Map<String, Value>) -> Result<Self> {
        if filters.is_empty() {
            return Ok(Self {
                query: MATCH_ALL.to_string(),
                params: Vec::new(),
            });
        }

        let mut fragments = Vec::with_capacity(filters.len());
        let mut params = Vec::new();

        for (property, raw) in filters {
            let compiled = if property == MULTI_FIELD_PROPERTY {
                compile_multi(raw)?
            } else {
                compile_value(property, raw)?
            };

            fragments.push(compiled.fragment);
            params.extend(compiled.bindings);
        }

        Ok(Self {
            query: fragments.join(" "),
            params,
        })
    }
}

/// Compile a `#multi` entry: one expression applied to several fields at
/// once, referenced as a single `|`-composed field path.
fn compile_multi(raw: &Value) -> Result<CompiledQuery> {
    let fields: Vec<&str> = raw
        .as_object()
        .and_then(|object| object.get(FIELDS_KEY))
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if fields.is_empty() {
        return Err(UsersCoreError::UnsupportedOperation(raw.clone()));
    }

    compile_value(&fields.join("|"), raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_empty_filter_map_matches_all() {
        let query = SearchQuery::build(&Map::new()).unwrap();
        assert_eq!(query.query, "*");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_filters_join_with_implicit_and() {
        let query = SearchQuery::build(&filters(json!({
            "age": { "gte": 21, "lte": 65 },
            "email": "x@y.com",
            "role": { "ne": "tester" },
        })))
        .unwrap();

        assert_eq!(
            query.query,
            "@age:[21 65] @email:$f_email -@role:{$f_role_ne}"
        );
        assert_eq!(
            query.params,
            vec![
                ("f_email".to_string(), json!("x@y.com")),
                ("f_role_ne".to_string(), json!("tester")),
            ]
        );
    }

    #[test]
    fn test_multi_field_search_compiles_one_param() {
        let query = SearchQuery::build(&filters(json!({
            "#multi": {
                "fields": ["firstName", "lastName"],
                "match": "stan",
            },
        })))
        .unwrap();

        assert_eq!(query.query, "@firstName|lastName:($f_firstName_lastName_m*)");
        assert_eq!(
            query.params,
            vec![("f_firstName_lastName_m".to_string(), json!("stan"))]
        );
    }

    #[test]
    fn test_multi_without_fields_is_unsupported() {
        let result = SearchQuery::build(&filters(json!({
            "#multi": { "match": "stan" },
        })));
        assert!(matches!(
            result,
            Err(UsersCoreError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let map = filters(json!({
            "a": "1",
            "b": "2",
        }));
        let first = SearchQuery::build(&map).unwrap();
        let second = SearchQuery::build(&map).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.query, "@a:$f_a @b:$f_b");
    }
}
