//! `records.query`: argument checks, backend query and client-side field
//! filtering.
//!
//! The CMA cannot combine a model filter with field filters in one request,
//! so field conditions are applied to the fetched page here instead.

use regex::Regex;
use serde_json::{Map, Value};

use super::common;
use crate::cma::Page;
use crate::handler::{ListView, Pagination, ValidatedArgs};
use crate::schema::Violation;
use crate::{Error, Result};

/// Message for field filters without a model context
pub const MODEL_CONTEXT_REQUIRED: &str =
    "Field filtering requires a model context: provide modelName, modelId or textSearch";

const OPERATORS: [&str; 6] = ["eq", "neq", "in", "notIn", "matches", "exists"];

/// A condition on one record field
#[derive(Debug, Clone)]
pub enum FieldCondition {
    /// Equal to the value
    Eq(Value),
    /// Not equal to the value
    Neq(Value),
    /// One of the values
    In(Vec<Value>),
    /// None of the values
    NotIn(Vec<Value>),
    /// String matching the pattern
    Matches(Regex),
    /// Present and non-null (`true`) or absent / null (`false`)
    Exists(bool),
}

impl FieldCondition {
    /// Parse one condition: a literal means equality, an operator object
    /// yields one condition per operator.
    pub fn parse(raw: &Value) -> std::result::Result<Vec<Self>, String> {
        let Value::Object(ops) = raw else {
            return Ok(vec![Self::Eq(raw.clone())]);
        };
        if ops.is_empty() || !ops.keys().all(|k| OPERATORS.contains(&k.as_str())) {
            if ops.keys().any(|k| OPERATORS.contains(&k.as_str())) {
                let unknown: Vec<&str> = ops
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !OPERATORS.contains(k))
                    .collect();
                return Err(format!(
                    "unknown operator(s) {}; valid operators are: {}",
                    unknown.join(", "),
                    OPERATORS.join(", ")
                ));
            }
            // A plain object literal (e.g. a JSON field value)
            return Ok(vec![Self::Eq(raw.clone())]);
        }

        ops.iter()
            .map(|(op, operand)| match op.as_str() {
                "eq" => Ok(Self::Eq(operand.clone())),
                "neq" => Ok(Self::Neq(operand.clone())),
                "in" | "notIn" => {
                    let Value::Array(values) = operand else {
                        return Err(format!("{op} expects an array"));
                    };
                    Ok(if op == "in" {
                        Self::In(values.clone())
                    } else {
                        Self::NotIn(values.clone())
                    })
                }
                "matches" => {
                    let pattern = operand
                        .as_str()
                        .ok_or_else(|| "matches expects a string pattern".to_string())?;
                    Regex::new(pattern)
                        .map(Self::Matches)
                        .map_err(|e| format!("invalid pattern: {e}"))
                }
                "exists" => operand
                    .as_bool()
                    .map(Self::Exists)
                    .ok_or_else(|| "exists expects a boolean".to_string()),
                _ => Err(format!("unknown operator {op}")),
            })
            .collect()
    }

    /// Whether `value` satisfies this condition
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.filter(|v| !v.is_null());
        match self {
            Self::Eq(expected) => value == Some(expected),
            Self::Neq(expected) => value != Some(expected),
            Self::In(values) => value.is_some_and(|v| values.contains(v)),
            Self::NotIn(values) => value.is_none_or(|v| !values.contains(v)),
            Self::Matches(re) => value.and_then(Value::as_str).is_some_and(|s| re.is_match(s)),
            Self::Exists(expected) => value.is_some() == *expected,
        }
    }
}

/// Whether `record` satisfies every condition in `fields`.
///
/// Localized values (`{"en": .., "it": ..}`) are read in `locale` when one
/// is given.
#[must_use]
pub fn matches_condition(record: &Value, fields: &Map<String, Value>, locale: Option<&str>) -> bool {
    fields.iter().all(|(field, raw)| {
        let Ok(conditions) = FieldCondition::parse(raw) else {
            return false;
        };
        let mut value = record.get(field);
        if let (Some(locale), Some(Value::Object(localized))) = (locale, value) {
            if let Some(v) = localized.get(locale) {
                value = Some(v);
            }
        }
        conditions.iter().all(|c| c.matches(value))
    })
}

/// Argument schema of `records.query`
pub fn schema() -> Value {
    common::args_schema(
        serde_json::json!({
            "modelName": common::string("Model API key to restrict results to"),
            "modelId": common::string("Model ID to restrict results to"),
            "ids": common::strings("Only these record IDs"),
            "textSearch": common::string("Full-text search query"),
            "fields": common::object(
                "Field conditions: {field: literal} or {field: {eq|neq|in|notIn|matches|exists: ..}}"
            ),
            "locale": common::string("Locale for text search and localized field conditions"),
            "orderBy": common::string("Ordering, e.g. _updated_at_DESC"),
            "version": { "type": "string", "enum": ["published", "current"] },
            "nested": common::boolean("Expand block fields"),
            "page": common::page(),
            "returnOnlyIds": common::boolean("Return only record IDs")
        }),
        &[],
    )
}

/// Cross-field checks on `records.query` arguments
pub fn refine(args: &Value) -> Vec<Violation> {
    let Some(Value::Object(fields)) = args.get("fields") else {
        return Vec::new();
    };
    if fields.is_empty() {
        return Vec::new();
    }

    let has_context = ["modelName", "modelId", "textSearch"]
        .iter()
        .any(|k| args.get(*k).and_then(Value::as_str).is_some_and(|s| !s.is_empty()));
    if !has_context {
        return vec![Violation::new("fields", MODEL_CONTEXT_REQUIRED)];
    }

    fields
        .iter()
        .filter_map(|(name, raw)| {
            FieldCondition::parse(raw)
                .err()
                .map(|msg| Violation::new(format!("fields.{name}"), msg))
        })
        .collect()
}

/// Backend query pairs; field conditions are not sent
pub fn backend_query(args: &ValidatedArgs) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(model) = args.str("modelName").or_else(|| args.str("modelId")) {
        query.push(("filter[type]".to_string(), model.to_string()));
    }
    if let Some(Value::Array(ids)) = args.get("ids") {
        let ids: Vec<&str> = ids.iter().filter_map(Value::as_str).collect();
        query.push(("filter[ids]".to_string(), ids.join(",")));
    }
    if let Some(text) = args.str("textSearch") {
        query.push(("filter[query]".to_string(), text.to_string()));
    }
    for (arg, param) in [("locale", "locale"), ("orderBy", "order_by"), ("version", "version")] {
        if let Some(v) = args.str(arg) {
            query.push((param.to_string(), v.to_string()));
        }
    }
    if args.flag("nested") {
        query.push(("nested".to_string(), "true".to_string()));
    }
    query.extend(common::page_query(args));
    query
}

/// Apply field conditions to a fetched page.
///
/// The backend total no longer describes the filtered set, so it is
/// dropped when any condition applies.
pub fn filter_page(page: Page, args: &ValidatedArgs) -> Result<Page> {
    let Some(fields) = args.get("fields").and_then(Value::as_object) else {
        return Ok(page);
    };
    if fields.is_empty() {
        return Ok(page);
    }
    // Conditions were checked during validation; re-parse to fail loudly
    // rather than silently match nothing.
    for raw in fields.values() {
        FieldCondition::parse(raw).map_err(Error::InvalidArguments)?;
    }
    let locale = args.str("locale");
    Ok(Page {
        data: page
            .data
            .into_iter()
            .filter(|record| matches_condition(record, fields, locale))
            .collect(),
        total: None,
    })
}

/// List formatter: optional id-only projection plus pagination
pub fn format(page: Page, args: &ValidatedArgs) -> ListView {
    let count = page.data.len();
    let pagination = page.total.map(|total| {
        let limit = args
            .get("page")
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_u64)
            .unwrap_or(count as u64);
        let offset = args
            .get("page")
            .and_then(|p| p.get("offset"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Pagination::new(limit, offset, total, count)
    });
    let data = if args.flag("returnOnlyIds") {
        Value::Array(page.data.iter().filter_map(|r| r.get("id").cloned()).collect())
    } else {
        Value::Array(page.data)
    };
    ListView {
        data,
        count,
        pagination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fields_without_model_context_are_rejected() {
        // GIVEN: field filters but neither a model nor a text search
        let violations = refine(&json!({"fields": {"name": "Emily"}}));

        // THEN: exactly the model-context message
        assert_eq!(violations, vec![Violation::new("fields", MODEL_CONTEXT_REQUIRED)]);
    }

    #[test]
    fn any_model_context_satisfies_the_rule() {
        for ctx in [
            json!({"modelName": "author"}),
            json!({"modelId": "123"}),
            json!({"textSearch": "emily"}),
        ] {
            let mut args = ctx.clone();
            args["fields"] = json!({"name": "Emily"});
            assert!(refine(&args).is_empty(), "{ctx}");
        }
    }

    #[test]
    fn unknown_operators_are_reported_per_field() {
        let violations = refine(&json!({
            "modelName": "author",
            "fields": {"age": {"gt": 3, "eq": 4}}
        }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "fields.age");
        assert!(violations[0].message.contains("gt"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let violations = refine(&json!({
            "modelName": "author",
            "fields": {"name": {"matches": "("}}
        }));
        assert!(violations[0].message.starts_with("invalid pattern"));
    }

    #[test]
    fn literal_condition_means_equality() {
        let record = json!({"name": "Emily", "age": 30});
        assert!(matches_condition(&record, &fields(json!({"name": "Emily"})), None));
        assert!(!matches_condition(&record, &fields(json!({"name": "Anne"})), None));
    }

    #[test]
    fn operators_match() {
        let record = json!({"name": "Emily Bronte", "age": 30, "bio": null});
        let cases = [
            (json!({"age": {"eq": 30}}), true),
            (json!({"age": {"neq": 30}}), false),
            (json!({"age": {"in": [10, 30]}}), true),
            (json!({"age": {"notIn": [10, 30]}}), false),
            (json!({"name": {"matches": "^Emily"}}), true),
            (json!({"bio": {"exists": false}}), true),
            (json!({"name": {"exists": true}, "age": {"in": [30]}}), true),
            (json!({"missing": {"notIn": [1]}}), true),
        ];
        for (conditions, expected) in cases {
            assert_eq!(
                matches_condition(&record, &fields(conditions.clone()), None),
                expected,
                "{conditions}"
            );
        }
    }

    #[test]
    fn localized_values_use_the_locale() {
        let record = json!({"title": {"en": "Hello", "it": "Ciao"}});
        assert!(matches_condition(&record, &fields(json!({"title": "Ciao"})), Some("it")));
        assert!(!matches_condition(&record, &fields(json!({"title": "Ciao"})), Some("en")));
    }

    #[test]
    fn object_literals_without_operators_compare_whole_values() {
        let record = json!({"seo": {"title": "x"}});
        assert!(matches_condition(&record, &fields(json!({"seo": {"title": "x"}})), None));
    }
}
