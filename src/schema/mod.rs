//! Process-wide table of argument schemas keyed by `(domain, action)`.
//!
//! Each resource router registers the schemas of its actions at startup;
//! the validation stage of the handler pipeline looks them up before any
//! domain action runs.

mod validator;

use std::collections::HashMap;
use std::fmt::Write as _;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

pub use validator::{ValidationOutcome, Violation, validate};

/// Cross-field check run after structural validation succeeds
pub type Refinement = fn(&Value) -> Vec<Violation>;

/// A registered schema
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    /// JSON-Schema-shaped description of the arguments
    pub schema: Value,
    /// Optional human-readable description
    pub description: Option<String>,
    refinement: Option<Refinement>,
}

/// Why a payload was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// One-line summary suitable for the envelope's `error`
    pub message: String,
    /// Individual `{path, message}` violations
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let mut message = String::from("Validation failed");
        for (i, v) in violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            if v.path.is_empty() {
                let _ = write!(message, "{sep}{}", v.message);
            } else {
                let _ = write!(message, "{sep}{} {}", v.path, v.message);
            }
        }
        Self {
            message,
            violations,
        }
    }
}

/// Name and description of one registered schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    /// Action name
    pub name: String,
    /// Description, if one was registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `(domain, name)` → schema
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<(String, String), SchemaEntry>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. Re-registering a key overwrites it.
    pub fn register(
        &self,
        domain: &str,
        name: &str,
        schema: Value,
        description: Option<&str>,
    ) {
        self.insert(domain, name, schema, description, None);
    }

    /// Register a schema with a cross-field refinement
    pub fn register_refined(
        &self,
        domain: &str,
        name: &str,
        schema: Value,
        description: Option<&str>,
        refinement: Refinement,
    ) {
        self.insert(domain, name, schema, description, Some(refinement));
    }

    fn insert(
        &self,
        domain: &str,
        name: &str,
        schema: Value,
        description: Option<&str>,
        refinement: Option<Refinement>,
    ) {
        self.entries.write().insert(
            (domain.to_string(), name.to_string()),
            SchemaEntry {
                schema,
                description: description.map(String::from),
                refinement,
            },
        );
    }

    /// The schema registered under `(domain, name)`
    #[must_use]
    pub fn get(&self, domain: &str, name: &str) -> Option<Value> {
        self.entries
            .read()
            .get(&(domain.to_string(), name.to_string()))
            .map(|e| e.schema.clone())
    }

    /// Validate `data` against the schema registered under `(domain, name)`.
    ///
    /// Returns the coerced arguments on success. A missing schema is a
    /// validation failure, never a panic.
    pub fn validate(
        &self,
        domain: &str,
        name: &str,
        data: &Value,
    ) -> std::result::Result<Value, ValidationFailure> {
        let entry = self
            .entries
            .read()
            .get(&(domain.to_string(), name.to_string()))
            .cloned();

        let Some(entry) = entry else {
            return Err(ValidationFailure::from_violations(vec![Violation::new(
                "",
                format!("no schema registered for {domain}.{name}"),
            )]));
        };

        let outcome = validate(data, &entry.schema);
        if !outcome.is_valid() {
            return Err(ValidationFailure::from_violations(outcome.violations));
        }

        if let Some(refine) = entry.refinement {
            let violations = refine(&outcome.coerced);
            if !violations.is_empty() {
                return Err(ValidationFailure::from_violations(violations));
            }
        }

        Ok(outcome.coerced)
    }

    /// Registered schemas of `domain`, sorted by name
    #[must_use]
    pub fn describe(&self, domain: &str) -> Vec<SchemaSummary> {
        let mut out: Vec<SchemaSummary> = self
            .entries
            .read()
            .iter()
            .filter(|((d, _), _)| d == domain)
            .map(|((_, name), entry)| SchemaSummary {
                name: name.clone(),
                description: entry.description.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Number of registered schemas
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
