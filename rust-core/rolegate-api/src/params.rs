// SPDX-License-Identifier: PMPL-1.0-or-later
//! Parameter sources.
//!
//! A route declares, per context key, where the value lives: a JSON body
//! field, a query parameter or a path segment. Values are read through typed
//! accessors; there is no field-name reflection over request structs.

use std::collections::HashMap;

use serde_json::{Map, Value};

use rolegate_policy::PolicyContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Body(&'static str),
    Query(&'static str),
    Path(&'static str),
}

impl ParamSource {
    pub fn field(&self) -> &'static str {
        match self {
            ParamSource::Body(f) | ParamSource::Query(f) | ParamSource::Path(f) => f,
        }
    }
}

/// Raw values pulled from one request.
#[derive(Debug, Clone, Default)]
pub struct ExtractedParams {
    body: Map<String, Value>,
    query: HashMap<String, String>,
    path: HashMap<String, String>,
}

impl ExtractedParams {
    pub fn new(
        body: Map<String, Value>,
        query: HashMap<String, String>,
        path: HashMap<String, String>,
    ) -> Self {
        Self { body, query, path }
    }

    /// Scalar body fields are stringified; arrays, objects and nulls count as absent.
    fn body_field(&self, field: &str) -> Option<String> {
        match self.body.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// True when `field` is a body array with at least one non-blank string.
    pub fn has_items(&self, field: &str) -> bool {
        match self.body.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty())),
            _ => false,
        }
    }

    pub fn get(&self, source: ParamSource) -> Option<String> {
        match source {
            ParamSource::Body(f) => self.body_field(f),
            ParamSource::Query(f) => self.query.get(f).cloned(),
            ParamSource::Path(f) => self.path.get(f).cloned(),
        }
    }

    /// Build a policy context from `(context key, source)` pairs. Empty
    /// values are dropped.
    pub fn resolve(&self, sources: &[(&'static str, ParamSource)]) -> PolicyContext {
        let mut ctx = PolicyContext::new();
        for (key, source) in sources {
            if let Some(value) = self.get(*source) {
                ctx.insert(*key, value.trim());
            }
        }
        ctx
    }
}
