// SPDX-License-Identifier: PMPL-1.0-or-later
//! Runtime context a policy rule is evaluated against.

use std::collections::BTreeMap;

/// Well-known context keys, shared by the request matcher and the policy
/// documents.
pub mod keys {
    pub const NAMESPACE: &str = "namespace";
    pub const RESOURCE_ID: &str = "resource_id";
    pub const RESOURCE_TYPE: &str = "resource_type";
    pub const PARENT_RESOURCE_ID: &str = "parent_resource_id";
    pub const PARENT_RESOURCE_TYPE: &str = "parent_resource_type";
    pub const ROLE: &str = "role";
    pub const USER_ID: &str = "user_id";
}

/// String-valued context. Empty values are never stored, so "present" always
/// means "present and non-empty".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyContext {
    values: BTreeMap<String, String>,
}

impl PolicyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.values.insert(key.into(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether every `(key, expected)` pair is present with an equal value.
    pub fn satisfies(&self, conditions: &BTreeMap<String, String>) -> bool {
        conditions
            .iter()
            .all(|(k, expected)| self.get(k) == Some(expected.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PolicyContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = PolicyContext::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}
