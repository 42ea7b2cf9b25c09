// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Policy Store: the immutable set of rule documents loaded at boot.
//
// An action may be declared by more than one document. Rules are merged in
// document order: conditional rules first, in the order they were declared,
// then the single unconditional fallback, if any. A second fallback for the
// same action is a load error.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::PolicyError;
use crate::rule::{PolicyDocument, PolicyRule};

/// Documents compiled into the binary, in merge order.
pub const EMBEDDED_DOCUMENTS: [(&str, &str); 4] = [
    ("system", include_str!("../policies/system.json")),
    ("dashboard", include_str!("../policies/dashboard.json")),
    ("dashboard_widget", include_str!("../policies/dashboard_widget.json")),
    ("library_widget", include_str!("../policies/library_widget.json")),
];

#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    entities: Vec<String>,
    actions: HashMap<String, Vec<PolicyRule>>,
}

impl PolicyStore {
    pub fn load_embedded() -> Result<Self, PolicyError> {
        Self::from_documents(&EMBEDDED_DOCUMENTS)
    }

    /// Parse and merge `(name, json)` documents in the given order.
    pub fn from_documents(documents: &[(&str, &str)]) -> Result<Self, PolicyError> {
        let mut parsed = Vec::with_capacity(documents.len());
        for (name, json) in documents {
            let doc: PolicyDocument =
                serde_json::from_str(json).map_err(|source| PolicyError::Parse {
                    document: name.to_string(),
                    source,
                })?;
            if doc.entity != *name {
                return Err(PolicyError::invalid(
                    name,
                    format!("declares entity '{}'", doc.entity),
                ));
            }
            parsed.push(doc);
        }
        Self::merge(parsed)
    }

    fn merge(documents: Vec<PolicyDocument>) -> Result<Self, PolicyError> {
        let mut conditional: HashMap<String, Vec<PolicyRule>> = HashMap::new();
        let mut fallbacks: HashMap<String, PolicyRule> = HashMap::new();
        let mut entities = Vec::with_capacity(documents.len());

        for doc in documents {
            for (action, raw_rules) in doc.actions {
                if raw_rules.is_empty() {
                    return Err(PolicyError::invalid(
                        &doc.entity,
                        format!("action '{}' has no rules", action),
                    ));
                }
                for raw in raw_rules {
                    let rule = PolicyRule::from_raw(&doc.entity, raw)?;
                    if rule.is_fallback() {
                        if let Some(existing) = fallbacks.get(&action) {
                            return Err(PolicyError::invalid(
                                &doc.entity,
                                format!(
                                    "action '{}' already has a fallback rule in '{}'",
                                    action, existing.entity
                                ),
                            ));
                        }
                        fallbacks.insert(action.clone(), rule);
                    } else {
                        conditional.entry(action.clone()).or_default().push(rule);
                    }
                }
            }
            debug!(entity = %doc.entity, "Policy document loaded");
            entities.push(doc.entity);
        }

        for (action, fallback) in fallbacks {
            conditional.entry(action).or_default().push(fallback);
        }

        info!(
            documents = entities.len(),
            actions = conditional.len(),
            "Policy store ready"
        );
        Ok(Self {
            entities,
            actions: conditional,
        })
    }

    /// Merged rule list for `action`, or `None` if no document declares it.
    pub fn rules(&self, action: &str) -> Option<&[PolicyRule]> {
        self.actions.get(action).map(Vec::as_slice)
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }
}
