// SPDX-License-Identifier: PMPL-1.0-or-later
//! Policy documents as written on disk and the validated rules built from them.

use std::collections::BTreeMap;

use serde::Deserialize;

use rolegate_model::CheckScope;

use crate::context::PolicyContext;
use crate::error::PolicyError;
use crate::template::PermissionTemplate;

/// One per-entity policy document.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub entity: String,
    /// Action name to its ordered rule list.
    pub actions: BTreeMap<String, Vec<RawRule>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRule {
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
    pub permission: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A validated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// Entity of the document that declared the rule.
    pub entity: String,
    pub conditions: BTreeMap<String, String>,
    pub template: PermissionTemplate,
    pub scope: CheckScope,
}

impl PolicyRule {
    pub(crate) fn from_raw(document: &str, raw: RawRule) -> Result<Self, PolicyError> {
        let template =
            PermissionTemplate::parse(&raw.permission).map_err(|r| PolicyError::invalid(document, r))?;
        let scope = match raw.scope.as_deref() {
            None => CheckScope::default(),
            Some(s) => s
                .parse::<CheckScope>()
                .map_err(|e| PolicyError::invalid(document, e.to_string()))?,
        };
        Ok(Self {
            entity: document.to_string(),
            conditions: raw.conditions,
            template,
            scope,
        })
    }

    /// A rule without conditions always matches.
    pub fn is_fallback(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, ctx: &PolicyContext) -> bool {
        ctx.satisfies(&self.conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(scope: Option<&str>) -> RawRule {
        RawRule {
            conditions: BTreeMap::new(),
            permission: "system.read".to_string(),
            scope: scope.map(str::to_string),
        }
    }

    #[test]
    fn test_scope_defaults_to_resource() {
        let rule = PolicyRule::from_raw("system", raw(None)).unwrap();
        assert_eq!(rule.scope, CheckScope::Resource);
        assert!(rule.is_fallback());
    }

    #[test]
    fn test_unknown_scope_is_invalid_document() {
        let err = PolicyRule::from_raw("system", raw(Some("tenant"))).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidDocument { .. }));
    }

    #[test]
    fn test_document_deserializes() {
        let doc: PolicyDocument = serde_json::from_str(
            r#"{"entity":"dashboard","actions":{"delete_resource":[{"permission":"resource.{resource_type}.delete"}]}}"#,
        )
        .unwrap();
        assert_eq!(doc.entity, "dashboard");
        assert_eq!(doc.actions["delete_resource"].len(), 1);
    }
}
