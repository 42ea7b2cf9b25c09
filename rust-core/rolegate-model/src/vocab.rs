// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Closed vocabulary: roles, resource types, user types and check scopes.
//
// Every string that crosses the boundary (request parameters, policy
// documents, stored records) is parsed into one of these enums before it is
// used, so an unknown value fails at the edge instead of deep in a lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a string does not name a member of the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct VocabularyError {
    pub kind: &'static str,
    pub value: String,
}

impl VocabularyError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A role a user can hold at system or resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
    /// Cross-namespace role, held at system scope with the empty namespace.
    /// Its only use is creating the first owner of a namespace.
    Moderator,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Owner,
        Role::Admin,
        Role::Editor,
        Role::Viewer,
        Role::Moderator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
            Role::Moderator => "moderator",
        }
    }

    /// Position in the per-scope hierarchy; higher outranks lower.
    /// Moderator sits outside the hierarchy.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Role::Owner => Some(4),
            Role::Admin => Some(3),
            Role::Editor => Some(2),
            Role::Viewer => Some(1),
            Role::Moderator => None,
        }
    }

    /// Whether the role may be recorded inside a namespace or on a resource.
    pub fn is_scoped(&self) -> bool {
        self.rank().is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| VocabularyError::new("role", s))
    }
}

/// Resource types that can carry role assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Dashboard,
    /// Nested under a [`ResourceType::Dashboard`].
    DashboardWidget,
    LibraryWidget,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Dashboard,
        ResourceType::DashboardWidget,
        ResourceType::LibraryWidget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Dashboard => "dashboard",
            ResourceType::DashboardWidget => "dashboard_widget",
            ResourceType::LibraryWidget => "library_widget",
        }
    }

    /// The type of the resource this one is nested under, if any.
    pub fn parent(&self) -> Option<ResourceType> {
        match self {
            ResourceType::DashboardWidget => Some(ResourceType::Dashboard),
            ResourceType::Dashboard | ResourceType::LibraryWidget => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| VocabularyError::new("resource type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Individual,
    Organization,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Individual => "individual",
            UserType::Organization => "organization",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(UserType::Individual),
            "organization" => Ok(UserType::Organization),
            other => Err(VocabularyError::new("user type", other)),
        }
    }
}

/// Where a permission is enforced.
///
/// Dispatch sites match on this exhaustively; never compare scope strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
    /// No authorization; the caller only has to be authenticated.
    None,
    /// System scope with the empty namespace.
    Global,
    /// System scope in the extracted namespace.
    System,
    /// The extracted resource itself.
    #[default]
    Resource,
    /// The parent of the extracted resource, not the resource.
    #[serde(rename = "parent", alias = "parent_resource")]
    ParentResource,
}

impl CheckScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckScope::None => "none",
            CheckScope::Global => "global",
            CheckScope::System => "system",
            CheckScope::Resource => "resource",
            CheckScope::ParentResource => "parent",
        }
    }
}

impl fmt::Display for CheckScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckScope {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CheckScope::None),
            "global" => Ok(CheckScope::Global),
            "system" => Ok(CheckScope::System),
            "resource" => Ok(CheckScope::Resource),
            "parent" | "parent_resource" => Ok(CheckScope::ParentResource),
            other => Err(VocabularyError::new("check scope", other)),
        }
    }
}
