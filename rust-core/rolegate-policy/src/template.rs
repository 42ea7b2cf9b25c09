// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Permission templates.
//
// A template such as `resource.{resource_type}.read` is parsed once, at load,
// into literal and placeholder segments. Only the placeholders in
// `Placeholder` are accepted; anything else is rejected while loading the
// document, not at request time.

use std::fmt;

use crate::context::{keys, PolicyContext};
use crate::error::PolicyError;

/// Context fields a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    ResourceType,
    ParentResourceType,
    Role,
}

impl Placeholder {
    pub const ALL: [Placeholder; 3] = [
        Placeholder::ResourceType,
        Placeholder::ParentResourceType,
        Placeholder::Role,
    ];

    /// The context key the placeholder reads.
    pub fn key(&self) -> &'static str {
        match self {
            Placeholder::ResourceType => keys::RESOURCE_TYPE,
            Placeholder::ParentResourceType => keys::PARENT_RESOURCE_TYPE,
            Placeholder::Role => keys::ROLE,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Placeholder::ALL.into_iter().find(|p| p.key() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PermissionTemplate {
    /// Parse a template. The error is a human-readable reason; the caller
    /// attaches the document name.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("empty permission template".to_string());
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(format!("unbalanced '{{' in template '{}'", raw))
                            }
                            Some(ch) => name.push(ch),
                        }
                    }
                    let placeholder = Placeholder::from_name(&name).ok_or_else(|| {
                        format!("unknown placeholder '{{{}}}' in template '{}'", name, raw)
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(placeholder));
                }
                '}' => return Err(format!("unbalanced '}}' in template '{}'", raw)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholders the template references, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    pub fn is_literal(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Substitute every placeholder from `ctx`.
    pub fn expand(&self, ctx: &PolicyContext) -> Result<String, PolicyError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(p) => {
                    let value = ctx.get(p.key()).ok_or_else(|| PolicyError::MissingPlaceholder {
                        placeholder: p.key().to_string(),
                        template: self.raw.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PermissionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
