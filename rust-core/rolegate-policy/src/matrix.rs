// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Static role -> permission matrix.
//
// Separate from the rule documents: documents say which permission an
// operation needs, the matrix says which roles carry it. A permission that is
// not listed is granted to nobody.

use std::collections::{BTreeSet, HashMap};

use rolegate_model::Role;

const MEMBERS: &[Role] = &[Role::Owner, Role::Admin, Role::Editor, Role::Viewer];
const EDITORS: &[Role] = &[Role::Owner, Role::Admin, Role::Editor];
const ADMINS: &[Role] = &[Role::Owner, Role::Admin];
const OWNERS: &[Role] = &[Role::Owner];
const MODERATORS: &[Role] = &[Role::Moderator];

const GRANTS: &[(&str, &[Role])] = &[
    // System (namespace) scope.
    ("system.create_owner", MODERATORS),
    ("system.read", MEMBERS),
    ("system.list_members", MEMBERS),
    ("system.add_member", ADMINS),
    ("system.remove_member", ADMINS),
    ("system.transfer_owner", OWNERS),
    ("system.read_history", ADMINS),
    // Dashboards.
    ("resource.dashboard.delete", OWNERS),
    ("resource.dashboard.list_members", MEMBERS),
    ("resource.dashboard.add_member", ADMINS),
    ("resource.dashboard.add_viewer", EDITORS),
    ("resource.dashboard.remove_member", ADMINS),
    ("resource.dashboard.transfer_owner", OWNERS),
    ("resource.dashboard.read_history", ADMINS),
    ("resource.dashboard.add_widget", EDITORS),
    ("resource.dashboard.add_widget_viewer", EDITORS),
    ("resource.dashboard.remove_widget_viewer", EDITORS),
    // Dashboard widgets.
    ("resource.dashboard_widget.read", MEMBERS),
    ("resource.dashboard_widget.delete", ADMINS),
    ("resource.dashboard_widget.list_members", MEMBERS),
    ("resource.dashboard_widget.transfer_owner", OWNERS),
    ("resource.dashboard_widget.read_history", ADMINS),
    // Library widgets.
    ("resource.library_widget.delete", OWNERS),
    ("resource.library_widget.list_members", MEMBERS),
    ("resource.library_widget.add_member", ADMINS),
    ("resource.library_widget.add_viewer", EDITORS),
    ("resource.library_widget.remove_member", ADMINS),
    ("resource.library_widget.transfer_owner", OWNERS),
    ("resource.library_widget.read_history", ADMINS),
];

#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<&'static str, BTreeSet<Role>>,
}

impl PermissionMatrix {
    /// The built-in matrix.
    pub fn standard() -> Self {
        let grants = GRANTS
            .iter()
            .map(|(permission, roles)| (*permission, roles.iter().copied().collect()))
            .collect();
        Self { grants }
    }

    /// Every role granted `permission`; empty for an unknown permission.
    pub fn roles_with_permission(&self, permission: &str) -> BTreeSet<Role> {
        self.grants.get(permission).cloned().unwrap_or_default()
    }

    /// Every permission `role` carries, sorted.
    pub fn permissions_of(&self, role: Role) -> Vec<&'static str> {
        let mut found: Vec<_> = self
            .grants
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(p, _)| *p)
            .collect();
        found.sort_unstable();
        found
    }

    pub fn knows(&self, permission: &str) -> bool {
        self.grants.contains_key(permission)
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}
