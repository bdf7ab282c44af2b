// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Role based capability sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    RecordMacros,
    PlayMacros,
    EditScripts,
    ImportExport,
    CreateProfiles,
    UseImageRecognition,
    ManageUsers,
    AdvancedSettings,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::RecordMacros,
        Permission::PlayMacros,
        Permission::EditScripts,
        Permission::ImportExport,
        Permission::CreateProfiles,
        Permission::UseImageRecognition,
        Permission::ManageUsers,
        Permission::AdvancedSettings,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Permission::RecordMacros => "Record Macros",
            Permission::PlayMacros => "Play Macros",
            Permission::EditScripts => "Edit Scripts",
            Permission::ImportExport => "Import/Export Scripts",
            Permission::CreateProfiles => "Create Profiles",
            Permission::UseImageRecognition => "Use Image Recognition",
            Permission::ManageUsers => "Manage Users",
            Permission::AdvancedSettings => "Access Advanced Settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Admin,
    PowerUser,
    Standard,
    Limited,
}

impl Role {
    pub fn default_permissions(&self) -> CapabilitySet {
        use Permission::*;
        match self {
            Role::Admin => CapabilitySet::all(),
            Role::PowerUser => CapabilitySet::from_iter([
                RecordMacros,
                PlayMacros,
                EditScripts,
                ImportExport,
                CreateProfiles,
                UseImageRecognition,
            ]),
            Role::Standard => {
                CapabilitySet::from_iter([RecordMacros, PlayMacros, EditScripts, CreateProfiles])
            }
            Role::Limited => CapabilitySet::from_iter([PlayMacros]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    granted: BTreeSet<Permission>,
}

impl CapabilitySet {
    pub fn all() -> Self {
        Self::from_iter(Permission::ALL)
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }

    pub fn grant(&mut self, permission: Permission) {
        self.granted.insert(permission);
    }

    pub fn revoke(&mut self, permission: Permission) {
        self.granted.remove(&permission);
    }
}

impl FromIterator<Permission> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults() {
        let admin = Role::Admin.default_permissions();
        assert!(admin.allows(Permission::ManageUsers));

        let power = Role::PowerUser.default_permissions();
        assert!(power.allows(Permission::UseImageRecognition));
        assert!(!power.allows(Permission::ManageUsers));
        assert!(!power.allows(Permission::AdvancedSettings));

        let standard = Role::Standard.default_permissions();
        assert!(standard.allows(Permission::RecordMacros));
        assert!(!standard.allows(Permission::ImportExport));

        let limited = Role::Limited.default_permissions();
        assert!(limited.allows(Permission::PlayMacros));
        assert!(!limited.allows(Permission::RecordMacros));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut caps = Role::Limited.default_permissions();
        caps.grant(Permission::RecordMacros);
        assert!(caps.allows(Permission::RecordMacros));
        caps.revoke(Permission::PlayMacros);
        assert!(!caps.allows(Permission::PlayMacros));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Role::PowerUser).unwrap(),
            "\"power_user\""
        );
        assert_eq!(
            serde_json::from_str::<Permission>("\"play_macros\"").unwrap(),
            Permission::PlayMacros
        );
    }
}
