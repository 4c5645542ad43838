use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ReadRecords,
    WriteRecords,
    DeleteRecords,
    UseInsights,
    ManageMembers,
    ManageSettings,
    ManageBilling,
    DeleteOrganization,
}

const OWNER_PERMISSIONS: &[Permission] = &[
    Permission::ReadRecords,
    Permission::WriteRecords,
    Permission::DeleteRecords,
    Permission::UseInsights,
    Permission::ManageMembers,
    Permission::ManageSettings,
    Permission::ManageBilling,
    Permission::DeleteOrganization,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ReadRecords,
    Permission::WriteRecords,
    Permission::DeleteRecords,
    Permission::UseInsights,
    Permission::ManageMembers,
    Permission::ManageSettings,
];

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::ReadRecords,
    Permission::WriteRecords,
    Permission::UseInsights,
];

const VIEWER_PERMISSIONS: &[Permission] = &[Permission::ReadRecords];

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Viewer => "VIEWER",
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Member => 2,
            Role::Viewer => 1,
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Owner => OWNER_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Member => MEMBER_PERMISSIONS,
            Role::Viewer => VIEWER_PERMISSIONS,
        }
    }

    pub fn can(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(Role::Owner),
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            "VIEWER" => Ok(Role::Viewer),
            _ => Err(AuthzError::Unknown {
                kind: "role",
                value: value.to_string(),
            }),
        }
    }
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ReadRecords => "READ_RECORDS",
            Permission::WriteRecords => "WRITE_RECORDS",
            Permission::DeleteRecords => "DELETE_RECORDS",
            Permission::UseInsights => "USE_INSIGHTS",
            Permission::ManageMembers => "MANAGE_MEMBERS",
            Permission::ManageSettings => "MANAGE_SETTINGS",
            Permission::ManageBilling => "MANAGE_BILLING",
            Permission::DeleteOrganization => "DELETE_ORGANIZATION",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Viewer ".parse::<Role>().unwrap(), Role::Viewer);
        assert!("SALES".parse::<Role>().is_err());
    }

    #[test]
    fn higher_roles_hold_every_lower_permission() {
        for pair in Role::ALL.windows(2) {
            let (higher, lower) = (pair[0], pair[1]);
            assert!(higher.level() > lower.level());
            assert!(lower.permissions().iter().all(|p| higher.can(*p)));
        }
    }
}
