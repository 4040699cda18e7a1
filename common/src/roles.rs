use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Who is making a request. Sent by the client in the role header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Roles {
    /// Full access, including the query console
    Admin,

    /// Read access to everything, including reports and supervision
    Executive,

    /// Read access to the entity lists and the safety search
    Staff,
}

/// Everything a role may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    ViewEntities,
    SafetySearch,
    ViewReports,
    ViewSupervision,
    Create,
    Update,
    Delete,
    DevConsole,
}

impl Roles {
    pub const ALL: [Roles; 3] = [Roles::Admin, Roles::Executive, Roles::Staff];

    pub fn permissions(&self) -> BTreeSet<Permission> {
        use Permission::*;

        match self {
            Roles::Admin => BTreeSet::from([
                ViewEntities,
                SafetySearch,
                ViewReports,
                ViewSupervision,
                Create,
                Update,
                Delete,
                DevConsole,
            ]),
            Roles::Executive => BTreeSet::from([ViewEntities, SafetySearch, ViewReports, ViewSupervision]),
            Roles::Staff => BTreeSet::from([ViewEntities, SafetySearch]),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Roles {
    type Err = ();

    /// Role names are matched ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Roles::ALL.into_iter().find(|role| role.to_string().eq_ignore_ascii_case(s.trim())).ok_or(())
    }
}

/// The response of the auth endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: Roles,
    pub permissions: BTreeSet<Permission>,
}

impl From<Roles> for RoleInfo {
    fn from(role: Roles) -> Self {
        RoleInfo { role, permissions: role.permissions() }
    }
}
