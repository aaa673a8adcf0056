//! Explicit user/role context handed to operations that depend on who is
//! asking. There is no process-wide "current user".

pub mod visibility;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub use visibility::{ProductField, ProductView, VisibilityPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "customer" => Ok(Self::Customer),
            other => Err(DomainError::invalid_input(format!("invalid role `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewAllQuotes,
    ManageProducts,
    ViewReports,
    ManageCustomers,
    ViewOwnQuotes,
    RequestQuotes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.user.permissions.contains(&permission)
    }

    pub fn is_agent(&self) -> bool {
        self.user.role == Role::Agent
    }

    pub fn is_customer(&self) -> bool {
        self.user.role == Role::Customer
    }

    /// Actor label for audit events and logs.
    pub fn actor(&self) -> &str {
        &self.user.email
    }
}

/// Fixed set of known users; switching role yields a fresh session.
#[derive(Clone, Debug)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    pub fn demo() -> Self {
        use Permission::*;

        Self::new(vec![
            User {
                id: 1,
                name: "John Agent".to_owned(),
                email: "john.agent@company.com".to_owned(),
                role: Role::Agent,
                permissions: BTreeSet::from([
                    ViewAllQuotes,
                    ManageProducts,
                    ViewReports,
                    ManageCustomers,
                ]),
            },
            User {
                id: 2,
                name: "Jane Customer".to_owned(),
                email: "jane.customer@company.com".to_owned(),
                role: Role::Customer,
                permissions: BTreeSet::from([ViewOwnQuotes, RequestQuotes]),
            },
        ])
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Default session: the first user in the directory.
    pub fn default_session(&self) -> Option<Session> {
        self.users.first().cloned().map(Session::new)
    }

    pub fn switch_role(&self, role: Role) -> Result<Session, DomainError> {
        self.users
            .iter()
            .find(|user| user.role == role)
            .cloned()
            .map(Session::new)
            .ok_or_else(|| DomainError::invalid_input(format!("no user holds the {role} role")))
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::demo()
    }
}
