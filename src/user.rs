//! Users and roles.

use std::fmt;

/// Role string attached to a user. `admin`, `manager` and `employee` are the
/// built-ins the engine recognizes; anything else (`cfo`, ...) is carried
/// through verbatim and can still be named by a Specific rule.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(transparent)]
pub struct Role(#[n(0)] String);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const MANAGER: &'static str = "manager";
    pub const EMPLOYEE: &'static str = "employee";

    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    pub fn manager() -> Self {
        Self::new(Self::MANAGER)
    }

    pub fn employee() -> Self {
        Self::new(Self::EMPLOYEE)
    }

    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN
    }

    pub fn is_manager(&self) -> bool {
        self.0 == Self::MANAGER
    }

    pub fn is_employee(&self) -> bool {
        self.0 == Self::EMPLOYEE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

/// A member of the organization. `manager` is a weak reference by username;
/// the stored reporting graph is not guaranteed acyclic, the chain resolver
/// guards against cycles on its own.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub username: String,
    #[n(1)]
    pub role: Role,
    #[n(2)]
    pub manager: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role, manager: Option<String>) -> Self {
        Self {
            username: username.into(),
            role,
            manager,
        }
    }
}
