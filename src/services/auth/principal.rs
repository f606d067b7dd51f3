use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed role set of the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

/// The authenticated actor of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            name: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin or manager.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }

    pub fn owns(&self, owner_id: Option<Uuid>) -> bool {
        owner_id == Some(self.id)
    }
}
