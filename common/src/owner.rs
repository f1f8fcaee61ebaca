use serde::{Deserialize, Serialize};

/// Stored field names, for store queries.
pub mod fields {
    pub const EMAIL: &str = "correo";
}

/// An account allowed to manage the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
    /// `salt$digest`, both hex. Never leaves the server.
    #[serde(rename = "password")]
    pub password_hash: String,
}

/// What an authenticated owner may see about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerProfile {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
}

impl From<&Owner> for OwnerProfile {
    fn from(owner: &Owner) -> Self {
        OwnerProfile {
            name: owner.name.clone(),
            email: owner.email.clone(),
        }
    }
}
