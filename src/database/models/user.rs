use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Role;

/// Directory entry for a user of one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}
