use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// Directory entry kept for every registered account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub role: Role,
    pub status: Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    PendingVerification,
    Verified,
    Rejected,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingVerification => "pending_verification",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl Member {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            status: Status::PendingVerification,
        }
    }

    pub fn verified(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            status: Status::Verified,
        }
    }
}
