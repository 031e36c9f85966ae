//! User schema
//!
//! Minimal per-tenant user record. Identity attributes live with the
//! external identity provider; this document anchors the tenant relation
//! and login bookkeeping. Rows are provisioned on a subject's first login
//! and only `last_login_at` mutates afterwards.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Role of a user within its tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    #[default]
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            _ => Err(()),
        }
    }
}

/// A tenant user
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Identity-provider subject, unique across the platform
    pub subject: String,

    /// Owning tenant
    pub tenant_id: Uuid,

    #[serde(default)]
    pub role: UserRole,

    /// Most recent login
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<bson::DateTime>,
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "subject": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("subject_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tenant_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_tenant".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("owner".parse::<UserRole>(), Ok(UserRole::Owner));
        assert_eq!("member".parse::<UserRole>(), Ok(UserRole::Member));
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serializes_snake_case() {
        assert_eq!(serde_json::to_value(UserRole::Owner).unwrap(), "owner");
    }
}
