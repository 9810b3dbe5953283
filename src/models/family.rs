use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// Relationship label stored on the head's member row when none is given.
pub const HEAD_RELATIONSHIP: &str = "self";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyGroup {
    pub id: Uuid,
    pub name: String,
    pub family_head_id: Uuid,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FamilyGroup {
    pub fn new(name: impl Into<String>, family_head_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            family_head_id,
            status: Status::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Join row linking a customer to a family group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Uuid,
    pub family_group_id: Uuid,
    pub customer_id: Uuid,
    /// Free-form label: spouse, child, parent, ...
    pub relationship: Option<String>,
    pub is_head: bool,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FamilyMember {
    pub fn new(family_group_id: Uuid, customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            family_group_id,
            customer_id,
            relationship: None,
            is_head: false,
            status: Status::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_head(family_group_id: Uuid, customer_id: Uuid) -> Self {
        Self {
            relationship: Some(HEAD_RELATIONSHIP.to_string()),
            is_head: true,
            ..Self::new(family_group_id, customer_id)
        }
    }
}

/// One requested member of a group being created or updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInput {
    pub customer_id: Uuid,
    pub relationship: Option<String>,
}

impl MemberInput {
    pub fn new(customer_id: Uuid, relationship: Option<&str>) -> Self {
        Self {
            customer_id,
            relationship: relationship.map(str::to_string),
        }
    }
}

/// Full desired state of a family group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFamilyGroup {
    pub name: String,
    pub head_customer_id: Uuid,
    /// Members other than the head.
    pub members: Vec<MemberInput>,
    pub status: Status,
}

impl NewFamilyGroup {
    pub fn new(name: impl Into<String>, head_customer_id: Uuid) -> Self {
        Self {
            name: name.into(),
            head_customer_id,
            members: Vec::new(),
            status: Status::default(),
        }
    }

    pub fn with_member(mut self, customer_id: Uuid, relationship: Option<&str>) -> Self {
        self.members.push(MemberInput::new(customer_id, relationship));
        self
    }
}
