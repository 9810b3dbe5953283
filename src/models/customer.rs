use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub pan_card_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub customer_type: CustomerType,
    pub status: Status,
    /// Set only by the family manager.
    pub family_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    #[default]
    Retail,
    Corporate,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Corporate => "corporate",
        }
    }

}

impl FromStr for CustomerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retail" => Ok(Self::Retail),
            "corporate" => Ok(Self::Corporate),
            other => Err(Error::validation(
                "customer_type",
                format!("unknown customer type {:?} (expected retail or corporate)", other),
            )),
        }
    }
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            mobile_number: None,
            pan_card_number: None,
            date_of_birth: None,
            customer_type: CustomerType::default(),
            status: Status::default(),
            family_group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_family(&self) -> bool {
        self.family_group_id.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
