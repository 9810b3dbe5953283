use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;
use crate::error::Error;

/// Premium component a commission percentage is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommissionBasis {
    #[default]
    NetPremium,
    OdPremium,
    TpPremium,
}

impl CommissionBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetPremium => "net_premium",
            Self::OdPremium => "od_premium",
            Self::TpPremium => "tp_premium",
        }
    }

}

impl FromStr for CommissionBasis {
    type Err = Error;

    /// Accepts the stored names and the short forms `net`, `od` and `tp`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "net_premium" | "net" => Ok(Self::NetPremium),
            "od_premium" | "od" => Ok(Self::OdPremium),
            "tp_premium" | "tp" => Ok(Self::TpPremium),
            other => Err(Error::validation(
                "commission_on",
                format!("unknown commission basis {:?} (expected net, od or tp)", other),
            )),
        }
    }
}

/// A bound insurance policy held by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInsurance {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub policy_no: String,
    pub registration_no: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub expired_date: Option<NaiveDate>,
    pub insurance_company: Option<String>,
    pub branch: Option<String>,
    pub broker: Option<String>,
    pub relationship_manager: Option<String>,
    pub premium_type: Option<String>,
    pub policy_type: Option<String>,
    pub od_premium: Decimal,
    pub tp_premium: Decimal,
    pub net_premium: Decimal,
    pub gst: Decimal,
    pub final_premium: Decimal,
    pub commission_on: CommissionBasis,
    pub my_commission_percentage: Decimal,
    pub my_commission_amount: Decimal,
    pub transfer_commission_percentage: Decimal,
    pub transfer_commission_amount: Decimal,
    pub actual_earnings: Decimal,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerInsurance {
    pub fn new(customer_id: Uuid, policy_no: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            policy_no: policy_no.into(),
            registration_no: None,
            issue_date: None,
            start_date: None,
            expired_date: None,
            insurance_company: None,
            branch: None,
            broker: None,
            relationship_manager: None,
            premium_type: None,
            policy_type: None,
            od_premium: Decimal::ZERO,
            tp_premium: Decimal::ZERO,
            net_premium: Decimal::ZERO,
            gst: Decimal::ZERO,
            final_premium: Decimal::ZERO,
            commission_on: CommissionBasis::default(),
            my_commission_percentage: Decimal::ZERO,
            my_commission_amount: Decimal::ZERO,
            transfer_commission_percentage: Decimal::ZERO,
            transfer_commission_amount: Decimal::ZERO,
            actual_earnings: Decimal::ZERO,
            status: Status::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Premium amount selected by `commission_on`.
    pub fn commission_basis_amount(&self) -> Decimal {
        match self.commission_on {
            CommissionBasis::NetPremium => self.net_premium,
            CommissionBasis::OdPremium => self.od_premium,
            CommissionBasis::TpPremium => self.tp_premium,
        }
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expired_date.map_or(false, |d| d < date)
    }
}
