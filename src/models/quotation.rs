use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest note allowed on an add-on cover.
pub const ADDON_NOTE_MAX_CHARS: usize = 100;

/// Insured Declared Value split by component. `None` counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdvComponents {
    pub vehicle: Option<Decimal>,
    pub trailer: Option<Decimal>,
    pub cng_lpg_kit: Option<Decimal>,
    pub electrical_accessories: Option<Decimal>,
    pub non_electrical_accessories: Option<Decimal>,
}

impl IdvComponents {
    /// (field name, value) pairs in a fixed order.
    pub fn fields(&self) -> [(&'static str, Option<Decimal>); 5] {
        [
            ("idv_vehicle", self.vehicle),
            ("idv_trailer", self.trailer),
            ("idv_cng_lpg_kit", self.cng_lpg_kit),
            ("idv_electrical_accessories", self.electrical_accessories),
            ("idv_non_electrical_accessories", self.non_electrical_accessories),
        ]
    }
}

/// An optional supplementary cover with its own premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonCover {
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AddonCover {
    pub fn new(price: Decimal) -> Self {
        Self { price, note: None }
    }

    pub fn with_note(price: Decimal, note: impl Into<String>) -> Self {
        Self {
            price,
            note: Some(note.into()),
        }
    }
}

/// Cover name -> cover. Ordered so JSON output is stable.
pub type AddonBreakdown = BTreeMap<String, AddonCover>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Generated,
    Sent,
    Accepted,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "generated" => Self::Generated,
            "sent" => Self::Sent,
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::Draft,
        }
    }
}

/// A quotation request for a customer's vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_number: Option<String>,
    pub make_model_variant: Option<String>,
    pub rto_location: Option<String>,
    pub manufacturing_year: Option<i32>,
    pub fuel_type: Option<String>,
    pub idv: IdvComponents,
    pub total_idv: Decimal,
    pub status: QuotationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn new(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            vehicle_number: None,
            make_model_variant: None,
            rto_location: None,
            manufacturing_year: None,
            fuel_type: None,
            idv: IdvComponents::default(),
            total_idv: Decimal::ZERO,
            status: QuotationStatus::default(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One insurer's quote on a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationCompany {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub insurance_company: String,
    pub plan_name: Option<String>,
    pub quote_number: Option<String>,
    pub basic_od_premium: Decimal,
    pub tp_premium: Decimal,
    pub cng_lpg_premium: Decimal,
    pub idv: IdvComponents,
    pub total_idv: Decimal,
    pub addon_covers: AddonBreakdown,
    pub total_addon_premium: Decimal,
    pub net_premium: Decimal,
    pub sgst_amount: Decimal,
    pub cgst_amount: Decimal,
    /// Net premium plus both GST amounts, before any rounding-off.
    pub total_premium: Decimal,
    pub final_premium: Decimal,
    pub is_recommended: bool,
    pub recommendation_note: Option<String>,
    pub ranking: u32,
}

impl QuotationCompany {
    pub fn new(quotation_id: Uuid, insurance_company: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quotation_id,
            insurance_company: insurance_company.into(),
            plan_name: None,
            quote_number: None,
            basic_od_premium: Decimal::ZERO,
            tp_premium: Decimal::ZERO,
            cng_lpg_premium: Decimal::ZERO,
            idv: IdvComponents::default(),
            total_idv: Decimal::ZERO,
            addon_covers: AddonBreakdown::new(),
            total_addon_premium: Decimal::ZERO,
            net_premium: Decimal::ZERO,
            sgst_amount: Decimal::ZERO,
            cgst_amount: Decimal::ZERO,
            total_premium: Decimal::ZERO,
            final_premium: Decimal::ZERO,
            is_recommended: false,
            recommendation_note: None,
            ranking: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotation_status_parse() {
        assert_eq!(QuotationStatus::parse("sent"), QuotationStatus::Sent);
        assert_eq!(QuotationStatus::parse("accepted"), QuotationStatus::Accepted);
        assert_eq!(QuotationStatus::parse("bogus"), QuotationStatus::Draft);
    }

    #[test]
    fn test_addon_breakdown_json_shape() {
        let mut addons = AddonBreakdown::new();
        addons.insert("zero_dep".to_string(), AddonCover::with_note(Decimal::new(1200, 0), "bumper to bumper"));
        addons.insert("rsa".to_string(), AddonCover::new(Decimal::new(300, 0)));

        let json = serde_json::to_string(&addons).unwrap();
        assert_eq!(
            json,
            r#"{"rsa":{"price":"300"},"zero_dep":{"price":"1200","note":"bumper to bumper"}}"#
        );
    }

    #[test]
    fn test_idv_fields_order() {
        let idv = IdvComponents {
            vehicle: Some(Decimal::new(500000, 0)),
            ..Default::default()
        };
        let fields = idv.fields();
        assert_eq!(fields[0], ("idv_vehicle", Some(Decimal::new(500000, 0))));
        assert_eq!(fields[4].1, None);
    }
}
