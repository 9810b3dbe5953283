//! Pricing configuration
//!
//! GST rates come from environment variables first, then the
//! `app_settings` table, then built-in defaults.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::db::Database;
use crate::premium::GstRates;

// Settings keys for database storage
pub const SETTING_SGST_RATE: &str = "sgst_rate";
pub const SETTING_CGST_RATE: &str = "cgst_rate";

// Environment variable names
const ENV_SGST_RATE: &str = "BROKERDESK_SGST_RATE";
const ENV_CGST_RATE: &str = "BROKERDESK_CGST_RATE";

/// 9 % state + 9 % central.
pub fn default_gst_rate() -> Decimal {
    Decimal::new(9, 2)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub sgst_rate: Decimal,
    pub cgst_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            sgst_rate: default_gst_rate(),
            cgst_rate: default_gst_rate(),
        }
    }
}

impl PricingConfig {
    /// Load configuration from environment variables and database settings.
    /// Environment variables take precedence over database settings.
    pub fn load(db: &Database) -> Result<Self> {
        let sgst_rate = Self::resolve(db, ENV_SGST_RATE, SETTING_SGST_RATE)?;
        let cgst_rate = Self::resolve(db, ENV_CGST_RATE, SETTING_CGST_RATE)?;

        Ok(Self {
            sgst_rate: sgst_rate.unwrap_or_else(default_gst_rate),
            cgst_rate: cgst_rate.unwrap_or_else(default_gst_rate),
        })
    }

    fn resolve(db: &Database, env_key: &str, setting_key: &str) -> Result<Option<Decimal>> {
        if let Ok(raw) = env::var(env_key) {
            match parse_rate(&raw) {
                Ok(rate) => return Ok(Some(rate)),
                Err(e) => log::warn!("ignoring {}={:?}: {}", env_key, raw, e),
            }
        }

        if let Some(raw) = db.get_setting(setting_key)? {
            match parse_rate(&raw) {
                Ok(rate) => return Ok(Some(rate)),
                Err(e) => log::warn!("ignoring stored setting {}={:?}: {}", setting_key, raw, e),
            }
        }

        Ok(None)
    }

    pub fn gst_rates(&self) -> GstRates {
        GstRates::new(self.sgst_rate, self.cgst_rate)
    }

    /// Save the current configuration to the database
    pub fn save(&self, db: &Database) -> Result<()> {
        db.set_setting(SETTING_SGST_RATE, &self.sgst_rate.to_string())?;
        db.set_setting(SETTING_CGST_RATE, &self.cgst_rate.to_string())?;
        Ok(())
    }

    /// Drop stored rates so the defaults apply again. Returns whether
    /// anything was stored.
    pub fn reset(db: &Database) -> Result<bool> {
        let sgst = db.delete_setting(SETTING_SGST_RATE)?;
        let cgst = db.delete_setting(SETTING_CGST_RATE)?;
        Ok(sgst || cgst)
    }
}

/// Parse a GST rate. Accepts a fraction ("0.09") or a percentage ("9%").
pub fn parse_rate(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    let rate = match raw.strip_suffix('%') {
        Some(pct) => Decimal::from_str(pct.trim())? / Decimal::ONE_HUNDRED,
        None => Decimal::from_str(raw)?,
    };
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        bail!("rate must be between 0 and 1 (or 0% and 100%)");
    }
    Ok(rate)
}
