use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::Database;
use crate::models::{Customer, CustomerType};

/// A row from a customer CSV file.
///
/// Headers must match field names exactly (`mobile_number`, not `Mobile`).
/// Empty cells become `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    pub name: String,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub mobile_number: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub pan_card_number: Option<String>,

    /// YYYY-MM-DD
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_of_birth: Option<String>,

    /// "retail" (default) or "corporate"
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub customer_type: Option<String>,
}

impl ImportRow {
    /// Validate required fields and formats.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("name is required and cannot be empty");
        }
        if let Some(ref dob) = self.date_of_birth {
            NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d")
                .with_context(|| format!("date_of_birth {:?} is not YYYY-MM-DD", dob))?;
        }
        if let Some(ref email) = self.email {
            if !email.contains('@') {
                bail!("email {:?} is not an email address", email);
            }
        }
        if let Some(ref customer_type) = self.customer_type {
            customer_type.parse::<CustomerType>()?;
        }
        Ok(())
    }

    fn to_customer(&self) -> Customer {
        let mut customer = Customer::new(self.name.trim());
        customer.email = self.email.as_deref().map(|e| e.trim().to_string());
        customer.mobile_number = self.mobile_number.as_deref().map(|m| m.trim().to_string());
        customer.pan_card_number = self.pan_card_number.as_deref().map(|p| p.trim().to_uppercase());
        customer.date_of_birth = self
            .date_of_birth
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
        customer.customer_type = self
            .customer_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();
        customer
    }
}

/// Deserialize empty strings as None.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

/// Import results summary.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub customers: u32,
    pub duplicates: u32,
    pub errors: u32,
}

/// Execute the import command.
pub fn run_import(db: &Database, file: &Path, dry_run: bool) -> Result<ImportStats> {
    if !file.exists() {
        bail!("File not found: {}", file.display());
    }

    let reader = File::open(file).context("Failed to open CSV file")?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut stats = ImportStats::default();

    if dry_run {
        eprintln!("Dry run: {}", file.display());
    } else {
        eprintln!("Importing: {}", file.display());
    }

    // Emails seen earlier in this file count as duplicates too
    let mut seen_emails = std::collections::HashSet::new();

    for (idx, result) in csv_reader.deserialize::<ImportRow>().enumerate() {
        let line = idx + 2; // CSV line number (1-indexed, skip header)

        let row = match result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Line {}: parse error: {}", line, e);
                stats.errors += 1;
                continue;
            }
        };

        if let Err(e) = row.validate() {
            eprintln!("Line {}: validation error: {:#}", line, e);
            stats.errors += 1;
            continue;
        }

        if let Some(ref email) = row.email {
            let key = email.trim().to_lowercase();
            if !seen_emails.insert(key) || db.get_customer_by_email(email.trim())?.is_some() {
                log::debug!("line {}: skipping duplicate email {}", line, email);
                stats.duplicates += 1;
                continue;
            }
        }

        if !dry_run {
            let customer = row.to_customer();
            if let Err(e) = db.insert_customer(&customer) {
                eprintln!("Line {}: {}", line, e);
                stats.errors += 1;
                continue;
            }
        }
        stats.customers += 1;
    }

    log::info!(
        "import of {}: {} customers, {} duplicates, {} errors",
        file.display(),
        stats.customers,
        stats.duplicates,
        stats.errors
    );
    print_summary(&stats, dry_run);
    Ok(stats)
}

fn print_summary(stats: &ImportStats, dry_run: bool) {
    let verb = if dry_run { "Would create" } else { "Created" };
    println!("\n{} {} customers", verb, stats.customers);

    if stats.duplicates > 0 {
        println!("Skipped {} duplicates", stats.duplicates);
    }
    if stats.errors > 0 {
        println!("Errors: {}", stats.errors);
    }
}
