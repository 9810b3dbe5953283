use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{AddonCover, CommissionBasis, MemberInput, ADDON_NOTE_MAX_CHARS};

pub mod customer;
pub mod display;
pub mod family;
pub mod import;
pub mod policy;
pub mod quote;
pub mod settings;

pub use customer::{run_customer_add, run_customer_list, run_customer_show};
pub use family::run_family;
pub use import::run_import;
pub use policy::run_policy;
pub use quote::run_quote;
pub use settings::run_config;

#[derive(Parser)]
#[command(name = "brokerdesk")]
#[command(about = "Insurance brokerage desk: customers, families, quotes and policies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add, list, show and import customers
    #[command(subcommand)]
    Customer(CustomerCommand),
    /// Manage family groups and their members
    #[command(subcommand)]
    Family(FamilyCommand),
    /// Build and compare vehicle insurance quotations
    #[command(subcommand)]
    Quote(QuoteCommand),
    /// Record policies and compute commission
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Show or change pricing settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

// ==================== CUSTOMER ====================

#[derive(Subcommand)]
pub enum CustomerCommand {
    /// Add a new customer
    Add(CustomerAddArgs),
    /// List customers
    List(CustomerListArgs),
    /// Show a customer by id or email
    Show(CustomerShowArgs),
    /// Import customers from a CSV file
    Import(ImportArgs),
}

#[derive(Args)]
pub struct CustomerAddArgs {
    pub name: String,
    #[arg(short, long)]
    pub email: Option<String>,
    #[arg(short, long)]
    pub mobile: Option<String>,
    #[arg(long)]
    pub pan: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub dob: Option<NaiveDate>,
    #[arg(long)]
    pub corporate: bool,
}

#[derive(Args)]
pub struct CustomerListArgs {
    #[arg(short, long, default_value = "1")]
    pub page: u32,
    #[arg(short, long, default_value = "20")]
    pub limit: u32,
    /// Filter by name, email or mobile number
    #[arg(short, long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct CustomerShowArgs {
    /// Customer UUID or email address
    pub identifier: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    #[arg(short, long)]
    pub dry_run: bool,
}

// ==================== FAMILY ====================

#[derive(Subcommand)]
pub enum FamilyCommand {
    /// Create a family group
    Create(FamilyCreateArgs),
    /// Replace a group's name, head and full member list
    Update(FamilyUpdateArgs),
    /// Show a group and its members
    Show(GroupArg),
    /// List all family groups
    List,
    /// Make another member the head of the group
    ChangeHead(ChangeHeadArgs),
    /// Add a customer to a group
    AddMember(AddMemberArgs),
    /// Remove a non-head member from a group
    RemoveMember(RemoveMemberArgs),
    /// Delete a group and release its members
    Delete(FamilyDeleteArgs),
    /// Activate or deactivate a group
    Status(FamilyStatusArgs),
    /// List customers that can join a group
    Available(AvailableArgs),
    /// Remove inconsistent member rows and repair heads
    Cleanup,
}

#[derive(Args)]
pub struct FamilyCreateArgs {
    pub name: String,
    /// Customer UUID of the family head
    #[arg(long)]
    pub head: Uuid,
    /// Member as UUID or UUID:relationship (repeatable)
    #[arg(short, long = "member", value_parser = parse_member)]
    pub members: Vec<MemberInput>,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Args)]
pub struct FamilyUpdateArgs {
    pub group: Uuid,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub head: Uuid,
    /// Member as UUID or UUID:relationship (repeatable)
    #[arg(short, long = "member", value_parser = parse_member)]
    pub members: Vec<MemberInput>,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Args)]
pub struct GroupArg {
    pub group: Uuid,
}

#[derive(Args)]
pub struct ChangeHeadArgs {
    pub group: Uuid,
    /// Customer UUID of the new head
    pub customer: Uuid,
}

#[derive(Args)]
pub struct AddMemberArgs {
    pub group: Uuid,
    pub customer: Uuid,
    #[arg(short, long)]
    pub relationship: Option<String>,
}

#[derive(Args)]
pub struct RemoveMemberArgs {
    pub group: Uuid,
    /// Member row UUID (see `family show`)
    pub member: Uuid,
}

#[derive(Args)]
pub struct FamilyDeleteArgs {
    pub group: Uuid,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct FamilyStatusArgs {
    pub group: Uuid,
    /// Mark the group inactive; without it the group is activated
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Args)]
pub struct AvailableArgs {
    /// Also include the current members of this group
    #[arg(long)]
    pub group: Option<Uuid>,
}

// ==================== QUOTE ====================

#[derive(Subcommand)]
pub enum QuoteCommand {
    /// Start a quotation for a customer's vehicle
    Create(QuoteCreateArgs),
    /// Add or replace one insurer's quote and re-rank
    AddCompany(QuoteCompanyArgs),
    /// Show a quotation with its ranked company quotes
    Show(QuoteShowArgs),
    /// List quotations visible to a customer
    Viewable(ViewableArgs),
}

#[derive(Args)]
pub struct QuoteCreateArgs {
    #[arg(long)]
    pub customer: Uuid,
    #[arg(long)]
    pub vehicle_number: Option<String>,
    #[arg(long)]
    pub make_model: Option<String>,
    #[arg(long)]
    pub rto: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub fuel: Option<String>,
    #[command(flatten)]
    pub idv: IdvArgs,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Clone, Default)]
pub struct IdvArgs {
    #[arg(long)]
    pub idv_vehicle: Option<Decimal>,
    #[arg(long)]
    pub idv_trailer: Option<Decimal>,
    #[arg(long)]
    pub idv_cng: Option<Decimal>,
    #[arg(long)]
    pub idv_electrical: Option<Decimal>,
    #[arg(long)]
    pub idv_non_electrical: Option<Decimal>,
}

#[derive(Args)]
pub struct QuoteCompanyArgs {
    pub quotation: Uuid,
    #[arg(short, long)]
    pub company: String,
    #[arg(long)]
    pub plan: Option<String>,
    #[arg(long)]
    pub quote_number: Option<String>,
    #[arg(long, default_value = "0")]
    pub od: Decimal,
    #[arg(long, default_value = "0")]
    pub tp: Decimal,
    #[arg(long, default_value = "0")]
    pub cng_premium: Decimal,
    /// Add-on cover as name=price or name=price:note (repeatable)
    #[arg(short, long = "addon", value_parser = parse_addon)]
    pub addons: Vec<(String, AddonCover)>,
    #[arg(long)]
    pub recommend: bool,
    #[arg(long)]
    pub recommendation_note: Option<String>,
}

#[derive(Args)]
pub struct QuoteShowArgs {
    pub quotation: Uuid,
}

// ==================== POLICY ====================

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Record a policy and compute its commission
    Add(PolicyAddArgs),
    /// Show the commission breakdown of a policy
    Commission(PolicyRefArgs),
    /// List policies visible to a customer
    Viewable(ViewableArgs),
}

#[derive(Args)]
pub struct PolicyAddArgs {
    #[arg(long)]
    pub customer: Uuid,
    #[arg(long)]
    pub policy_no: String,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub registration_no: Option<String>,
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    #[arg(long)]
    pub expired_date: Option<NaiveDate>,
    #[arg(long, default_value = "0")]
    pub od: Decimal,
    #[arg(long, default_value = "0")]
    pub tp: Decimal,
    /// Defaults to OD + TP
    #[arg(long)]
    pub net: Option<Decimal>,
    /// Commission basis: net, od or tp
    #[arg(long, default_value = "net")]
    pub commission_on: CommissionBasis,
    /// My commission in percent
    #[arg(long, default_value = "0")]
    pub commission: Decimal,
    /// Commission passed on to a sub-agent, in percent
    #[arg(long, default_value = "0")]
    pub transfer: Decimal,
}

#[derive(Args)]
pub struct PolicyRefArgs {
    /// Policy UUID or policy number
    pub policy: String,
}

#[derive(Args)]
pub struct ViewableArgs {
    /// Acting customer UUID
    pub customer: Uuid,
}

// ==================== CONFIG ====================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective pricing settings
    Show,
    /// Store GST rates (fraction like 0.09 or percent like 9%)
    SetGst(SetGstArgs),
    /// Forget stored GST rates and use the defaults
    ResetGst,
}

#[derive(Args)]
pub struct SetGstArgs {
    #[arg(long)]
    pub sgst: String,
    #[arg(long)]
    pub cgst: String,
}

// ==================== ARGUMENT PARSERS ====================

/// `UUID` or `UUID:relationship`.
pub fn parse_member(raw: &str) -> Result<MemberInput, String> {
    let (id, relationship) = match raw.split_once(':') {
        Some((id, rel)) => (id, Some(rel.trim()).filter(|r| !r.is_empty())),
        None => (raw, None),
    };
    let customer_id =
        Uuid::parse_str(id.trim()).map_err(|e| format!("invalid customer id {:?}: {}", id, e))?;
    Ok(MemberInput::new(customer_id, relationship))
}

/// `name=price` or `name=price:note`.
pub fn parse_addon(raw: &str) -> Result<(String, AddonCover), String> {
    let (name, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=price, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("add-on name is empty".to_string());
    }

    let (price, note) = match rest.split_once(':') {
        Some((price, note)) => (price, Some(note.trim())),
        None => (rest, None),
    };
    let price = Decimal::from_str(price.trim()).map_err(|e| format!("invalid price {:?}: {}", price, e))?;

    let cover = match note.filter(|n| !n.is_empty()) {
        Some(note) if note.chars().count() > ADDON_NOTE_MAX_CHARS => {
            return Err(format!("note longer than {} characters", ADDON_NOTE_MAX_CHARS));
        }
        Some(note) => AddonCover::with_note(price, note),
        None => AddonCover::new(price),
    };
    Ok((name.to_string(), cover))
}
