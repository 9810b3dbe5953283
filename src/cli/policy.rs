use anyhow::Result;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::display::{money, print_commission, print_policy_line};
use super::{PolicyAddArgs, PolicyCommand};
use crate::config::PricingConfig;
use crate::db::Database;
use crate::error::Error;
use crate::family::FamilyManager;
use crate::models::CustomerInsurance;
use crate::premium::{
    apply_commission, calculate_commission_breakdown, compute_final_premium, compute_gst, compute_net_premium,
    ensure_non_negative,
};

/// Execute a policy subcommand
pub fn run_policy(db: &Database, command: PolicyCommand) -> Result<()> {
    match command {
        PolicyCommand::Add(args) => {
            let policy = add_policy(db, args)?;
            println!(
                "Added policy {} (earnings {})",
                policy.policy_no,
                money(policy.actual_earnings)
            );
        }
        PolicyCommand::Commission(args) => {
            let policy = find_policy(db, &args.policy)?;
            let breakdown = calculate_commission_breakdown(&policy)?;
            print_commission(&policy, &breakdown);
        }
        PolicyCommand::Viewable(args) => {
            let policies = FamilyManager::new(db).viewable_policies(args.customer)?;
            if policies.is_empty() {
                println!("No policies.");
            }
            for policy in &policies {
                print_policy_line(policy);
            }
        }
    }
    Ok(())
}

/// Record a policy with its GST, final premium and commission filled in.
pub fn add_policy(db: &Database, args: PolicyAddArgs) -> Result<CustomerInsurance> {
    db.get_customer_by_id(args.customer)?
        .ok_or_else(|| Error::not_found("customer", args.customer))?;

    let policy_no = args.policy_no.trim();
    if policy_no.is_empty() {
        return Err(Error::validation("policy_no", "policy number is required").into());
    }
    if db.get_policy_by_number(policy_no)?.is_some() {
        return Err(Error::conflict("policy_no", format!("policy {} already exists", policy_no)).into());
    }

    ensure_non_negative("od_premium", args.od)?;
    ensure_non_negative("tp_premium", args.tp)?;
    let net_premium = match args.net {
        Some(net) => net,
        None => compute_net_premium(args.od, args.tp, Decimal::ZERO, Decimal::ZERO)?,
    };
    ensure_non_negative("net_premium", net_premium)?;

    let rates = PricingConfig::load(db)?.gst_rates();

    let mut policy = CustomerInsurance::new(args.customer, policy_no);
    policy.insurance_company = args.company;
    policy.registration_no = args.registration_no;
    policy.start_date = args.start_date;
    policy.expired_date = args.expired_date;
    policy.od_premium = args.od;
    policy.tp_premium = args.tp;
    policy.net_premium = net_premium;
    policy.commission_on = args.commission_on;
    policy.my_commission_percentage = args.commission;
    policy.transfer_commission_percentage = args.transfer;

    let gst = compute_gst(policy.net_premium, rates.sgst, rates.cgst)?;
    policy.gst = gst.total()?;
    policy.final_premium = compute_final_premium(policy.net_premium, gst.sgst_amount, gst.cgst_amount)?;
    apply_commission(&mut policy)?;

    db.insert_policy(&policy)?;
    log::info!("added policy {} for customer {}", policy.policy_no, policy.customer_id);
    Ok(policy)
}

/// Look a policy up by UUID or policy number.
pub fn find_policy(db: &Database, identifier: &str) -> Result<CustomerInsurance> {
    let identifier = identifier.trim();
    let found = match Uuid::parse_str(identifier) {
        Ok(id) => db.get_policy_by_id(id)?,
        Err(_) => db.get_policy_by_number(identifier)?,
    };
    found.ok_or_else(|| Error::not_found("policy", identifier).into())
}
