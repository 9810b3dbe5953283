use chrono::Local;
use rust_decimal::Decimal;

use crate::models::{Customer, CustomerInsurance, FamilyGroup, FamilyMember, Quotation, QuotationCompany};
use crate::premium::CommissionBreakdown;

/// Print a customer with only the fields that are set
pub fn print_customer(customer: &Customer) {
    println!("{}\n", customer.name);
    println!("  id      {}", customer.id);
    if let Some(ref email) = customer.email {
        println!("  email   {}", email);
    }
    if let Some(ref mobile) = customer.mobile_number {
        println!("  mobile  {}", mobile);
    }
    if let Some(ref pan) = customer.pan_card_number {
        println!("  pan     {}", pan);
    }
    if let Some(dob) = customer.date_of_birth {
        println!("  born    {}", dob.format("%Y-%m-%d"));
    }
    println!("  type    {}", customer.customer_type.as_str());
    println!("  status  {}", customer.status);
    if let Some(group) = customer.family_group_id {
        println!("  family  {}", group);
    }
}

/// One line per customer, for lists
pub fn print_customer_line(customer: &Customer) {
    let contact = customer
        .email
        .as_deref()
        .or(customer.mobile_number.as_deref())
        .unwrap_or("");
    let family = if customer.has_family() { " [family]" } else { "" };
    println!("{}  {:<30} {}{}", customer.id, truncate(&customer.name, 30), contact, family);
}

pub fn print_family_group(group: &FamilyGroup, members: &[(FamilyMember, Customer)]) {
    println!("{} ({})\n", group.name, group.status);
    println!("  id  {}", group.id);
    println!();
    for (member, customer) in members {
        let marker = if member.is_head { "*" } else { " " };
        let relationship = member.relationship.as_deref().unwrap_or("-");
        println!(
            "  {} {:<30} {:<10} member {}",
            marker,
            truncate(&customer.name, 30),
            relationship,
            member.id
        );
    }
}

fn vehicle_label(quotation: &Quotation) -> &str {
    quotation
        .vehicle_number
        .as_deref()
        .or(quotation.make_model_variant.as_deref())
        .unwrap_or("(vehicle)")
}

pub fn print_quotation(quotation: &Quotation, companies: &[QuotationCompany]) {
    let vehicle = vehicle_label(quotation);
    println!("{} [{}]\n", vehicle, quotation.status.as_str());
    println!("  id         {}", quotation.id);
    println!("  customer   {}", quotation.customer_id);
    println!("  total IDV  {}", money(quotation.total_idv));
    if let Some(ref notes) = quotation.notes {
        println!("  notes      {}", notes);
    }

    if companies.is_empty() {
        println!("\n  No company quotes yet.");
        return;
    }

    println!();
    for qc in companies {
        let star = if qc.is_recommended { "*" } else { " " };
        println!(
            "  #{:<2}{} {:<24} net {:>12}  gst {:>10}  final {:>12}  idv {}",
            qc.ranking,
            star,
            truncate(&qc.insurance_company, 24),
            money(qc.net_premium),
            money(qc.sgst_amount.saturating_add(qc.cgst_amount)),
            money(qc.final_premium),
            money(qc.total_idv),
        );
        for (name, cover) in &qc.addon_covers {
            match cover.note {
                Some(ref note) => println!("        + {} {} ({})", name, money(cover.price), note),
                None => println!("        + {} {}", name, money(cover.price)),
            }
        }
        if let Some(ref note) = qc.recommendation_note {
            println!("        {}", note);
        }
    }
}

pub fn print_quotation_line(quotation: &Quotation) {
    println!(
        "{}  {:<16} {:<10} IDV {:>12}  customer {}",
        quotation.id,
        truncate(vehicle_label(quotation), 16),
        quotation.status.as_str(),
        money(quotation.total_idv),
        quotation.customer_id
    );
}

pub fn print_policy_line(policy: &CustomerInsurance) {
    let company = policy.insurance_company.as_deref().unwrap_or("-");
    let mut expires = policy
        .expired_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    if policy.is_expired_on(Local::now().date_naive()) {
        expires.push_str(" (expired)");
    }
    println!(
        "{:<20} {:<24} final {:>12}  expires {}  customer {}",
        policy.policy_no,
        truncate(company, 24),
        money(policy.final_premium),
        expires,
        policy.customer_id
    );
}

pub fn print_commission(policy: &CustomerInsurance, breakdown: &CommissionBreakdown) {
    println!("{} ({})\n", policy.policy_no, policy.commission_on.as_str());
    println!("  basis            {:>12}", money(breakdown.basis_amount));
    println!(
        "  my commission    {:>12}  ({}%)",
        money(breakdown.commission_amount),
        policy.my_commission_percentage
    );
    println!(
        "  transferred      {:>12}  ({}%)",
        money(breakdown.transfer_commission_amount),
        policy.transfer_commission_percentage
    );
    println!("  actual earnings  {:>12}", money(breakdown.actual_earnings));
}

/// Format an amount with two decimals
pub fn money(d: Decimal) -> String {
    format!("{:.2}", d)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let text: String = s.chars().take(max - 1).collect();
        format!("{}…", text.trim_end())
    } else {
        s.to_string()
    }
}
