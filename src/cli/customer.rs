use anyhow::{bail, Result};
use uuid::Uuid;

use super::display::{print_customer, print_customer_line};
use super::{CustomerAddArgs, CustomerListArgs};
use crate::db::Database;
use crate::models::{Customer, CustomerType};

/// Execute the customer add command
pub fn run_customer_add(db: &Database, args: CustomerAddArgs) -> Result<Customer> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("Name cannot be empty.");
    }

    let email = args.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    if let Some(ref email) = email {
        if db.get_customer_by_email(email)?.is_some() {
            bail!("A customer with email {} already exists.", email);
        }
    }

    let mut customer = Customer::new(name);
    customer.email = email;
    customer.mobile_number = args.mobile.filter(|m| !m.trim().is_empty());
    customer.pan_card_number = args.pan.map(|p| p.trim().to_uppercase()).filter(|p| !p.is_empty());
    customer.date_of_birth = args.dob;
    if args.corporate {
        customer.customer_type = CustomerType::Corporate;
    }

    db.insert_customer(&customer)?;
    log::info!("added customer {} ({:?})", customer.id, customer.name);
    println!("Added {} ({})", customer.name, customer.id);
    Ok(customer)
}

/// Execute the customer list command
pub fn run_customer_list(db: &Database, args: CustomerListArgs) -> Result<()> {
    let limit = args.limit.max(1);

    let customers = match args.search.as_deref().map(str::trim) {
        Some(query) if !query.is_empty() => db.search_customers(query, limit)?,
        _ => {
            let offset = args.page.saturating_sub(1) * limit;
            db.list_customers(limit, offset)?
        }
    };

    if customers.is_empty() {
        println!("No customers.");
        return Ok(());
    }

    for customer in &customers {
        print_customer_line(customer);
    }

    if args.search.is_none() {
        let total = db.count_customers()?;
        let pages = total.div_ceil(limit).max(1);
        println!("\nPage {} of {} ({} customers)", args.page.max(1), pages, total);
    }
    Ok(())
}

/// Execute the customer show command
pub fn run_customer_show(db: &Database, identifier: &str) -> Result<()> {
    match find_customer(db, identifier)? {
        Some(customer) => print_customer(&customer),
        None => println!("No customer found: {}", identifier.trim()),
    }
    Ok(())
}

/// Look a customer up by UUID or, failing that, by email.
pub fn find_customer(db: &Database, identifier: &str) -> Result<Option<Customer>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        bail!("Identifier cannot be empty.");
    }

    if let Ok(id) = Uuid::parse_str(identifier) {
        return db.get_customer_by_id(id);
    }
    if identifier.contains('@') {
        return db.get_customer_by_email(identifier);
    }
    bail!("Expected a customer UUID or email, got {:?}", identifier)
}
