use anyhow::{anyhow, Result};

use super::display::{money, print_quotation, print_quotation_line};
use super::{IdvArgs, QuoteCommand, QuoteCompanyArgs, QuoteCreateArgs};
use crate::config::PricingConfig;
use crate::db::Database;
use crate::error::Error;
use crate::family::FamilyManager;
use crate::models::{AddonBreakdown, AddonCover, IdvComponents, Quotation, QuotationCompany, QuotationStatus};
use crate::premium::{compute_total_idv, price_quote, rank_quotes};

/// Execute a quote subcommand
pub fn run_quote(db: &Database, command: QuoteCommand) -> Result<()> {
    match command {
        QuoteCommand::Create(args) => {
            let quotation = create_quotation(db, args)?;
            println!(
                "Created quotation {} (total IDV {})",
                quotation.id,
                money(quotation.total_idv)
            );
        }
        QuoteCommand::AddCompany(args) => {
            let quote = add_company_quote(db, args)?;
            println!(
                "{}: final premium {} (rank #{})",
                quote.insurance_company,
                money(quote.final_premium),
                quote.ranking
            );
        }
        QuoteCommand::Show(args) => {
            let quotation = db
                .get_quotation(args.quotation)?
                .ok_or_else(|| Error::not_found("quotation", args.quotation))?;
            let companies = db.list_quotation_companies(quotation.id)?;
            print_quotation(&quotation, &companies);
        }
        QuoteCommand::Viewable(args) => {
            let quotations = FamilyManager::new(db).viewable_quotations(args.customer)?;
            if quotations.is_empty() {
                println!("No quotations.");
            }
            for quotation in &quotations {
                print_quotation_line(quotation);
            }
        }
    }
    Ok(())
}

impl From<IdvArgs> for IdvComponents {
    fn from(args: IdvArgs) -> Self {
        Self {
            vehicle: args.idv_vehicle,
            trailer: args.idv_trailer,
            cng_lpg_kit: args.idv_cng,
            electrical_accessories: args.idv_electrical,
            non_electrical_accessories: args.idv_non_electrical,
        }
    }
}

/// Collect add-on covers keyed by name. A name given twice is rejected.
fn collect_addons(addons: Vec<(String, AddonCover)>) -> crate::error::Result<AddonBreakdown> {
    let mut covers = AddonBreakdown::new();
    for (name, cover) in addons {
        if covers.contains_key(&name) {
            return Err(Error::validation(
                "addon_covers",
                format!("add-on {:?} given more than once", name),
            ));
        }
        covers.insert(name, cover);
    }
    Ok(covers)
}

pub fn create_quotation(db: &Database, args: QuoteCreateArgs) -> Result<Quotation> {
    db.get_customer_by_id(args.customer)?
        .ok_or_else(|| Error::not_found("customer", args.customer))?;

    let mut quotation = Quotation::new(args.customer);
    quotation.vehicle_number = args.vehicle_number;
    quotation.make_model_variant = args.make_model;
    quotation.rto_location = args.rto;
    quotation.manufacturing_year = args.year;
    quotation.fuel_type = args.fuel;
    quotation.notes = args.notes;
    quotation.idv = args.idv.into();
    quotation.total_idv = compute_total_idv(&quotation.idv)?;

    db.insert_quotation(&quotation)?;
    log::info!("created quotation {} for customer {}", quotation.id, quotation.customer_id);
    Ok(quotation)
}

/// Price one insurer's quote, store it, and re-rank every quote of the
/// quotation. A second quote from the same insurer replaces the first.
pub fn add_company_quote(db: &Database, args: QuoteCompanyArgs) -> Result<QuotationCompany> {
    let rates = PricingConfig::load(db)?.gst_rates();

    db.in_transaction(|db| -> Result<QuotationCompany> {
        let quotation = db
            .get_quotation(args.quotation)?
            .ok_or_else(|| Error::not_found("quotation", args.quotation))?;
        let existing = db.list_quotation_companies(quotation.id)?;

        let company = args.company.trim();
        if company.is_empty() {
            return Err(Error::validation("insurance_company", "insurer name is required").into());
        }

        let mut quote = QuotationCompany::new(quotation.id, company);
        if let Some(previous) = existing
            .iter()
            .find(|q| q.insurance_company.eq_ignore_ascii_case(company))
        {
            quote.id = previous.id;
        }
        quote.plan_name = args.plan;
        quote.quote_number = args.quote_number;
        quote.basic_od_premium = args.od;
        quote.tp_premium = args.tp;
        quote.cng_lpg_premium = args.cng_premium;
        quote.idv = quotation.idv.clone();
        quote.addon_covers = collect_addons(args.addons)?;
        quote.is_recommended = args.recommend;
        quote.recommendation_note = args.recommendation_note;

        price_quote(&mut quote, &rates)?;
        db.upsert_quotation_company(&quote)?;

        let mut all = db.list_quotation_companies(quotation.id)?;
        if quote.is_recommended {
            for other in all.iter_mut().filter(|q| q.id != quote.id) {
                other.is_recommended = false;
            }
        }
        rank_quotes(&mut all);
        for ranked in &all {
            db.upsert_quotation_company(ranked)?;
        }

        if quotation.status == QuotationStatus::Draft {
            db.update_quotation_status(quotation.id, QuotationStatus::Generated)?;
        }

        all.into_iter()
            .find(|q| q.id == quote.id)
            .ok_or_else(|| anyhow!("quote {} vanished while ranking", quote.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddonCover, Customer};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> (Database, Quotation) {
        let db = Database::open_memory().unwrap();
        let customer = Customer::new("Asha Smith");
        db.insert_customer(&customer).unwrap();

        let quotation = create_quotation(
            &db,
            QuoteCreateArgs {
                customer: customer.id,
                vehicle_number: Some("MH01AB1234".to_string()),
                make_model: None,
                rto: None,
                year: Some(2022),
                fuel: Some("cng".to_string()),
                idv: IdvArgs {
                    idv_vehicle: Some(d("500000")),
                    idv_trailer: Some(d("0")),
                    idv_cng: Some(d("20000")),
                    idv_electrical: Some(d("5000")),
                    idv_non_electrical: None,
                },
                notes: None,
            },
        )
        .unwrap();
        (db, quotation)
    }

    fn company_args(quotation: Uuid, company: &str, od: &str) -> QuoteCompanyArgs {
        QuoteCompanyArgs {
            quotation,
            company: company.to_string(),
            plan: None,
            quote_number: None,
            od: d(od),
            tp: d("3500"),
            cng_premium: d("0"),
            addons: vec![("zero_dep".to_string(), AddonCover::new(d("1000")))],
            recommend: false,
            recommendation_note: None,
        }
    }

    #[test]
    fn create_quotation_totals_idv() {
        let (db, quotation) = setup();
        assert_eq!(quotation.total_idv, d("525000"));
        let stored = db.get_quotation(quotation.id).unwrap().unwrap();
        assert_eq!(stored.total_idv, d("525000"));
    }

    #[test]
    fn create_quotation_for_unknown_customer_fails() {
        let db = Database::open_memory().unwrap();
        let args = QuoteCreateArgs {
            customer: Uuid::new_v4(),
            vehicle_number: None,
            make_model: None,
            rto: None,
            year: None,
            fuel: None,
            idv: IdvArgs::default(),
            notes: None,
        };
        let err = create_quotation(&db, args).unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_not_found());
    }

    #[test]
    fn add_company_prices_and_ranks() {
        let (db, quotation) = setup();

        // 10000 + 3500 + 1000 = 14500 net, 1305 + 1305 GST, 17110 final
        let first = add_company_quote(&db, company_args(quotation.id, "Acme General", "10000")).unwrap();
        assert_eq!(first.net_premium, d("14500"));
        assert_eq!(first.sgst_amount, d("1305.00"));
        assert_eq!(first.final_premium, d("17110.00"));
        assert_eq!(first.total_idv, d("525000"));
        assert_eq!(first.ranking, 1);

        let cheaper = add_company_quote(&db, company_args(quotation.id, "Budget Insure", "8000")).unwrap();
        assert_eq!(cheaper.ranking, 1);

        let ranked = db.list_quotation_companies(quotation.id).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].insurance_company, "Budget Insure");
        assert_eq!(ranked[1].ranking, 2);

        let stored = db.get_quotation(quotation.id).unwrap().unwrap();
        assert_eq!(stored.status, QuotationStatus::Generated);
    }

    #[test]
    fn same_insurer_replaces_previous_quote() {
        let (db, quotation) = setup();
        add_company_quote(&db, company_args(quotation.id, "Acme General", "10000")).unwrap();
        add_company_quote(&db, company_args(quotation.id, "acme general", "9000")).unwrap();

        let companies = db.list_quotation_companies(quotation.id).unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].basic_od_premium, d("9000"));
    }

    #[test]
    fn invalid_quote_writes_nothing() {
        let (db, quotation) = setup();
        let mut args = company_args(quotation.id, "Acme General", "10000");
        args.addons = vec![("rsa".to_string(), AddonCover::new(d("-5")))];

        let err = add_company_quote(&db, args).unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_validation());
        assert!(db.list_quotation_companies(quotation.id).unwrap().is_empty());
        assert_eq!(db.get_quotation(quotation.id).unwrap().unwrap().status, QuotationStatus::Draft);
    }

    #[test]
    fn duplicate_addon_name_is_rejected() {
        let (db, quotation) = setup();
        let mut args = company_args(quotation.id, "Acme General", "10000");
        args.addons = vec![
            ("rsa".to_string(), AddonCover::new(d("300"))),
            ("rsa".to_string(), AddonCover::new(d("200"))),
        ];

        let err = add_company_quote(&db, args).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>().unwrap().field(), Some("addon_covers"));
        assert!(db.list_quotation_companies(quotation.id).unwrap().is_empty());
    }

    #[test]
    fn viewable_command_runs_for_owner() {
        let (db, quotation) = setup();
        run_quote(&db, QuoteCommand::Viewable(crate::cli::ViewableArgs { customer: quotation.customer_id })).unwrap();

        let err = run_quote(&db, QuoteCommand::Viewable(crate::cli::ViewableArgs { customer: Uuid::new_v4() }))
            .unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_not_found());
    }

    #[test]
    fn only_one_recommended_quote() {
        let (db, quotation) = setup();
        let mut first = company_args(quotation.id, "Acme General", "10000");
        first.recommend = true;
        add_company_quote(&db, first).unwrap();

        let mut second = company_args(quotation.id, "Budget Insure", "8000");
        second.recommend = true;
        add_company_quote(&db, second).unwrap();

        let recommended: Vec<String> = db
            .list_quotation_companies(quotation.id)
            .unwrap()
            .into_iter()
            .filter(|q| q.is_recommended)
            .map(|q| q.insurance_company)
            .collect();
        assert_eq!(recommended, vec!["Budget Insure"]);
    }
}
