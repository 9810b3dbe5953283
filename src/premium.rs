//! Premium, IDV and commission arithmetic.
//!
//! Everything here is a pure function of its arguments: no I/O, no shared
//! state. The same inputs always produce the same amounts, so a form can
//! recompute them on every keystroke and the stored record will still match
//! when it is saved.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    AddonBreakdown, CustomerInsurance, IdvComponents, QuotationCompany, ADDON_NOTE_MAX_CHARS,
};

/// Decimal places kept on amounts derived from a rate.
pub const AMOUNT_DP: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn round_amount(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn ensure_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::validation(field, format!("must not be negative (got {})", value)));
    }
    Ok(())
}

fn out_of_range(field: &str) -> Error {
    Error::validation(field, "amount out of range")
}

/// Sum of amounts, failing on overflow instead of panicking.
fn checked_sum(field: &str, amounts: &[Decimal]) -> Result<Decimal> {
    amounts.iter().try_fold(Decimal::ZERO, |total, &amount| {
        total.checked_add(amount).ok_or_else(|| out_of_range(field))
    })
}

/// Sum of the five IDV components. Missing components count as zero.
pub fn compute_total_idv(components: &IdvComponents) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for (field, value) in components.fields() {
        let value = value.unwrap_or(Decimal::ZERO);
        ensure_non_negative(field, value)?;
        total = total.checked_add(value).ok_or_else(|| out_of_range("total_idv"))?;
    }
    Ok(total)
}

/// Sum of add-on cover prices. Notes carry no weight but are length-checked.
pub fn compute_addon_total(addons: &AddonBreakdown) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for (name, cover) in addons {
        let field = format!("addon_covers.{}", name);
        ensure_non_negative(&field, cover.price)?;
        if let Some(note) = &cover.note {
            if note.chars().count() > ADDON_NOTE_MAX_CHARS {
                return Err(Error::validation(
                    format!("{}.note", field),
                    format!("must be at most {} characters", ADDON_NOTE_MAX_CHARS),
                ));
            }
        }
        total = total
            .checked_add(cover.price)
            .ok_or_else(|| out_of_range("total_addon_premium"))?;
    }
    Ok(total)
}

pub fn compute_net_premium(
    basic_od_premium: Decimal,
    tp_premium: Decimal,
    cng_lpg_premium: Decimal,
    addon_total: Decimal,
) -> Result<Decimal> {
    checked_sum(
        "net_premium",
        &[basic_od_premium, tp_premium, cng_lpg_premium, addon_total],
    )
}

/// State and central GST on a net premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstSplit {
    pub sgst_amount: Decimal,
    pub cgst_amount: Decimal,
}

impl GstSplit {
    pub fn total(&self) -> Result<Decimal> {
        checked_sum("gst", &[self.sgst_amount, self.cgst_amount])
    }
}

/// GST rates as decimal fractions (0.09 is 9 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstRates {
    pub sgst: Decimal,
    pub cgst: Decimal,
}

impl GstRates {
    pub fn new(sgst: Decimal, cgst: Decimal) -> Self {
        Self { sgst, cgst }
    }
}

fn ensure_rate(field: &str, rate: Decimal) -> Result<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(Error::validation(
            field,
            format!("must be a fraction between 0 and 1 (got {})", rate),
        ));
    }
    Ok(())
}

pub fn compute_gst(net_premium: Decimal, sgst_rate: Decimal, cgst_rate: Decimal) -> Result<GstSplit> {
    ensure_rate("sgst_rate", sgst_rate)?;
    ensure_rate("cgst_rate", cgst_rate)?;

    let tax = |field: &str, rate: Decimal| {
        net_premium
            .checked_mul(rate)
            .map(round_amount)
            .ok_or_else(|| out_of_range(field))
    };
    Ok(GstSplit {
        sgst_amount: tax("sgst_amount", sgst_rate)?,
        cgst_amount: tax("cgst_amount", cgst_rate)?,
    })
}

pub fn compute_final_premium(net_premium: Decimal, sgst_amount: Decimal, cgst_amount: Decimal) -> Result<Decimal> {
    checked_sum("final_premium", &[net_premium, sgst_amount, cgst_amount])
}

/// Split of a policy's commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    /// Premium amount the percentages were applied to.
    pub basis_amount: Decimal,
    pub commission_amount: Decimal,
    pub transfer_commission_amount: Decimal,
    pub actual_earnings: Decimal,
}

fn ensure_percentage(field: &str, pct: Decimal) -> Result<()> {
    if pct < Decimal::ZERO || pct > HUNDRED {
        return Err(Error::validation(
            field,
            format!("must be between 0 and 100 (got {})", pct),
        ));
    }
    Ok(())
}

pub fn calculate_commission_breakdown(policy: &CustomerInsurance) -> Result<CommissionBreakdown> {
    ensure_percentage("my_commission_percentage", policy.my_commission_percentage)?;
    ensure_percentage(
        "transfer_commission_percentage",
        policy.transfer_commission_percentage,
    )?;

    let basis_amount = policy.commission_basis_amount();
    let share = |field: &str, pct: Decimal| {
        basis_amount
            .checked_mul(pct)
            .and_then(|v| v.checked_div(HUNDRED))
            .map(round_amount)
            .ok_or_else(|| out_of_range(field))
    };
    let commission_amount = share("my_commission_amount", policy.my_commission_percentage)?;
    let transfer_commission_amount = share(
        "transfer_commission_amount",
        policy.transfer_commission_percentage,
    )?;
    let actual_earnings = commission_amount
        .checked_sub(transfer_commission_amount)
        .ok_or_else(|| out_of_range("actual_earnings"))?;

    Ok(CommissionBreakdown {
        basis_amount,
        commission_amount,
        transfer_commission_amount,
        actual_earnings,
    })
}

/// Recompute the stored commission summary fields of a policy.
pub fn apply_commission(policy: &mut CustomerInsurance) -> Result<CommissionBreakdown> {
    let breakdown = calculate_commission_breakdown(policy)?;
    policy.my_commission_amount = breakdown.commission_amount;
    policy.transfer_commission_amount = breakdown.transfer_commission_amount;
    policy.actual_earnings = breakdown.actual_earnings;
    Ok(breakdown)
}

/// Fill every derived field of a company quote from its itemized inputs.
pub fn price_quote(quote: &mut QuotationCompany, rates: &GstRates) -> Result<()> {
    ensure_non_negative("basic_od_premium", quote.basic_od_premium)?;
    ensure_non_negative("tp_premium", quote.tp_premium)?;
    ensure_non_negative("cng_lpg_premium", quote.cng_lpg_premium)?;

    let total_idv = compute_total_idv(&quote.idv)?;
    let addon_total = compute_addon_total(&quote.addon_covers)?;
    let net = compute_net_premium(
        quote.basic_od_premium,
        quote.tp_premium,
        quote.cng_lpg_premium,
        addon_total,
    )?;
    let gst = compute_gst(net, rates.sgst, rates.cgst)?;
    let final_premium = compute_final_premium(net, gst.sgst_amount, gst.cgst_amount)?;

    quote.total_idv = total_idv;
    quote.total_addon_premium = addon_total;
    quote.net_premium = net;
    quote.sgst_amount = gst.sgst_amount;
    quote.cgst_amount = gst.cgst_amount;
    quote.total_premium = final_premium;
    quote.final_premium = final_premium;
    Ok(())
}

/// Assign rankings 1..n: cheapest final premium first, then higher IDV,
/// then insurer name.
pub fn rank_quotes(quotes: &mut [QuotationCompany]) {
    quotes.sort_by(|a, b| {
        a.final_premium
            .cmp(&b.final_premium)
            .then_with(|| b.total_idv.cmp(&a.total_idv))
            .then_with(|| a.insurance_company.cmp(&b.insurance_company))
    });
    for (i, quote) in quotes.iter_mut().enumerate() {
        quote.ranking = i as u32 + 1;
    }
}
