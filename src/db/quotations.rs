use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{format_decimal, parse_datetime, parse_decimal, parse_optional_decimal, parse_uuid, Database};
use crate::models::*;

impl Database {
    // ==================== QUOTATION ====================

    pub fn insert_quotation(&self, q: &Quotation) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO quotations (
                id, customer_id, vehicle_number, make_model_variant, rto_location,
                manufacturing_year, fuel_type, idv_vehicle, idv_trailer, idv_cng_lpg_kit,
                idv_electrical_accessories, idv_non_electrical_accessories, total_idv,
                status, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                q.id.to_string(),
                q.customer_id.to_string(),
                q.vehicle_number,
                q.make_model_variant,
                q.rto_location,
                q.manufacturing_year,
                q.fuel_type,
                format_decimal(q.idv.vehicle),
                format_decimal(q.idv.trailer),
                format_decimal(q.idv.cng_lpg_kit),
                format_decimal(q.idv.electrical_accessories),
                format_decimal(q.idv.non_electrical_accessories),
                q.total_idv.to_string(),
                q.status.as_str(),
                q.notes,
                q.created_at.to_rfc3339(),
                q.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>> {
        let result = self.conn.query_row(
            "SELECT * FROM quotations WHERE id = ?",
            [id.to_string()],
            Self::row_to_quotation,
        );

        match result {
            Ok(q) => Ok(Some(q)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_quotations_for_customers(&self, customer_ids: &[Uuid]) -> Result<Vec<Quotation>> {
        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; customer_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM quotations WHERE customer_id IN ({}) ORDER BY created_at DESC",
            placeholders
        );

        let ids: Vec<String> = customer_ids.iter().map(|id| id.to_string()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let quotations = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), Self::row_to_quotation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(quotations)
    }

    pub fn update_quotation_status(&self, id: Uuid, status: QuotationStatus) -> Result<bool> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE quotations SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now.to_rfc3339(), id.to_string()],
        )?;
        Ok(rows > 0)
    }

    // ==================== QUOTATION COMPANY ====================

    /// Insert or replace a company quote (keyed by id).
    pub fn upsert_quotation_company(&self, qc: &QuotationCompany) -> Result<()> {
        let addons =
            serde_json::to_string(&qc.addon_covers).context("Failed to encode add-on covers")?;

        self.conn.execute(
            r#"INSERT OR REPLACE INTO quotation_companies (
                id, quotation_id, insurance_company, plan_name, quote_number,
                basic_od_premium, tp_premium, cng_lpg_premium,
                idv_vehicle, idv_trailer, idv_cng_lpg_kit,
                idv_electrical_accessories, idv_non_electrical_accessories, total_idv,
                addon_covers, total_addon_premium, net_premium, sgst_amount, cgst_amount,
                total_premium, final_premium, is_recommended, recommendation_note, ranking
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                qc.id.to_string(),
                qc.quotation_id.to_string(),
                qc.insurance_company,
                qc.plan_name,
                qc.quote_number,
                qc.basic_od_premium.to_string(),
                qc.tp_premium.to_string(),
                qc.cng_lpg_premium.to_string(),
                format_decimal(qc.idv.vehicle),
                format_decimal(qc.idv.trailer),
                format_decimal(qc.idv.cng_lpg_kit),
                format_decimal(qc.idv.electrical_accessories),
                format_decimal(qc.idv.non_electrical_accessories),
                qc.total_idv.to_string(),
                addons,
                qc.total_addon_premium.to_string(),
                qc.net_premium.to_string(),
                qc.sgst_amount.to_string(),
                qc.cgst_amount.to_string(),
                qc.total_premium.to_string(),
                qc.final_premium.to_string(),
                qc.is_recommended as i32,
                qc.recommendation_note,
                qc.ranking,
            ],
        )?;
        Ok(())
    }

    /// Company quotes of a quotation, best ranking first.
    pub fn list_quotation_companies(&self, quotation_id: Uuid) -> Result<Vec<QuotationCompany>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM quotation_companies WHERE quotation_id = ?
             ORDER BY ranking ASC, insurance_company ASC",
        )?;

        let companies = stmt
            .query_map([quotation_id.to_string()], Self::row_to_quotation_company)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(companies)
    }

    // ==================== ROW MAPPERS ====================

    fn row_to_idv(row: &Row) -> rusqlite::Result<IdvComponents> {
        Ok(IdvComponents {
            vehicle: parse_optional_decimal(row.get("idv_vehicle")?)?,
            trailer: parse_optional_decimal(row.get("idv_trailer")?)?,
            cng_lpg_kit: parse_optional_decimal(row.get("idv_cng_lpg_kit")?)?,
            electrical_accessories: parse_optional_decimal(row.get("idv_electrical_accessories")?)?,
            non_electrical_accessories: parse_optional_decimal(
                row.get("idv_non_electrical_accessories")?,
            )?,
        })
    }

    fn row_to_quotation(row: &Row) -> rusqlite::Result<Quotation> {
        let id: String = row.get("id")?;
        let customer_id: String = row.get("customer_id")?;
        let total_idv: String = row.get("total_idv")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(Quotation {
            id: parse_uuid(&id)?,
            customer_id: parse_uuid(&customer_id)?,
            vehicle_number: row.get("vehicle_number")?,
            make_model_variant: row.get("make_model_variant")?,
            rto_location: row.get("rto_location")?,
            manufacturing_year: row.get("manufacturing_year")?,
            fuel_type: row.get("fuel_type")?,
            idv: Self::row_to_idv(row)?,
            total_idv: parse_decimal(&total_idv)?,
            status: QuotationStatus::parse(&status),
            notes: row.get("notes")?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    fn row_to_quotation_company(row: &Row) -> rusqlite::Result<QuotationCompany> {
        let id: String = row.get("id")?;
        let quotation_id: String = row.get("quotation_id")?;
        let addons_json: String = row.get("addon_covers")?;
        let addon_covers: AddonBreakdown = serde_json::from_str(&addons_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let money = |col: &str| -> rusqlite::Result<Decimal> {
            parse_decimal(&row.get::<_, String>(col)?)
        };

        Ok(QuotationCompany {
            id: parse_uuid(&id)?,
            quotation_id: parse_uuid(&quotation_id)?,
            insurance_company: row.get("insurance_company")?,
            plan_name: row.get("plan_name")?,
            quote_number: row.get("quote_number")?,
            basic_od_premium: money("basic_od_premium")?,
            tp_premium: money("tp_premium")?,
            cng_lpg_premium: money("cng_lpg_premium")?,
            idv: Self::row_to_idv(row)?,
            total_idv: money("total_idv")?,
            addon_covers,
            total_addon_premium: money("total_addon_premium")?,
            net_premium: money("net_premium")?,
            sgst_amount: money("sgst_amount")?,
            cgst_amount: money("cgst_amount")?,
            total_premium: money("total_premium")?,
            final_premium: money("final_premium")?,
            is_recommended: row.get::<_, i32>("is_recommended")? == 1,
            recommendation_note: row.get("recommendation_note")?,
            ranking: row.get("ranking")?,
        })
    }
}
