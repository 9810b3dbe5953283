use anyhow::Result;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{conversion_error, format_date, parse_datetime, parse_decimal, parse_optional_date, parse_uuid, Database};
use crate::models::*;

impl Database {
    // ==================== POLICY CREATE ====================

    pub fn insert_policy(&self, policy: &CustomerInsurance) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO customer_insurances (
                id, customer_id, policy_no, registration_no, issue_date, start_date, expired_date,
                insurance_company, branch, broker, relationship_manager, premium_type, policy_type,
                od_premium, tp_premium, net_premium, gst, final_premium, commission_on,
                my_commission_percentage, my_commission_amount,
                transfer_commission_percentage, transfer_commission_amount, actual_earnings,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                policy.id.to_string(),
                policy.customer_id.to_string(),
                policy.policy_no,
                policy.registration_no,
                format_date(policy.issue_date),
                format_date(policy.start_date),
                format_date(policy.expired_date),
                policy.insurance_company,
                policy.branch,
                policy.broker,
                policy.relationship_manager,
                policy.premium_type,
                policy.policy_type,
                policy.od_premium.to_string(),
                policy.tp_premium.to_string(),
                policy.net_premium.to_string(),
                policy.gst.to_string(),
                policy.final_premium.to_string(),
                policy.commission_on.as_str(),
                policy.my_commission_percentage.to_string(),
                policy.my_commission_amount.to_string(),
                policy.transfer_commission_percentage.to_string(),
                policy.transfer_commission_amount.to_string(),
                policy.actual_earnings.to_string(),
                policy.status.as_str(),
                policy.created_at.to_rfc3339(),
                policy.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ==================== POLICY READ ====================

    pub fn get_policy_by_id(&self, id: Uuid) -> Result<Option<CustomerInsurance>> {
        let result = self.conn.query_row(
            "SELECT * FROM customer_insurances WHERE id = ?",
            [id.to_string()],
            Self::row_to_policy,
        );

        match result {
            Ok(policy) => Ok(Some(policy)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_policy_by_number(&self, policy_no: &str) -> Result<Option<CustomerInsurance>> {
        let result = self.conn.query_row(
            "SELECT * FROM customer_insurances WHERE policy_no = ? LIMIT 1",
            [policy_no],
            Self::row_to_policy,
        );

        match result {
            Ok(policy) => Ok(Some(policy)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Policies held by any of `customer_ids`.
    pub fn list_policies_for_customers(&self, customer_ids: &[Uuid]) -> Result<Vec<CustomerInsurance>> {
        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; customer_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM customer_insurances WHERE customer_id IN ({})
             ORDER BY expired_date DESC, policy_no ASC",
            placeholders
        );

        let ids: Vec<String> = customer_ids.iter().map(|id| id.to_string()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let policies = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), Self::row_to_policy)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(policies)
    }

    // ==================== ROW MAPPERS ====================

    fn row_to_policy(row: &Row) -> rusqlite::Result<CustomerInsurance> {
        let id: String = row.get("id")?;
        let customer_id: String = row.get("customer_id")?;
        let commission_on: String = row.get("commission_on")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let money = |col: &str| -> rusqlite::Result<rust_decimal::Decimal> {
            parse_decimal(&row.get::<_, String>(col)?)
        };

        Ok(CustomerInsurance {
            id: parse_uuid(&id)?,
            customer_id: parse_uuid(&customer_id)?,
            policy_no: row.get("policy_no")?,
            registration_no: row.get("registration_no")?,
            issue_date: parse_optional_date(row.get("issue_date")?)?,
            start_date: parse_optional_date(row.get("start_date")?)?,
            expired_date: parse_optional_date(row.get("expired_date")?)?,
            insurance_company: row.get("insurance_company")?,
            branch: row.get("branch")?,
            broker: row.get("broker")?,
            relationship_manager: row.get("relationship_manager")?,
            premium_type: row.get("premium_type")?,
            policy_type: row.get("policy_type")?,
            od_premium: money("od_premium")?,
            tp_premium: money("tp_premium")?,
            net_premium: money("net_premium")?,
            gst: money("gst")?,
            final_premium: money("final_premium")?,
            commission_on: commission_on.parse().map_err(conversion_error)?,
            my_commission_percentage: money("my_commission_percentage")?,
            my_commission_amount: money("my_commission_amount")?,
            transfer_commission_percentage: money("transfer_commission_percentage")?,
            transfer_commission_amount: money("transfer_commission_amount")?,
            actual_earnings: money("actual_earnings")?,
            status: Status::parse(&status),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
