use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{conversion_error, format_date, parse_datetime, parse_optional_date, parse_optional_uuid, parse_uuid, Database};
use crate::models::*;

impl Database {
    // ==================== CUSTOMER CREATE ====================

    pub fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO customers (
                id, name, email, mobile_number, pan_card_number, date_of_birth,
                customer_type, status, family_group_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                customer.id.to_string(),
                customer.name,
                customer.email,
                customer.mobile_number,
                customer.pan_card_number,
                format_date(customer.date_of_birth),
                customer.customer_type.as_str(),
                customer.status.as_str(),
                customer.family_group_id.map(|id| id.to_string()),
                customer.created_at.to_rfc3339(),
                customer.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ==================== CUSTOMER READ ====================

    /// Fetch a customer regardless of status.
    pub fn get_customer_by_id(&self, id: Uuid) -> Result<Option<Customer>> {
        let mut stmt = self.conn.prepare("SELECT * FROM customers WHERE id = ?")?;

        let result = stmt.query_row([id.to_string()], Self::row_to_customer);

        match result {
            Ok(customer) => Ok(Some(customer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a customer by email address (case-insensitive).
    pub fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM customers WHERE LOWER(email) = LOWER(?) LIMIT 1")?;

        let result = stmt.query_row([email], Self::row_to_customer);

        match result {
            Ok(customer) => Ok(Some(customer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_customers(&self, limit: u32, offset: u32) -> Result<Vec<Customer>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM customers ORDER BY name ASC LIMIT ? OFFSET ?")?;

        let customers = stmt
            .query_map([limit, offset], Self::row_to_customer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(customers)
    }

    pub fn count_customers(&self) -> Result<u32> {
        let count: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Search by name, email or mobile number (substring, case-insensitive).
    pub fn search_customers(&self, query: &str, limit: u32) -> Result<Vec<Customer>> {
        let pattern = format!("%{}%", Self::escape_like(&query.to_lowercase()));

        let mut stmt = self.conn.prepare(
            r#"SELECT * FROM customers
               WHERE LOWER(name) LIKE ?1 ESCAPE '\'
                  OR LOWER(COALESCE(email, '')) LIKE ?1 ESCAPE '\'
                  OR COALESCE(mobile_number, '') LIKE ?1 ESCAPE '\'
               ORDER BY name ASC
               LIMIT ?2"#,
        )?;

        let customers = stmt
            .query_map(params![pattern, limit], Self::row_to_customer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(customers)
    }

    fn escape_like(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if matches!(c, '%' | '_' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    /// Active customers without a family group, plus the members of
    /// `include_group_id` when given.
    pub fn list_available_customers(&self, include_group_id: Option<Uuid>) -> Result<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT * FROM customers
               WHERE status = 'active'
                 AND (family_group_id IS NULL OR family_group_id = ?)
               ORDER BY name ASC"#,
        )?;

        let customers = stmt
            .query_map(
                [include_group_id.map(|id| id.to_string())],
                Self::row_to_customer,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(customers)
    }

    // ==================== CUSTOMER UPDATE ====================

    pub fn set_customer_family_group(&self, customer_id: Uuid, group_id: Option<Uuid>) -> Result<bool> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE customers SET family_group_id = ?, updated_at = ? WHERE id = ?",
            params![
                group_id.map(|id| id.to_string()),
                now.to_rfc3339(),
                customer_id.to_string()
            ],
        )?;
        Ok(rows > 0)
    }

    /// Clear `family_group_id` on every customer pointing at `group_id`.
    pub fn clear_family_group_for_customers(&self, group_id: Uuid) -> Result<usize> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE customers SET family_group_id = NULL, updated_at = ? WHERE family_group_id = ?",
            params![now.to_rfc3339(), group_id.to_string()],
        )?;
        Ok(rows)
    }

    // ==================== ROW MAPPERS ====================

    pub(super) fn row_to_customer(row: &Row) -> rusqlite::Result<Customer> {
        let id: String = row.get("id")?;
        let customer_type: String = row.get("customer_type")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(Customer {
            id: parse_uuid(&id)?,
            name: row.get("name")?,
            email: row.get("email")?,
            mobile_number: row.get("mobile_number")?,
            pan_card_number: row.get("pan_card_number")?,
            date_of_birth: parse_optional_date(row.get("date_of_birth")?)?,
            customer_type: customer_type.parse().map_err(conversion_error)?,
            status: Status::parse(&status),
            family_group_id: parse_optional_uuid(row.get("family_group_id")?)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn customer(name: &str) -> Customer {
        Customer::new(name)
    }

    #[test]
    fn test_insert_and_get_customer() {
        let db = Database::open_memory().unwrap();

        let mut c = customer("Ravi Kumar");
        c.email = Some("ravi@example.com".to_string());
        c.date_of_birth = NaiveDate::from_ymd_opt(1985, 7, 12);
        db.insert_customer(&c).unwrap();

        let retrieved = db.get_customer_by_id(c.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Ravi Kumar");
        assert_eq!(retrieved.email.as_deref(), Some("ravi@example.com"));
        assert_eq!(retrieved.date_of_birth, c.date_of_birth);
        assert_eq!(retrieved.family_group_id, None);
    }

    #[test]
    fn test_get_customer_by_email_ignores_case() {
        let db = Database::open_memory().unwrap();
        let mut c = customer("Meera Shah");
        c.email = Some("Meera@Example.com".to_string());
        db.insert_customer(&c).unwrap();

        let found = db.get_customer_by_email("meera@example.com").unwrap();
        assert_eq!(found.map(|c| c.id), Some(c.id));
        assert!(db.get_customer_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_list_and_count_customers() {
        let db = Database::open_memory().unwrap();
        for name in ["Charlie", "Alice", "Bob"] {
            db.insert_customer(&customer(name)).unwrap();
        }

        let list = db.list_customers(10, 0).unwrap();
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
        assert_eq!(db.count_customers().unwrap(), 3);
        assert_eq!(db.list_customers(1, 1).unwrap()[0].name, "Bob");
    }

    #[test]
    fn test_search_customers() {
        let db = Database::open_memory().unwrap();
        let mut a = customer("Anil Gupta");
        a.mobile_number = Some("9876543210".to_string());
        db.insert_customer(&a).unwrap();
        db.insert_customer(&customer("Sunita Rao")).unwrap();

        assert_eq!(db.search_customers("gupta", 10).unwrap().len(), 1);
        assert_eq!(db.search_customers("98765", 10).unwrap().len(), 1);
        assert_eq!(db.search_customers("100%", 10).unwrap().len(), 0);
    }

    #[test]
    fn test_available_customers() {
        let db = Database::open_memory().unwrap();
        let group = Uuid::new_v4();
        let other = Uuid::new_v4();

        let free = customer("Free");
        let mut inactive = customer("Inactive");
        inactive.status = Status::Inactive;
        let in_group = customer("InGroup");
        let elsewhere = customer("Elsewhere");
        for c in [&free, &inactive, &in_group, &elsewhere] {
            db.insert_customer(c).unwrap();
        }
        db.set_customer_family_group(in_group.id, Some(group)).unwrap();
        db.set_customer_family_group(elsewhere.id, Some(other)).unwrap();

        let ids: Vec<Uuid> = db.list_available_customers(None).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![free.id]);

        let ids: Vec<Uuid> = db
            .list_available_customers(Some(group))
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![free.id, in_group.id]);
    }

    #[test]
    fn test_clear_family_group_for_customers() {
        let db = Database::open_memory().unwrap();
        let group = Uuid::new_v4();
        let a = customer("A");
        let b = customer("B");
        db.insert_customer(&a).unwrap();
        db.insert_customer(&b).unwrap();
        db.set_customer_family_group(a.id, Some(group)).unwrap();
        db.set_customer_family_group(b.id, Some(group)).unwrap();

        assert_eq!(db.clear_family_group_for_customers(group).unwrap(), 2);
        for id in [a.id, b.id] {
            assert!(db.get_customer_by_id(id).unwrap().unwrap().family_group_id.is_none());
        }
    }
}
