//! Row access for family groups and their member rows.
//!
//! These functions write single rows and never enforce the group invariants
//! on their own; `crate::family::FamilyManager` sequences them inside one
//! transaction.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid, Database};
use crate::models::*;

/// Why a member row failed the consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberDefect {
    MissingCustomer,
    MissingGroup,
    /// The customer's `family_group_id` points somewhere else (or nowhere).
    GroupMismatch,
}

impl MemberDefect {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MissingCustomer => "customer no longer exists",
            Self::MissingGroup => "family group no longer exists",
            Self::GroupMismatch => "customer's family_group_id disagrees with the member row",
        }
    }
}

impl Database {
    // ==================== FAMILY GROUP ====================

    pub fn insert_family_group(&self, group: &FamilyGroup) -> Result<()> {
        self.conn.execute(
            "INSERT INTO family_groups (id, name, family_head_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                group.id.to_string(),
                group.name,
                group.family_head_id.to_string(),
                group.status.as_str(),
                group.created_at.to_rfc3339(),
                group.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_family_group(&self, id: Uuid) -> Result<Option<FamilyGroup>> {
        let result = self.conn.query_row(
            "SELECT * FROM family_groups WHERE id = ?",
            [id.to_string()],
            Self::row_to_family_group,
        );

        match result {
            Ok(group) => Ok(Some(group)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_family_groups(&self) -> Result<Vec<FamilyGroup>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM family_groups ORDER BY name ASC, created_at ASC")?;

        let groups = stmt
            .query_map([], Self::row_to_family_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(groups)
    }

    /// Write name, head and status. Automatically sets `updated_at` to now.
    pub fn update_family_group(&self, group: &FamilyGroup) -> Result<bool> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE family_groups SET name = ?, family_head_id = ?, status = ?, updated_at = ? WHERE id = ?",
            params![
                group.name,
                group.family_head_id.to_string(),
                group.status.as_str(),
                now.to_rfc3339(),
                group.id.to_string(),
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_family_group_row(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM family_groups WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ==================== FAMILY MEMBER ====================

    pub fn insert_family_member(&self, member: &FamilyMember) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO family_members (
                id, family_group_id, customer_id, relationship, is_head, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                member.id.to_string(),
                member.family_group_id.to_string(),
                member.customer_id.to_string(),
                member.relationship,
                member.is_head as i32,
                member.status.as_str(),
                member.created_at.to_rfc3339(),
                member.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_family_member(&self, id: Uuid) -> Result<Option<FamilyMember>> {
        let result = self.conn.query_row(
            "SELECT * FROM family_members WHERE id = ?",
            [id.to_string()],
            Self::row_to_family_member,
        );

        match result {
            Ok(member) => Ok(Some(member)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The member row of a customer, in whichever group it is.
    pub fn get_family_member_by_customer(&self, customer_id: Uuid) -> Result<Option<FamilyMember>> {
        let result = self.conn.query_row(
            "SELECT * FROM family_members WHERE customer_id = ?",
            [customer_id.to_string()],
            Self::row_to_family_member,
        );

        match result {
            Ok(member) => Ok(Some(member)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Members of a group, head first, then by join time.
    pub fn list_family_members(&self, group_id: Uuid) -> Result<Vec<FamilyMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM family_members WHERE family_group_id = ?
             ORDER BY is_head DESC, created_at ASC, rowid ASC",
        )?;

        let members = stmt
            .query_map([group_id.to_string()], Self::row_to_family_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(members)
    }

    pub fn set_family_member_head(&self, member_id: Uuid, is_head: bool) -> Result<bool> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE family_members SET is_head = ?, updated_at = ? WHERE id = ?",
            params![is_head as i32, now.to_rfc3339(), member_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn set_family_member_relationship(&self, member_id: Uuid, relationship: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        let rows = self.conn.execute(
            "UPDATE family_members SET relationship = ?, updated_at = ? WHERE id = ?",
            params![relationship, now.to_rfc3339(), member_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_family_member(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM family_members WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    pub fn delete_family_members_for_group(&self, group_id: Uuid) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM family_members WHERE family_group_id = ?",
            [group_id.to_string()],
        )?;
        Ok(rows)
    }

    // ==================== CONSISTENCY SCANS ====================

    /// Member rows whose customer or group is gone, or whose customer points
    /// at a different group.
    pub fn find_inconsistent_family_members(&self) -> Result<Vec<(FamilyMember, MemberDefect)>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT m.*,
                      c.id IS NULL AS customer_missing,
                      g.id IS NULL AS group_missing,
                      c.family_group_id AS customer_group
               FROM family_members m
               LEFT JOIN customers c ON c.id = m.customer_id
               LEFT JOIN family_groups g ON g.id = m.family_group_id
               WHERE c.id IS NULL
                  OR g.id IS NULL
                  OR c.family_group_id IS NULL
                  OR c.family_group_id != m.family_group_id
               ORDER BY m.created_at ASC"#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                let member = Self::row_to_family_member(row)?;
                let defect = if row.get::<_, i32>("customer_missing")? == 1 {
                    MemberDefect::MissingCustomer
                } else if row.get::<_, i32>("group_missing")? == 1 {
                    MemberDefect::MissingGroup
                } else {
                    MemberDefect::GroupMismatch
                };
                Ok((member, defect))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Customers whose `family_group_id` has no matching member row.
    pub fn find_customers_with_dangling_family(&self) -> Result<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT c.* FROM customers c
               WHERE c.family_group_id IS NOT NULL
                 AND NOT EXISTS (
                     SELECT 1 FROM family_members m
                     WHERE m.customer_id = c.id AND m.family_group_id = c.family_group_id
                 )
               ORDER BY c.name ASC"#,
        )?;

        let customers = stmt
            .query_map([], Self::row_to_customer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(customers)
    }

    // ==================== ROW MAPPERS ====================

    fn row_to_family_group(row: &Row) -> rusqlite::Result<FamilyGroup> {
        let id: String = row.get("id")?;
        let head: String = row.get("family_head_id")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(FamilyGroup {
            id: parse_uuid(&id)?,
            name: row.get("name")?,
            family_head_id: parse_uuid(&head)?,
            status: Status::parse(&status),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    fn row_to_family_member(row: &Row) -> rusqlite::Result<FamilyMember> {
        let id: String = row.get("id")?;
        let group_id: String = row.get("family_group_id")?;
        let customer_id: String = row.get("customer_id")?;
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(FamilyMember {
            id: parse_uuid(&id)?,
            family_group_id: parse_uuid(&group_id)?,
            customer_id: parse_uuid(&customer_id)?,
            relationship: row.get("relationship")?,
            is_head: row.get::<_, i32>("is_head")? == 1,
            status: Status::parse(&status),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
