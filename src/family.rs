//! Family group management
//!
//! Keeps customers, family groups and member rows consistent. A group always
//! has exactly one head, the head always has a member row flagged `is_head`,
//! and a customer is in at most one group. Each operation that writes more
//! than one row runs inside a single transaction, so a failure leaves
//! nothing half-applied.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::Database;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::{
    Customer, CustomerInsurance, FamilyGroup, FamilyMember, NewFamilyGroup, Quotation, Status,
    HEAD_RELATIONSHIP,
};

pub struct FamilyManager<'a> {
    db: &'a Database,
}

impl<'a> FamilyManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // ==================== GROUP LIFECYCLE ====================

    /// Create a group with its head and members.
    pub fn create_family_group(&self, req: &NewFamilyGroup) -> Result<FamilyGroup> {
        validate_request(req)?;

        let group = self.db.in_transaction(|db| -> Result<FamilyGroup> {
            let head = require_customer(db, req.head_customer_id)?;
            if let Some(other) = current_group_of(db, &head)? {
                return Err(Error::validation(
                    "head_customer_id",
                    format!("customer {} already belongs to family group {}", head.id, other),
                ));
            }
            for input in &req.members {
                let customer = require_customer(db, input.customer_id)?;
                if let Some(other) = current_group_of(db, &customer)? {
                    return Err(Error::conflict(
                        "members",
                        format!("customer {} already belongs to family group {}", customer.id, other),
                    ));
                }
            }

            let mut group = FamilyGroup::new(req.name.trim(), head.id);
            group.status = req.status;
            db.insert_family_group(&group)?;

            insert_member(db, &FamilyMember::new_head(group.id, head.id))?;
            db.set_customer_family_group(head.id, Some(group.id))?;

            for input in &req.members {
                let mut member = FamilyMember::new(group.id, input.customer_id);
                member.relationship = input.relationship.clone();
                insert_member(db, &member)?;
                db.set_customer_family_group(input.customer_id, Some(group.id))?;
                log::debug!("added {} to family group {}", input.customer_id, group.id);
            }

            Ok(group)
        })?;

        log::info!(
            "created family group {} ({:?}) with {} member(s)",
            group.id,
            group.name,
            req.members.len() + 1
        );
        Ok(group)
    }

    /// Replace a group's name, status, head and full membership.
    pub fn update_family_group(&self, group_id: Uuid, req: &NewFamilyGroup) -> Result<FamilyGroup> {
        validate_request(req)?;

        let group = self.db.in_transaction(|db| -> Result<FamilyGroup> {
            let mut group = require_group(db, group_id)?;

            let new_head = require_customer(db, req.head_customer_id)?;
            if let Some(other) = current_group_of(db, &new_head)? {
                if other != group.id {
                    return Err(Error::validation(
                        "head_customer_id",
                        format!("customer {} already belongs to family group {}", new_head.id, other),
                    ));
                }
            }
            for input in &req.members {
                let customer = require_customer(db, input.customer_id)?;
                if let Some(other) = current_group_of(db, &customer)? {
                    if other != group.id {
                        return Err(Error::conflict(
                            "members",
                            format!("customer {} already belongs to family group {}", customer.id, other),
                        ));
                    }
                }
            }

            let current = db.list_family_members(group.id)?;
            let mut wanted: HashSet<Uuid> = req.members.iter().map(|m| m.customer_id).collect();
            wanted.insert(new_head.id);

            // Drop members left out of the new list
            for member in current.iter().filter(|m| !wanted.contains(&m.customer_id)) {
                db.delete_family_member(member.id)?;
                db.set_customer_family_group(member.customer_id, None)?;
                log::debug!("removed {} from family group {}", member.customer_id, group.id);
            }

            // Demote before promoting so the group never has two heads
            for member in current
                .iter()
                .filter(|m| m.is_head && m.customer_id != new_head.id && wanted.contains(&m.customer_id))
            {
                db.set_family_member_head(member.id, false)?;
            }

            match current.iter().find(|m| m.customer_id == new_head.id) {
                Some(existing) => {
                    if !existing.is_head {
                        db.set_family_member_head(existing.id, true)?;
                    }
                    db.set_family_member_relationship(existing.id, Some(HEAD_RELATIONSHIP))?;
                }
                None => {
                    insert_member(db, &FamilyMember::new_head(group.id, new_head.id))?;
                    db.set_customer_family_group(new_head.id, Some(group.id))?;
                }
            }

            for input in &req.members {
                match current.iter().find(|m| m.customer_id == input.customer_id) {
                    Some(existing) => {
                        db.set_family_member_relationship(existing.id, input.relationship.as_deref())?;
                    }
                    None => {
                        let mut member = FamilyMember::new(group.id, input.customer_id);
                        member.relationship = input.relationship.clone();
                        insert_member(db, &member)?;
                        db.set_customer_family_group(input.customer_id, Some(group.id))?;
                        log::debug!("added {} to family group {}", input.customer_id, group.id);
                    }
                }
            }

            group.name = req.name.trim().to_string();
            group.family_head_id = new_head.id;
            group.status = req.status;
            db.update_family_group(&group)?;

            require_group(db, group.id)
        })?;

        log::info!("updated family group {} ({:?})", group.id, group.name);
        Ok(group)
    }

    /// Make another member of the group its head.
    pub fn change_family_head(&self, group_id: Uuid, new_head_customer_id: Uuid) -> Result<FamilyGroup> {
        let group = self.db.in_transaction(|db| -> Result<FamilyGroup> {
            let mut group = require_group(db, group_id)?;

            let target = db
                .get_family_member_by_customer(new_head_customer_id)?
                .filter(|m| m.family_group_id == group.id)
                .ok_or_else(|| {
                    Error::validation(
                        "new_head_customer_id",
                        format!(
                            "customer {} is not a member of family group {}",
                            new_head_customer_id, group.id
                        ),
                    )
                })?;

            if target.is_head && group.family_head_id == target.customer_id {
                return Ok(group);
            }

            for member in db.list_family_members(group.id)?.iter().filter(|m| m.is_head) {
                db.set_family_member_head(member.id, false)?;
            }
            db.set_family_member_head(target.id, true)?;

            group.family_head_id = target.customer_id;
            db.update_family_group(&group)?;

            require_group(db, group.id)
        })?;

        log::info!("family group {} head is now {}", group.id, group.family_head_id);
        Ok(group)
    }

    pub fn set_family_group_status(&self, group_id: Uuid, status: Status) -> Result<FamilyGroup> {
        self.db.in_transaction(|db| -> Result<FamilyGroup> {
            let mut group = require_group(db, group_id)?;
            group.status = status;
            db.update_family_group(&group)?;
            require_group(db, group.id)
        })
    }

    /// Delete a group, its member rows, and every customer's link to it.
    pub fn delete_family_group(&self, group: &FamilyGroup) -> Result<()> {
        let released = self.db.in_transaction(|db| -> Result<usize> {
            require_group(db, group.id)?;

            let removed = db.delete_family_members_for_group(group.id)?;
            db.clear_family_group_for_customers(group.id)?;
            db.delete_family_group_row(group.id)?;
            Ok(removed)
        })?;

        log::info!(
            "deleted family group {} ({:?}), released {} member(s)",
            group.id,
            group.name,
            released
        );
        Ok(())
    }

    // ==================== MEMBERSHIP ====================

    pub fn add_family_member(
        &self,
        group_id: Uuid,
        customer_id: Uuid,
        relationship: Option<&str>,
    ) -> Result<FamilyMember> {
        let member = self.db.in_transaction(|db| -> Result<FamilyMember> {
            let group = require_group(db, group_id)?;
            let customer = require_customer(db, customer_id)?;

            if let Some(other) = current_group_of(db, &customer)? {
                return Err(Error::conflict(
                    "customer_id",
                    format!("customer {} already belongs to family group {}", customer.id, other),
                ));
            }

            let mut member = FamilyMember::new(group.id, customer.id);
            member.relationship = relationship.map(str::to_string);
            insert_member(db, &member)?;
            db.set_customer_family_group(customer.id, Some(group.id))?;
            Ok(member)
        })?;

        log::info!("added {} to family group {}", member.customer_id, member.family_group_id);
        Ok(member)
    }

    /// Remove a non-head member row of `group_id`.
    pub fn remove_family_member(&self, group_id: Uuid, member_id: Uuid) -> Result<()> {
        self.db.in_transaction(|db| -> Result<()> {
            let member = db
                .get_family_member(member_id)?
                .filter(|m| m.family_group_id == group_id)
                .ok_or_else(|| Error::not_found("family member", member_id))?;
            remove_member_row(db, &member)
        })
    }

    /// Same as [`Self::remove_family_member`], for a row already in hand.
    /// The row is re-read so a stale copy cannot remove a newly promoted head.
    pub fn remove_family_member_by_object(&self, member: &FamilyMember) -> Result<()> {
        self.remove_family_member(member.family_group_id, member.id)
    }

    // ==================== CONSISTENCY SWEEP ====================

    /// Delete member rows that disagree with their customer or group and
    /// repair what that leaves behind. Returns the number of member rows
    /// deleted. Not meant to run per request.
    pub fn cleanup_orphaned_records(&self) -> Result<usize> {
        let removed = self.db.in_transaction(|db| -> Result<usize> {
            let findings = db.find_inconsistent_family_members()?;
            for (member, defect) in &findings {
                let err = Error::consistency(format!(
                    "member row {} (customer {}, group {}): {}",
                    member.id,
                    member.customer_id,
                    member.family_group_id,
                    defect.describe()
                ));
                log::warn!("{}; deleting row", err);
                db.delete_family_member(member.id)?;
            }

            for customer in db.find_customers_with_dangling_family()? {
                let err = Error::consistency(format!(
                    "customer {} points at family group {:?} without a member row",
                    customer.id, customer.family_group_id
                ));
                log::warn!("{}; clearing link", err);
                db.set_customer_family_group(customer.id, None)?;
            }

            for mut group in db.list_family_groups()? {
                repair_head(db, &mut group)?;
            }

            Ok(findings.len())
        })?;

        if removed > 0 {
            log::info!("cleanup removed {} inconsistent family member row(s)", removed);
        }
        Ok(removed)
    }

    // ==================== QUERIES ====================

    /// Customers that can be picked for a group: active customers without a
    /// family, plus the current members of `exclude_group_id` when editing it.
    pub fn get_available_customers(&self, exclude_group_id: Option<Uuid>) -> Result<Vec<Customer>> {
        Ok(self.db.list_available_customers(exclude_group_id)?)
    }

    pub fn get_family_group(&self, group_id: Uuid) -> Result<FamilyGroup> {
        require_group(self.db, group_id)
    }

    pub fn list_family_groups(&self) -> Result<Vec<FamilyGroup>> {
        Ok(self.db.list_family_groups()?)
    }

    /// Member rows with their customers, head first.
    pub fn get_family_members(&self, group_id: Uuid) -> Result<Vec<(FamilyMember, Customer)>> {
        require_group(self.db, group_id)?;

        let mut out = Vec::new();
        for member in self.db.list_family_members(group_id)? {
            let customer = require_customer(self.db, member.customer_id)?;
            out.push((member, customer));
        }
        Ok(out)
    }

    pub fn family_of(&self, customer_id: Uuid) -> Result<Option<FamilyGroup>> {
        match self.db.get_family_member_by_customer(customer_id)? {
            Some(member) => Ok(self.db.get_family_group(member.family_group_id)?),
            None => Ok(None),
        }
    }

    pub fn is_family_head(&self, customer_id: Uuid) -> Result<bool> {
        Ok(self
            .db
            .get_family_member_by_customer(customer_id)?
            .map_or(false, |m| m.is_head))
    }

    /// Customers whose records `acting_customer_id` may see: every member of
    /// an active group they head, otherwise only themselves.
    pub fn visible_customer_ids(&self, acting_customer_id: Uuid) -> Result<Vec<Uuid>> {
        let customer = require_customer(self.db, acting_customer_id)?;

        let member = match self.db.get_family_member_by_customer(customer.id)? {
            Some(m) if m.is_head => m,
            _ => return Ok(vec![customer.id]),
        };
        match self.db.get_family_group(member.family_group_id)? {
            Some(group) if group.status.is_active() => Ok(self
                .db
                .list_family_members(group.id)?
                .into_iter()
                .map(|m| m.customer_id)
                .collect()),
            _ => Ok(vec![customer.id]),
        }
    }

    pub fn viewable_policies(&self, acting_customer_id: Uuid) -> Result<Vec<CustomerInsurance>> {
        let ids = self.visible_customer_ids(acting_customer_id)?;
        Ok(self.db.list_policies_for_customers(&ids)?)
    }

    pub fn viewable_quotations(&self, acting_customer_id: Uuid) -> Result<Vec<Quotation>> {
        let ids = self.visible_customer_ids(acting_customer_id)?;
        Ok(self.db.list_quotations_for_customers(&ids)?)
    }
}

// ==================== HELPERS ====================

fn validate_request(req: &NewFamilyGroup) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(Error::validation("name", "family group name is required"));
    }

    let mut seen = HashSet::new();
    for input in &req.members {
        if input.customer_id == req.head_customer_id {
            return Err(Error::validation(
                "members",
                format!("head {} is listed again as a member", input.customer_id),
            ));
        }
        if !seen.insert(input.customer_id) {
            return Err(Error::validation(
                "members",
                format!("customer {} is listed more than once", input.customer_id),
            ));
        }
    }
    Ok(())
}

fn require_customer(db: &Database, id: Uuid) -> Result<Customer> {
    db.get_customer_by_id(id)?
        .ok_or_else(|| Error::not_found("customer", id))
}

fn require_group(db: &Database, id: Uuid) -> Result<FamilyGroup> {
    db.get_family_group(id)?
        .ok_or_else(|| Error::not_found("family group", id))
}

/// Group a customer is in, by member row or by customer link.
fn current_group_of(db: &Database, customer: &Customer) -> Result<Option<Uuid>> {
    if let Some(member) = db.get_family_member_by_customer(customer.id)? {
        return Ok(Some(member.family_group_id));
    }
    Ok(customer.family_group_id)
}

fn insert_member(db: &Database, member: &FamilyMember) -> Result<()> {
    db.insert_family_member(member).map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(
                "customer_id",
                format!("customer {} already belongs to a family group", member.customer_id),
            )
        } else {
            Error::Storage(e)
        }
    })
}

fn remove_member_row(db: &Database, member: &FamilyMember) -> Result<()> {
    let group = require_group(db, member.family_group_id)?;
    if member.is_head || group.family_head_id == member.customer_id {
        return Err(Error::validation(
            "member_id",
            "cannot remove the family head; change the head first or delete the group",
        ));
    }

    db.delete_family_member(member.id)?;
    if let Some(customer) = db.get_customer_by_id(member.customer_id)? {
        if customer.family_group_id == Some(member.family_group_id) {
            db.set_customer_family_group(customer.id, None)?;
        }
    }

    log::info!("removed {} from family group {}", member.customer_id, member.family_group_id);
    Ok(())
}

/// Restore "exactly one head, and `family_head_id` names it" for one group.
fn repair_head(db: &Database, group: &mut FamilyGroup) -> Result<()> {
    let members = db.list_family_members(group.id)?;

    if members.is_empty() {
        log::warn!(
            "{}; deleting group",
            Error::consistency(format!("family group {} has no members", group.id))
        );
        db.delete_family_group_row(group.id)?;
        return Ok(());
    }

    let heads: Vec<&FamilyMember> = members.iter().filter(|m| m.is_head).collect();
    let head = match heads.as_slice() {
        [] => {
            // Prefer the recorded head if it is still a member, else the earliest member
            let chosen = members
                .iter()
                .find(|m| m.customer_id == group.family_head_id)
                .unwrap_or(&members[0]);
            log::warn!(
                "{}; promoting {}",
                Error::consistency(format!("family group {} has no head", group.id)),
                chosen.customer_id
            );
            db.set_family_member_head(chosen.id, true)?;
            chosen
        }
        [only] => *only,
        [first, rest @ ..] => {
            log::warn!(
                "{}; keeping {}",
                Error::consistency(format!("family group {} has {} heads", group.id, heads.len())),
                first.customer_id
            );
            for extra in rest {
                db.set_family_member_head(extra.id, false)?;
            }
            *first
        }
    };

    if group.family_head_id != head.customer_id {
        log::warn!(
            "{}",
            Error::consistency(format!(
                "family group {} records head {} but member row says {}",
                group.id, group.family_head_id, head.customer_id
            ))
        );
        group.family_head_id = head.customer_id;
        db.update_family_group(group)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberInput;

    fn seed_customers(db: &Database, names: &[&str]) -> Vec<Customer> {
        names
            .iter()
            .map(|name| {
                let c = Customer::new(*name);
                db.insert_customer(&c).unwrap();
                c
            })
            .collect()
    }

    fn heads_of(db: &Database, group_id: Uuid) -> Vec<Uuid> {
        db.list_family_members(group_id)
            .unwrap()
            .into_iter()
            .filter(|m| m.is_head)
            .map(|m| m.customer_id)
            .collect()
    }

    fn group_of(db: &Database, customer_id: Uuid) -> Option<Uuid> {
        db.get_customer_by_id(customer_id).unwrap().unwrap().family_group_id
    }

    #[test]
    fn test_smith_family_scenario() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A Smith", "B Smith", "C Smith"]);
        let (a, b, cc) = (&c[0], &c[1], &c[2]);
        let fm = FamilyManager::new(&db);

        let req = NewFamilyGroup::new("Smith Family", a.id)
            .with_member(b.id, Some("spouse"))
            .with_member(cc.id, Some("child"));
        let group = fm.create_family_group(&req).unwrap();

        let members = db.list_family_members(group.id).unwrap();
        assert_eq!(members.len(), 3);
        let a_row = members.iter().find(|m| m.customer_id == a.id).unwrap();
        assert!(a_row.is_head);
        assert_eq!(group_of(&db, a.id), Some(group.id));
        assert_eq!(group_of(&db, b.id), Some(group.id));
        assert_eq!(group_of(&db, cc.id), Some(group.id));

        let group = fm.change_family_head(group.id, b.id).unwrap();
        let a_row = db.get_family_member_by_customer(a.id).unwrap().unwrap();
        let b_row = db.get_family_member_by_customer(b.id).unwrap().unwrap();
        assert!(!a_row.is_head);
        assert!(b_row.is_head);
        assert_eq!(group.family_head_id, b.id);

        fm.delete_family_group(&group).unwrap();
        assert!(db.list_family_members(group.id).unwrap().is_empty());
        assert!(db.get_family_group(group.id).unwrap().is_none());
        for customer in &c {
            assert_eq!(group_of(&db, customer.id), None);
        }
    }

    #[test]
    fn test_create_rejects_head_in_other_group() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B"]);
        let fm = FamilyManager::new(&db);
        fm.create_family_group(&NewFamilyGroup::new("First", c[0].id)).unwrap();

        let err = fm
            .create_family_group(&NewFamilyGroup::new("Second", c[0].id).with_member(c[1].id, None))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("head_customer_id"));
        // Nothing from the failed call was written
        assert_eq!(group_of(&db, c[1].id), None);
        assert_eq!(db.list_family_groups().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_duplicate_and_head_as_member() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B"]);
        let fm = FamilyManager::new(&db);

        let dup = NewFamilyGroup::new("Dup", c[0].id)
            .with_member(c[1].id, None)
            .with_member(c[1].id, Some("child"));
        assert_eq!(fm.create_family_group(&dup).unwrap_err().field(), Some("members"));

        let head_twice = NewFamilyGroup::new("Twice", c[0].id).with_member(c[0].id, None);
        assert!(fm.create_family_group(&head_twice).unwrap_err().is_validation());

        let blank = NewFamilyGroup::new("   ", c[0].id);
        assert_eq!(fm.create_family_group(&blank).unwrap_err().field(), Some("name"));

        assert!(db.list_family_groups().unwrap().is_empty());
    }

    #[test]
    fn test_create_rolls_back_when_member_taken() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C", "D"]);
        let fm = FamilyManager::new(&db);
        fm.create_family_group(&NewFamilyGroup::new("Taken", c[3].id)).unwrap();

        let req = NewFamilyGroup::new("New", c[0].id)
            .with_member(c[1].id, None)
            .with_member(c[3].id, None);
        let err = fm.create_family_group(&req).unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(group_of(&db, c[0].id), None);
        assert_eq!(group_of(&db, c[1].id), None);
        assert!(db.get_family_member_by_customer(c[0].id).unwrap().is_none());
    }

    #[test]
    fn test_create_unknown_customer_is_not_found() {
        let db = Database::open_memory().unwrap();
        let fm = FamilyManager::new(&db);
        let err = fm
            .create_family_group(&NewFamilyGroup::new("Ghost", Uuid::new_v4()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_replaces_membership_and_head() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C", "D"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(
                &NewFamilyGroup::new("Fam", c[0].id)
                    .with_member(c[1].id, Some("spouse"))
                    .with_member(c[2].id, Some("child")),
            )
            .unwrap();

        // B becomes head, A stays as parent, C leaves, D joins
        let req = NewFamilyGroup {
            name: "Renamed".to_string(),
            head_customer_id: c[1].id,
            members: vec![
                MemberInput::new(c[0].id, Some("parent")),
                MemberInput::new(c[3].id, Some("child")),
            ],
            status: Status::Inactive,
        };
        let updated = fm.update_family_group(group.id, &req).unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.status, Status::Inactive);
        assert_eq!(updated.family_head_id, c[1].id);
        assert_eq!(heads_of(&db, group.id), vec![c[1].id]);

        let a_row = db.get_family_member_by_customer(c[0].id).unwrap().unwrap();
        assert!(!a_row.is_head);
        assert_eq!(a_row.relationship.as_deref(), Some("parent"));

        assert_eq!(group_of(&db, c[2].id), None);
        assert!(db.get_family_member_by_customer(c[2].id).unwrap().is_none());
        assert_eq!(group_of(&db, c[3].id), Some(group.id));
        assert_eq!(db.list_family_members(group.id).unwrap().len(), 3);
    }

    #[test]
    fn test_update_can_drop_old_head_entirely() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        fm.update_family_group(group.id, &NewFamilyGroup::new("Fam", c[1].id))
            .unwrap();

        assert_eq!(heads_of(&db, group.id), vec![c[1].id]);
        assert_eq!(group_of(&db, c[0].id), None);
        assert_eq!(db.list_family_members(group.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_errors() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C"]);
        let fm = FamilyManager::new(&db);
        let g1 = fm.create_family_group(&NewFamilyGroup::new("One", c[0].id)).unwrap();
        fm.create_family_group(&NewFamilyGroup::new("Two", c[1].id).with_member(c[2].id, None))
            .unwrap();

        let missing = fm
            .update_family_group(Uuid::new_v4(), &NewFamilyGroup::new("X", c[0].id))
            .unwrap_err();
        assert!(missing.is_not_found());

        // Head of another group
        let err = fm
            .update_family_group(g1.id, &NewFamilyGroup::new("One", c[1].id))
            .unwrap_err();
        assert_eq!(err.field(), Some("head_customer_id"));
        assert!(err.is_validation());

        // Plain member of another group
        let err = fm
            .update_family_group(g1.id, &NewFamilyGroup::new("One", c[2].id))
            .unwrap_err();
        assert!(err.is_validation());

        let err = fm
            .update_family_group(g1.id, &NewFamilyGroup::new("One", c[0].id).with_member(c[2].id, None))
            .unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(heads_of(&db, g1.id), vec![c[0].id]);
    }

    #[test]
    fn test_change_head_requires_membership() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "Outsider"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        let err = fm.change_family_head(group.id, c[2].id).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(heads_of(&db, group.id), vec![c[0].id]);

        assert!(fm.change_family_head(Uuid::new_v4(), c[1].id).unwrap_err().is_not_found());

        // Same head is a no-op
        let same = fm.change_family_head(group.id, c[0].id).unwrap();
        assert_eq!(same.family_head_id, c[0].id);
        assert_eq!(heads_of(&db, group.id), vec![c[0].id]);
    }

    #[test]
    fn test_add_member_conflicts() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C"]);
        let fm = FamilyManager::new(&db);
        let g1 = fm.create_family_group(&NewFamilyGroup::new("One", c[0].id)).unwrap();
        let g2 = fm.create_family_group(&NewFamilyGroup::new("Two", c[1].id)).unwrap();

        let member = fm.add_family_member(g1.id, c[2].id, Some("child")).unwrap();
        assert!(!member.is_head);
        assert_eq!(group_of(&db, c[2].id), Some(g1.id));

        // Already in this group
        assert!(fm.add_family_member(g1.id, c[2].id, None).unwrap_err().is_conflict());
        // Already in another group
        assert!(fm.add_family_member(g2.id, c[2].id, None).unwrap_err().is_conflict());
        assert!(fm.add_family_member(g2.id, c[0].id, None).unwrap_err().is_conflict());

        assert!(fm.add_family_member(Uuid::new_v4(), c[2].id, None).unwrap_err().is_not_found());
        assert!(fm.add_family_member(g1.id, Uuid::new_v4(), None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_member() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(
                &NewFamilyGroup::new("Fam", c[0].id)
                    .with_member(c[1].id, None)
                    .with_member(c[2].id, None),
            )
            .unwrap();

        let head_row = db.get_family_member_by_customer(c[0].id).unwrap().unwrap();
        let err = fm.remove_family_member(group.id, head_row.id).unwrap_err();
        assert!(err.is_validation());

        let b_row = db.get_family_member_by_customer(c[1].id).unwrap().unwrap();
        fm.remove_family_member(group.id, b_row.id).unwrap();
        assert_eq!(group_of(&db, c[1].id), None);
        assert!(fm.remove_family_member(group.id, b_row.id).unwrap_err().is_not_found());

        let c_row = db.get_family_member_by_customer(c[2].id).unwrap().unwrap();
        assert!(fm.remove_family_member(Uuid::new_v4(), c_row.id).unwrap_err().is_not_found());
        fm.remove_family_member_by_object(&c_row).unwrap();
        assert_eq!(db.list_family_members(group.id).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_by_stale_object_after_head_change() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        let stale_b = db.get_family_member_by_customer(c[1].id).unwrap().unwrap();
        fm.change_family_head(group.id, c[1].id).unwrap();

        assert!(fm.remove_family_member_by_object(&stale_b).unwrap_err().is_validation());
        assert_eq!(heads_of(&db, group.id), vec![c[1].id]);
    }

    #[test]
    fn test_delete_missing_group_is_not_found() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A"]);
        let fm = FamilyManager::new(&db);
        let group = fm.create_family_group(&NewFamilyGroup::new("Fam", c[0].id)).unwrap();

        fm.delete_family_group(&group).unwrap();
        assert!(fm.delete_family_group(&group).unwrap_err().is_not_found());
    }

    #[test]
    fn test_cleanup_removes_mismatched_rows_and_is_idempotent() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(
                &NewFamilyGroup::new("Fam", c[0].id)
                    .with_member(c[1].id, None)
                    .with_member(c[2].id, None),
            )
            .unwrap();

        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 0);

        // B's link drifted away from its member row
        db.set_customer_family_group(c[1].id, None).unwrap();
        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 1);
        assert!(db.get_family_member_by_customer(c[1].id).unwrap().is_none());
        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 0);
        assert_eq!(heads_of(&db, group.id), vec![c[0].id]);
    }

    #[test]
    fn test_cleanup_handles_deleted_customer_and_repairs_head() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        // Simulate a delete made outside the application
        db.conn().execute_batch("PRAGMA foreign_keys = OFF").unwrap();
        db.conn()
            .execute("DELETE FROM customers WHERE id = ?", [c[0].id.to_string()])
            .unwrap();
        db.conn().execute_batch("PRAGMA foreign_keys = ON").unwrap();

        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 1);
        let repaired = db.get_family_group(group.id).unwrap().unwrap();
        assert_eq!(repaired.family_head_id, c[1].id);
        assert_eq!(heads_of(&db, group.id), vec![c[1].id]);
        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 0);
    }

    #[test]
    fn test_cleanup_clears_dangling_links_and_empty_groups() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "Drifter"]);
        let fm = FamilyManager::new(&db);
        let group = fm.create_family_group(&NewFamilyGroup::new("Fam", c[0].id)).unwrap();

        db.set_customer_family_group(c[1].id, Some(group.id)).unwrap();
        let head_row = db.get_family_member_by_customer(c[0].id).unwrap().unwrap();
        db.delete_family_member(head_row.id).unwrap();

        assert_eq!(fm.cleanup_orphaned_records().unwrap(), 0);
        assert_eq!(group_of(&db, c[0].id), None);
        assert_eq!(group_of(&db, c[1].id), None);
        assert!(db.get_family_group(group.id).unwrap().is_none());
    }

    #[test]
    fn test_available_customers() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "C"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        let free: Vec<Uuid> = fm.get_available_customers(None).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(free, vec![c[2].id]);

        let editing: Vec<Uuid> = fm
            .get_available_customers(Some(group.id))
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(editing, vec![c[0].id, c[1].id, c[2].id]);
    }

    #[test]
    fn test_queries() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["A", "B", "Solo"]);
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, Some("spouse")))
            .unwrap();

        let members = fm.get_family_members(group.id).unwrap();
        assert_eq!(members[0].1.name, "A");
        assert_eq!(members[1].0.relationship.as_deref(), Some("spouse"));

        assert_eq!(fm.family_of(c[1].id).unwrap().map(|g| g.id), Some(group.id));
        assert!(fm.family_of(c[2].id).unwrap().is_none());
        assert!(fm.is_family_head(c[0].id).unwrap());
        assert!(!fm.is_family_head(c[1].id).unwrap());
        assert!(!fm.is_family_head(c[2].id).unwrap());
        assert!(fm.get_family_members(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_viewable_policies_follow_family_head() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["Head", "Spouse", "Stranger"]);
        for (owner, no) in [(&c[0], "H-1"), (&c[1], "S-1"), (&c[2], "X-1")] {
            db.insert_policy(&CustomerInsurance::new(owner.id, no)).unwrap();
        }
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        let mut head_view: Vec<String> = fm
            .viewable_policies(c[0].id)
            .unwrap()
            .into_iter()
            .map(|p| p.policy_no)
            .collect();
        head_view.sort();
        assert_eq!(head_view, vec!["H-1", "S-1"]);

        let spouse_view: Vec<String> = fm
            .viewable_policies(c[1].id)
            .unwrap()
            .into_iter()
            .map(|p| p.policy_no)
            .collect();
        assert_eq!(spouse_view, vec!["S-1"]);

        fm.set_family_group_status(group.id, Status::Inactive).unwrap();
        assert_eq!(fm.viewable_policies(c[0].id).unwrap().len(), 1);

        assert!(fm.viewable_policies(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_viewable_quotations_follow_family_head() {
        let db = Database::open_memory().unwrap();
        let c = seed_customers(&db, &["Head", "Spouse", "Stranger"]);
        let mut owners = std::collections::HashMap::new();
        for owner in &c {
            let q = Quotation::new(owner.id);
            db.insert_quotation(&q).unwrap();
            owners.insert(q.id, owner.name.clone());
        }
        let fm = FamilyManager::new(&db);
        let group = fm
            .create_family_group(&NewFamilyGroup::new("Fam", c[0].id).with_member(c[1].id, None))
            .unwrap();

        let view = |acting: Uuid| -> Vec<String> {
            let mut names: Vec<String> = fm
                .viewable_quotations(acting)
                .unwrap()
                .iter()
                .map(|q| owners[&q.id].clone())
                .collect();
            names.sort();
            names
        };

        assert_eq!(view(c[0].id), vec!["Head", "Spouse"]);
        assert_eq!(view(c[1].id), vec!["Spouse"]);
        assert_eq!(view(c[2].id), vec!["Stranger"]);

        fm.set_family_group_status(group.id, Status::Inactive).unwrap();
        assert_eq!(view(c[0].id), vec!["Head"]);

        assert!(fm.viewable_quotations(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_concurrent_adds_only_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");

        let (g1, g2, target) = {
            let db = Database::open_at(path.clone()).unwrap();
            let c = seed_customers(&db, &["H1", "H2", "Target"]);
            let fm = FamilyManager::new(&db);
            let g1 = fm.create_family_group(&NewFamilyGroup::new("One", c[0].id)).unwrap();
            let g2 = fm.create_family_group(&NewFamilyGroup::new("Two", c[1].id)).unwrap();
            (g1.id, g2.id, c[2].id)
        };

        let handles: Vec<_> = [g1, g2]
            .into_iter()
            .map(|group_id| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let db = Database::open_at(path).unwrap();
                    let fm = FamilyManager::new(&db);
                    fm.add_family_member(group_id, target, None)
                        .map(|_| ())
                        .map_err(|e| e.is_conflict())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| *r == Err(true)));

        let db = Database::open_at(path).unwrap();
        let member = db.get_family_member_by_customer(target).unwrap().unwrap();
        assert_eq!(group_of(&db, target), Some(member.family_group_id));
    }
}
