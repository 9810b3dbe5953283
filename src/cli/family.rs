use anyhow::Result;
use inquire::Confirm;

use super::display::{print_customer_line, print_family_group};
use super::FamilyCommand;
use crate::db::Database;
use crate::family::FamilyManager;
use crate::models::{NewFamilyGroup, Status};

/// Execute a family subcommand
pub fn run_family(db: &Database, command: FamilyCommand) -> Result<()> {
    let manager = FamilyManager::new(db);

    match command {
        FamilyCommand::Create(args) => {
            let request = NewFamilyGroup {
                name: args.name,
                head_customer_id: args.head,
                members: args.members,
                status: status_flag(args.inactive),
            };
            let group = manager.create_family_group(&request)?;
            println!("Created family group {} ({})", group.name, group.id);
        }
        FamilyCommand::Update(args) => {
            let request = NewFamilyGroup {
                name: args.name,
                head_customer_id: args.head,
                members: args.members,
                status: status_flag(args.inactive),
            };
            let group = manager.update_family_group(args.group, &request)?;
            let members = manager.get_family_members(group.id)?;
            print_family_group(&group, &members);
        }
        FamilyCommand::Show(args) => {
            let group = manager.get_family_group(args.group)?;
            let members = manager.get_family_members(group.id)?;
            print_family_group(&group, &members);
        }
        FamilyCommand::List => {
            let groups = manager.list_family_groups()?;
            if groups.is_empty() {
                println!("No family groups.");
            }
            for group in groups {
                println!("{}  {} ({})  head {}", group.id, group.name, group.status, group.family_head_id);
            }
        }
        FamilyCommand::ChangeHead(args) => {
            let group = manager.change_family_head(args.group, args.customer)?;
            println!("{} is now headed by {}", group.name, group.family_head_id);
        }
        FamilyCommand::AddMember(args) => {
            let member = manager.add_family_member(args.group, args.customer, args.relationship.as_deref())?;
            println!("Added member {}", member.id);
        }
        FamilyCommand::RemoveMember(args) => {
            manager.remove_family_member(args.group, args.member)?;
            println!("Removed member {}", args.member);
        }
        FamilyCommand::Delete(args) => {
            let group = manager.get_family_group(args.group)?;
            let members = manager.get_family_members(group.id)?;
            print_family_group(&group, &members);
            println!();

            if !args.force {
                let confirmed = Confirm::new(&format!("Delete {} and release {} member(s)?", group.name, members.len()))
                    .with_default(false)
                    .prompt()
                    .unwrap_or(false);

                if !confirmed {
                    return Ok(());
                }
            }

            manager.delete_family_group(&group)?;
            println!("Deleted.");
        }
        FamilyCommand::Status(args) => {
            let group = manager.set_family_group_status(args.group, status_flag(args.inactive))?;
            println!("{} is now {}", group.name, group.status);
        }
        FamilyCommand::Available(args) => {
            let customers = manager.get_available_customers(args.group)?;
            if customers.is_empty() {
                println!("No available customers.");
            }
            for customer in &customers {
                print_customer_line(customer);
            }
        }
        FamilyCommand::Cleanup => {
            let removed = manager.cleanup_orphaned_records()?;
            if removed == 0 {
                println!("No inconsistent member rows.");
            } else {
                println!("Removed {} inconsistent member row(s).", removed);
            }
        }
    }

    Ok(())
}

fn status_flag(inactive: bool) -> Status {
    if inactive {
        Status::Inactive
    } else {
        Status::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FamilyCreateArgs, FamilyDeleteArgs, FamilyStatusArgs, GroupArg};
    use crate::models::{Customer, MemberInput};

    #[test]
    fn create_show_and_force_delete() {
        let db = Database::open_memory().unwrap();
        let head = Customer::new("A Smith");
        let spouse = Customer::new("B Smith");
        db.insert_customer(&head).unwrap();
        db.insert_customer(&spouse).unwrap();

        run_family(
            &db,
            FamilyCommand::Create(FamilyCreateArgs {
                name: "Smith Family".to_string(),
                head: head.id,
                members: vec![MemberInput::new(spouse.id, Some("spouse"))],
                inactive: false,
            }),
        )
        .unwrap();

        let group = db.list_family_groups().unwrap().remove(0);
        run_family(&db, FamilyCommand::Show(GroupArg { group: group.id })).unwrap();

        run_family(
            &db,
            FamilyCommand::Delete(FamilyDeleteArgs {
                group: group.id,
                force: true,
            }),
        )
        .unwrap();
        assert!(db.list_family_groups().unwrap().is_empty());
        assert!(db.get_customer_by_id(spouse.id).unwrap().unwrap().family_group_id.is_none());
    }

    #[test]
    fn status_command_toggles_group() {
        let db = Database::open_memory().unwrap();
        let head = Customer::new("A Smith");
        db.insert_customer(&head).unwrap();
        let group = FamilyManager::new(&db)
            .create_family_group(&NewFamilyGroup::new("Smith Family", head.id))
            .unwrap();

        run_family(&db, FamilyCommand::Status(FamilyStatusArgs { group: group.id, inactive: true })).unwrap();
        assert_eq!(db.get_family_group(group.id).unwrap().unwrap().status, Status::Inactive);

        run_family(&db, FamilyCommand::Status(FamilyStatusArgs { group: group.id, inactive: false })).unwrap();
        assert_eq!(db.get_family_group(group.id).unwrap().unwrap().status, Status::Active);
    }

    #[test]
    fn errors_surface_as_typed_errors() {
        let db = Database::open_memory().unwrap();
        let err = run_family(&db, FamilyCommand::Show(GroupArg { group: uuid::Uuid::new_v4() })).unwrap_err();
        let typed = err.downcast_ref::<crate::Error>().unwrap();
        assert!(typed.is_not_found());
    }
}
