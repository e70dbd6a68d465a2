//! Roles and per-module capabilities.
//!
//! Lab users and managers see many of the same modules (instruments, reagents, reports). Rather
//! than separate views per role, each list view is parameterised by the [`Capabilities`] the role
//! has in that module.

use crate::error::{LisError, LisResult};

labelled_enum! {
    /// Dashboard role of the signed-in user.
    pub enum Role {
        LabUser => "Lab User",
        Manager => "Manager",
    }
}

labelled_enum! {
    /// Record collections managed by the dashboards.
    pub enum Module {
        TestOrders => "Test Orders",
        EventLogs => "Event Logs",
        Instruments => "Instruments",
        Reagents => "Reagents",
        Warehouse => "Warehouse",
        Reports => "Reports",
        RawResults => "Raw Results",
        SyncLogs => "Sync Logs",
        Hl7Messages => "HL7 Messages",
        AuditLogs => "Audit Logs",
        Configuration => "Configuration",
        Users => "Users",
        Approvals => "Staff Approvals",
        Notifications => "Notifications",
    }
}

labelled_enum! {
    /// Mutating actions a view may offer.
    pub enum Action {
        Create => "create",
        Update => "update",
        Delete => "delete",
        ChangeStatus => "change status",
    }
}

/// The mutating actions a role may perform in one module. Reading is always allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub change_status: bool,
}

impl Capabilities {
    pub const fn read_only() -> Self {
        Self {
            create: false,
            update: false,
            delete: false,
            change_status: false,
        }
    }

    pub const fn full() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            change_status: true,
        }
    }

    const fn status_only() -> Self {
        Self {
            change_status: true,
            ..Self::read_only()
        }
    }

    /// Capability table for `role` in `module`.
    pub fn for_role(role: Role, module: Module) -> Self {
        use Module::*;

        match (role, module) {
            (Role::LabUser, TestOrders) => Self::full(),
            (Role::LabUser, Instruments) => Self::status_only(),
            (Role::LabUser, Reagents) => Self {
                delete: false,
                ..Self::full()
            },
            (Role::LabUser, Reports | RawResults | SyncLogs | Hl7Messages) => Self {
                create: true,
                change_status: true,
                ..Self::read_only()
            },
            (Role::LabUser, Notifications) => Self {
                update: true,
                delete: true,
                ..Self::read_only()
            },
            (Role::LabUser, _) => Self::read_only(),

            (Role::Manager, TestOrders) => Self::status_only(),
            (Role::Manager, EventLogs) => Self {
                delete: true,
                change_status: true,
                ..Self::read_only()
            },
            (Role::Manager, AuditLogs) => Self::read_only(),
            (Role::Manager, _) => Self::full(),
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
            Action::ChangeStatus => self.change_status,
        }
    }

    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] when `action` is not allowed.
    pub fn check(&self, action: Action, role: Role, module: Module) -> LisResult<()> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(LisError::PermissionDenied {
                action: action.label(),
                role: role.label(),
                module: module.label(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_users_change_instrument_mode_but_do_not_edit_instruments() {
        let caps = Capabilities::for_role(Role::LabUser, Module::Instruments);
        assert!(caps.allows(Action::ChangeStatus));
        assert!(!caps.allows(Action::Create));
        assert!(!caps.allows(Action::Delete));
    }

    #[test]
    fn audit_logs_are_read_only_for_everyone() {
        for role in Role::ALL {
            assert_eq!(
                Capabilities::for_role(*role, Module::AuditLogs),
                Capabilities::read_only()
            );
        }
    }

    #[test]
    fn denied_action_names_role_and_module() {
        let caps = Capabilities::for_role(Role::LabUser, Module::Warehouse);
        let err = caps
            .check(Action::Delete, Role::LabUser, Module::Warehouse)
            .expect_err("lab users cannot delete warehouse stock");
        assert_eq!(
            err.to_string(),
            "delete is not permitted for Lab User in Warehouse"
        );
    }

    #[test]
    fn roles_parse_from_env_style_values() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("lab_user".parse::<Role>().unwrap(), Role::LabUser);
        assert_eq!("Lab User".parse::<Role>().unwrap(), Role::LabUser);
    }
}
