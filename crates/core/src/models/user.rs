//! Dashboard users and staff access requests.

use crate::access::{Action, Role};
use crate::audit::AuditAction;
use crate::dates::format_timestamp;
use crate::error::{FormErrors, LisError, LisResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::{require, require_email, require_phone};
use crate::view::{Editable, ListView, StatusBearing};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum UserStatus {
        Active => "Active",
        Inactive => "Inactive",
        Locked => "Locked",
    }
}

labelled_enum! {
    pub enum ApprovalStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserField {
    Id,
    FullName,
    Email,
    Role,
    Status,
}

pub const USER_SEARCH_FIELDS: [UserField; 3] =
    [UserField::FullName, UserField::Email, UserField::Id];

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for User {
    type Field = UserField;

    fn field_text(&self, field: UserField) -> Option<Cow<'_, str>> {
        Some(match field {
            UserField::Id => Cow::Borrowed(self.id.as_str()),
            UserField::FullName => Cow::Borrowed(self.full_name.as_str()),
            UserField::Email => Cow::Borrowed(self.email.as_str()),
            UserField::Role => Cow::Borrowed(self.role.label()),
            UserField::Status => Cow::Borrowed(self.status.label()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.created_at)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct UserDraft {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Option<Role>,
}

impl Editable for User {
    type Draft = UserDraft;

    fn validate(draft: &UserDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "full_name", "Full name", &draft.full_name);
        require_email(&mut errors, "email", &draft.email);
        require_phone(&mut errors, "phone", &draft.phone);
        if draft.role.is_none() {
            errors.insert("role", "Role is required");
        }
        errors
    }

    fn from_draft(id: String, draft: UserDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            full_name: draft.full_name.trim().to_owned(),
            email: draft.email.trim().to_owned(),
            phone: draft.phone.trim().to_owned(),
            role: draft.role.unwrap_or(Role::LabUser),
            status: UserStatus::Active,
            created_at: format_timestamp(now),
        }
    }

    fn apply_draft(&mut self, draft: UserDraft, _now: NaiveDateTime) {
        self.full_name = draft.full_name.trim().to_owned();
        self.email = draft.email.trim().to_owned();
        self.phone = draft.phone.trim().to_owned();
        if let Some(role) = draft.role {
            self.role = role;
        }
    }

    fn to_draft(&self) -> UserDraft {
        UserDraft {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: Some(self.role),
        }
    }
}

impl StatusBearing for User {
    type Status = UserStatus;

    fn status(&self) -> UserStatus {
        self.status
    }

    fn set_status(&mut self, status: UserStatus, _now: NaiveDateTime) {
        self.status = status;
    }
}

pub fn user_summary_specs() -> Vec<AggregateSpec<User>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Full),
        AggregateSpec::count_equal(
            "active",
            AggregateSource::Full,
            UserField::Status,
            UserStatus::Active.label(),
        ),
        AggregateSpec::count_equal(
            "managers",
            AggregateSource::Full,
            UserField::Role,
            Role::Manager.label(),
        ),
        AggregateSpec::count("shown", AggregateSource::Filtered),
    ]
}

// ============================================================================
// Staff approvals
// ============================================================================

/// A request for dashboard access awaiting a manager's decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaffApproval {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub requested_role: Role,
    pub submitted_at: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl StaffApproval {
    /// Draft for the user account an approved request turns into.
    pub fn to_user_draft(&self) -> UserDraft {
        UserDraft {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: Some(self.requested_role),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalField {
    FullName,
    Email,
    RequestedRole,
    Status,
}

pub const APPROVAL_SEARCH_FIELDS: [ApprovalField; 2] =
    [ApprovalField::FullName, ApprovalField::Email];

impl Record for StaffApproval {
    const KIND: &'static str = "staff approval";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for StaffApproval {
    type Field = ApprovalField;

    fn field_text(&self, field: ApprovalField) -> Option<Cow<'_, str>> {
        Some(match field {
            ApprovalField::FullName => Cow::Borrowed(self.full_name.as_str()),
            ApprovalField::Email => Cow::Borrowed(self.email.as_str()),
            ApprovalField::RequestedRole => Cow::Borrowed(self.requested_role.label()),
            ApprovalField::Status => Cow::Borrowed(self.status.label()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.submitted_at)
    }
}

pub fn approval_summary_specs() -> Vec<AggregateSpec<StaffApproval>> {
    ApprovalStatus::ALL
        .iter()
        .map(|status| {
            let name = match status {
                ApprovalStatus::Pending => "pending",
                ApprovalStatus::Approved => "approved",
                ApprovalStatus::Rejected => "rejected",
            };
            AggregateSpec::count_equal(
                name,
                AggregateSource::Full,
                ApprovalField::Status,
                status.label(),
            )
        })
        .collect()
}

impl<R: Repository<StaffApproval>> ListView<StaffApproval, R> {
    /// Approves or rejects a request, recording who decided and an optional note.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], [`LisError::NotFound`], or
    /// [`LisError::InvalidInput`] when `decision` is Pending or the request was already decided.
    pub fn decide(
        &mut self,
        id: &str,
        decision: ApprovalStatus,
        note: Option<&str>,
        now: NaiveDateTime,
    ) -> LisResult<StaffApproval> {
        self.ensure(Action::ChangeStatus)?;
        self.require_record(id)?;
        if decision == ApprovalStatus::Pending {
            let e = LisError::InvalidInput("a decision must approve or reject".into());
            return Err(self.fail("No decision recorded", e));
        }
        if let Some(current) = self.get(id).map(|r| r.status) {
            if current != ApprovalStatus::Pending {
                let e = LisError::InvalidInput(format!("request {id} is already {current}"));
                return Err(self.fail("No decision recorded", e));
            }
        }

        let actor = self.actor().to_owned();
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned);
        let decided = match self.store_mut().get_mut(id) {
            Some(request) => {
                request.status = decision;
                request.decided_by = Some(actor);
                request.note = note;
                request.clone()
            }
            None => {
                return Err(LisError::NotFound {
                    kind: StaffApproval::KIND,
                    id: id.to_owned(),
                })
            }
        };

        tracing::info!(id, decision = %decision, "staff request decided");
        self.finish();
        self.notices_mut().success(
            format!("Request {}", decision.label().to_lowercase()),
            format!("{} ({})", decided.full_name, decided.requested_role),
        );
        self.audit(
            AuditAction::StatusChanged,
            id,
            format!("{} → {}", ApprovalStatus::Pending, decision),
            now,
        );
        Ok(decided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Module;
    use crate::query::FilterCriteria;
    use lis_ids::SequentialIds;

    fn now() -> NaiveDateTime {
        crate::dates::parse_timestamp("2024-03-08 13:00:00").unwrap()
    }

    fn request(id: &str) -> StaffApproval {
        StaffApproval {
            id: id.to_owned(),
            full_name: "Priya Raman".to_owned(),
            email: "priya.raman@example.com".to_owned(),
            phone: "555-0199-221".to_owned(),
            requested_role: Role::LabUser,
            submitted_at: "2024-03-07 10:00:00".to_owned(),
            status: ApprovalStatus::Pending,
            decided_by: None,
            note: None,
        }
    }

    fn approvals() -> ListView<StaffApproval> {
        ListView::in_memory(
            Role::Manager,
            Module::Approvals,
            vec![request("APR-001"), request("APR-002")],
            FilterCriteria::new(APPROVAL_SEARCH_FIELDS),
            SequentialIds::new("APR", 3).unwrap(),
        )
        .with_audit_trail("Quinn Manager")
        .unwrap()
    }

    #[test]
    fn decisions_record_the_manager() {
        let mut v = approvals();
        let decided = v
            .decide("APR-001", ApprovalStatus::Rejected, Some("  Duplicate account "), now())
            .unwrap();
        assert_eq!(decided.decided_by.as_deref(), Some("Quinn Manager"));
        assert_eq!(decided.note.as_deref(), Some("Duplicate account"));

        let cards = v.aggregates(&approval_summary_specs());
        assert_eq!(cards.get("pending"), Some(1));
        assert_eq!(cards.get("rejected"), Some(1));
    }

    #[test]
    fn pending_is_not_a_decision() {
        let mut v = approvals();
        assert!(matches!(
            v.decide("APR-001", ApprovalStatus::Pending, None, now()),
            Err(LisError::InvalidInput(_))
        ));
        assert!(v.audit_trail().unwrap().is_empty());
    }

    #[test]
    fn decided_requests_cannot_be_decided_again() {
        let mut v = approvals();
        v.decide("APR-001", ApprovalStatus::Approved, None, now()).unwrap();
        assert!(matches!(
            v.decide("APR-001", ApprovalStatus::Rejected, Some("changed my mind"), now()),
            Err(LisError::InvalidInput(_))
        ));
        let kept = v.get("APR-001").unwrap();
        assert_eq!(kept.status, ApprovalStatus::Approved);
        assert_eq!(kept.note, None);
        assert_eq!(v.audit_trail().unwrap().len(), 1);
    }

    #[test]
    fn lab_users_cannot_decide() {
        let mut v = ListView::in_memory(
            Role::LabUser,
            Module::Approvals,
            vec![request("APR-001")],
            FilterCriteria::new(APPROVAL_SEARCH_FIELDS),
            SequentialIds::new("APR", 3).unwrap(),
        );
        assert!(v
            .decide("APR-001", ApprovalStatus::Approved, None, now())
            .is_err());
        assert_eq!(v.get("APR-001").unwrap().status, ApprovalStatus::Pending);
    }

    #[test]
    fn approved_request_becomes_a_valid_user() {
        let draft = request("APR-001").to_user_draft();
        assert!(User::validate(&draft).is_empty());

        let user = User::from_draft("USR-010".into(), draft, now());
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, Role::LabUser);
    }

    #[test]
    fn user_form_requires_valid_contact_details() {
        let draft = UserDraft {
            full_name: "Sam".into(),
            email: "sam@localhost".into(),
            phone: "12".into(),
            role: None,
        };
        let errors = User::validate(&draft);
        assert!(errors.contains("email"));
        assert!(errors.contains("phone"));
        assert!(errors.contains("role"));
    }
}
