//! Analysers and their operating mode.
//!
//! Mode changes are the one guarded transition in the dashboards:
//! - Maintenance and Inactive need a reason.
//! - Ready needs the QC-passed acknowledgement (and no reason).
//! - Calibration is unguarded.
//!
//! A rejected change leaves the instrument untouched and writes no audit entry.

use crate::access::Action;
use crate::audit::AuditAction;
use crate::dates::format_timestamp;
use crate::error::{FormErrors, LisError, LisResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::require;
use crate::view::{Editable, ListView};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Name of the mode change dialog in [`crate::view::Dialog::Action`].
pub const MODE_CHANGE_DIALOG: &str = "change_mode";

labelled_enum! {
    pub enum InstrumentMode {
        Ready => "Ready",
        Maintenance => "Maintenance",
        Inactive => "Inactive",
        Calibration => "Calibration",
    }
}

labelled_enum! {
    pub enum InstrumentStatus {
        Available => "Available",
        InUse => "In Use",
        Error => "Error",
        Offline => "Offline",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Instrument {
    pub id: String,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub location: String,
    pub mode: InstrumentMode,
    pub status: InstrumentStatus,
    pub operator: String,
    pub last_modified: String,
}

/// A requested mode change, as entered in the dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChangeRequest {
    pub target: InstrumentMode,
    pub reason: String,
    pub qc_passed: bool,
}

impl ModeChangeRequest {
    pub fn new(target: InstrumentMode) -> Self {
        Self {
            target,
            reason: String::new(),
            qc_passed: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_qc_passed(mut self, qc_passed: bool) -> Self {
        self.qc_passed = qc_passed;
        self
    }

    /// Field-keyed problems with the request (`reason`, `qc_passed`).
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        match self.target {
            InstrumentMode::Maintenance | InstrumentMode::Inactive => {
                if self.reason.trim().is_empty() {
                    errors.insert(
                        "reason",
                        format!("A reason is required to set {}", self.target),
                    );
                }
            }
            InstrumentMode::Ready => {
                if !self.qc_passed {
                    errors.insert("qc_passed", "QC must pass before setting Ready");
                }
            }
            InstrumentMode::Calibration => {}
        }
        errors
    }

    fn trimmed_reason(&self) -> Option<&str> {
        let reason = self.reason.trim();
        (!reason.is_empty()).then_some(reason)
    }
}

/// An applied mode change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModeTransition {
    pub from: InstrumentMode,
    pub to: InstrumentMode,
    pub reason: Option<String>,
}

impl ModeTransition {
    /// Audit log details: `"<from> → <to>"`, followed by the reason if one was given.
    pub fn details(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{} → {}: {}", self.from, self.to, reason),
            None => format!("{} → {}", self.from, self.to),
        }
    }
}

impl Instrument {
    /// Applies `request` if it passes the guard.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Validation`] without modifying the instrument when the guard
    /// rejects the request.
    pub fn apply_mode_change(
        &mut self,
        request: &ModeChangeRequest,
        now: NaiveDateTime,
    ) -> LisResult<ModeTransition> {
        request.validate().into_result()?;
        let transition = ModeTransition {
            from: self.mode,
            to: request.target,
            reason: request.trimmed_reason().map(str::to_owned),
        };
        self.mode = request.target;
        self.last_modified = format_timestamp(now);
        Ok(transition)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentField {
    Id,
    Name,
    Model,
    SerialNumber,
    Location,
    Mode,
    Status,
    Operator,
}

pub const SEARCH_FIELDS: [InstrumentField; 4] = [
    InstrumentField::Name,
    InstrumentField::Id,
    InstrumentField::Model,
    InstrumentField::SerialNumber,
];

impl Record for Instrument {
    const KIND: &'static str = "instrument";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for Instrument {
    type Field = InstrumentField;

    fn field_text(&self, field: InstrumentField) -> Option<Cow<'_, str>> {
        Some(match field {
            InstrumentField::Id => Cow::Borrowed(self.id.as_str()),
            InstrumentField::Name => Cow::Borrowed(self.name.as_str()),
            InstrumentField::Model => Cow::Borrowed(self.model.as_str()),
            InstrumentField::SerialNumber => Cow::Borrowed(self.serial_number.as_str()),
            InstrumentField::Location => Cow::Borrowed(self.location.as_str()),
            InstrumentField::Mode => Cow::Borrowed(self.mode.label()),
            InstrumentField::Status => Cow::Borrowed(self.status.label()),
            InstrumentField::Operator => Cow::Borrowed(self.operator.as_str()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.last_modified)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InstrumentDraft {
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub location: String,
    pub operator: String,
}

impl Editable for Instrument {
    type Draft = InstrumentDraft;

    fn validate(draft: &InstrumentDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "name", "Name", &draft.name);
        require(&mut errors, "model", "Model", &draft.model);
        require(&mut errors, "serial_number", "Serial number", &draft.serial_number);
        require(&mut errors, "location", "Location", &draft.location);
        errors
    }

    /// New instruments start Inactive and Offline until commissioned.
    fn from_draft(id: String, draft: InstrumentDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            name: draft.name.trim().to_owned(),
            model: draft.model.trim().to_owned(),
            serial_number: draft.serial_number.trim().to_owned(),
            location: draft.location.trim().to_owned(),
            mode: InstrumentMode::Inactive,
            status: InstrumentStatus::Offline,
            operator: draft.operator.trim().to_owned(),
            last_modified: format_timestamp(now),
        }
    }

    fn apply_draft(&mut self, draft: InstrumentDraft, now: NaiveDateTime) {
        self.name = draft.name.trim().to_owned();
        self.model = draft.model.trim().to_owned();
        self.serial_number = draft.serial_number.trim().to_owned();
        self.location = draft.location.trim().to_owned();
        self.operator = draft.operator.trim().to_owned();
        self.last_modified = format_timestamp(now);
    }

    fn to_draft(&self) -> InstrumentDraft {
        InstrumentDraft {
            name: self.name.clone(),
            model: self.model.clone(),
            serial_number: self.serial_number.clone(),
            location: self.location.clone(),
            operator: self.operator.clone(),
        }
    }
}

pub fn summary_specs() -> Vec<AggregateSpec<Instrument>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Full),
        AggregateSpec::count_equal(
            "ready",
            AggregateSource::Full,
            InstrumentField::Mode,
            InstrumentMode::Ready.label(),
        ),
        AggregateSpec::count_equal(
            "maintenance",
            AggregateSource::Full,
            InstrumentField::Mode,
            InstrumentMode::Maintenance.label(),
        ),
        AggregateSpec::count_equal(
            "inactive",
            AggregateSource::Full,
            InstrumentField::Mode,
            InstrumentMode::Inactive.label(),
        ),
        AggregateSpec::count_equal(
            "calibration",
            AggregateSource::Full,
            InstrumentField::Mode,
            InstrumentMode::Calibration.label(),
        ),
        AggregateSpec::count("shown", AggregateSource::Filtered),
    ]
}

impl<R: Repository<Instrument>> ListView<Instrument, R> {
    /// Opens the mode change dialog for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] or [`LisError::NotFound`].
    pub fn open_mode_change(&mut self, id: &str) -> LisResult<()> {
        self.ensure(Action::ChangeStatus)?;
        self.open_action(MODE_CHANGE_DIALOG, id)
    }

    /// Changes an instrument's mode through the guard.
    ///
    /// On rejection the instrument, the audit trail and the dialog are left as they were and
    /// the field errors are kept for display.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], [`LisError::NotFound`] or
    /// [`LisError::Validation`].
    pub fn change_mode(
        &mut self,
        id: &str,
        request: &ModeChangeRequest,
        now: NaiveDateTime,
    ) -> LisResult<ModeTransition> {
        self.ensure(Action::ChangeStatus)?;
        self.require_record(id)?;

        let outcome = match self.store_mut().get_mut(id) {
            Some(instrument) => instrument.apply_mode_change(request, now),
            None => Err(LisError::NotFound {
                kind: Instrument::KIND,
                id: id.to_owned(),
            }),
        };
        let transition = match outcome {
            Ok(transition) => transition,
            Err(LisError::Validation(errors)) => {
                tracing::warn!(id, target = %request.target, "mode change rejected");
                return Err(self.reject("Mode not changed", errors));
            }
            Err(e) => return Err(self.fail("Mode not changed", e)),
        };

        tracing::info!(id, from = %transition.from, to = %transition.to, "instrument mode changed");
        self.finish();
        self.notices_mut().success(
            "Mode updated",
            format!("{id} is now {}", transition.to),
        );
        self.audit(AuditAction::ModeChanged, id, transition.details(), now);
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Module, Role};
    use crate::query::FilterCriteria;
    use crate::view::Dialog;
    use lis_ids::SequentialIds;

    fn instrument(id: &str, mode: InstrumentMode) -> Instrument {
        Instrument {
            id: id.to_owned(),
            name: "Sysmex XN-1000".to_owned(),
            model: "XN-1000".to_owned(),
            serial_number: "SN-88213".to_owned(),
            location: "Haematology Bench 2".to_owned(),
            mode,
            status: InstrumentStatus::Available,
            operator: "Dana Okafor".to_owned(),
            last_modified: "2024-03-01 07:45:00".to_owned(),
        }
    }

    fn now() -> NaiveDateTime {
        crate::dates::parse_timestamp("2024-03-05 16:20:00").unwrap()
    }

    fn manager_view() -> ListView<Instrument> {
        ListView::in_memory(
            Role::Manager,
            Module::Instruments,
            vec![
                instrument("INS-001", InstrumentMode::Maintenance),
                instrument("INS-002", InstrumentMode::Ready),
            ],
            FilterCriteria::new(SEARCH_FIELDS),
            SequentialIds::new("INS", 3).unwrap(),
        )
        .with_audit_trail("Quinn Manager")
        .unwrap()
    }

    #[test]
    fn blank_reason_blocks_maintenance_and_inactive() {
        for target in [InstrumentMode::Maintenance, InstrumentMode::Inactive] {
            let mut v = manager_view();
            v.open_mode_change("INS-002").unwrap();

            let request = ModeChangeRequest::new(target).with_reason("   ");
            let err = v.change_mode("INS-002", &request, now()).expect_err("reason required");
            match err {
                LisError::Validation(errors) => assert!(errors.contains("reason")),
                other => panic!("expected Validation, got {other:?}"),
            }

            let unchanged = v.get("INS-002").unwrap();
            assert_eq!(unchanged.mode, InstrumentMode::Ready);
            assert_eq!(unchanged.last_modified, "2024-03-01 07:45:00");
            assert!(v.audit_trail().unwrap().is_empty());
            assert!(matches!(v.dialog(), Dialog::Action { .. }));
            assert!(v.errors().contains("reason"));
        }
    }

    #[test]
    fn ready_requires_qc() {
        let mut v = manager_view();
        let request = ModeChangeRequest::new(InstrumentMode::Ready).with_reason("serviced");
        let err = v.change_mode("INS-001", &request, now()).expect_err("QC required");
        match err {
            LisError::Validation(errors) => assert!(errors.contains("qc_passed")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(v.get("INS-001").unwrap().mode, InstrumentMode::Maintenance);
    }

    #[test]
    fn maintenance_to_ready_with_qc_and_no_reason() {
        let mut v = manager_view();
        v.open_mode_change("INS-001").unwrap();

        let request = ModeChangeRequest::new(InstrumentMode::Ready).with_qc_passed(true);
        let transition = v.change_mode("INS-001", &request, now()).unwrap();

        assert_eq!(transition.from, InstrumentMode::Maintenance);
        let changed = v.get("INS-001").unwrap();
        assert_eq!(changed.mode, InstrumentMode::Ready);
        assert_eq!(changed.last_modified, "2024-03-05 16:20:00");
        assert_eq!(v.dialog(), &Dialog::Closed);

        let entry = &v.audit_trail().unwrap().entries()[0];
        assert_eq!(entry.action, AuditAction::ModeChanged);
        assert_eq!(entry.details, "Maintenance → Ready");
        assert_eq!(entry.entity_id, "INS-001");
    }

    #[test]
    fn audit_details_carry_the_reason() {
        let mut v = manager_view();
        let request =
            ModeChangeRequest::new(InstrumentMode::Inactive).with_reason("  Awaiting parts ");
        v.change_mode("INS-002", &request, now()).unwrap();
        assert_eq!(
            v.audit_trail().unwrap().entries()[0].details,
            "Ready → Inactive: Awaiting parts"
        );
    }

    #[test]
    fn calibration_is_unguarded() {
        let mut v = manager_view();
        let request = ModeChangeRequest::new(InstrumentMode::Calibration);
        assert!(v.change_mode("INS-002", &request, now()).is_ok());
        assert_eq!(v.aggregates(&summary_specs()).get("calibration"), Some(1));
    }

    #[test]
    fn lab_users_change_mode_but_cannot_register_instruments() {
        let mut v = ListView::in_memory(
            Role::LabUser,
            Module::Instruments,
            vec![instrument("INS-001", InstrumentMode::Maintenance)],
            FilterCriteria::new(SEARCH_FIELDS),
            SequentialIds::new("INS", 3).unwrap(),
        );
        let request = ModeChangeRequest::new(InstrumentMode::Ready).with_qc_passed(true);
        assert!(v.change_mode("INS-001", &request, now()).is_ok());
        assert!(v.open_create().is_err());
    }

    #[test]
    fn new_instruments_start_inactive() {
        let mut v = manager_view();
        let draft = InstrumentDraft {
            name: "Cobas c311".into(),
            model: "c311".into(),
            serial_number: "CB-0042".into(),
            location: "Chemistry".into(),
            operator: String::new(),
        };
        let id = v.submit_create(draft, now()).unwrap();
        assert_eq!(id, "INS-003");
        assert_eq!(v.records()[0].mode, InstrumentMode::Inactive);
    }
}
