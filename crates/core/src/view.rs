//! The list view controller shared by every management screen.
//!
//! A [`ListView`] owns one record store and all UI state around it: filter criteria, sort order,
//! the open dialog, the field errors of the last rejected form, the notice queue and (for
//! manager screens) an audit trail. All mutation goes through its operations, each of which:
//! 1. checks the role's [`Capabilities`] for the module,
//! 2. validates input, recording field errors and an error notice on failure without touching
//!    the store,
//! 3. on success replaces the store contents, closes the dialog, queues a success notice and
//!    appends an audit entry when a trail is attached.

use crate::access::{Action, Capabilities, Module, Role};
use crate::audit::{AuditAction, AuditTrail};
use crate::error::{FormErrors, LisError, LisResult};
use crate::notices::{Notice, Notices};
use crate::query::{
    compute_aggregates, sort_by_timestamp, AggregateSpec, Aggregates, DateRange, FilterCriteria,
    Filterable, Selection, SortOrder,
};
use crate::store::{InMemoryRepository, Record, Repository};
use chrono::NaiveDateTime;
use lis_ids::IdGenerator;
use std::fmt;
use std::marker::PhantomData;

/// Attempts made to find an unused identifier before giving up.
const ID_ATTEMPTS: usize = 5;

/// A record that can be created and edited through a dialog form.
pub trait Editable: Record {
    /// Raw form values as typed by the user.
    type Draft: Clone + fmt::Debug;

    /// Field-keyed problems with `draft`; empty when it is acceptable.
    fn validate(draft: &Self::Draft) -> FormErrors;

    /// Builds a new record from an accepted draft.
    fn from_draft(id: String, draft: Self::Draft, now: NaiveDateTime) -> Self;

    /// Applies an accepted draft to an existing record.
    fn apply_draft(&mut self, draft: Self::Draft, now: NaiveDateTime);

    /// Current values, used to prefill the edit dialog.
    fn to_draft(&self) -> Self::Draft;
}

/// A record with a single replaceable status field.
pub trait StatusBearing: Record {
    type Status: Copy + PartialEq + fmt::Display;

    fn status(&self) -> Self::Status;

    fn set_status(&mut self, status: Self::Status, now: NaiveDateTime);
}

/// Which dialog, if any, is open over the list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Dialog {
    #[default]
    Closed,
    Create,
    Edit(String),
    Delete(String),
    /// A record-specific dialog such as an instrument mode change.
    Action { name: &'static str, id: String },
}

pub(crate) fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Controller for one list screen.
pub struct ListView<T, R = InMemoryRepository<T>>
where
    T: Record + Filterable,
    R: Repository<T>,
{
    role: Role,
    module: Module,
    store: R,
    criteria: FilterCriteria<T::Field>,
    sort: Option<SortOrder>,
    capabilities: Capabilities,
    dialog: Dialog,
    errors: FormErrors,
    notices: Notices,
    audit: Option<AuditTrail>,
    actor: String,
    ids: Box<dyn IdGenerator>,
    on_navigate_to_dashboard: Option<Box<dyn FnMut()>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record + Filterable> ListView<T> {
    /// A view over an in-memory store seeded with `records`.
    pub fn in_memory(
        role: Role,
        module: Module,
        records: Vec<T>,
        criteria: FilterCriteria<T::Field>,
        ids: impl IdGenerator + 'static,
    ) -> Self {
        Self::new(
            role,
            module,
            InMemoryRepository::from_records(records),
            criteria,
            Box::new(ids),
        )
    }
}

impl<T, R> ListView<T, R>
where
    T: Record + Filterable,
    R: Repository<T>,
{
    /// Creates a view with the capabilities `role` has in `module`.
    pub fn new(
        role: Role,
        module: Module,
        store: R,
        criteria: FilterCriteria<T::Field>,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        Self {
            role,
            module,
            store,
            criteria,
            sort: None,
            capabilities: Capabilities::for_role(role, module),
            dialog: Dialog::Closed,
            errors: FormErrors::new(),
            notices: Notices::new(),
            audit: None,
            actor: role.label().to_owned(),
            ids,
            on_navigate_to_dashboard: None,
            _record: PhantomData,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_sort(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    /// Attaches an audit trail; entries are attributed to `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Id`] if the trail's identifier generator cannot be created.
    pub fn with_audit_trail(mut self, actor: impl Into<String>) -> LisResult<Self> {
        self.actor = actor.into();
        self.audit = Some(AuditTrail::new()?);
        Ok(self)
    }

    /// Attaches `trail`, typically a [`AuditTrail::fork`] of a session-wide trail.
    pub fn with_shared_audit_trail(
        mut self,
        actor: impl Into<String>,
        trail: AuditTrail,
    ) -> Self {
        self.actor = actor.into();
        self.audit = Some(trail);
        self
    }

    pub fn on_navigate_to_dashboard(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_navigate_to_dashboard = Some(Box::new(callback));
        self
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn module(&self) -> Module {
        self.module
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn records(&self) -> &[T] {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.store.get(id)
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn criteria(&self) -> &FilterCriteria<T::Field> {
        &self.criteria
    }

    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    /// Field errors of the most recently rejected form.
    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn audit_trail(&self) -> Option<&AuditTrail> {
        self.audit.as_ref()
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Rows passing the current filters, in sort order (or store order when unsorted).
    pub fn visible(&self) -> Vec<&T> {
        let mut rows = self.criteria.apply(self.store.list());
        if let Some(order) = self.sort {
            sort_by_timestamp(&mut rows, order);
        }
        rows
    }

    /// Summary values, each computed over the source its `AggregateSpec` names.
    pub fn aggregates(&self, specs: &[AggregateSpec<T>]) -> Aggregates {
        let visible = self.visible();
        compute_aggregates(self.store.list(), &visible, specs)
    }

    // ------------------------------------------------------------------
    // Filter controls
    // ------------------------------------------------------------------

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.criteria.set_query(query);
    }

    pub fn set_selection(&mut self, field: T::Field, selection: impl Into<Selection>) {
        self.criteria.set_selection(field, selection.into());
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.criteria.set_range(range);
    }

    /// Sets the date range from date-picker text.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidDate`] and queues an error notice when a bound cannot be
    /// parsed; the current range is left as it was.
    pub fn set_date_range_text(&mut self, start: Option<&str>, end: Option<&str>) -> LisResult<()> {
        match DateRange::parse(start, end) {
            Ok(range) => {
                self.criteria.set_range(range);
                Ok(())
            }
            Err(e) => Err(self.fail("Invalid date", e)),
        }
    }

    pub fn clear_filters(&mut self) {
        self.criteria.clear();
    }

    pub fn set_sort(&mut self, order: Option<SortOrder>) {
        self.sort = order;
    }

    // ------------------------------------------------------------------
    // Dialogs
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] if the role cannot create records here.
    pub fn open_create(&mut self) -> LisResult<()> {
        self.ensure(Action::Create)?;
        self.errors.clear();
        self.dialog = Dialog::Create;
        Ok(())
    }

    /// Opens the delete confirmation for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] or [`LisError::NotFound`].
    pub fn request_delete(&mut self, id: &str) -> LisResult<()> {
        self.ensure(Action::Delete)?;
        self.require_record(id)?;
        self.dialog = Dialog::Delete(id.to_owned());
        Ok(())
    }

    /// Opens a record-specific dialog (mode change, approval decision, ...).
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if `id` is not in the store.
    pub fn open_action(&mut self, name: &'static str, id: &str) -> LisResult<()> {
        self.require_record(id)?;
        self.errors.clear();
        self.dialog = Dialog::Action {
            name,
            id: id.to_owned(),
        };
        Ok(())
    }

    pub fn close_dialog(&mut self) {
        self.dialog = Dialog::Closed;
        self.errors.clear();
    }

    /// Deletes the record named by the open delete confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Precondition`] when no delete confirmation is open, otherwise the
    /// errors of [`ListView::delete`].
    pub fn confirm_delete(&mut self, now: NaiveDateTime) -> LisResult<T> {
        let Dialog::Delete(id) = self.dialog.clone() else {
            return Err(LisError::Precondition(
                "no delete confirmation is open".into(),
            ));
        };
        self.delete(&id, now)
    }

    /// Removes one record. This cannot be undone.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] or [`LisError::NotFound`].
    pub fn delete(&mut self, id: &str, now: NaiveDateTime) -> LisResult<T> {
        self.ensure(Action::Delete)?;
        let removed = match self.store.delete(id) {
            Ok(removed) => removed,
            Err(e) => return Err(self.fail("Delete failed", e)),
        };
        tracing::info!(kind = T::KIND, id, "record deleted");

        self.dialog = Dialog::Closed;
        self.notices.success(
            format!("{} deleted", capitalise(T::KIND)),
            format!("{id} has been permanently removed"),
        );
        self.audit(AuditAction::Deleted, id, format!("Deleted {} {id}", T::KIND), now);
        Ok(removed)
    }

    /// Invokes the breadcrumb callback, if one was supplied.
    pub fn navigate_to_dashboard(&mut self) {
        self.close_dialog();
        if let Some(callback) = self.on_navigate_to_dashboard.as_mut() {
            callback();
        }
    }

    // ------------------------------------------------------------------
    // Helpers for record-specific operations
    // ------------------------------------------------------------------

    /// Checks a capability, queueing an error notice on denial.
    pub(crate) fn ensure(&mut self, action: Action) -> LisResult<()> {
        if let Err(e) = self.capabilities.check(action, self.role, self.module) {
            return Err(self.fail("Not permitted", e));
        }
        Ok(())
    }

    pub(crate) fn require_record(&mut self, id: &str) -> LisResult<()> {
        if self.store.contains(id) {
            return Ok(());
        }
        let e = LisError::NotFound {
            kind: T::KIND,
            id: id.to_owned(),
        };
        Err(self.fail("Not found", e))
    }

    /// Queues an error notice for `err` and hands it back for returning.
    pub(crate) fn fail(&mut self, title: &str, err: LisError) -> LisError {
        self.notices.error(title, err.to_string());
        err
    }

    /// Keeps `errors` for display, queues an error notice and returns the validation error.
    pub(crate) fn reject(&mut self, title: &str, errors: FormErrors) -> LisError {
        tracing::debug!(kind = T::KIND, %errors, "form rejected");
        self.errors = errors.clone();
        self.notices.error(title, errors.to_string());
        LisError::Validation(errors)
    }

    /// Closes the dialog and clears field errors after a successful operation.
    pub(crate) fn finish(&mut self) {
        self.dialog = Dialog::Closed;
        self.errors.clear();
    }

    /// Appends to the audit trail, if one is attached.
    pub(crate) fn audit(
        &mut self,
        action: AuditAction,
        entity_id: &str,
        details: impl Into<String>,
        now: NaiveDateTime,
    ) {
        if let Some(trail) = self.audit.as_mut() {
            trail.record(action, T::KIND, entity_id, &self.actor, details, now);
        }
    }

    pub(crate) fn store_mut(&mut self) -> &mut R {
        &mut self.store
    }

    pub(crate) fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    /// Allocates `count` identifiers that are unused in this store and distinct from each other.
    pub(crate) fn allocate_ids(
        &mut self,
        count: usize,
        now: NaiveDateTime,
    ) -> LisResult<Vec<String>> {
        let mut allocated: Vec<String> = Vec::with_capacity(count);
        while allocated.len() < count {
            let id = (0..ID_ATTEMPTS)
                .map(|_| self.ids.next_id(now))
                .find(|id| !self.store.contains(id) && !allocated.contains(id))
                .ok_or_else(|| {
                    LisError::Precondition(format!(
                        "failed to allocate a unique {} identifier after {ID_ATTEMPTS} attempts",
                        T::KIND
                    ))
                })?;
            allocated.push(id);
        }
        Ok(allocated)
    }

    /// Inserts every record or none: on a failed insert the earlier ones are removed again.
    pub(crate) fn commit_all(&mut self, records: Vec<T>) -> LisResult<()> {
        let mut inserted: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id().to_owned();
            if let Err(e) = self.store.create(record) {
                for id in &inserted {
                    let _ = self.store.delete(id);
                }
                return Err(e);
            }
            inserted.push(id);
        }
        Ok(())
    }

    /// Draws identifiers until one is unused in this store.
    pub(crate) fn allocate_id(&mut self, now: NaiveDateTime) -> LisResult<String> {
        for _attempt in 0..ID_ATTEMPTS {
            let id = self.ids.next_id(now);
            if !self.store.contains(&id) {
                return Ok(id);
            }
        }
        Err(LisError::Precondition(format!(
            "failed to allocate a unique {} identifier after {ID_ATTEMPTS} attempts",
            T::KIND
        )))
    }
}

impl<T, R> ListView<T, R>
where
    T: Editable + Filterable,
    R: Repository<T>,
{
    /// Opens the edit dialog for `id` and returns its current values.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] or [`LisError::NotFound`].
    pub fn open_edit(&mut self, id: &str) -> LisResult<T::Draft> {
        self.ensure(Action::Update)?;
        self.require_record(id)?;
        self.errors.clear();
        self.dialog = Dialog::Edit(id.to_owned());
        let draft = self
            .store
            .get(id)
            .map(Editable::to_draft)
            .ok_or_else(|| LisError::NotFound {
                kind: T::KIND,
                id: id.to_owned(),
            })?;
        Ok(draft)
    }

    /// Validates `draft` and, if acceptable, prepends a new record built from it.
    ///
    /// Returns the new record's identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], [`LisError::Validation`] (store untouched, dialog
    /// left open) or an identifier allocation failure.
    pub fn submit_create(&mut self, draft: T::Draft, now: NaiveDateTime) -> LisResult<String> {
        self.ensure(Action::Create)?;

        let errors = T::validate(&draft);
        if !errors.is_empty() {
            return Err(self.reject("Please fix the highlighted fields", errors));
        }

        let id = match self.allocate_id(now) {
            Ok(id) => id,
            Err(e) => return Err(self.fail("Create failed", e)),
        };
        let record = T::from_draft(id.clone(), draft, now);
        if let Err(e) = self.store.create(record) {
            return Err(self.fail("Create failed", e));
        }
        tracing::info!(kind = T::KIND, id = %id, "record created");

        self.finish();
        self.notices.success(
            format!("{} created", capitalise(T::KIND)),
            format!("{id} has been added"),
        );
        self.audit(AuditAction::Created, &id, format!("Created {} {id}", T::KIND), now);
        Ok(id)
    }

    /// Validates `draft` and, if acceptable, applies it to the record with `id` in place.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], [`LisError::NotFound`] or
    /// [`LisError::Validation`].
    pub fn submit_update(
        &mut self,
        id: &str,
        draft: T::Draft,
        now: NaiveDateTime,
    ) -> LisResult<()> {
        self.ensure(Action::Update)?;
        self.require_record(id)?;

        let errors = T::validate(&draft);
        if !errors.is_empty() {
            return Err(self.reject("Please fix the highlighted fields", errors));
        }

        let mut record = match self.store.get(id) {
            Some(record) => record.clone(),
            None => {
                let e = LisError::NotFound {
                    kind: T::KIND,
                    id: id.to_owned(),
                };
                return Err(self.fail("Update failed", e));
            }
        };
        record.apply_draft(draft, now);
        if let Err(e) = self.store.update(record) {
            return Err(self.fail("Update failed", e));
        }
        tracing::info!(kind = T::KIND, id, "record updated");

        self.finish();
        self.notices.success(
            format!("{} updated", capitalise(T::KIND)),
            format!("{id} has been saved"),
        );
        self.audit(AuditAction::Updated, id, format!("Updated {} {id}", T::KIND), now);
        Ok(())
    }
}

impl<T, R> ListView<T, R>
where
    T: StatusBearing + Filterable,
    R: Repository<T>,
{
    /// Replaces the status of `id` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] or [`LisError::NotFound`].
    pub fn set_status(&mut self, id: &str, status: T::Status, now: NaiveDateTime) -> LisResult<()> {
        self.ensure(Action::ChangeStatus)?;
        self.require_record(id)?;

        let Some(record) = self.store.get_mut(id) else {
            return Err(LisError::NotFound {
                kind: T::KIND,
                id: id.to_owned(),
            });
        };
        let previous = record.status();
        record.set_status(status, now);
        tracing::info!(kind = T::KIND, id, from = %previous, to = %status, "status changed");

        self.notices.success(
            "Status updated",
            format!("{id} is now {status}"),
        );
        self.audit(
            AuditAction::StatusChanged,
            id,
            format!("{previous} → {status}"),
            now,
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::AggregateSource;
    use chrono::NaiveDate;
    use lis_ids::SequentialIds;
    use std::borrow::Cow;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    labelled_enum! {
        pub(crate) enum SpecimenState {
            Received => "Received",
            Processed => "Processed",
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) struct Specimen {
        id: String,
        label: String,
        state: SpecimenState,
        collected_at: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) enum SpecimenField {
        Label,
        State,
    }

    impl Record for Specimen {
        const KIND: &'static str = "specimen";

        fn id(&self) -> &str {
            &self.id
        }
    }

    impl Filterable for Specimen {
        type Field = SpecimenField;

        fn field_text(&self, field: SpecimenField) -> Option<Cow<'_, str>> {
            match field {
                SpecimenField::Label => Some(Cow::Borrowed(&self.label)),
                SpecimenField::State => Some(Cow::Borrowed(self.state.label())),
            }
        }

        fn timestamp_text(&self) -> Option<&str> {
            Some(&self.collected_at)
        }
    }

    impl Editable for Specimen {
        type Draft = String;

        fn validate(draft: &String) -> FormErrors {
            let mut errors = FormErrors::new();
            crate::validation::require(&mut errors, "label", "Label", draft);
            errors
        }

        fn from_draft(id: String, draft: String, now: NaiveDateTime) -> Self {
            Self {
                id,
                label: draft.trim().to_owned(),
                state: SpecimenState::Received,
                collected_at: crate::dates::format_timestamp(now),
            }
        }

        fn apply_draft(&mut self, draft: String, _now: NaiveDateTime) {
            self.label = draft.trim().to_owned();
        }

        fn to_draft(&self) -> String {
            self.label.clone()
        }
    }

    impl StatusBearing for Specimen {
        type Status = SpecimenState;

        fn status(&self) -> SpecimenState {
            self.state
        }

        fn set_status(&mut self, status: SpecimenState, _now: NaiveDateTime) {
            self.state = status;
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn specimen(id: &str, label: &str) -> Specimen {
        Specimen {
            id: id.to_owned(),
            label: label.to_owned(),
            state: SpecimenState::Received,
            collected_at: "2024-04-01 09:00:00".to_owned(),
        }
    }

    fn view(records: Vec<Specimen>) -> ListView<Specimen> {
        ListView::in_memory(
            Role::Manager,
            Module::RawResults,
            records,
            FilterCriteria::new([SpecimenField::Label]),
            SequentialIds::new("SP", 3).unwrap(),
        )
    }

    #[test]
    fn creates_prepend_with_unique_ids() {
        let mut v = view(vec![]);
        let mut seen = HashSet::new();
        for n in 0..5 {
            v.open_create().unwrap();
            let id = v.submit_create(format!("sample {n}"), now()).unwrap();
            assert_eq!(v.records()[0].id, id);
            assert!(seen.insert(id));
            assert_eq!(v.dialog(), &Dialog::Closed);
        }
        assert_eq!(v.records().len(), 5);
        assert_eq!(v.records()[0].label, "sample 4");
        assert_eq!(v.records()[4].label, "sample 0");
    }

    #[test]
    fn allocation_skips_ids_already_in_the_store() {
        let mut v = view(vec![specimen("SP-001", "seeded"), specimen("SP-002", "seeded")]);
        let id = v.submit_create("new".into(), now()).unwrap();
        assert_eq!(id, "SP-003");
    }

    #[test]
    fn failed_batch_insert_rolls_back() {
        let mut v = view(vec![specimen("SP-001", "seeded")]);
        let err = v
            .commit_all(vec![specimen("SP-005", "new"), specimen("SP-001", "dup")])
            .expect_err("SP-001 exists");
        assert!(matches!(err, LisError::DuplicateId { .. }));
        let ids: Vec<_> = v.records().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["SP-001"]);
    }

    #[test]
    fn rejected_create_keeps_dialog_and_store() {
        let mut v = view(vec![specimen("SP-001", "a")]);
        v.open_create().unwrap();

        let err = v.submit_create("   ".into(), now()).expect_err("blank label");
        assert!(matches!(err, LisError::Validation(_)));
        assert_eq!(v.dialog(), &Dialog::Create);
        assert_eq!(v.errors().get("label"), Some("Label is required"));
        assert_eq!(v.records().len(), 1);
        assert_eq!(
            v.notices().latest().unwrap().level,
            crate::notices::NoticeLevel::Error
        );
    }

    #[test]
    fn update_replaces_in_place_and_audits() {
        let mut v = view(vec![specimen("SP-001", "a"), specimen("SP-002", "b")])
            .with_audit_trail("Quinn Manager")
            .unwrap();
        let draft = v.open_edit("SP-002").unwrap();
        assert_eq!(draft, "b");

        v.submit_update("SP-002", "b (haemolysed)".into(), now()).unwrap();
        assert_eq!(v.records()[1].label, "b (haemolysed)");
        assert_eq!(v.records()[0].id, "SP-001");

        let trail = v.audit_trail().unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.entries()[0].action, AuditAction::Updated);
        assert_eq!(trail.entries()[0].user, "Quinn Manager");
    }

    #[test]
    fn delete_is_exact_and_order_preserving() {
        let mut v = view(vec![
            specimen("SP-001", "a"),
            specimen("SP-002", "b"),
            specimen("SP-003", "c"),
        ]);
        v.request_delete("SP-002").unwrap();
        assert_eq!(v.dialog(), &Dialog::Delete("SP-002".into()));

        let removed = v.confirm_delete(now()).unwrap();
        assert_eq!(removed.id, "SP-002");
        let ids: Vec<_> = v.records().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["SP-001", "SP-003"]);
        assert!(v.confirm_delete(now()).is_err());
    }

    #[test]
    fn denied_actions_do_not_mutate() {
        let mut v = view(vec![specimen("SP-001", "a")])
            .with_capabilities(Capabilities::read_only());
        assert!(matches!(
            v.delete("SP-001", now()),
            Err(LisError::PermissionDenied { .. })
        ));
        assert!(v.submit_create("x".into(), now()).is_err());
        assert!(v.set_status("SP-001", SpecimenState::Processed, now()).is_err());
        assert_eq!(v.records(), &[specimen("SP-001", "a")]);
    }

    #[test]
    fn aggregates_are_recomputed_after_every_mutation() {
        let specs = vec![
            AggregateSpec::count_equal(
                "received",
                AggregateSource::Full,
                SpecimenField::State,
                "Received",
            ),
            AggregateSpec::count("shown", AggregateSource::Filtered),
        ];
        let mut v = view(vec![specimen("SP-001", "urine"), specimen("SP-002", "blood")]);
        v.set_query("blood");

        assert_eq!(v.aggregates(&specs).get("received"), Some(2));
        assert_eq!(v.aggregates(&specs).get("shown"), Some(1));

        v.set_status("SP-001", SpecimenState::Processed, now()).unwrap();
        v.submit_create("blood".into(), now()).unwrap();

        let fresh = v
            .records()
            .iter()
            .filter(|s| s.state == SpecimenState::Received)
            .count() as i64;
        assert_eq!(v.aggregates(&specs).get("received"), Some(fresh));
        assert_eq!(v.aggregates(&specs).get("shown"), Some(2));
    }

    #[test]
    fn bad_filter_dates_leave_range_untouched() {
        let mut v = view(vec![specimen("SP-001", "a")]);
        v.set_date_range_text(Some("2024-04-01"), None).unwrap();
        let before = v.criteria().range();

        assert!(v.set_date_range_text(Some("someday"), None).is_err());
        assert_eq!(v.criteria().range(), before);
        assert_eq!(v.notices().latest().unwrap().title, "Invalid date");
    }

    #[test]
    fn breadcrumb_invokes_callback() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut v = view(vec![]).on_navigate_to_dashboard(move || counter.set(counter.get() + 1));

        v.navigate_to_dashboard();
        v.navigate_to_dashboard();
        assert_eq!(calls.get(), 2);
    }
}
