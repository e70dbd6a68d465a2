//! Test orders: patient demographics, run results and review comments.
//!
//! Status moves Pending → In Progress → Completed, after which an order is annotated either
//! Reviewed or AI Reviewed. The order of these steps is not enforced: any role that may change
//! status can assign any status.

use crate::dates::{age_on, format_timestamp, parse_date};
use crate::error::{FormErrors, LisError, LisResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::{require, require_email, require_iso_date, require_phone};
use crate::view::{Editable, ListView, StatusBearing};
use chrono::{NaiveDate, NaiveDateTime};
use lis_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum TestOrderStatus {
        Pending => "Pending",
        InProgress => "In Progress",
        Completed => "Completed",
        Reviewed => "Reviewed",
        AiReviewed => "AI Reviewed",
    }
}

impl TestOrderStatus {
    /// Whether a run has produced results for the order.
    pub fn is_resulted(self) -> bool {
        matches!(self, Self::Completed | Self::Reviewed | Self::AiReviewed)
    }
}

labelled_enum! {
    pub enum Gender {
        Male => "Male",
        Female => "Female",
        Other => "Other",
    }
}

labelled_enum! {
    /// Abnormality flag of one result parameter.
    pub enum ResultFlag {
        Normal => "Normal",
        High => "High",
        Low => "Low",
        Critical => "Critical",
    }
}

impl ResultFlag {
    /// HL7 v2 abnormal flag code (table 0078).
    pub fn hl7_code(self) -> &'static str {
        match self {
            Self::Normal => "N",
            Self::High => "H",
            Self::Low => "L",
            Self::Critical => "AA",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestResult {
    pub parameter: String,
    pub value: String,
    pub unit: String,
    pub reference_range: String,
    pub flag: ResultFlag,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comment {
    pub author: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestOrder {
    pub id: String,
    pub patient_name: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub test_type: String,
    pub status: TestOrderStatus,
    pub created_by: String,
    pub created_at: String,
    #[serde(default)]
    pub run_by: Option<String>,
    #[serde(default)]
    pub run_at: Option<String>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl TestOrder {
    /// Patient age in completed years on `today`, if the date of birth is readable.
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        parse_date(&self.date_of_birth).map(|dob| age_on(dob, today))
    }

    /// Appends a comment. Comments are never edited or removed.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Validation`] with a `content` error when `content` is blank.
    pub fn add_comment(
        &mut self,
        author: &str,
        content: &str,
        now: NaiveDateTime,
    ) -> LisResult<&Comment> {
        let content = NonEmptyText::new(content).map_err(|_| {
            let mut errors = FormErrors::new();
            errors.insert("content", "Comment cannot be empty");
            LisError::Validation(errors)
        })?;
        self.comments.push(Comment {
            author: author.to_owned(),
            content: content.into_inner(),
            timestamp: format_timestamp(now),
        });
        let index = self.comments.len() - 1;
        Ok(&self.comments[index])
    }

    /// Records a finished instrument run: results, who ran it and when. Status becomes
    /// Completed.
    pub fn complete_run(&mut self, run_by: &str, results: Vec<TestResult>, now: NaiveDateTime) {
        self.results = results;
        self.run_by = Some(run_by.to_owned());
        self.run_at = Some(format_timestamp(now));
        self.status = TestOrderStatus::Completed;
    }

    /// Completed (or reviewed) with at least one result row.
    pub fn is_resulted(&self) -> bool {
        self.status.is_resulted() && !self.results.is_empty()
    }

    pub fn has_abnormal_results(&self) -> bool {
        self.results.iter().any(|r| r.flag != ResultFlag::Normal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestOrderField {
    Id,
    PatientName,
    TestType,
    Status,
    Gender,
    CreatedBy,
}

pub const SEARCH_FIELDS: [TestOrderField; 4] = [
    TestOrderField::PatientName,
    TestOrderField::Id,
    TestOrderField::TestType,
    TestOrderField::CreatedBy,
];

impl Record for TestOrder {
    const KIND: &'static str = "test order";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for TestOrder {
    type Field = TestOrderField;

    fn field_text(&self, field: TestOrderField) -> Option<Cow<'_, str>> {
        Some(match field {
            TestOrderField::Id => Cow::Borrowed(self.id.as_str()),
            TestOrderField::PatientName => Cow::Borrowed(self.patient_name.as_str()),
            TestOrderField::TestType => Cow::Borrowed(self.test_type.as_str()),
            TestOrderField::Status => Cow::Borrowed(self.status.label()),
            TestOrderField::Gender => Cow::Borrowed(self.gender.label()),
            TestOrderField::CreatedBy => Cow::Borrowed(self.created_by.as_str()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.created_at)
    }
}

/// Values of the create/edit test order dialog.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TestOrderDraft {
    pub patient_name: String,
    pub date_of_birth: String,
    pub gender: Option<Gender>,
    pub phone: String,
    pub email: String,
    pub test_type: String,
    pub created_by: String,
}

impl Editable for TestOrder {
    type Draft = TestOrderDraft;

    fn validate(draft: &TestOrderDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "patient_name", "Patient name", &draft.patient_name);
        require_iso_date(&mut errors, "date_of_birth", "Date of birth", &draft.date_of_birth);
        if draft.gender.is_none() {
            errors.insert("gender", "Gender is required");
        }
        require_phone(&mut errors, "phone", &draft.phone);
        require_email(&mut errors, "email", &draft.email);
        require(&mut errors, "test_type", "Test type", &draft.test_type);
        require(&mut errors, "created_by", "Ordering user", &draft.created_by);
        errors
    }

    fn from_draft(id: String, draft: TestOrderDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            patient_name: draft.patient_name.trim().to_owned(),
            date_of_birth: draft.date_of_birth.trim().to_owned(),
            gender: draft.gender.unwrap_or(Gender::Other),
            phone: draft.phone.trim().to_owned(),
            email: draft.email.trim().to_owned(),
            test_type: draft.test_type.trim().to_owned(),
            status: TestOrderStatus::Pending,
            created_by: draft.created_by.trim().to_owned(),
            created_at: format_timestamp(now),
            run_by: None,
            run_at: None,
            results: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn apply_draft(&mut self, draft: TestOrderDraft, _now: NaiveDateTime) {
        self.patient_name = draft.patient_name.trim().to_owned();
        self.date_of_birth = draft.date_of_birth.trim().to_owned();
        if let Some(gender) = draft.gender {
            self.gender = gender;
        }
        self.phone = draft.phone.trim().to_owned();
        self.email = draft.email.trim().to_owned();
        self.test_type = draft.test_type.trim().to_owned();
        self.created_by = draft.created_by.trim().to_owned();
    }

    fn to_draft(&self) -> TestOrderDraft {
        TestOrderDraft {
            patient_name: self.patient_name.clone(),
            date_of_birth: self.date_of_birth.clone(),
            gender: Some(self.gender),
            phone: self.phone.clone(),
            email: self.email.clone(),
            test_type: self.test_type.clone(),
            created_by: self.created_by.clone(),
        }
    }
}

impl StatusBearing for TestOrder {
    type Status = TestOrderStatus;

    fn status(&self) -> TestOrderStatus {
        self.status
    }

    fn set_status(&mut self, status: TestOrderStatus, _now: NaiveDateTime) {
        self.status = status;
    }
}

/// Status cards count the whole collection; the total follows the filters.
pub fn summary_specs() -> Vec<AggregateSpec<TestOrder>> {
    let mut specs = vec![AggregateSpec::count("total", AggregateSource::Filtered)];
    specs.extend(TestOrderStatus::ALL.iter().map(|status| {
        let name = match status {
            TestOrderStatus::Pending => "pending",
            TestOrderStatus::InProgress => "in_progress",
            TestOrderStatus::Completed => "completed",
            TestOrderStatus::Reviewed => "reviewed",
            TestOrderStatus::AiReviewed => "ai_reviewed",
        };
        AggregateSpec::count_equal(
            name,
            AggregateSource::Full,
            TestOrderField::Status,
            status.label(),
        )
    }));
    specs.push(AggregateSpec::count_where(
        "abnormal",
        AggregateSource::Full,
        TestOrder::has_abnormal_results,
    ));
    specs
}

impl<R: Repository<TestOrder>> ListView<TestOrder, R> {
    /// Adds a review comment to an order. Commenting needs no capability beyond viewing.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] or a `content` validation error.
    pub fn add_comment(
        &mut self,
        id: &str,
        content: &str,
        now: NaiveDateTime,
    ) -> LisResult<()> {
        self.require_record(id)?;
        let author = self.actor().to_owned();
        let outcome = match self.store_mut().get_mut(id) {
            Some(order) => order.add_comment(&author, content, now).map(|_| ()),
            None => Err(LisError::NotFound {
                kind: TestOrder::KIND,
                id: id.to_owned(),
            }),
        };
        match outcome {
            Ok(()) => {
                tracing::info!(id, "comment added");
                self.notices_mut()
                    .success("Comment added", format!("Comment added to {id}"));
                Ok(())
            }
            Err(LisError::Validation(errors)) => Err(self.reject("Comment not added", errors)),
            Err(e) => Err(self.fail("Comment not added", e)),
        }
    }

    /// Stores the results of a run and marks the order Completed.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], [`LisError::NotFound`], or
    /// [`LisError::Precondition`] when `results` is empty.
    pub fn complete_run(
        &mut self,
        id: &str,
        results: Vec<TestResult>,
        now: NaiveDateTime,
    ) -> LisResult<()> {
        self.ensure(crate::access::Action::ChangeStatus)?;
        self.require_record(id)?;
        if results.is_empty() {
            let e = LisError::Precondition(format!("no results were supplied for {id}"));
            return Err(self.fail("Run not recorded", e));
        }

        let actor = self.actor().to_owned();
        if let Some(order) = self.store_mut().get_mut(id) {
            order.complete_run(&actor, results, now);
        }
        tracing::info!(id, "run completed");
        self.notices_mut()
            .success("Run completed", format!("{id} is now Completed"));
        self.audit(
            crate::audit::AuditAction::StatusChanged,
            id,
            "Run completed with results",
            now,
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::access::{Module, Role};
    use crate::query::{DateRange, FilterCriteria, Selection};
    use lis_ids::SequentialIds;

    pub(crate) fn order(id: &str, status: TestOrderStatus, created_at: &str) -> TestOrder {
        TestOrder {
            id: id.to_owned(),
            patient_name: "Amina Yusuf".to_owned(),
            date_of_birth: "1985-07-23".to_owned(),
            gender: Gender::Female,
            phone: "+1 555 010 2030".to_owned(),
            email: "amina.yusuf@example.com".to_owned(),
            test_type: "Complete Blood Count".to_owned(),
            status,
            created_by: "Dana Okafor".to_owned(),
            created_at: created_at.to_owned(),
            run_by: None,
            run_at: None,
            results: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub(crate) fn hemoglobin(flag: ResultFlag) -> TestResult {
        TestResult {
            parameter: "Hemoglobin".to_owned(),
            value: "13.2".to_owned(),
            unit: "g/dL".to_owned(),
            reference_range: "12.0-15.5".to_owned(),
            flag,
        }
    }

    fn now() -> NaiveDateTime {
        crate::dates::parse_timestamp("2024-03-10 11:30:00").unwrap()
    }

    fn draft() -> TestOrderDraft {
        TestOrderDraft {
            patient_name: "Luis Ortega".into(),
            date_of_birth: "1990-02-14".into(),
            gender: Some(Gender::Male),
            phone: "(555) 123-4567".into(),
            email: "luis@example.org".into(),
            test_type: "Lipid Panel".into(),
            created_by: "Dana Okafor".into(),
        }
    }

    fn view(records: Vec<TestOrder>) -> ListView<TestOrder> {
        let ids = SequentialIds::new("TO", 3)
            .unwrap()
            .continuing_from(records.iter().map(|o| o.id.as_str()));
        ListView::in_memory(
            Role::LabUser,
            Module::TestOrders,
            records,
            FilterCriteria::new(SEARCH_FIELDS),
            ids,
        )
    }

    #[test]
    fn status_then_range_filter_scenario() {
        let mut v = view(vec![
            order("TO-001", TestOrderStatus::Pending, "2024-03-01 09:00"),
            order("TO-002", TestOrderStatus::Completed, "2024-03-02 09:00"),
            order("TO-003", TestOrderStatus::Completed, "2024-03-03 09:00"),
        ]);
        v.set_selection(TestOrderField::Status, "Completed");
        assert_eq!(v.visible().len(), 2);

        v.set_date_range_text(Some("2024-04-01"), Some("2024-04-30"))
            .unwrap();
        assert!(v.visible().is_empty());

        v.set_selection(TestOrderField::Status, Selection::All);
        v.set_date_range(DateRange::unbounded());
        assert_eq!(v.visible().len(), 3);
    }

    #[test]
    fn created_orders_continue_the_seed_sequence() {
        let mut v = view(vec![order("TO-003", TestOrderStatus::Pending, "2024-03-01")]);
        let id = v.submit_create(draft(), now()).unwrap();
        assert_eq!(id, "TO-004");

        let created = &v.records()[0];
        assert_eq!(created.status, TestOrderStatus::Pending);
        assert_eq!(created.created_at, "2024-03-10 11:30:00");
        assert_eq!(created.age(now().date()), Some(34));
    }

    #[test]
    fn edits_update_the_ordering_user() {
        let mut v = view(vec![order("TO-001", TestOrderStatus::Pending, "2024-03-01")]);
        let mut edit = v.open_edit("TO-001").unwrap();
        edit.created_by = "Sam Ito".into();
        v.submit_update("TO-001", edit, now()).unwrap();
        assert_eq!(v.get("TO-001").unwrap().created_by, "Sam Ito");
    }

    #[test]
    fn invalid_draft_reports_each_field() {
        let mut v = view(vec![]);
        let bad = TestOrderDraft {
            date_of_birth: "14/02/1990".into(),
            email: "luis@".into(),
            gender: None,
            ..draft()
        };
        let err = v.submit_create(bad, now()).expect_err("draft is invalid");
        match err {
            LisError::Validation(errors) => {
                assert!(errors.contains("date_of_birth"));
                assert!(errors.contains("email"));
                assert!(errors.contains("gender"));
                assert!(!errors.contains("patient_name"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(v.records().is_empty());
    }

    #[test]
    fn comments_are_appended_in_order() {
        let mut v = view(vec![order("TO-001", TestOrderStatus::Completed, "2024-03-01")]);
        v.add_comment("TO-001", "Repeat sample requested", now()).unwrap();
        v.add_comment("TO-001", "Sample received", now()).unwrap();
        assert!(v.add_comment("TO-001", "   ", now()).is_err());

        let comments = &v.get("TO-001").unwrap().comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].content, "Sample received");
        assert_eq!(comments[0].author, "Lab User");
    }

    #[test]
    fn completing_a_run_records_results_and_runner() {
        let mut v = view(vec![order("TO-001", TestOrderStatus::InProgress, "2024-03-01")]);
        assert!(v.complete_run("TO-001", vec![], now()).is_err());

        v.complete_run("TO-001", vec![hemoglobin(ResultFlag::High)], now())
            .unwrap();
        let o = v.get("TO-001").unwrap();
        assert_eq!(o.status, TestOrderStatus::Completed);
        assert_eq!(o.run_by.as_deref(), Some("Lab User"));
        assert!(o.is_resulted());
        assert_eq!(v.aggregates(&summary_specs()).get("abnormal"), Some(1));
    }

    #[test]
    fn pending_count_tracks_status_changes() {
        let mut v = view(vec![
            order("TO-001", TestOrderStatus::Pending, "2024-03-01"),
            order("TO-002", TestOrderStatus::Pending, "2024-03-02"),
        ]);
        v.set_status("TO-002", TestOrderStatus::AiReviewed, now())
            .unwrap();
        let cards = v.aggregates(&summary_specs());
        assert_eq!(cards.get("pending"), Some(1));
        assert_eq!(cards.get("ai_reviewed"), Some(1));
    }
}
