//! Reporting records: report rows, raw instrument results, sync logs and HL7 messages.
//!
//! All four share one shape (identity, test order reference, status, operator, timestamp) and
//! differ in their status set and descriptive fields. HL7 messages are only produced by
//! [`ListView::publish_hl7`]; report rows by [`ListView::generate_reports`].

use crate::access::Action;
use crate::audit::AuditAction;
use crate::dates::{format_timestamp, parse_date, parse_timestamp};
use crate::error::{FormErrors, LisError, LisResult};
use crate::models::test_order::{Gender, TestOrder, TestResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::require;
use crate::view::{Editable, ListView, StatusBearing};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum ReportStatus {
        Draft => "Draft",
        Generated => "Generated",
        Published => "Published",
    }
}

labelled_enum! {
    pub enum RawResultStatus {
        Received => "Received",
        Processed => "Processed",
        Rejected => "Rejected",
    }
}

labelled_enum! {
    pub enum SyncStatus {
        Success => "Success",
        Failed => "Failed",
        Pending => "Pending",
    }
}

labelled_enum! {
    pub enum Hl7Status {
        Queued => "Queued",
        Sent => "Sent",
        Acknowledged => "Acknowledged",
        Failed => "Failed",
    }
}

/// Common filter fields of the reporting records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportField {
    Id,
    TestOrderId,
    Status,
    Operator,
    /// Patient name, instrument, target system or message type, depending on the record.
    Subject,
}

pub const SEARCH_FIELDS: [ReportField; 4] = [
    ReportField::Id,
    ReportField::TestOrderId,
    ReportField::Subject,
    ReportField::Operator,
];

/// Implements `Record`, `Filterable` and `StatusBearing` for a reporting record.
macro_rules! reporting_record {
    ($ty:ident, $kind:literal, $status:ty, $subject:ident) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }
        }

        impl Filterable for $ty {
            type Field = ReportField;

            fn field_text(&self, field: ReportField) -> Option<Cow<'_, str>> {
                Some(match field {
                    ReportField::Id => Cow::Borrowed(self.id.as_str()),
                    ReportField::TestOrderId => Cow::Borrowed(self.test_order_id.as_str()),
                    ReportField::Status => Cow::Borrowed(self.status.label()),
                    ReportField::Operator => Cow::Borrowed(self.operator.as_str()),
                    ReportField::Subject => Cow::Borrowed(self.$subject.as_str()),
                })
            }

            fn timestamp_text(&self) -> Option<&str> {
                Some(&self.timestamp)
            }
        }

        impl StatusBearing for $ty {
            type Status = $status;

            fn status(&self) -> $status {
                self.status
            }

            fn set_status(&mut self, status: $status, now: NaiveDateTime) {
                self.status = status;
                self.timestamp = format_timestamp(now);
            }
        }
    };
}

// ============================================================================
// Report rows
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRow {
    pub id: String,
    pub test_order_id: String,
    pub patient_name: String,
    pub test_type: String,
    pub status: ReportStatus,
    pub operator: String,
    pub timestamp: String,
}

reporting_record!(ReportRow, "report", ReportStatus, patient_name);

impl ReportRow {
    /// A Generated report row for `order`.
    pub fn from_order(id: String, order: &TestOrder, operator: &str, now: NaiveDateTime) -> Self {
        Self {
            id,
            test_order_id: order.id.clone(),
            patient_name: order.patient_name.clone(),
            test_type: order.test_type.clone(),
            status: ReportStatus::Generated,
            operator: operator.to_owned(),
            timestamp: format_timestamp(now),
        }
    }
}

// ============================================================================
// Raw results
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawResult {
    pub id: String,
    pub test_order_id: String,
    pub instrument_id: String,
    pub raw_data: String,
    pub status: RawResultStatus,
    pub operator: String,
    pub timestamp: String,
}

reporting_record!(RawResult, "raw result", RawResultStatus, instrument_id);

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawResultDraft {
    pub test_order_id: String,
    pub instrument_id: String,
    pub raw_data: String,
    pub operator: String,
}

impl Editable for RawResult {
    type Draft = RawResultDraft;

    fn validate(draft: &RawResultDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "test_order_id", "Test order", &draft.test_order_id);
        require(&mut errors, "instrument_id", "Instrument", &draft.instrument_id);
        require(&mut errors, "raw_data", "Raw data", &draft.raw_data);
        errors
    }

    fn from_draft(id: String, draft: RawResultDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            test_order_id: draft.test_order_id.trim().to_owned(),
            instrument_id: draft.instrument_id.trim().to_owned(),
            raw_data: draft.raw_data,
            status: RawResultStatus::Received,
            operator: draft.operator.trim().to_owned(),
            timestamp: format_timestamp(now),
        }
    }

    fn apply_draft(&mut self, draft: RawResultDraft, now: NaiveDateTime) {
        self.test_order_id = draft.test_order_id.trim().to_owned();
        self.instrument_id = draft.instrument_id.trim().to_owned();
        self.raw_data = draft.raw_data;
        self.timestamp = format_timestamp(now);
    }

    fn to_draft(&self) -> RawResultDraft {
        RawResultDraft {
            test_order_id: self.test_order_id.clone(),
            instrument_id: self.instrument_id.clone(),
            raw_data: self.raw_data.clone(),
            operator: self.operator.clone(),
        }
    }
}

// ============================================================================
// Sync logs
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncLog {
    pub id: String,
    pub test_order_id: String,
    pub target_system: String,
    pub message: String,
    pub status: SyncStatus,
    pub operator: String,
    pub timestamp: String,
}

reporting_record!(SyncLog, "sync log", SyncStatus, target_system);

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SyncLogDraft {
    pub test_order_id: String,
    pub target_system: String,
    pub message: String,
    pub operator: String,
}

impl Editable for SyncLog {
    type Draft = SyncLogDraft;

    fn validate(draft: &SyncLogDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "test_order_id", "Test order", &draft.test_order_id);
        require(&mut errors, "target_system", "Target system", &draft.target_system);
        errors
    }

    fn from_draft(id: String, draft: SyncLogDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            test_order_id: draft.test_order_id.trim().to_owned(),
            target_system: draft.target_system.trim().to_owned(),
            message: draft.message.trim().to_owned(),
            status: SyncStatus::Pending,
            operator: draft.operator.trim().to_owned(),
            timestamp: format_timestamp(now),
        }
    }

    fn apply_draft(&mut self, draft: SyncLogDraft, now: NaiveDateTime) {
        self.test_order_id = draft.test_order_id.trim().to_owned();
        self.target_system = draft.target_system.trim().to_owned();
        self.message = draft.message.trim().to_owned();
        self.timestamp = format_timestamp(now);
    }

    fn to_draft(&self) -> SyncLogDraft {
        SyncLogDraft {
            test_order_id: self.test_order_id.clone(),
            target_system: self.target_system.clone(),
            message: self.message.clone(),
            operator: self.operator.clone(),
        }
    }
}

// ============================================================================
// HL7 messages
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hl7Message {
    pub id: String,
    pub test_order_id: String,
    pub message_type: String,
    /// Segments separated by carriage returns.
    pub payload: String,
    pub status: Hl7Status,
    pub operator: String,
    pub timestamp: String,
}

reporting_record!(Hl7Message, "HL7 message", Hl7Status, message_type);

impl Hl7Message {
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.payload.split(SEGMENT_SEPARATOR).filter(|s| !s.is_empty())
    }
}

pub const ORU_R01: &str = "ORU^R01";
const SEGMENT_SEPARATOR: char = '\r';
const HL7_VERSION: &str = "2.5.1";
const SENDING_APPLICATION: &str = "LIS";
const SENDING_FACILITY: &str = "LAB";
const RECEIVING_APPLICATION: &str = "EHR";
const RECEIVING_FACILITY: &str = "HOSPITAL";

/// Escapes HL7 delimiter characters inside a field value.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\E\\"),
            '|' => out.push_str("\\F\\"),
            '^' => out.push_str("\\S\\"),
            '~' => out.push_str("\\R\\"),
            '&' => out.push_str("\\T\\"),
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

fn hl7_timestamp(text: Option<&str>) -> String {
    text.and_then(parse_timestamp)
        .map(|ts| ts.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_default()
}

/// `Family^Given`, splitting at the last space.
fn hl7_name(full_name: &str) -> String {
    let full_name = full_name.trim();
    match full_name.rsplit_once(char::is_whitespace) {
        Some((given, family)) => format!("{}^{}", escape(family), escape(given.trim())),
        None => escape(full_name),
    }
}

fn hl7_sex(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "M",
        Gender::Female => "F",
        Gender::Other => "O",
    }
}

fn obx_segment(set_id: usize, result: &TestResult) -> String {
    let value_type = if result.value.trim().parse::<f64>().is_ok() {
        "NM"
    } else {
        "ST"
    };
    format!(
        "OBX|{}|{}|{}||{}|{}|{}|{}|||F",
        set_id,
        value_type,
        escape(&result.parameter),
        escape(&result.value),
        escape(&result.unit),
        escape(&result.reference_range),
        result.flag.hl7_code(),
    )
}

/// Builds an HL7 v2.5.1 ORU^R01 observation result message for one order.
pub fn build_oru_r01(order: &TestOrder, control_id: &str, now: NaiveDateTime) -> String {
    let dob = parse_date(&order.date_of_birth)
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default();
    let observed_at = hl7_timestamp(order.run_at.as_deref().or(Some(order.created_at.as_str())));

    let mut segments = vec![
        format!(
            "MSH|^~\\&|{SENDING_APPLICATION}|{SENDING_FACILITY}|\
             {RECEIVING_APPLICATION}|{RECEIVING_FACILITY}|{}||{ORU_R01}|{}|P|{HL7_VERSION}",
            now.format("%Y%m%d%H%M%S"),
            escape(control_id),
        ),
        format!(
            "PID|1||{}||{}||{}|{}|||||{}",
            escape(&order.id),
            hl7_name(&order.patient_name),
            dob,
            hl7_sex(order.gender),
            escape(&order.phone),
        ),
        format!(
            "OBR|1|{}||{}|||{}",
            escape(&order.id),
            escape(&order.test_type),
            observed_at,
        ),
    ];
    segments.extend(
        order
            .results
            .iter()
            .enumerate()
            .map(|(i, result)| obx_segment(i + 1, result)),
    );
    segments.join("\r")
}

// ============================================================================
// View operations
// ============================================================================

impl<R: Repository<Hl7Message>> ListView<Hl7Message, R> {
    /// Queues one ORU^R01 message per resulted order and returns the new message ids.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], or [`LisError::Precondition`] (with an error
    /// notice) when no order in `orders` has results.
    pub fn publish_hl7(
        &mut self,
        orders: &[TestOrder],
        now: NaiveDateTime,
    ) -> LisResult<Vec<String>> {
        self.ensure(Action::Create)?;

        let resulted: Vec<&TestOrder> = orders.iter().filter(|o| o.is_resulted()).collect();
        if resulted.is_empty() {
            let e = LisError::Precondition(
                "No completed test orders with results to publish".into(),
            );
            return Err(self.fail("Cannot publish HL7", e));
        }

        let operator = self.actor().to_owned();
        let ids = match self.allocate_ids(resulted.len(), now) {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail("Cannot publish HL7", e)),
        };
        let messages: Vec<Hl7Message> = resulted
            .iter()
            .zip(&ids)
            .map(|(order, id)| Hl7Message {
                id: id.clone(),
                test_order_id: order.id.clone(),
                message_type: ORU_R01.to_owned(),
                payload: build_oru_r01(order, id, now),
                status: Hl7Status::Queued,
                operator: operator.clone(),
                timestamp: format_timestamp(now),
            })
            .collect();
        if let Err(e) = self.commit_all(messages) {
            return Err(self.fail("Cannot publish HL7", e));
        }
        for (order, id) in resulted.iter().zip(&ids) {
            let details = format!("Queued {ORU_R01} for {}", order.id);
            self.audit(AuditAction::Created, id, details, now);
        }

        tracing::info!(count = ids.len(), "HL7 messages queued");
        self.notices_mut().success(
            "HL7 published",
            format!("{} message(s) queued", ids.len()),
        );
        Ok(ids)
    }
}

impl<R: Repository<ReportRow>> ListView<ReportRow, R> {
    /// Generates a report row for every resulted order that does not have one yet.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`], or [`LisError::Precondition`] when there is
    /// nothing new to report.
    pub fn generate_reports(
        &mut self,
        orders: &[TestOrder],
        now: NaiveDateTime,
    ) -> LisResult<Vec<String>> {
        self.ensure(Action::Create)?;

        let pending: Vec<&TestOrder> = orders
            .iter()
            .filter(|o| o.is_resulted())
            .filter(|o| !self.records().iter().any(|r| r.test_order_id == o.id))
            .collect();
        if pending.is_empty() {
            let e = LisError::Precondition(
                "Every resulted test order already has a report".into(),
            );
            return Err(self.fail("No reports generated", e));
        }

        let operator = self.actor().to_owned();
        let ids = match self.allocate_ids(pending.len(), now) {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail("No reports generated", e)),
        };
        let rows: Vec<ReportRow> = pending
            .iter()
            .zip(&ids)
            .map(|(order, id)| ReportRow::from_order(id.clone(), order, &operator, now))
            .collect();
        if let Err(e) = self.commit_all(rows) {
            return Err(self.fail("No reports generated", e));
        }
        for (order, id) in pending.iter().zip(&ids) {
            self.audit(AuditAction::Created, id, format!("Report for {}", order.id), now);
        }
        let generated = ids;

        self.notices_mut().success(
            "Reports generated",
            format!("{} report(s) generated", generated.len()),
        );
        Ok(generated)
    }
}

pub fn report_summary_specs() -> Vec<AggregateSpec<ReportRow>> {
    let mut specs = vec![AggregateSpec::count("total", AggregateSource::Filtered)];
    specs.extend(ReportStatus::ALL.iter().map(|status| {
        let name = match status {
            ReportStatus::Draft => "draft",
            ReportStatus::Generated => "generated",
            ReportStatus::Published => "published",
        };
        AggregateSpec::count_equal(name, AggregateSource::Full, ReportField::Status, status.label())
    }));
    specs
}

pub fn hl7_summary_specs() -> Vec<AggregateSpec<Hl7Message>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Filtered),
        AggregateSpec::count_equal(
            "queued",
            AggregateSource::Full,
            ReportField::Status,
            Hl7Status::Queued.label(),
        ),
        AggregateSpec::count_equal(
            "failed",
            AggregateSource::Full,
            ReportField::Status,
            Hl7Status::Failed.label(),
        ),
    ]
}

pub fn sync_summary_specs() -> Vec<AggregateSpec<SyncLog>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Filtered),
        AggregateSpec::count_equal(
            "failed",
            AggregateSource::Full,
            ReportField::Status,
            SyncStatus::Failed.label(),
        ),
        AggregateSpec::count_equal(
            "pending",
            AggregateSource::Full,
            ReportField::Status,
            SyncStatus::Pending.label(),
        ),
    ]
}
