//! Domain records managed by the dashboards.
//!
//! Each module defines one record family: the record struct, its closed status enums, its
//! filter `Field` enum with the fields the search box looks in, the dialog draft when the
//! record can be created from a form, the summary cards of its view, and any
//! record-specific view operations.

pub mod configuration;
pub mod event_log;
pub mod instrument;
pub mod notification;
pub mod reagent;
pub mod report;
pub mod test_order;
pub mod user;

pub use configuration::{ConfigType, ConfigurationDraft, ConfigurationEntry, ConfigurationField};
pub use event_log::{EventAction, EventLog, EventLogField};
pub use instrument::{
    Instrument, InstrumentDraft, InstrumentField, InstrumentMode, InstrumentStatus,
    ModeChangeRequest, ModeTransition,
};
pub use notification::{Notification, NotificationField, NotificationKind};
pub use reagent::{Reagent, ReagentDraft, ReagentField, ReagentStatus, StockLevel, StockThresholds};
pub use report::{
    Hl7Message, Hl7Status, RawResult, RawResultDraft, RawResultStatus, ReportField, ReportRow,
    ReportStatus, SyncLog, SyncLogDraft, SyncStatus,
};
pub use test_order::{
    Comment, Gender, ResultFlag, TestOrder, TestOrderDraft, TestOrderField, TestOrderStatus,
    TestResult,
};
pub use user::{
    ApprovalField, ApprovalStatus, StaffApproval, User, UserDraft, UserField, UserStatus,
};
