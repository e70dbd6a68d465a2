//! Role-scoped dashboard shells.
//!
//! A [`Dashboard`] builds one [`ListView`] per module from its own copy of the seed data,
//! tracks which tab is open and produces the overview cards. Lab users and managers share the
//! same views; what differs is the set of tabs and the capabilities each view is given.

use crate::access::{Action, Module, Role};
use crate::audit::{self, AuditLog, AuditTrail};
use crate::config::CoreConfig;
use crate::error::{LisError, LisResult};
use crate::models::{
    configuration, event_log, instrument, notification, reagent, report, test_order, user,
    ApprovalStatus, ConfigurationEntry, EventLog, Hl7Message, Instrument, Notification,
    RawResult, Reagent, ReportRow, StaffApproval, SyncLog, TestOrder, User,
};
use crate::query::{
    AggregateSource, AggregateSpec, Aggregates, FilterCriteria, Filterable, SortOrder,
};
use crate::seed::SeedData;
use crate::store::Record;
use crate::view::{Editable, ListView};
use chrono::{NaiveDate, NaiveDateTime};
use lis_ids::{SequentialIds, TimestampIds};
use serde::Serialize;

labelled_enum! {
    /// Dashboard tabs. Every tab but the overview shows one module.
    pub enum Tab {
        Overview => "Overview",
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

const LAB_USER_TABS: &[Tab] = &[
    Tab::Overview,
    Tab::TestOrders,
    Tab::EventLogs,
    Tab::Instruments,
    Tab::Reagents,
    Tab::Reports,
    Tab::RawResults,
    Tab::SyncLogs,
    Tab::Hl7Messages,
    Tab::Notifications,
];

impl Tab {
    /// Tabs `role` may open, in menu order.
    pub fn for_role(role: Role) -> &'static [Tab] {
        match role {
            Role::LabUser => LAB_USER_TABS,
            Role::Manager => Tab::ALL,
        }
    }

    pub fn module(self) -> Option<Module> {
        Some(match self {
            Tab::Overview => return None,
            Tab::TestOrders => Module::TestOrders,
            Tab::EventLogs => Module::EventLogs,
            Tab::Instruments => Module::Instruments,
            Tab::Reagents => Module::Reagents,
            Tab::Warehouse => Module::Warehouse,
            Tab::Reports => Module::Reports,
            Tab::RawResults => Module::RawResults,
            Tab::SyncLogs => Module::SyncLogs,
            Tab::Hl7Messages => Module::Hl7Messages,
            Tab::AuditLogs => Module::AuditLogs,
            Tab::Configuration => Module::Configuration,
            Tab::Users => Module::Users,
            Tab::Approvals => Module::Approvals,
            Tab::Notifications => Module::Notifications,
        })
    }
}

/// One overview card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryCard {
    pub tab: Tab,
    pub title: &'static str,
    pub value: i64,
}

/// Overview payload for the signed-in role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardOverview {
    pub role: Role,
    pub display_name: String,
    pub date: NaiveDate,
    pub cards: Vec<SummaryCard>,
}

impl DashboardOverview {
    pub fn card(&self, title: &str) -> Option<i64> {
        self.cards.iter().find(|c| c.title == title).map(|c| c.value)
    }
}

/// Every module view of one signed-in session.
pub struct Dashboard {
    role: Role,
    display_name: String,
    active_tab: Tab,
    config: CoreConfig,
    on_logout: Option<Box<dyn FnMut()>>,

    pub test_orders: ListView<TestOrder>,
    pub event_logs: ListView<EventLog>,
    pub instruments: ListView<Instrument>,
    pub reagents: ListView<Reagent>,
    pub warehouse: ListView<Reagent>,
    pub reports: ListView<ReportRow>,
    pub raw_results: ListView<RawResult>,
    pub sync_logs: ListView<SyncLog>,
    pub hl7_messages: ListView<Hl7Message>,
    pub audit_logs: ListView<AuditLog>,
    pub configuration: ListView<ConfigurationEntry>,
    pub users: ListView<User>,
    pub approvals: ListView<StaffApproval>,
    pub notifications: ListView<Notification>,
}

/// Sequential ids continuing after the highest seeded id with `prefix`.
fn sequential<T: Record>(prefix: &str, width: usize, records: &[T]) -> LisResult<SequentialIds> {
    Ok(SequentialIds::new(prefix, width)?.continuing_from(records.iter().map(Record::id)))
}

struct ViewBuilder<'a> {
    role: Role,
    actor: &'a str,
    trail: AuditTrail,
}

impl ViewBuilder<'_> {
    fn build<T: Record + Filterable>(
        &self,
        module: Module,
        records: Vec<T>,
        search_fields: impl IntoIterator<Item = T::Field>,
        ids: SequentialIds,
    ) -> ListView<T> {
        let view = ListView::in_memory(
            self.role,
            module,
            records,
            FilterCriteria::new(search_fields),
            ids,
        );
        let audited = matches!(
            module,
            Module::Instruments
                | Module::Reagents
                | Module::Warehouse
                | Module::Configuration
                | Module::Users
                | Module::Approvals
        );
        if self.role == Role::Manager && audited {
            view.with_shared_audit_trail(self.actor, self.trail.fork())
        } else {
            view
        }
    }
}

impl Dashboard {
    /// Builds every view from an independent copy of `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Id`] if an identifier generator cannot be created.
    pub fn new(config: CoreConfig, seed: &SeedData) -> LisResult<Self> {
        let role = config.role();
        let display_name = config.display_name().to_owned();
        let b = ViewBuilder {
            role,
            actor: &display_name,
            trail: AuditTrail::new()?,
        };
        let seed = seed.clone();

        let test_orders = b.build(
            Module::TestOrders,
            seed.test_orders.clone(),
            test_order::SEARCH_FIELDS,
            sequential("TO", 3, &seed.test_orders)?,
        );
        let event_logs = b
            .build(
                Module::EventLogs,
                seed.event_logs.clone(),
                event_log::SEARCH_FIELDS,
                sequential("EV", 3, &seed.event_logs)?,
            )
            .with_sort(SortOrder::NewestFirst);
        let instruments = b.build(
            Module::Instruments,
            seed.instruments.clone(),
            instrument::SEARCH_FIELDS,
            sequential("INS", 3, &seed.instruments)?,
        );
        let reagents = b.build(
            Module::Reagents,
            seed.reagents.clone(),
            reagent::SEARCH_FIELDS,
            sequential("RG", 3, &seed.reagents)?,
        );
        let warehouse = b.build(
            Module::Warehouse,
            seed.warehouse.clone(),
            reagent::SEARCH_FIELDS,
            sequential("WH", 3, &seed.warehouse)?,
        );
        let reports = b.build(
            Module::Reports,
            seed.reports.clone(),
            report::SEARCH_FIELDS,
            sequential("RPT", 3, &seed.reports)?,
        );
        let raw_results = b.build(
            Module::RawResults,
            seed.raw_results.clone(),
            report::SEARCH_FIELDS,
            sequential("RAW", 3, &seed.raw_results)?,
        );
        let sync_logs = b.build(
            Module::SyncLogs,
            seed.sync_logs.clone(),
            report::SEARCH_FIELDS,
            sequential("SYNC", 3, &seed.sync_logs)?,
        );
        let hl7_messages = b.build(
            Module::Hl7Messages,
            seed.hl7_messages.clone(),
            report::SEARCH_FIELDS,
            sequential("HL7", 4, &seed.hl7_messages)?,
        );
        let audit_logs = ListView::in_memory(
            role,
            Module::AuditLogs,
            seed.audit_logs.clone(),
            FilterCriteria::new(audit::SEARCH_FIELDS),
            TimestampIds::new("AUD")?,
        )
        .with_sort(SortOrder::NewestFirst);
        let configuration = b.build(
            Module::Configuration,
            seed.configuration.clone(),
            configuration::SEARCH_FIELDS,
            sequential("CFG", 3, &seed.configuration)?,
        );
        let users = b.build(
            Module::Users,
            seed.users.clone(),
            user::USER_SEARCH_FIELDS,
            sequential("USR", 3, &seed.users)?,
        );
        let approvals = b.build(
            Module::Approvals,
            seed.approvals.clone(),
            user::APPROVAL_SEARCH_FIELDS,
            sequential("APR", 3, &seed.approvals)?,
        );
        let notifications = b.build(
            Module::Notifications,
            seed.notifications.clone(),
            notification::SEARCH_FIELDS,
            sequential("NTF", 3, &seed.notifications)?,
        );

        tracing::info!(role = %role, user = %display_name, "dashboard opened");
        Ok(Self {
            role,
            display_name,
            active_tab: Tab::Overview,
            config,
            on_logout: None,
            test_orders,
            event_logs,
            instruments,
            reagents,
            warehouse,
            reports,
            raw_results,
            sync_logs,
            hl7_messages,
            audit_logs,
            configuration,
            users,
            approvals,
            notifications,
        })
    }

    pub fn on_logout(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_logout = Some(Box::new(callback));
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn tabs(&self) -> &'static [Tab] {
        Tab::for_role(self.role)
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    /// Opens `tab`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] if the role's menu does not include `tab`.
    pub fn select_tab(&mut self, tab: Tab) -> LisResult<()> {
        if !self.tabs().contains(&tab) {
            return Err(LisError::PermissionDenied {
                action: "open",
                role: self.role.label(),
                module: tab.label(),
            });
        }
        tracing::debug!(tab = %tab, "tab selected");
        self.active_tab = tab;
        Ok(())
    }

    /// Breadcrumb "Dashboard" link: closes any open dialog and returns to the overview.
    pub fn navigate_to_dashboard(&mut self) {
        match self.active_tab {
            Tab::Overview => {}
            Tab::TestOrders => self.test_orders.navigate_to_dashboard(),
            Tab::EventLogs => self.event_logs.navigate_to_dashboard(),
            Tab::Instruments => self.instruments.navigate_to_dashboard(),
            Tab::Reagents => self.reagents.navigate_to_dashboard(),
            Tab::Warehouse => self.warehouse.navigate_to_dashboard(),
            Tab::Reports => self.reports.navigate_to_dashboard(),
            Tab::RawResults => self.raw_results.navigate_to_dashboard(),
            Tab::SyncLogs => self.sync_logs.navigate_to_dashboard(),
            Tab::Hl7Messages => self.hl7_messages.navigate_to_dashboard(),
            Tab::AuditLogs => self.audit_logs.navigate_to_dashboard(),
            Tab::Configuration => self.configuration.navigate_to_dashboard(),
            Tab::Users => self.users.navigate_to_dashboard(),
            Tab::Approvals => self.approvals.navigate_to_dashboard(),
            Tab::Notifications => self.notifications.navigate_to_dashboard(),
        }
        self.active_tab = Tab::Overview;
    }

    pub fn logout(&mut self) {
        tracing::info!(user = %self.display_name, "logged out");
        if let Some(callback) = self.on_logout.as_mut() {
            callback();
        }
    }

    /// Queues HL7 messages for the resulted orders of this session's test order view.
    ///
    /// # Errors
    ///
    /// See [`ListView::publish_hl7`].
    pub fn publish_hl7(&mut self, now: NaiveDateTime) -> LisResult<Vec<String>> {
        self.hl7_messages.publish_hl7(self.test_orders.records(), now)
    }

    /// # Errors
    ///
    /// See [`ListView::generate_reports`].
    pub fn generate_reports(&mut self, now: NaiveDateTime) -> LisResult<Vec<String>> {
        self.reports.generate_reports(self.test_orders.records(), now)
    }

    /// Decides a staff request; an approved request also creates the user account.
    ///
    /// An approval is checked against the user form before anything changes, so a request
    /// that cannot become an account stays pending.
    ///
    /// # Errors
    ///
    /// See [`ListView::decide`] and [`ListView::submit_create`]. Returns
    /// [`LisError::Validation`] if the request would not make a valid user.
    pub fn decide_approval(
        &mut self,
        id: &str,
        decision: ApprovalStatus,
        note: Option<&str>,
        now: NaiveDateTime,
    ) -> LisResult<StaffApproval> {
        if decision == ApprovalStatus::Approved {
            self.users.ensure(Action::Create)?;
            let draft = self
                .approvals
                .get(id)
                .filter(|request| request.status == ApprovalStatus::Pending)
                .map(StaffApproval::to_user_draft);
            if let Some(draft) = draft {
                let errors = User::validate(&draft);
                if !errors.is_empty() {
                    return Err(self.approvals.reject("Cannot approve request", errors));
                }
            }
        }
        let decided = self.approvals.decide(id, decision, note, now)?;
        if decision == ApprovalStatus::Approved {
            let user_id = self.users.submit_create(decided.to_user_draft(), now)?;
            tracing::info!(request = id, user = %user_id, "account created from request");
        }
        Ok(decided)
    }

    /// Summary cards for the overview tab, recomputed from the current views.
    pub fn overview(&self, today: NaiveDate) -> DashboardOverview {
        let mut cards = Vec::new();
        let mut push = |tab: Tab, aggregates: &Aggregates, picks: &[(&'static str, &str)]| {
            for &(title, name) in picks {
                cards.push(SummaryCard {
                    tab,
                    title,
                    value: aggregates.get(name).unwrap_or_default(),
                });
            }
        };

        let orders = self.test_orders.aggregates(&test_order::summary_specs());
        let instruments = self.instruments.aggregates(&instrument::summary_specs());
        let reagents = self
            .reagents
            .aggregates(&reagent::summary_specs(self.config.reagent_thresholds()));
        let notifications = self.notifications.aggregates(&notification::summary_specs());

        match self.role {
            Role::LabUser => {
                push(
                    Tab::TestOrders,
                    &orders,
                    &[
                        ("Pending orders", "pending"),
                        ("In progress", "in_progress"),
                        ("Awaiting review", "completed"),
                    ],
                );
                push(Tab::Instruments, &instruments, &[("Instruments ready", "ready")]);
                push(Tab::Reagents, &reagents, &[("Low stock reagents", "low_stock")]);
                let expired = self.reagents.aggregates(&[expired_on(today)]);
                push(Tab::Reagents, &expired, &[("Past expiry", "past_expiry")]);
                push(
                    Tab::Notifications,
                    &notifications,
                    &[("Unread notifications", "unread")],
                );
            }
            Role::Manager => {
                push(
                    Tab::TestOrders,
                    &orders,
                    &[
                        ("Total orders", "total"),
                        ("Awaiting review", "completed"),
                        ("Abnormal results", "abnormal"),
                    ],
                );
                push(
                    Tab::Instruments,
                    &instruments,
                    &[
                        ("In maintenance", "maintenance"),
                        ("Inactive instruments", "inactive"),
                    ],
                );
                let warehouse = self
                    .warehouse
                    .aggregates(&reagent::summary_specs(self.config.warehouse_thresholds()));
                push(Tab::Warehouse, &warehouse, &[("Low warehouse stock", "low_stock")]);
                let approvals = self.approvals.aggregates(&user::approval_summary_specs());
                push(Tab::Approvals, &approvals, &[("Pending approvals", "pending")]);
                let config = self.configuration.aggregates(&configuration::summary_specs());
                push(Tab::Configuration, &config, &[("Invalid settings", "invalid")]);
                let users = self.users.aggregates(&user::user_summary_specs());
                push(Tab::Users, &users, &[("Active users", "active")]);
                let syncs = self.sync_logs.aggregates(&report::sync_summary_specs());
                push(Tab::SyncLogs, &syncs, &[("Failed syncs", "failed")]);
                push(
                    Tab::Notifications,
                    &notifications,
                    &[("Unread notifications", "unread")],
                );
            }
        }

        DashboardOverview {
            role: self.role,
            display_name: self.display_name.clone(),
            date: today,
            cards,
        }
    }

    /// Audit entries written by this session's manager views, newest first.
    pub fn session_audit_entries(&self) -> Vec<&AuditLog> {
        let trails = [
            self.instruments.audit_trail(),
            self.reagents.audit_trail(),
            self.warehouse.audit_trail(),
            self.configuration.audit_trail(),
            self.users.audit_trail(),
            self.approvals.audit_trail(),
        ];
        let mut entries: Vec<&AuditLog> = trails
            .into_iter()
            .flatten()
            .flat_map(|t| t.entries())
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries
    }
}

fn expired_on(today: NaiveDate) -> AggregateSpec<Reagent> {
    AggregateSpec::count_where("past_expiry", AggregateSource::Full, move |r: &Reagent| {
        r.is_expired_on(today)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstrumentMode, ModeChangeRequest, TestOrderStatus};
    use std::cell::Cell;
    use std::rc::Rc;

    fn now() -> NaiveDateTime {
        crate::dates::parse_timestamp("2024-03-12 12:00:00").unwrap()
    }

    fn dashboard(role: Role) -> Dashboard {
        let config = CoreConfig::for_role(role, "Quinn Harper").unwrap();
        Dashboard::new(config, &SeedData::builtin().unwrap()).unwrap()
    }

    #[test]
    fn lab_users_do_not_get_manager_tabs() {
        let mut d = dashboard(Role::LabUser);
        assert!(d.select_tab(Tab::Reagents).is_ok());
        match d.select_tab(Tab::Approvals) {
            Err(LisError::PermissionDenied { module, .. }) => assert_eq!(module, "Staff Approvals"),
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
        assert_eq!(d.active_tab(), Tab::Reagents);
    }

    #[test]
    fn managers_see_every_tab() {
        let d = dashboard(Role::Manager);
        assert_eq!(d.tabs().len(), Tab::ALL.len());
        assert!(Tab::ALL.iter().all(|t| *t == Tab::Overview || t.module().is_some()));
    }

    #[test]
    fn breadcrumb_returns_to_overview_and_closes_dialog() {
        let mut d = dashboard(Role::Manager);
        d.select_tab(Tab::Instruments).unwrap();
        d.instruments.open_mode_change("INS-001").unwrap();

        d.navigate_to_dashboard();
        assert_eq!(d.active_tab(), Tab::Overview);
        assert_eq!(d.instruments.dialog(), &crate::view::Dialog::Closed);
    }

    #[test]
    fn logout_fires_callback() {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let mut d = dashboard(Role::LabUser).on_logout(move || flag.set(true));
        d.logout();
        assert!(fired.get());
    }

    #[test]
    fn views_hold_independent_copies() {
        let seed = SeedData::builtin().unwrap();
        let config = CoreConfig::for_role(Role::Manager, "Quinn Harper").unwrap();
        let mut manager = Dashboard::new(config.clone(), &seed).unwrap();
        let lab = Dashboard::new(config.with_role(Role::LabUser), &seed).unwrap();

        let request = ModeChangeRequest::new(InstrumentMode::Ready).with_qc_passed(true);
        manager.instruments.change_mode("INS-001", &request, now()).unwrap();

        assert_eq!(manager.instruments.get("INS-001").unwrap().mode, InstrumentMode::Ready);
        assert_eq!(lab.instruments.get("INS-001").unwrap().mode, InstrumentMode::Maintenance);
        assert_eq!(manager.session_audit_entries().len(), 1);
    }

    #[test]
    fn overview_follows_mutations() {
        let mut d = dashboard(Role::LabUser);
        let today = now().date();
        let before = d.overview(today).card("Pending orders").unwrap();

        d.test_orders.set_status("TO-001", TestOrderStatus::InProgress, now()).unwrap();
        assert_eq!(d.overview(today).card("Pending orders"), Some(before - 1));
        assert_eq!(d.overview(today).card("Unread notifications"), Some(2));
    }

    #[test]
    fn approving_a_request_creates_the_user() {
        let mut d = dashboard(Role::Manager);
        let users_before = d.users.records().len();

        d.decide_approval("APR-001", ApprovalStatus::Approved, None, now()).unwrap();
        assert_eq!(d.users.records().len(), users_before + 1);
        assert_eq!(d.users.records()[0].full_name, "Priya Raman");
        assert_eq!(d.users.records()[0].id, "USR-005");

        d.decide_approval("APR-002", ApprovalStatus::Rejected, Some("No vacancy"), now())
            .unwrap();
        assert_eq!(d.users.records().len(), users_before + 1);
        assert_eq!(d.overview(now().date()).card("Pending approvals"), Some(0));
    }

    #[test]
    fn invalid_request_is_not_approved() {
        let mut seed = SeedData::builtin().unwrap();
        let request = seed.approvals.iter_mut().find(|a| a.id == "APR-003").unwrap();
        request.status = ApprovalStatus::Pending;
        let config = CoreConfig::for_role(Role::Manager, "Quinn Harper").unwrap();
        let mut d = Dashboard::new(config, &seed).unwrap();
        let users_before = d.users.records().len();

        match d.decide_approval("APR-003", ApprovalStatus::Approved, None, now()) {
            Err(LisError::Validation(errors)) => assert!(errors.contains("phone")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(d.approvals.get("APR-003").unwrap().status, ApprovalStatus::Pending);
        assert_eq!(d.users.records().len(), users_before);
        assert!(d.session_audit_entries().is_empty());
    }

    #[test]
    fn approving_twice_creates_one_user() {
        let mut d = dashboard(Role::Manager);
        let users_before = d.users.records().len();

        d.decide_approval("APR-001", ApprovalStatus::Approved, None, now()).unwrap();
        assert!(d.decide_approval("APR-001", ApprovalStatus::Approved, None, now()).is_err());
        assert_eq!(d.users.records().len(), users_before + 1);
    }

    #[test]
    fn session_audit_ids_are_unique_across_views() {
        let mut d = dashboard(Role::Manager);
        d.decide_approval("APR-001", ApprovalStatus::Approved, None, now()).unwrap();
        let request = ModeChangeRequest::new(InstrumentMode::Ready).with_qc_passed(true);
        d.instruments.change_mode("INS-001", &request, now()).unwrap();

        let entries = d.session_audit_entries();
        assert_eq!(entries.len(), 3);
        let mut ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn publishing_uses_the_session_orders() {
        let mut d = dashboard(Role::LabUser);
        let ids = d.publish_hl7(now()).unwrap();
        let resulted = d.test_orders.records().iter().filter(|o| o.is_resulted()).count();
        assert_eq!(ids.len(), resulted);
        assert_eq!(ids[0], "HL7-0002");
    }
}
