//! Reagent stock, shared by the reagent bench view and the warehouse view.

use crate::access::Action;
use crate::audit::AuditAction;
use crate::dates::{format_timestamp, parse_date};
use crate::error::{FormErrors, LisError, LisResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::{require, require_contact, require_iso_date};
use crate::view::{Editable, ListView, StatusBearing};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum ReagentStatus {
        InUse => "In Use",
        NotInUse => "Not In Use",
        Expired => "Expired",
    }
}

labelled_enum! {
    /// Stock badge derived from quantity.
    pub enum StockLevel {
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
}

/// Quantity bounds for the stock badge: below `low` is Low, below `medium` is Medium.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StockThresholds {
    low: u32,
    medium: u32,
}

impl StockThresholds {
    pub const DEFAULT_LOW: u32 = 200;
    pub const DEFAULT_MEDIUM: u32 = 350;

    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] unless `low < medium`.
    pub fn new(low: u32, medium: u32) -> LisResult<Self> {
        if low >= medium {
            return Err(LisError::InvalidInput(format!(
                "low stock threshold ({low}) must be below the medium threshold ({medium})"
            )));
        }
        Ok(Self { low, medium })
    }

    pub fn low(&self) -> u32 {
        self.low
    }

    pub fn medium(&self) -> u32 {
        self.medium
    }

    pub fn classify(&self, quantity: u32) -> StockLevel {
        if quantity < self.low {
            StockLevel::Low
        } else if quantity < self.medium {
            StockLevel::Medium
        } else {
            StockLevel::High
        }
    }
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            low: Self::DEFAULT_LOW,
            medium: Self::DEFAULT_MEDIUM,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reagent {
    pub id: String,
    pub name: String,
    pub lot_number: String,
    pub quantity: u32,
    pub unit: String,
    /// `YYYY-MM-DD`.
    pub expiration_date: String,
    pub vendor: String,
    /// Email address or phone number.
    pub vendor_contact: String,
    pub status: ReagentStatus,
    pub installed_by: String,
    pub installed_at: String,
    pub location: String,
}

impl Reagent {
    pub fn stock_level(&self, thresholds: StockThresholds) -> StockLevel {
        thresholds.classify(self.quantity)
    }

    /// Past its expiration date on `today`. An unreadable expiration date never counts as
    /// expired.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        parse_date(&self.expiration_date).is_some_and(|expires| expires < today)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReagentField {
    Id,
    Name,
    LotNumber,
    Vendor,
    Status,
    Location,
    Quantity,
}

pub const SEARCH_FIELDS: [ReagentField; 4] = [
    ReagentField::Name,
    ReagentField::LotNumber,
    ReagentField::Vendor,
    ReagentField::Id,
];

impl Record for Reagent {
    const KIND: &'static str = "reagent";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for Reagent {
    type Field = ReagentField;

    fn field_text(&self, field: ReagentField) -> Option<Cow<'_, str>> {
        Some(match field {
            ReagentField::Id => Cow::Borrowed(self.id.as_str()),
            ReagentField::Name => Cow::Borrowed(self.name.as_str()),
            ReagentField::LotNumber => Cow::Borrowed(self.lot_number.as_str()),
            ReagentField::Vendor => Cow::Borrowed(self.vendor.as_str()),
            ReagentField::Status => Cow::Borrowed(self.status.label()),
            ReagentField::Location => Cow::Borrowed(self.location.as_str()),
            ReagentField::Quantity => Cow::Owned(self.quantity.to_string()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.installed_at)
    }

    fn field_number(&self, field: ReagentField) -> Option<i64> {
        match field {
            ReagentField::Quantity => Some(i64::from(self.quantity)),
            _ => None,
        }
    }
}

/// Values of the reagent dialog. Quantity is kept as typed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ReagentDraft {
    pub name: String,
    pub lot_number: String,
    pub quantity: String,
    pub unit: String,
    pub expiration_date: String,
    pub vendor: String,
    pub vendor_contact: String,
    pub installed_by: String,
    pub location: String,
}

impl ReagentDraft {
    fn parsed_quantity(&self) -> Option<u32> {
        self.quantity.trim().parse().ok()
    }
}

impl Editable for Reagent {
    type Draft = ReagentDraft;

    fn validate(draft: &ReagentDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "name", "Name", &draft.name);
        require(&mut errors, "lot_number", "Lot number", &draft.lot_number);
        if draft.quantity.trim().is_empty() {
            errors.insert("quantity", "Quantity is required");
        } else if draft.parsed_quantity().is_none() {
            errors.insert("quantity", "Quantity must be a whole number");
        }
        require(&mut errors, "unit", "Unit", &draft.unit);
        require_iso_date(&mut errors, "expiration_date", "Expiration date", &draft.expiration_date);
        require(&mut errors, "vendor", "Vendor", &draft.vendor);
        require_contact(&mut errors, "vendor_contact", &draft.vendor_contact);
        require(&mut errors, "installed_by", "Installed by", &draft.installed_by);
        errors
    }

    fn from_draft(id: String, draft: ReagentDraft, now: NaiveDateTime) -> Self {
        let quantity = draft.parsed_quantity().unwrap_or_default();
        Self {
            id,
            name: draft.name.trim().to_owned(),
            lot_number: draft.lot_number.trim().to_owned(),
            quantity,
            unit: draft.unit.trim().to_owned(),
            expiration_date: draft.expiration_date.trim().to_owned(),
            vendor: draft.vendor.trim().to_owned(),
            vendor_contact: draft.vendor_contact.trim().to_owned(),
            status: ReagentStatus::NotInUse,
            installed_by: draft.installed_by.trim().to_owned(),
            installed_at: format_timestamp(now),
            location: draft.location.trim().to_owned(),
        }
    }

    fn apply_draft(&mut self, draft: ReagentDraft, _now: NaiveDateTime) {
        if let Some(quantity) = draft.parsed_quantity() {
            self.quantity = quantity;
        }
        self.name = draft.name.trim().to_owned();
        self.lot_number = draft.lot_number.trim().to_owned();
        self.unit = draft.unit.trim().to_owned();
        self.expiration_date = draft.expiration_date.trim().to_owned();
        self.vendor = draft.vendor.trim().to_owned();
        self.vendor_contact = draft.vendor_contact.trim().to_owned();
        self.installed_by = draft.installed_by.trim().to_owned();
        self.location = draft.location.trim().to_owned();
    }

    fn to_draft(&self) -> ReagentDraft {
        ReagentDraft {
            name: self.name.clone(),
            lot_number: self.lot_number.clone(),
            quantity: self.quantity.to_string(),
            unit: self.unit.clone(),
            expiration_date: self.expiration_date.clone(),
            vendor: self.vendor.clone(),
            vendor_contact: self.vendor_contact.clone(),
            installed_by: self.installed_by.clone(),
            location: self.location.clone(),
        }
    }
}

impl StatusBearing for Reagent {
    type Status = ReagentStatus;

    fn status(&self) -> ReagentStatus {
        self.status
    }

    fn set_status(&mut self, status: ReagentStatus, _now: NaiveDateTime) {
        self.status = status;
    }
}

/// Stock cards. Stock badges use `thresholds`, which differ between the bench and the
/// warehouse.
pub fn summary_specs(thresholds: StockThresholds) -> Vec<AggregateSpec<Reagent>> {
    let level_count = move |name: &'static str, level: StockLevel| {
        AggregateSpec::count_where(name, AggregateSource::Full, move |r: &Reagent| {
            r.stock_level(thresholds) == level
        })
    };
    vec![
        AggregateSpec::count("total", AggregateSource::Filtered),
        AggregateSpec::sum("total_quantity", AggregateSource::Filtered, ReagentField::Quantity),
        AggregateSpec::count_equal(
            "in_use",
            AggregateSource::Full,
            ReagentField::Status,
            ReagentStatus::InUse.label(),
        ),
        AggregateSpec::count_equal(
            "expired",
            AggregateSource::Full,
            ReagentField::Status,
            ReagentStatus::Expired.label(),
        ),
        level_count("low_stock", StockLevel::Low),
        level_count("medium_stock", StockLevel::Medium),
        level_count("high_stock", StockLevel::High),
    ]
}

impl<R: Repository<Reagent>> ListView<Reagent, R> {
    /// Marks every reagent past its expiration date on `today` as Expired and returns their
    /// identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::PermissionDenied`] if the role cannot change reagent status.
    pub fn expire_lapsed(
        &mut self,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> LisResult<Vec<String>> {
        self.ensure(Action::ChangeStatus)?;

        let lapsed: Vec<String> = self
            .records()
            .iter()
            .filter(|r| r.status != ReagentStatus::Expired && r.is_expired_on(today))
            .map(|r| r.id.clone())
            .collect();
        for id in &lapsed {
            if let Some(reagent) = self.store_mut().get_mut(id) {
                let previous = reagent.status;
                reagent.set_status(ReagentStatus::Expired, now);
                self.audit(
                    AuditAction::StatusChanged,
                    id,
                    format!("{previous} → {}", ReagentStatus::Expired),
                    now,
                );
            }
        }

        if lapsed.is_empty() {
            self.notices_mut()
                .info("Nothing expired", "No reagent is past its expiration date");
        } else {
            tracing::info!(count = lapsed.len(), "reagents expired");
            self.notices_mut().success(
                "Reagents expired",
                format!("{} reagent(s) marked Expired", lapsed.len()),
            );
        }
        Ok(lapsed)
    }
}
