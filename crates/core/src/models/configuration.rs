//! System configuration entries.

use crate::access::Action;
use crate::audit::AuditAction;
use crate::dates::format_timestamp;
use crate::error::{FormErrors, LisResult};
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::validation::require;
use crate::view::{Editable, ListView};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum ConfigType {
        General => "General",
        Specific => "Specific",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationEntry {
    pub id: String,
    /// Dotted setting name, e.g. `hl7.receiving_facility`.
    pub key: String,
    pub description: String,
    pub value: String,
    pub config_type: ConfigType,
    pub valid: bool,
    pub last_updated: String,
    #[serde(default)]
    pub last_synced: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationField {
    Key,
    Description,
    Value,
    ConfigType,
    Validity,
}

pub const SEARCH_FIELDS: [ConfigurationField; 3] = [
    ConfigurationField::Key,
    ConfigurationField::Description,
    ConfigurationField::Value,
];

impl Record for ConfigurationEntry {
    const KIND: &'static str = "configuration entry";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for ConfigurationEntry {
    type Field = ConfigurationField;

    fn field_text(&self, field: ConfigurationField) -> Option<Cow<'_, str>> {
        Some(match field {
            ConfigurationField::Key => Cow::Borrowed(self.key.as_str()),
            ConfigurationField::Description => Cow::Borrowed(self.description.as_str()),
            ConfigurationField::Value => Cow::Borrowed(self.value.as_str()),
            ConfigurationField::ConfigType => Cow::Borrowed(self.config_type.label()),
            ConfigurationField::Validity => {
                Cow::Borrowed(if self.valid { "Valid" } else { "Invalid" })
            }
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.last_updated)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationDraft {
    pub key: String,
    pub description: String,
    pub value: String,
    pub config_type: ConfigType,
}

fn is_setting_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.ends_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'.')
}

impl Editable for ConfigurationEntry {
    type Draft = ConfigurationDraft;

    fn validate(draft: &ConfigurationDraft) -> FormErrors {
        let mut errors = FormErrors::new();
        let key = draft.key.trim();
        if key.is_empty() {
            errors.insert("key", "Key is required");
        } else if !is_setting_key(key) {
            errors.insert(
                "key",
                "Key may only contain lowercase letters, digits, '_' and '.'",
            );
        }
        require(&mut errors, "value", "Value", &draft.value);
        errors
    }

    fn from_draft(id: String, draft: ConfigurationDraft, now: NaiveDateTime) -> Self {
        Self {
            id,
            key: draft.key.trim().to_owned(),
            description: draft.description.trim().to_owned(),
            value: draft.value.trim().to_owned(),
            config_type: draft.config_type,
            valid: true,
            last_updated: format_timestamp(now),
            last_synced: None,
        }
    }

    fn apply_draft(&mut self, draft: ConfigurationDraft, now: NaiveDateTime) {
        self.key = draft.key.trim().to_owned();
        self.description = draft.description.trim().to_owned();
        self.value = draft.value.trim().to_owned();
        self.config_type = draft.config_type;
        self.valid = true;
        self.last_updated = format_timestamp(now);
    }

    fn to_draft(&self) -> ConfigurationDraft {
        ConfigurationDraft {
            key: self.key.clone(),
            description: self.description.clone(),
            value: self.value.clone(),
            config_type: self.config_type,
        }
    }
}

pub fn summary_specs() -> Vec<AggregateSpec<ConfigurationEntry>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Full),
        AggregateSpec::count_where("invalid", AggregateSource::Full, |e: &ConfigurationEntry| {
            !e.valid
        }),
        AggregateSpec::count_equal(
            "general",
            AggregateSource::Filtered,
            ConfigurationField::ConfigType,
            ConfigType::General.label(),
        ),
        AggregateSpec::count_equal(
            "specific",
            AggregateSource::Filtered,
            ConfigurationField::ConfigType,
            ConfigType::Specific.label(),
        ),
    ]
}

impl<R: Repository<ConfigurationEntry>> ListView<ConfigurationEntry, R> {
    /// Marks every entry as synced at `now` and returns the stamp written.
    ///
    /// There is no remote side: the sync cannot fail once permitted. Any perceived delay is
    /// applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LisError::PermissionDenied`] if the role cannot update
    /// configuration.
    pub fn sync(&mut self, now: NaiveDateTime) -> LisResult<String> {
        self.ensure(Action::Update)?;

        let stamp = format_timestamp(now);
        let ids: Vec<String> = self.records().iter().map(|e| e.id.clone()).collect();
        for id in &ids {
            if let Some(entry) = self.store_mut().get_mut(id) {
                entry.last_synced = Some(stamp.clone());
            }
        }

        tracing::info!(entries = ids.len(), synced_at = %stamp, "configuration synced");
        self.notices_mut().success(
            "Configuration synced",
            format!("{} entries synced at {stamp}", ids.len()),
        );
        self.audit(
            AuditAction::Synced,
            "all",
            format!("Synced {} entries", ids.len()),
            now,
        );
        Ok(stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Module, Role};
    use crate::error::LisError;
    use crate::query::FilterCriteria;
    use lis_ids::SequentialIds;

    fn entry(id: &str, key: &str, valid: bool) -> ConfigurationEntry {
        ConfigurationEntry {
            id: id.to_owned(),
            key: key.to_owned(),
            description: "Receiving facility for outbound HL7".to_owned(),
            value: "HOSPITAL".to_owned(),
            config_type: ConfigType::Specific,
            valid,
            last_updated: "2024-02-20 12:00:00".to_owned(),
            last_synced: None,
        }
    }

    fn view(role: Role) -> ListView<ConfigurationEntry> {
        ListView::in_memory(
            role,
            Module::Configuration,
            vec![
                entry("CFG-001", "hl7.receiving_facility", true),
                entry("CFG-002", "reagents.low_stock", false),
            ],
            FilterCriteria::new(SEARCH_FIELDS),
            SequentialIds::new("CFG", 3).unwrap(),
        )
    }

    #[test]
    fn sync_stamps_every_entry() {
        let mut v = view(Role::Manager).with_audit_trail("Quinn Manager").unwrap();
        let now = crate::dates::parse_timestamp("2024-03-01 09:30:00").unwrap();

        let stamp = v.sync(now).unwrap();
        assert_eq!(stamp, "2024-03-01 09:30:00");
        assert!(v
            .records()
            .iter()
            .all(|e| e.last_synced.as_deref() == Some("2024-03-01 09:30:00")));
        assert_eq!(
            v.audit_trail().unwrap().entries()[0].action,
            AuditAction::Synced
        );
    }

    #[test]
    fn lab_users_cannot_sync() {
        let mut v = view(Role::LabUser);
        let now = crate::dates::parse_timestamp("2024-03-01").unwrap();
        assert!(matches!(
            v.sync(now),
            Err(LisError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn keys_are_checked() {
        let draft = ConfigurationDraft {
            key: "HL7 Facility".into(),
            description: String::new(),
            value: "LAB".into(),
            config_type: ConfigType::General,
        };
        assert!(ConfigurationEntry::validate(&draft).contains("key"));
        assert!(!is_setting_key("hl7."));
        assert!(is_setting_key("hl7.sending_facility"));
    }

    #[test]
    fn editing_revalidates_the_entry() {
        let mut v = view(Role::Manager);
        let now = crate::dates::parse_timestamp("2024-03-02").unwrap();
        assert_eq!(v.aggregates(&summary_specs()).get("invalid"), Some(1));

        let mut draft = v.open_edit("CFG-002").unwrap();
        draft.value = "150".into();
        v.submit_update("CFG-002", draft, now).unwrap();
        assert_eq!(v.aggregates(&summary_specs()).get("invalid"), Some(0));
    }
}
