//! Sample data the dashboards start from.
//!
//! A built-in seed is compiled into the crate. A YAML file with the same schema can replace it
//! (`LIS_SEED_FILE`). Every dashboard view takes its own copy of the collections it shows, so a
//! change made in one view is not visible in another.

use crate::audit::AuditLog;
use crate::error::{LisError, LisResult};
use crate::models::{
    ConfigurationEntry, EventLog, Hl7Message, Instrument, Notification, RawResult, Reagent,
    ReportRow, StaffApproval, SyncLog, TestOrder, User,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUILTIN_SEED: &str = include_str!("../seed/default.yaml");

/// Every seeded collection. Missing collections are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default)]
    pub test_orders: Vec<TestOrder>,
    #[serde(default)]
    pub event_logs: Vec<EventLog>,
    #[serde(default)]
    pub audit_logs: Vec<AuditLog>,
    #[serde(default)]
    pub instruments: Vec<Instrument>,
    #[serde(default)]
    pub reagents: Vec<Reagent>,
    /// Warehouse stock, kept separately from bench reagents.
    #[serde(default)]
    pub warehouse: Vec<Reagent>,
    #[serde(default)]
    pub reports: Vec<ReportRow>,
    #[serde(default)]
    pub raw_results: Vec<RawResult>,
    #[serde(default)]
    pub sync_logs: Vec<SyncLog>,
    #[serde(default)]
    pub hl7_messages: Vec<Hl7Message>,
    #[serde(default)]
    pub configuration: Vec<ConfigurationEntry>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub approvals: Vec<StaffApproval>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl SeedData {
    /// The seed compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::SeedParse`] if the built-in seed does not match the schema.
    pub fn builtin() -> LisResult<Self> {
        Self::parse(BUILTIN_SEED)
    }

    /// Parses seed YAML.
    ///
    /// Unknown keys are rejected. Schema errors name the failing path (for example
    /// `instruments[0].mode`).
    ///
    /// # Errors
    ///
    /// Returns [`LisError::SeedParse`] if the YAML does not match the seed schema.
    pub fn parse(yaml_text: &str) -> LisResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        match serde_path_to_error::deserialize::<_, SeedData>(deserializer) {
            Ok(seed) => Ok(seed),
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_owned()
                } else {
                    path
                };
                Err(LisError::SeedParse {
                    path,
                    message: source.to_string(),
                })
            }
        }
    }

    /// Loads the seed from `path`, or the built-in seed when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::SeedRead`] if the file cannot be read, or [`LisError::SeedParse`]
    /// if it does not match the schema.
    pub fn load(path: Option<&Path>) -> LisResult<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(LisError::SeedRead)?;
                let seed = Self::parse(&text)?;
                tracing::info!(path = %path.display(), "loaded seed file");
                Ok(seed)
            }
            None => Self::builtin(),
        }
    }

    /// Seed as pretty JSON, for exporting the current sample set.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Serialization`] if serialisation fails.
    pub fn to_json(&self) -> LisResult<String> {
        serde_json::to_string_pretty(self).map_err(LisError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstrumentMode, TestOrderStatus};
    use std::io::Write;

    #[test]
    fn builtin_seed_parses() {
        let seed = SeedData::builtin().expect("built-in seed is valid");
        assert!(!seed.test_orders.is_empty());
        assert!(!seed.warehouse.is_empty());

        let ins = seed
            .instruments
            .iter()
            .find(|i| i.id == "INS-001")
            .expect("INS-001 is seeded");
        assert_eq!(ins.mode, InstrumentMode::Maintenance);
        assert!(seed
            .test_orders
            .iter()
            .any(|o| o.status == TestOrderStatus::Completed && !o.results.is_empty()));
    }

    #[test]
    fn builtin_ids_are_unique_per_collection() {
        let seed = SeedData::builtin().unwrap();
        let mut ids: Vec<&str> = seed.test_orders.iter().map(|o| o.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn schema_errors_name_the_path() {
        let yaml = "\
instruments:
  - id: INS-9
    name: X
    model: X
    serial_number: X
    location: X
    mode: sleeping
    status: available
    operator: X
    last_modified: '2024-01-01'
";
        match SeedData::parse(yaml) {
            Err(LisError::SeedParse { path, .. }) => assert_eq!(path, "instruments[0].mode"),
            other => panic!("expected SeedParse, got {other:?}"),
        }
    }

    #[test]
    fn unknown_collections_are_rejected() {
        assert!(matches!(
            SeedData::parse("patients: []\n"),
            Err(LisError::SeedParse { .. })
        ));
    }

    #[test]
    fn loads_seed_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "\
notifications:
  - id: NTF-1
    title: Hello
    message: Welcome
    kind: info
    timestamp: '2024-03-01 08:00'"
        )
        .unwrap();

        let seed = SeedData::load(Some(file.path())).unwrap();
        assert_eq!(seed.notifications.len(), 1);
        assert!(!seed.notifications[0].read);
        assert!(seed.test_orders.is_empty());
    }

    #[test]
    fn missing_seed_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            SeedData::load(Some(&missing)),
            Err(LisError::SeedRead(_))
        ));
    }
}
