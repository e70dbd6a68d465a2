//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the dashboard. The
//! helpers below take the raw environment value as an argument and never read the process
//! environment themselves, so tests can exercise them without touching global state.

use crate::access::Role;
use crate::constants::{
    DEFAULT_DISPLAY_NAME, DEFAULT_SYNC_DELAY_MS, DEFAULT_WAREHOUSE_LOW_STOCK,
    DEFAULT_WAREHOUSE_MEDIUM_STOCK,
};
use crate::error::{LisError, LisResult};
use crate::models::StockThresholds;
use lis_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    role: Role,
    display_name: NonEmptyText,
    seed_file: Option<PathBuf>,
    reagent_thresholds: StockThresholds,
    warehouse_thresholds: StockThresholds,
    sync_delay: Duration,
}

impl CoreConfig {
    pub fn new(
        role: Role,
        display_name: NonEmptyText,
        seed_file: Option<PathBuf>,
        reagent_thresholds: StockThresholds,
        warehouse_thresholds: StockThresholds,
        sync_delay: Duration,
    ) -> Self {
        Self {
            role,
            display_name,
            seed_file,
            reagent_thresholds,
            warehouse_thresholds,
            sync_delay,
        }
    }

    /// Defaults for `role`: built-in seed, default thresholds, default sync delay.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Text`] if `display_name` is blank.
    pub fn for_role(role: Role, display_name: &str) -> LisResult<Self> {
        Ok(Self::new(
            role,
            NonEmptyText::new(display_name)?,
            None,
            StockThresholds::default(),
            warehouse_thresholds_default(),
            Duration::from_millis(DEFAULT_SYNC_DELAY_MS),
        ))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    pub fn seed_file(&self) -> Option<&Path> {
        self.seed_file.as_deref()
    }

    pub fn reagent_thresholds(&self) -> StockThresholds {
        self.reagent_thresholds
    }

    pub fn warehouse_thresholds(&self) -> StockThresholds {
        self.warehouse_thresholds
    }

    /// Perceived latency the shell waits before reporting a configuration sync.
    pub fn sync_delay(&self) -> Duration {
        self.sync_delay
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_seed_file(mut self, seed_file: Option<PathBuf>) -> Self {
        self.seed_file = seed_file;
        self
    }
}

fn warehouse_thresholds_default() -> StockThresholds {
    StockThresholds::new(DEFAULT_WAREHOUSE_LOW_STOCK, DEFAULT_WAREHOUSE_MEDIUM_STOCK)
        .unwrap_or_default()
}

/// Trims an optional raw value, treating blank as absent.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the dashboard role. Missing or blank means Lab User.
pub fn role_from_env_value(value: Option<String>) -> LisResult<Role> {
    let parsed = present(value).map(|v| v.parse::<Role>()).transpose()?;
    Ok(parsed.unwrap_or(Role::LabUser))
}

/// Parse the display name. Missing or blank means [`DEFAULT_DISPLAY_NAME`].
pub fn display_name_from_env_value(value: Option<String>) -> LisResult<NonEmptyText> {
    let name = present(value).unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
    Ok(NonEmptyText::new(name)?)
}

pub fn seed_file_from_env_value(value: Option<String>) -> Option<PathBuf> {
    present(value).map(PathBuf::from)
}

fn parse_count(name: &str, value: Option<String>) -> LisResult<Option<u32>> {
    present(value)
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                LisError::InvalidInput(format!("{name} must be a non-negative integer, got '{v}'"))
            })
        })
        .transpose()
}

/// Parse a low/medium stock threshold pair, falling back to the given defaults per value.
///
/// # Errors
///
/// Returns [`LisError::InvalidInput`] if a value is not a non-negative integer or the
/// resulting low bound is not below the medium bound.
pub fn thresholds_from_env_values(
    low: Option<String>,
    medium: Option<String>,
    defaults: StockThresholds,
) -> LisResult<StockThresholds> {
    let low = parse_count("low stock threshold", low)?.unwrap_or(defaults.low());
    let medium = parse_count("medium stock threshold", medium)?.unwrap_or(defaults.medium());
    StockThresholds::new(low, medium)
}

/// Warehouse thresholds; defaults are higher than the bench ones.
pub fn warehouse_thresholds_from_env_values(
    low: Option<String>,
    medium: Option<String>,
) -> LisResult<StockThresholds> {
    thresholds_from_env_values(low, medium, warehouse_thresholds_default())
}

/// Parse the configuration sync delay in milliseconds.
pub fn sync_delay_from_env_value(value: Option<String>) -> LisResult<Duration> {
    let millis = present(value)
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                LisError::InvalidInput(format!(
                    "sync delay must be a whole number of milliseconds, got '{v}'"
                ))
            })
        })
        .transpose()?;
    Ok(Duration::from_millis(millis.unwrap_or(DEFAULT_SYNC_DELAY_MS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_lab_user() {
        assert_eq!(role_from_env_value(None).unwrap(), Role::LabUser);
        assert_eq!(role_from_env_value(Some("  ".into())).unwrap(), Role::LabUser);
        assert_eq!(role_from_env_value(Some("Manager".into())).unwrap(), Role::Manager);
        assert!(role_from_env_value(Some("admin".into())).is_err());
    }

    #[test]
    fn display_name_falls_back() {
        assert_eq!(
            display_name_from_env_value(None).unwrap().as_str(),
            DEFAULT_DISPLAY_NAME
        );
        assert_eq!(
            display_name_from_env_value(Some(" Quinn Harper ".into()))
                .unwrap()
                .as_str(),
            "Quinn Harper"
        );
    }

    #[test]
    fn thresholds_override_individually() {
        let t = thresholds_from_env_values(Some("150".into()), None, StockThresholds::default())
            .unwrap();
        assert_eq!((t.low(), t.medium()), (150, 350));

        let w = warehouse_thresholds_from_env_values(None, None).unwrap();
        assert_eq!((w.low(), w.medium()), (500, 1000));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = thresholds_from_env_values(
            Some("400".into()),
            None,
            StockThresholds::default(),
        )
        .expect_err("400 is above the default medium bound");
        match err {
            LisError::InvalidInput(msg) => assert!(msg.contains("must be below")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(thresholds_from_env_values(Some("lots".into()), None, StockThresholds::default())
            .is_err());
    }

    #[test]
    fn sync_delay_parses_millis() {
        assert_eq!(
            sync_delay_from_env_value(None).unwrap(),
            Duration::from_millis(DEFAULT_SYNC_DELAY_MS)
        );
        assert_eq!(
            sync_delay_from_env_value(Some("0".into())).unwrap(),
            Duration::ZERO
        );
        assert!(sync_delay_from_env_value(Some("-5".into())).is_err());
    }

    #[test]
    fn seed_file_blank_is_none() {
        assert_eq!(seed_file_from_env_value(Some(" ".into())), None);
        assert_eq!(
            seed_file_from_env_value(Some("seed.yaml".into())),
            Some(PathBuf::from("seed.yaml"))
        );
    }
}
