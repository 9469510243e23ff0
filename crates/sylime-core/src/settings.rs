//! Per-dictionary settings loaded from TOML.
//!
//! Defaults are embedded via `include_str!("default_settings.toml")`.
//! Settings are plain values handed to each dictionary at
//! construction, not a process-wide singleton; two dictionaries in one
//! process can run different policies.

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictSettings {
    /// Ticks an entry must go unused before `delete_entry` tombstones
    /// it. Zero disables automatic deletion; negatives clamp to zero.
    pub delete_threshold: i64,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    pub query_window: Option<usize>,
    pub fold_case: bool,
    pub max_text_chars: Option<usize>,
    pub single_slot: bool,
    pub credibility: f64,
}

impl Default for DictSettings {
    fn default() -> Self {
        Self {
            delete_threshold: 1000,
            scan: ScanSettings::default(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            query_window: None,
            fold_case: false,
            max_text_chars: None,
            single_slot: false,
            credibility: 1.0,
        }
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<DictSettings, SettingsError> {
    let s: DictSettings =
        toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &DictSettings) -> Result<(), SettingsError> {
    macro_rules! check_at_least_one {
        ($field:ident) => {
            if s.scan.$field == Some(0) {
                return Err(SettingsError::InvalidValue {
                    field: concat!("scan.", stringify!($field)).to_string(),
                    reason: "must be at least 1 when set".to_string(),
                });
            }
        };
    }

    check_at_least_one!(query_window);
    check_at_least_one!(max_text_chars);
    if !s.scan.credibility.is_finite() {
        return Err(SettingsError::InvalidValue {
            field: "scan.credibility".to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}
