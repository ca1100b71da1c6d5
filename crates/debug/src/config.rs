//! Live-mutable session settings
//!
//! Settings are registered once with a typed default and mutated only through
//! [`Settings::set`]. Readers always see the live value: the stepper and the
//! inspector consult the store at each decision point, so a change takes
//! effect on the very next step.

use std::collections::HashMap;

/// Name of the boolean setting controlling descent into native helpers
pub const STEP_INTO_NATIVE_CODE: &str = "step_into_native_code";

/// Name of the integer setting bounding rendered fields of a decoded value
pub const DYNAMIC_FIELD_LIMIT: &str = "dynamic_field_limit";

/// A typed setting value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Bool(true) => write!(f, "on"),
            SettingValue::Bool(false) => write!(f, "off"),
            SettingValue::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Errors from configuration commands
#[derive(Debug, PartialEq, Eq)]
pub enum SettingsError {
    /// No setting registered under this name
    UnknownSetting(String),
    /// The value does not parse for the setting's type
    InvalidValue { name: String, value: String },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::UnknownSetting(name) => write!(f, "unknown setting: {}", name),
            SettingsError::InvalidValue { name, value } => {
                write!(f, "invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone)]
struct Entry {
    value: SettingValue,
    default: SettingValue,
}

/// The session's named settings
#[derive(Debug)]
pub struct Settings {
    entries: HashMap<String, Entry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Create the settings store with every known setting at its default.
    pub fn new() -> Self {
        let mut settings = Self {
            entries: HashMap::new(),
        };
        settings.register(STEP_INTO_NATIVE_CODE, SettingValue::Bool(false));
        settings.register(DYNAMIC_FIELD_LIMIT, SettingValue::Int(8));
        settings
    }

    fn register(&mut self, name: &str, default: SettingValue) {
        self.entries.insert(
            name.to_string(),
            Entry {
                value: default,
                default,
            },
        );
    }

    /// Get the live value of a setting. Never fails for a registered name.
    pub fn get(&self, name: &str) -> Option<SettingValue> {
        self.entries.get(name).map(|e| e.value)
    }

    /// Set a setting from its textual representation.
    ///
    /// Booleans accept `on`/`off`/`true`/`false`/`1`/`0`; integers accept
    /// decimal.
    pub fn set(&mut self, name: &str, text: &str) -> Result<(), SettingsError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))?;

        let parsed = match entry.default {
            SettingValue::Bool(_) => match text {
                "on" | "true" | "1" => Some(SettingValue::Bool(true)),
                "off" | "false" | "0" => Some(SettingValue::Bool(false)),
                _ => None,
            },
            SettingValue::Int(_) => text.parse::<i64>().ok().map(SettingValue::Int),
        };

        match parsed {
            Some(value) => {
                entry.value = value;
                Ok(())
            }
            None => Err(SettingsError::InvalidValue {
                name: name.to_string(),
                value: text.to_string(),
            }),
        }
    }

    /// Restore a setting to its default.
    pub fn reset(&mut self, name: &str) -> Result<(), SettingsError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))?;
        entry.value = entry.default;
        Ok(())
    }

    /// Whether the stepper may descend into step-into-set native helpers.
    pub fn step_into_native_code(&self) -> bool {
        matches!(
            self.get(STEP_INTO_NATIVE_CODE),
            Some(SettingValue::Bool(true))
        )
    }

    /// How many fields of a decoded Quill value to render.
    pub fn dynamic_field_limit(&self) -> usize {
        match self.get(DYNAMIC_FIELD_LIMIT) {
            Some(SettingValue::Int(v)) if v > 0 => v as usize,
            _ => 8,
        }
    }

    /// All settings with their current values, sorted by name.
    pub fn list(&self) -> Vec<(String, SettingValue)> {
        let mut all: Vec<(String, SettingValue)> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
