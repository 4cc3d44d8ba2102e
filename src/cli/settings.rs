//! `set` / `unset` handling for config keys.

use std::fmt;
use std::path::PathBuf;

use crate::core::config::{Config, ConfigError};
use crate::utils::url::normalize_base_url;

#[derive(Debug)]
pub enum SettingError {
    UnknownKey(String),
    MissingValue {
        key: &'static str,
        example: &'static str,
    },
    InvalidBoolean(String),
    InvalidTemperature(String),
    Config(ConfigError),
}

impl SettingError {
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
                eprintln!("   Known keys: {}", known_keys().join(", "));
            }
            SettingError::MissingValue { key, example } => {
                eprintln!("⚠️  Specify a value for {key}");
                eprintln!("Example: {example}");
            }
            SettingError::InvalidBoolean(input) => {
                eprintln!("❌ Invalid boolean value: {input}");
                eprintln!("   Use 'on' or 'off' (also accepts true/false, yes/no)");
            }
            SettingError::InvalidTemperature(input) => {
                eprintln!("❌ Invalid temperature: {input}");
                eprintln!("   Use a number between 0.0 and 2.0");
            }
            SettingError::Config(err) => {
                eprintln!("❌ Failed to save configuration: {err}");
            }
        }
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::MissingValue { key, .. } => write!(f, "Missing value for {key}"),
            SettingError::InvalidBoolean(input) => write!(f, "Invalid boolean value: {input}"),
            SettingError::InvalidTemperature(input) => write!(f, "Invalid temperature: {input}"),
            SettingError::Config(err) => write!(f, "Config error: {err}"),
        }
    }
}

impl std::error::Error for SettingError {}

impl From<ConfigError> for SettingError {
    fn from(err: ConfigError) -> Self {
        SettingError::Config(err)
    }
}

struct Setting {
    key: &'static str,
    example: &'static str,
    set: fn(&mut Config, &str) -> Result<String, SettingError>,
    unset: fn(&mut Config),
}

const SETTINGS: &[Setting] = &[
    Setting {
        key: "model",
        example: "threadchat set model gemini-2.5-flash",
        set: |config, value| {
            config.model = Some(value.to_string());
            Ok(value.to_string())
        },
        unset: |config| config.model = None,
    },
    Setting {
        key: "base-url",
        example: "threadchat set base-url https://generativelanguage.googleapis.com/v1beta",
        set: |config, value| {
            let trimmed = normalize_base_url(value);
            config.base_url = Some(trimmed.clone());
            Ok(trimmed)
        },
        unset: |config| config.base_url = None,
    },
    Setting {
        key: "temperature",
        example: "threadchat set temperature 0.4",
        set: |config, value| {
            let temperature = value
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or_else(|| SettingError::InvalidTemperature(value.to_string()))?;
            config.temperature = Some(temperature);
            Ok(temperature.to_string())
        },
        unset: |config| config.temperature = None,
    },
    Setting {
        key: "system-instruction",
        example: "threadchat set system-instruction You are a terse assistant.",
        set: |config, value| {
            config.system_instruction = Some(value.to_string());
            Ok("(custom)".to_string())
        },
        unset: |config| config.system_instruction = None,
    },
    Setting {
        key: "markdown",
        example: "threadchat set markdown off",
        set: |config, value| {
            let enabled =
                parse_bool(value).ok_or_else(|| SettingError::InvalidBoolean(value.to_string()))?;
            config.markdown = Some(enabled);
            Ok(format_bool(enabled).to_string())
        },
        unset: |config| config.markdown = None,
    },
    Setting {
        key: "data-dir",
        example: "threadchat set data-dir ~/chats",
        set: |config, value| {
            config.data_dir = Some(PathBuf::from(value));
            Ok(value.to_string())
        },
        unset: |config| config.data_dir = None,
    },
];

pub fn known_keys() -> Vec<&'static str> {
    SETTINGS.iter().map(|setting| setting.key).collect()
}

fn find(key: &str) -> Result<&'static Setting, SettingError> {
    SETTINGS
        .iter()
        .find(|setting| setting.key.eq_ignore_ascii_case(key))
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))
}

pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Apply `key = args` to `config` and return the confirmation line.
pub fn apply_set(config: &mut Config, key: &str, args: &[String]) -> Result<String, SettingError> {
    let setting = find(key)?;
    let value = args.join(" ");
    if value.trim().is_empty() {
        return Err(SettingError::MissingValue {
            key: setting.key,
            example: setting.example,
        });
    }
    let display = (setting.set)(config, value.trim())?;
    Ok(format!("✅ Set {} to: {display}", setting.key))
}

pub fn apply_unset(config: &mut Config, key: &str) -> Result<String, SettingError> {
    let setting = find(key)?;
    (setting.unset)(config);
    Ok(format!("✅ Unset {} (will use default)", setting.key))
}

pub fn set_and_save(key: &str, args: &[String]) -> Result<String, SettingError> {
    let mut config = Config::load()?;
    let message = apply_set(&mut config, key, args)?;
    config.save()?;
    Ok(message)
}

pub fn unset_and_save(key: &str) -> Result<String, SettingError> {
    let mut config = Config::load()?;
    let message = apply_unset(&mut config, key)?;
    config.save()?;
    Ok(message)
}
