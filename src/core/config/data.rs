use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::model_client::ModelSettings;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Gemini model id (e.g., "gemini-3-pro-preview")
    pub model: Option<String>,
    /// API root; the model path is appended to it
    pub base_url: Option<String>,
    /// Sampling temperature sent with every request
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    /// Render inline markdown in replies
    pub markdown: Option<bool>,
    /// Where saved threads live; defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Generation settings, with `model_override` (from the command line)
    /// taking precedence over the configured model.
    pub fn model_settings(&self, model_override: Option<&str>) -> ModelSettings {
        let defaults = ModelSettings::default();
        ModelSettings {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            model: model_override
                .map(str::to_string)
                .or_else(|| self.model.clone())
                .unwrap_or(defaults.model),
            system_instruction: self
                .system_instruction
                .clone()
                .unwrap_or(defaults.system_instruction),
            temperature: self.temperature.unwrap_or(defaults.temperature),
        }
    }

    pub fn markdown_enabled(&self) -> bool {
        self.markdown.unwrap_or(true)
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
