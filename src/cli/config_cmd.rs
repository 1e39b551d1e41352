//! Config command for Mentor.
//!
//! Prints the effective configuration, or writes a starter
//! `config.toml` into the Mentor home directory.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{mentor_home, Config};

/// Options for the config command.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub json: bool,
    pub quiet: bool,
    /// Write the defaults to `<home>/config.toml`.
    pub init: bool,
    /// Overwrite an existing file when initializing.
    pub force: bool,
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOutput {
    pub success: bool,
    /// File written by `--init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Whether `--init` wrote the file (false when it already existed).
    pub written: bool,
    /// Effective configuration.
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
    home: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            home: mentor_home(),
        }
    }

    /// Use a specific home directory instead of `~/.mentor`.
    pub fn with_home(config: Config, home: impl Into<PathBuf>) -> Self {
        Self {
            config,
            home: Some(home.into()),
        }
    }

    pub fn run(&self, options: &ConfigOptions) -> ConfigOutput {
        let mut output = ConfigOutput {
            success: true,
            path: None,
            written: false,
            config: self.config.clone(),
            error: None,
        };

        if options.init {
            if let Err(e) = self.init(options.force, &mut output) {
                output.success = false;
                output.error = Some(e);
            }
        }
        output
    }

    fn init(&self, force: bool, output: &mut ConfigOutput) -> std::result::Result<(), String> {
        let home = self
            .home
            .as_ref()
            .ok_or_else(|| "Could not determine home directory".to_string())?;
        let path = home.join("config.toml");
        output.path = Some(path.display().to_string());

        if path.exists() && !force {
            return Ok(());
        }

        let content = Config::default().to_toml().map_err(|e| e.to_string())?;
        fs::create_dir_all(home).map_err(|e| format!("Failed to create {}: {}", home.display(), e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        output.written = true;
        Ok(())
    }

    pub fn format_output(&self, output: &ConfigOutput, options: &ConfigOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Config failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut text = String::new();
        if let Some(path) = &output.path {
            if output.written {
                text.push_str(&format!("Wrote {}\n\n", path));
            } else {
                text.push_str(&format!("{} already exists (use --force to overwrite)\n\n", path));
            }
        }
        match output.config.to_toml() {
            Ok(toml) => text.push_str(&toml),
            Err(e) => text.push_str(&format!("Could not render config: {}\n", e)),
        }
        text
    }
}
