//! Device command for Mentor.
//!
//! Shows the device-scope moderation state.

use serde::{Deserialize, Serialize};

use crate::core::ModerationGate;
use crate::storage::{KeyValueStore, RecordStore};

/// Options for the device command.
#[derive(Debug, Clone, Default)]
pub struct DeviceOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Output format for the device command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceOutput {
    pub success: bool,
    pub banned: bool,
    pub warnings: u32,
    /// Warnings at which the device is banned.
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceOutput {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            banned: false,
            warnings: 0,
            threshold: 0,
            error: Some(error.into()),
        }
    }
}

/// The device command implementation.
pub struct DeviceCommand<'a, S: KeyValueStore> {
    records: &'a RecordStore<S>,
    gate: ModerationGate,
}

impl<'a, S: KeyValueStore> DeviceCommand<'a, S> {
    pub fn new(records: &'a RecordStore<S>, gate: ModerationGate) -> Self {
        Self { records, gate }
    }

    pub fn run(&self) -> DeviceOutput {
        match self.records.device_state() {
            Ok(state) => DeviceOutput {
                success: true,
                banned: state.banned,
                warnings: state.warnings,
                threshold: self.gate.threshold(),
                error: None,
            },
            Err(e) => DeviceOutput::failure(e.to_string()),
        }
    }

    pub fn format_output(&self, output: &DeviceOutput, options: &DeviceOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Reading device state failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.banned {
            "This device is suspended.\n".to_string()
        } else {
            format!(
                "This device is in good standing ({} of {} warnings).\n",
                output.warnings, output.threshold
            )
        }
    }
}
