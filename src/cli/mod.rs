//! CLI commands for Mentor.
//!
//! This module provides the CLI commands, organized into:
//! - **Learner command**: play (interactive session)
//! - **Inspection commands**: users, device, config

// Learner command
pub mod play;
pub mod render;

// Inspection commands
pub mod config_cmd;
pub mod device;
pub mod users;

pub use config_cmd::{ConfigCommand, ConfigOptions};
pub use device::{DeviceCommand, DeviceOptions};
pub use play::PlayCommand;
pub use users::{UsersCommand, UsersOptions};
