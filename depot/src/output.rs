//! Text or JSON rendering of command results.

use anyhow::Result;
use depot_core::{PackageRecord, ToolRecord};
use serde::Serialize;
use std::io::{self, Write};

/// Renders command results to stdout and errors to stderr.
pub struct OutputWriter {
    json: bool,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `data` as JSON, or the text built by `text_fn`.
    ///
    /// Every DTO carries `success` and `result_code` so JSON consumers can
    /// branch without parsing the exit status.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut stdout, data)?;
            writeln!(stdout)?;
        } else {
            write!(stdout, "{}", text_fn())?;
        }
        Ok(())
    }

    /// Report a failed command, including its cause chain.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        let mut stderr = io::stderr().lock();
        if self.json {
            let error_output = ErrorOutput {
                success: false,
                result_code,
                error: format!("{:#}", error),
            };
            if serde_json::to_writer_pretty(&mut stderr, &error_output).is_ok() {
                let _ = writeln!(stderr);
            }
        } else {
            let _ = writeln!(stderr, "Error: {:#}", error);
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub tool_prefix: String,
}

/// Output for `tools list` command.
#[derive(Debug, Serialize)]
pub struct ToolsListOutput {
    pub success: bool,
    pub result_code: u8,
    pub tools: Vec<ToolRecord>,
}

/// Output for `tools publish` command.
#[derive(Debug, Serialize)]
pub struct ToolsPublishOutput {
    pub success: bool,
    pub result_code: u8,
    pub tool: ToolRecord,
    pub aliases: Vec<String>,
}

/// Output for `packages publish` command.
#[derive(Debug, Serialize)]
pub struct PackagesPublishOutput {
    pub success: bool,
    pub result_code: u8,
    pub package: PackageRecord,
}

/// Output for `packages list` command.
#[derive(Debug, Serialize)]
pub struct PackagesListOutput {
    pub success: bool,
    pub result_code: u8,
    pub packages: Vec<PackageRecord>,
}
