//! Capability invocation: the collaborator trait the chain calls into, the
//! per-step outcome record, and a process-backed implementation.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, error, instrument, warn};

use crate::error::InvocationError;
use crate::settings::InvokerConfig;

/// Status code recorded when the capability process times out.
pub const TIMEOUT_STATUS: i32 = 124;

/// Error recorded when the process exits 0 but prints nothing.
pub const EMPTY_OUTPUT_ERROR: &str = "capability produced no output";

/// Result of invoking a single capability.
///
/// Successful outcomes carry `output`, failed ones carry `error`; use the
/// constructors to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub capability: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status_code: i32,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl InvocationOutcome {
    pub fn succeeded(
        capability: impl Into<String>,
        output: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            capability: capability.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            status_code: 0,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// A failed outcome. A zero `status_code` is bumped to 1.
    pub fn failed(
        capability: impl Into<String>,
        error: impl Into<String>,
        status_code: i32,
        duration: Duration,
    ) -> Self {
        Self {
            capability: capability.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            status_code: if status_code == 0 { 1 } else { status_code },
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn output_text(&self) -> &str {
        self.output.as_deref().unwrap_or_default()
    }

    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

/// Invokes a capability by name with a fully built prompt.
///
/// `Err` means the call could not be attempted at all. A capability that ran
/// and failed is reported as `Ok` with `success == false`.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(
        &self,
        capability: &str,
        prompt: &str,
    ) -> Result<InvocationOutcome, InvocationError>;
}

/// Runs capabilities as `<program> --agent=<name> --prompt=<prompt>`.
pub struct CliInvoker {
    program: String,
    timeout: Duration,
    retries: u32,
}

impl CliInvoker {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            retries: 1,
        }
    }

    pub fn from_config(config: &InvokerConfig) -> Self {
        Self::new(config.program.clone(), config.timeout()).with_retries(config.retries)
    }

    /// Extra attempts made after a timed-out attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether `<program> --version` runs successfully.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn attempt(
        &self,
        capability: &str,
        prompt: &str,
    ) -> Result<Option<std::process::Output>, InvocationError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("--agent={capability}"))
            .arg(format!("--prompt={prompt}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(InvocationError::Spawn)?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(Some(output?)),
            // Dropping the future drops the child; kill_on_drop reaps it.
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl CapabilityInvoker for CliInvoker {
    #[instrument(skip(self, prompt), fields(program = %self.program))]
    async fn invoke(
        &self,
        capability: &str,
        prompt: &str,
    ) -> Result<InvocationOutcome, InvocationError> {
        let start = Instant::now();

        for attempt in 0..=self.retries {
            let Some(output) = self.attempt(capability, prompt).await? else {
                warn!(capability, attempt, timeout = ?self.timeout, "capability timed out");
                continue;
            };

            let elapsed = start.elapsed();
            if output.status.success() {
                let stdout = normalize_output(&String::from_utf8_lossy(&output.stdout));
                // A clean exit with nothing to forward is not a result.
                if stdout.is_empty() {
                    warn!(capability, "capability exited cleanly without output");
                    return Ok(InvocationOutcome::failed(
                        capability,
                        EMPTY_OUTPUT_ERROR,
                        1,
                        elapsed,
                    ));
                }
                debug!(capability, duration = ?elapsed, "capability succeeded");
                return Ok(InvocationOutcome::succeeded(capability, stdout, elapsed));
            }

            let status_code = output.status.code().unwrap_or(1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("capability exited with status {status_code}")
            } else {
                stderr
            };
            warn!(capability, status_code, error = %message, "capability failed");
            return Ok(InvocationOutcome::failed(
                capability,
                message,
                status_code,
                elapsed,
            ));
        }

        error!(capability, attempts = self.retries + 1, "capability timed out on every attempt");
        Ok(InvocationOutcome::failed(
            capability,
            format!("capability invocation timed out after {:?}", self.timeout),
            TIMEOUT_STATUS,
            start.elapsed(),
        ))
    }
}

/// Unwrap a JSON string literal, compact other JSON, otherwise trim.
fn normalize_output(stdout: &str) -> String {
    let trimmed = stdout.trim();
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(text)) => text,
        Ok(value) => value.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
