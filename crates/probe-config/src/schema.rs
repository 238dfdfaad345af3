//! Configuration schema types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level probe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Server process to launch.
    #[serde(default)]
    pub server: ServerConfig,
    /// Waits and deadlines.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Client identity sent in `initialize`.
    #[serde(default)]
    pub client: ClientConfig,
    /// Arguments of the `tools/call` step.
    #[serde(default)]
    pub invoke: InvokeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Executable name or path.
    #[serde(default = "default_program")]
    pub program: String,
    /// Fixed arguments selecting the server run mode.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the server.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory for the server.
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }
}

fn default_program() -> String {
    "cunzhi-server".to_string()
}

/// Waits and deadlines, all in milliseconds unless named otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Grace after launch before the first request.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Bound on the negotiate and enumerate reads.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Bound on the invoke read; covers interactive handling.
    #[serde(default = "default_invoke_timeout_ms")]
    pub invoke_timeout_ms: u64,
    /// How long to wait for a stderr diagnostic line.
    #[serde(default = "default_stderr_wait_ms")]
    pub stderr_wait_ms: u64,
    /// Grace between the termination signal and a forced kill.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Deadline for the whole conversation, in seconds.
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
}

impl TimingConfig {
    /// Returns the start-up grace as a `Duration`.
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Returns the response timeout as a `Duration`.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Returns the invoke timeout as a `Duration`.
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }

    /// Returns the stderr wait as a `Duration`.
    pub fn stderr_wait(&self) -> Duration {
        Duration::from_millis(self.stderr_wait_ms)
    }

    /// Returns the shutdown grace as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Returns the run deadline as a `Duration`.
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            invoke_timeout_ms: default_invoke_timeout_ms(),
            stderr_wait_ms: default_stderr_wait_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            run_deadline_secs: default_run_deadline_secs(),
        }
    }
}

fn default_startup_delay_ms() -> u64 {
    2_000
}
fn default_response_timeout_ms() -> u64 {
    5_000
}
fn default_invoke_timeout_ms() -> u64 {
    30_000
}
fn default_stderr_wait_ms() -> u64 {
    500
}
fn default_shutdown_grace_ms() -> u64 {
    3_000
}
/// Longest accepted `timing.run_deadline_secs`: one day.
pub const MAX_RUN_DEADLINE_SECS: u64 = 86_400;

fn default_run_deadline_secs() -> u64 {
    120
}

/// Client identity sent during negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client name.
    #[serde(default = "default_client_name")]
    pub name: String,
    /// Client version.
    #[serde(default = "default_client_version")]
    pub version: String,
    /// Requested MCP protocol version.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
            protocol_version: default_protocol_version(),
        }
    }
}

fn default_client_name() -> String {
    "test-client".to_string()
}
fn default_client_version() -> String {
    "1.0.0".to_string()
}
fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

/// The capability to require and how to call it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeConfig {
    /// Tool that must be listed and is then called.
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
    /// Message shown by the tool.
    #[serde(default = "default_message")]
    pub message: String,
    /// Options offered by the tool.
    #[serde(default = "default_predefined_options")]
    pub predefined_options: Vec<String>,
    /// Render `message` as Markdown.
    #[serde(default)]
    pub is_markdown: bool,
    /// Prompt in the server's terminal.
    #[serde(default)]
    pub terminal_mode: bool,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            message: default_message(),
            predefined_options: default_predefined_options(),
            is_markdown: false,
            terminal_mode: false,
        }
    }
}

fn default_tool_name() -> String {
    "zhi".to_string()
}
fn default_message() -> String {
    "这是一个测试消息".to_string()
}
fn default_predefined_options() -> Vec<String> {
    vec!["选项1".to_string(), "选项2".to_string(), "取消".to_string()]
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "probe_conformance=trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ProbeConfig {
    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.program.trim().is_empty() {
            return Err("server.program must not be empty".into());
        }
        if self.invoke.tool_name.trim().is_empty() {
            return Err("invoke.tool_name must not be empty".into());
        }
        let t = &self.timing;
        for (name, value) in [
            ("timing.response_timeout_ms", t.response_timeout_ms),
            ("timing.invoke_timeout_ms", t.invoke_timeout_ms),
            ("timing.shutdown_grace_ms", t.shutdown_grace_ms),
            ("timing.run_deadline_secs", t.run_deadline_secs),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }
        if t.run_deadline_secs > MAX_RUN_DEADLINE_SECS {
            return Err(format!(
                "timing.run_deadline_secs must be at most {MAX_RUN_DEADLINE_SECS}, got {}",
                t.run_deadline_secs
            ));
        }
        Ok(())
    }
}
