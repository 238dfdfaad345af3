//! Maps the loaded configuration onto a harness run.

use std::path::PathBuf;

use probe_config::ProbeConfig;
use probe_conformance::{ClientIdentity, ConversationConfig, HarnessConfig};
use probe_protocol::mcp::ZhiArguments;
use probe_transport_stdio::{diagnostics, ServerCommand};

/// Builds the harness configuration. A non-empty `server_override`
/// replaces `server.program` and `server.args`.
pub fn harness_config(config: &ProbeConfig, server_override: &[String]) -> HarnessConfig {
    let command = server_command(config, server_override);
    let timing = &config.timing;

    let conversation = ConversationConfig {
        client: ClientIdentity {
            name: config.client.name.clone(),
            version: config.client.version.clone(),
            protocol_version: config.client.protocol_version.clone(),
        },
        tool_name: config.invoke.tool_name.clone(),
        arguments: ZhiArguments {
            message: config.invoke.message.clone(),
            predefined_options: config.invoke.predefined_options.clone(),
            is_markdown: config.invoke.is_markdown,
            terminal_mode: config.invoke.terminal_mode,
        },
        response_timeout: timing.response_timeout(),
        invoke_timeout: timing.invoke_timeout(),
        stderr_wait: timing.stderr_wait(),
    };

    HarnessConfig {
        command,
        conversation,
        startup_delay: timing.startup_delay(),
        shutdown_grace: timing.shutdown_grace(),
        run_deadline: timing.run_deadline(),
        stderr_capacity: diagnostics::DEFAULT_CAPACITY,
    }
}

fn server_command(config: &ProbeConfig, server_override: &[String]) -> ServerCommand {
    let mut command = match server_override.split_first() {
        Some((program, args)) => ServerCommand::new(program.clone()).args(args.iter().cloned()),
        None => ServerCommand::new(config.server.program.clone())
            .args(config.server.args.iter().cloned()),
    };
    for (key, value) in &config.server.env {
        command = command.env(key.clone(), value.clone());
    }
    if let Some(dir) = &config.server.working_dir {
        command = command.current_dir(PathBuf::from(dir));
    }
    command
}

/// Log filter: `-v` raises to debug, `-vv` to trace; otherwise the
/// configured level applies.
pub fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_map_to_reference_run() {
        let harness = harness_config(&ProbeConfig::default(), &[]);

        assert_eq!(harness.command.program, "cunzhi-server");
        assert!(harness.command.args.is_empty());
        assert_eq!(harness.conversation, ConversationConfig::default());
        assert_eq!(harness.startup_delay, Duration::from_secs(2));
        assert_eq!(harness.run_deadline, Duration::from_secs(120));
    }

    #[test]
    fn trailing_command_overrides_server() {
        let mut config = ProbeConfig::default();
        config.server.args = vec!["--stdio".into()];
        let harness = harness_config(&config, &["./target/debug/server".into(), "--mcp".into()]);

        assert_eq!(harness.command.program, "./target/debug/server");
        assert_eq!(harness.command.args, vec!["--mcp".to_string()]);
    }

    #[test]
    fn env_and_working_dir_are_forwarded() {
        let mut config = ProbeConfig::default();
        config.server.env.insert("RUST_LOG".into(), "warn".into());
        config.server.working_dir = Some("/tmp".into());
        let harness = harness_config(&config, &[]);

        assert_eq!(
            harness.command.env,
            vec![("RUST_LOG".to_string(), "warn".to_string())]
        );
        assert_eq!(harness.command.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn timing_and_invoke_settings_are_applied() {
        let mut config = ProbeConfig::default();
        config.timing.invoke_timeout_ms = 60_000;
        config.invoke.tool_name = "ask".into();
        config.invoke.terminal_mode = true;
        let harness = harness_config(&config, &[]);

        assert_eq!(harness.conversation.invoke_timeout, Duration::from_secs(60));
        assert_eq!(harness.conversation.tool_name, "ask");
        assert!(harness.conversation.arguments.terminal_mode);
    }

    #[test]
    fn verbosity_overrides_configured_level() {
        assert_eq!(log_filter(0, "warn"), "warn");
        assert_eq!(log_filter(1, "warn"), "debug");
        assert_eq!(log_filter(3, "warn"), "trace");
    }
}
