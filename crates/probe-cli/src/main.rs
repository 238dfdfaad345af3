//! mcp-probe - stdio JSON-RPC conformance probe for MCP servers.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::format::FmtSpan;

use probe_conformance::Harness;
use probe_types::DiagnosticError;

mod output;
mod settings;

/// Launches an MCP server over stdio and checks that it negotiates,
/// lists the required tool and answers a call to it.
#[derive(Debug, Parser)]
#[command(name = "mcp-probe", version, about)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long)]
    config: Option<String>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format: plain (default) or json (for log aggregation).
    #[arg(long, default_value = "plain", value_parser = ["plain", "json"])]
    log_format: String,

    /// Result format on stdout: plain step trace or a json verdict.
    #[arg(long, default_value = "plain", value_parser = ["plain", "json"])]
    report: String,

    /// Server command and arguments, overriding `server.program` and `server.args`.
    #[arg(last = true, value_name = "SERVER")]
    server: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match probe_config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&e.to_string());
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            if let Some(fix) = e.fix() {
                eprintln!("  fix: {fix}");
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    // Initialize tracing. Logs go to stderr; stdout carries the result.
    let filter = settings::log_filter(cli.verbose, &config.logging.level);
    match cli.log_format.as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    tracing::debug!("mcp-probe starting with config: {:?}", cli.config);

    let harness_config = settings::harness_config(&config, &cli.server);
    let server = harness_config.command.display();
    let verdict = Harness::new(harness_config).run().await;

    if cli.report == "json" {
        let json = output::render_json(&verdict).context("failed to serialize verdict")?;
        println!("{json}");
    } else {
        print!("{}", output::render_trace(&server, &verdict));
        match output::summary(&verdict) {
            Ok(line) => output::print_success(&line),
            Err(line) => output::print_error(&line),
        }
    }

    Ok(ExitCode::from(verdict.exit_code()))
}
