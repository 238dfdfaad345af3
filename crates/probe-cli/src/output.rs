//! Output formatting for the step trace and the final result.

use std::fmt::Write as _;

use probe_types::{ProbeError, StepKind, Verdict};

/// Prints a success message.
pub fn print_success(message: &str) {
    println!("[OK] {message}");
}

/// Prints an error message.
pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

/// Human-readable trace of every step, in order.
///
/// Steps after the first failure are listed as skipped.
pub fn render_trace(server: &str, verdict: &Verdict) -> String {
    let mut out = String::new();
    let total = StepKind::ALL.len();
    let _ = writeln!(out, "probing `{server}`");

    if let Some(failure) = &verdict.failure {
        if !verdict.process_reachable {
            let _ = writeln!(out, "[launch] FAILED {failure}");
            write_advice(&mut out, failure);
            return out;
        }
    }

    for kind in StepKind::ALL {
        let label = format!("[{}/{total}] {kind}", kind.ordinal());
        match verdict.steps.iter().find(|s| s.step == kind) {
            Some(step) => {
                match &step.failure {
                    None => {
                        let _ = writeln!(out, "{label} ... ok");
                    }
                    Some(failure) => {
                        let _ = writeln!(out, "{label} ... FAILED {failure}");
                    }
                }
                for detail in &step.details {
                    let _ = writeln!(out, "      {detail}");
                }
                if let Some(diagnostic) = &step.diagnostic {
                    let _ = writeln!(out, "      stderr: {diagnostic}");
                }
                if let Some(failure) = &step.failure {
                    write_advice(&mut out, failure);
                }
            }
            None => {
                let _ = writeln!(out, "{label} ... skipped");
            }
        }
    }

    if verdict.process_reachable {
        if let Some(failure) = &verdict.failure {
            let _ = writeln!(out, "[run] FAILED {failure}");
            write_advice(&mut out, failure);
        }
    }
    out
}

fn write_advice(out: &mut String, failure: &ProbeError) {
    if let Some(hint) = &failure.hint {
        let _ = writeln!(out, "      hint: {hint}");
    }
    if let Some(fix) = &failure.fix {
        for (i, line) in fix.lines().enumerate() {
            let prefix = if i == 0 { "fix: " } else { "     " };
            let _ = writeln!(out, "      {prefix}{line}");
        }
    }
}

/// The single closing line: `Ok` on success, `Err` naming the failure.
pub fn summary(verdict: &Verdict) -> Result<String, String> {
    if verdict.is_success() {
        return Ok(format!(
            "all {} steps passed, server stopped cleanly",
            StepKind::ALL.len()
        ));
    }
    match verdict.first_failure() {
        Some(failure) => Err(format!("conformance check failed: {}", failure.kind)),
        None if !verdict.process_exited_cleanly => {
            Err("conformance check failed: server was not stopped cleanly".to_string())
        }
        None => Err("conformance check failed".to_string()),
    }
}

/// Machine-readable verdict.
pub fn render_json(verdict: &Verdict) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(verdict)
}
