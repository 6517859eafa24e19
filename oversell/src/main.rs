//! # oversell - Main Entry Point
//!
//! Parses flags, runs pre-flight checks, probes the host and prints the
//! report. A Ctrl+C or SIGTERM drops the in-flight probe, which removes its
//! temporary files before the process exits.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};
use std::io::{self, IsTerminal, Write};
use tokio::signal::unix::{signal, SignalKind};

use oversell::capability::{self, KNOWN_TOOLS};
use oversell::cli::Args;
use oversell::config::OutputFormat;
use oversell::engine::Engine;
use oversell::preflight::run_preflight_checks;
use oversell::report::{render_narrative, Report};
use oversell::tools::{HostPaths, SystemRunner};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_UNAVAILABLE: i32 = 69;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("interrupted") {
        EXIT_INTERRUPTED
    } else {
        EXIT_ERROR
    }
}

/// Resolves on the first Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl+C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

fn render(report: &Report, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            report.write_json(&mut out).context("Failed to write JSON report")?;
        }
        OutputFormat::Narrative => {
            let color = io::stdout().is_terminal();
            render_narrative(report, &mut out, color).context("Failed to write report")?;
        }
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn run() -> Result<i32> {
    // clap prints help/version and exits 0; usage errors exit 2 from inside clap
    let args = Args::parse();

    let work_dir = std::env::current_dir().context("Cannot determine working directory")?;
    let config = args.to_config(work_dir);
    let host = HostPaths::system();

    let caps = capability::detect(KNOWN_TOOLS);
    for (tool, present) in caps.iter() {
        debug!("tool {tool}: {}", if present { "found" } else { "missing" });
    }

    run_preflight_checks(&host, &caps, args.json)?;

    let format = config.format;
    let engine = Engine::new(SystemRunner, host, config);
    info!("starting probes in {}", engine.config().work_dir.display());

    let report = tokio::select! {
        report = engine.run(&caps) => report,
        res = shutdown_signal() => {
            res?;
            // The probe future is dropped here, which removes its scratch files
            bail!("interrupted, temporary files removed");
        }
    };

    render(&report, format)?;

    if report.has_missing_tool() {
        info!("one or more probes could not run because a required tool is missing");
        return Ok(EXIT_UNAVAILABLE);
    }
    Ok(EXIT_SUCCESS)
}
