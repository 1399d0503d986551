pub mod app;
pub mod cli;
pub mod diff;
pub mod filter;
pub mod guard;
pub mod output;
pub mod params;
pub mod state_xml;
pub mod vst_host;

use clap::Parser;

pub use app::{run_with, RunReport};
pub use cli::Args;

/// Parses the command line and runs the probe against the VST3 host.
pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let report = run_with(&args, &vst_host::Vst3Host)?;
    log::debug!(
        "Probe of {} finished, {} file(s) written",
        report.plugin_name,
        report.written.len()
    );
    Ok(())
}
