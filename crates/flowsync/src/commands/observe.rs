//! Merge one discovery pass read from a samples file.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use flowsync_core::FlowSample;

use crate::cli::GlobalOpts;
use crate::commands::{Session, read_input};
use crate::error::CliError;
use crate::output;

/// `{ "rx": [...], "tx": [...] }`; either side may be omitted.
#[derive(Debug, Default, Deserialize)]
struct Samples {
    #[serde(default)]
    rx: Vec<FlowSample>,
    #[serde(default)]
    tx: Vec<FlowSample>,
}

pub fn handle(file: &Path, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let raw = read_input(file)?;
    let samples: Samples = serde_json::from_str(&raw).map_err(|source| CliError::InvalidJson {
        path: file.to_path_buf(),
        source,
    })?;

    session.with_manager(|m| m.refresh_statistics(&samples.rx, &samples.tx))??;
    info!(
        element = session.element(),
        rx = samples.rx.len(),
        tx = samples.tx.len(),
        "discovery pass merged"
    );

    let interfaces: Vec<_> = session.with_manager(|m| m.interfaces().iter().cloned().collect())?;
    let out = super::flows::render_interfaces(global, &interfaces)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
