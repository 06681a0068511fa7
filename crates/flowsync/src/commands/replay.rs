//! Replay provisioning calls from a file, one inter-app call per line.

use std::path::Path;

use tabled::Tabled;
use tracing::warn;

use flowsync_core::{CallReport, ProvisioningReply};

use crate::cli::GlobalOpts;
use crate::commands::{Session, read_input};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ReplyRow {
    #[tabled(rename = "Message")]
    message_id: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ProvisioningReply> for ReplyRow {
    fn from(r: &ProvisioningReply) -> Self {
        Self {
            message_id: r.message_id.to_string(),
            result: if r.success { "ok" } else { "rejected" }.into(),
            detail: r.detail.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default)]
struct ReplaySummary {
    calls: usize,
    skipped_lines: usize,
    applied: usize,
    failed: usize,
}

pub fn handle(file: &Path, mut session: Session, global: &GlobalOpts) -> Result<(), CliError> {
    let input = read_input(file)?;
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match session.dispatcher().on_raw_call(session.element(), line) {
            Ok(CallReport { applied, failed }) => {
                summary.calls += 1;
                summary.applied += applied;
                summary.failed += failed;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unreadable call");
                summary.skipped_lines += 1;
            }
        }
    }

    let replies = session.drain_replies();
    let out = output::render_list(&global.output, &replies, |r| ReplyRow::from(r))?;
    output::print_output(&out, global.quiet);

    if !global.quiet {
        eprintln!(
            "{} call(s): {} applied, {} rejected, {} unreadable line(s) skipped",
            summary.calls, summary.applied, summary.failed, summary.skipped_lines
        );
    }
    tracing::debug!(?summary, tables = %session.tables().display(), "replay finished");
    Ok(())
}
