//! Operator edits: expected bitrate, flow deletion, pair teardown.
//!
//! These call the manager directly rather than through the dispatcher so
//! failures reach the exit code instead of only the log.

use flowsync_core::Direction;
use flowsync_core::dispatch::parse_provisioned_id;

use crate::cli::GlobalOpts;
use crate::commands::Session;
use crate::commands::flows::{render_flows, render_provisioned};
use crate::error::CliError;
use crate::output;

pub fn set_expected(
    session: &Session,
    direction: Direction,
    key: &str,
    value: f64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = session.with_manager(|m| -> Result<Option<String>, CliError> {
        if !m.update_expected_bitrate(direction, key, value)? {
            return Ok(None);
        }
        let rendered = match direction {
            Direction::Rx => {
                let flow: Vec<_> = m.incoming().get(key).cloned().into_iter().collect();
                render_flows(global, &flow)
            }
            Direction::Tx => {
                let flow: Vec<_> = m.outgoing().get(key).cloned().into_iter().collect();
                render_flows(global, &flow)
            }
        }?;
        Ok(Some(rendered))
    })??;

    match out {
        Some(rendered) => output::print_output(&rendered, global.quiet),
        None => absent(direction, key, global),
    }
    Ok(())
}

pub fn delete_flow(
    session: &Session,
    direction: Direction,
    key: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if session.with_manager(|m| m.delete_flow(direction, key))?? {
        if !global.quiet {
            eprintln!("Deleted {direction} flow {key}");
        }
    } else {
        absent(direction, key, global);
    }
    Ok(())
}

pub fn delete_provisioned(
    session: &Session,
    raw_id: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = parse_provisioned_id(raw_id)?;
    let teardown = session.with_manager(|m| m.delete_provisioned_flow(&id))??;

    if !global.quiet {
        let gone = |released: bool| if released { "released" } else { "already gone" };
        eprintln!(
            "Deleted provisioned flow {id} (rx {}: {}, tx {}: {})",
            teardown.flow.rx_instance,
            gone(teardown.rx.is_some()),
            teardown.flow.tx_instance,
            gone(teardown.tx.is_some()),
        );
    }
    let out = render_provisioned(global, std::slice::from_ref(&teardown.flow))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// Absent rows are not an error for operator edits.
fn absent(direction: Direction, key: &str, global: &GlobalOpts) {
    if !global.quiet {
        eprintln!("No {direction} flow {key}; nothing changed");
    }
}
