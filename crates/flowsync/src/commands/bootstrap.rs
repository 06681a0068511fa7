//! Wait for the element's interface table, then load and index it.

use tracing::info;

use crate::cli::GlobalOpts;
use crate::commands::Session;
use crate::commands::flows::render_interfaces;
use crate::error::CliError;
use crate::output;

pub async fn handle(session: Session, global: &GlobalOpts) -> Result<(), CliError> {
    let mut manager = session.into_manager()?;
    let expected = manager.options().expected_interfaces;

    let loaded = manager.bootstrap_interfaces().await?;
    info!(element = manager.element_id(), expected, loaded, "interfaces bootstrapped");

    let interfaces: Vec<_> = manager.interfaces().iter().cloned().collect();
    let out = render_interfaces(global, &interfaces)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
