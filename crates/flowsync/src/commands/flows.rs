//! Listing commands: flows, provisioned pairs, interfaces.

use tabled::Tabled;

use flowsync_core::{Direction, Flow, FlowDirection, Interface, ProvisionedFlow};

use crate::cli::GlobalOpts;
use crate::commands::Session;
use crate::error::CliError;
use crate::output::{self, format_bitrate};

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct FlowRow {
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Present")]
    present: String,
    #[tabled(rename = "Bitrate")]
    bitrate: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Linked")]
    linked: String,
    #[tabled(rename = "Pair")]
    foreign_key: String,
}

impl<D: FlowDirection> From<&Flow<D>> for FlowRow {
    fn from(f: &Flow<D>) -> Self {
        Self {
            instance: f.instance().to_owned(),
            interface: f.interface.clone(),
            owner: f.owner.to_string(),
            present: if f.is_present { "yes" } else { "no" }.into(),
            bitrate: format_bitrate(f.bitrate),
            expected: format_bitrate(f.expected_bitrate),
            status: f.expected_bitrate_status.to_string(),
            linked: f.linked_flow.clone(),
            foreign_key: f.foreign_key.clone(),
        }
    }
}

#[derive(Tabled)]
struct ProvisionedRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RX Flow")]
    rx: String,
    #[tabled(rename = "TX Flow")]
    tx: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&ProvisionedFlow> for ProvisionedRow {
    fn from(p: &ProvisionedFlow) -> Self {
        Self {
            id: p.id.to_string(),
            rx: p.rx_instance.clone(),
            tx: p.tx_instance.clone(),
            created: p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Oper")]
    operational: String,
    #[tabled(rename = "RX Flows")]
    rx_flows: u32,
    #[tabled(rename = "TX Flows")]
    tx_flows: u32,
    #[tabled(rename = "RX Rate")]
    rx_bitrate: String,
    #[tabled(rename = "TX Rate")]
    tx_bitrate: String,
    #[tabled(rename = "Exp. RX")]
    expected_rx: String,
    #[tabled(rename = "Exp. TX")]
    expected_tx: String,
}

impl From<&Interface> for InterfaceRow {
    fn from(i: &Interface) -> Self {
        Self {
            id: i.id.clone(),
            description: i.description.clone(),
            operational: i.operational_status.to_string(),
            rx_flows: i.stats.rx_flows,
            tx_flows: i.stats.tx_flows,
            rx_bitrate: format_bitrate(i.stats.rx_bitrate),
            tx_bitrate: format_bitrate(i.stats.tx_bitrate),
            expected_rx: format_bitrate(i.stats.expected_rx_bitrate),
            expected_tx: format_bitrate(i.stats.expected_tx_bitrate),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub fn handle_flows(
    direction: Direction,
    session: &Session,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = session.with_manager(|m| match direction {
        Direction::Rx => render_flows(global, &m.incoming().iter().cloned().collect::<Vec<_>>()),
        Direction::Tx => render_flows(global, &m.outgoing().iter().cloned().collect::<Vec<_>>()),
    })??;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(crate) fn render_flows<D: FlowDirection>(
    global: &GlobalOpts,
    flows: &[Flow<D>],
) -> Result<String, CliError> {
    output::render_list(&global.output, flows, |f| FlowRow::from(f))
}

pub fn handle_provisioned(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let pairs: Vec<ProvisionedFlow> =
        session.with_manager(|m| m.provisioned().iter().cloned().collect())?;
    let out = render_provisioned(global, &pairs)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(crate) fn render_provisioned(
    global: &GlobalOpts,
    pairs: &[ProvisionedFlow],
) -> Result<String, CliError> {
    output::render_list(&global.output, pairs, |p| ProvisionedRow::from(p))
}

pub fn handle_interfaces(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let interfaces: Vec<Interface> =
        session.with_manager(|m| m.interfaces().iter().cloned().collect())?;
    let out = render_interfaces(global, &interfaces)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(crate) fn render_interfaces(
    global: &GlobalOpts,
    interfaces: &[Interface],
) -> Result<String, CliError> {
    output::render_list(&global.output, interfaces, |i| InterfaceRow::from(i))
}
