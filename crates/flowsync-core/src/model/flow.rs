// ── Flow domain types ──
//
// One RX or TX flow endpoint. Both directions share the same shape;
// identity semantics (instance key, linked remote id, table columns)
// come from the `FlowDirection` marker type.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::message::{FlowInfo, FlowTransportIp};
use crate::table::{TableId, TableRow};

/// Sentinel for "no destination port" and "no expected bitrate".
pub const UNSET: i32 = -1;
pub const UNSET_BITRATE: f64 = -1.0;

/// Column names shared by the incoming and outgoing flow tables.
pub mod columns {
    pub const DESTINATION: &str = "Destination";
    pub const DESTINATION_PORT: &str = "DestinationPort";
    pub const SOURCE: &str = "Source";
    pub const TRANSPORT_TYPE: &str = "TransportType";
    pub const LABEL: &str = "Label";
    pub const LINKED_FLOW: &str = "LinkedFlow";
    pub const FLOW_OWNER: &str = "FlowOwner";
    pub const IS_PRESENT: &str = "IsPresent";
    pub const BITRATE: &str = "Bitrate";
    pub const EXPECTED_BITRATE: &str = "ExpectedBitrate";
    pub const EXPECTED_BITRATE_STATUS: &str = "ExpectedBitrateStatus";
}

// ── Enums ────────────────────────────────────────────────────────────

/// Which writer controls a flow's provisioning fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum FlowOwner {
    #[default]
    LocalSystem,
    FlowEngineering,
}

impl FlowOwner {
    pub fn code(self) -> i64 {
        match self {
            Self::LocalSystem => 0,
            Self::FlowEngineering => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::LocalSystem),
            1 => Some(Self::FlowEngineering),
            _ => None,
        }
    }
}

/// Transport of a flow. Only IP flows are modelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum FlowTransportType {
    #[default]
    #[strum(to_string = "IP")]
    Ip,
}

impl FlowTransportType {
    pub fn code(self) -> i64 {
        match self {
            Self::Ip => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Ip),
            _ => None,
        }
    }
}

/// Observed bitrate compared against the expected bitrate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ExpectedBitrateStatus {
    #[default]
    Unknown,
    Ok,
    Low,
    High,
}

impl ExpectedBitrateStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Ok => 1,
            Self::Low => 2,
            Self::High => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Ok),
            2 => Some(Self::Low),
            3 => Some(Self::High),
            _ => None,
        }
    }

    /// `Unknown` while no expectation is set; otherwise `Ok` within
    /// `tolerance_pct` percent of the expected value.
    pub fn evaluate(bitrate: f64, expected: f64, tolerance_pct: f64) -> Self {
        if expected < 0.0 {
            return Self::Unknown;
        }
        let margin = expected * tolerance_pct / 100.0;
        if bitrate < expected - margin {
            Self::Low
        } else if bitrate > expected + margin {
            Self::High
        } else {
            Self::Ok
        }
    }
}

// ── Direction ────────────────────────────────────────────────────────

/// Identity semantics of one flow direction.
pub trait FlowDirection:
    fmt::Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static
{
    const TABLE: TableId;
    /// Short label used in logs ("rx" / "tx").
    const LABEL: &'static str;
    const INTERFACE_COLUMN: &'static str;
    const FOREIGN_KEY_COLUMN: &'static str;

    /// Structural instance key derived from the flow's network identity.
    fn instance_key(ip: &FlowTransportIp, interface: &str, ignore_destination_port: bool)
    -> String;

    /// Remote id recorded as `linked_flow` when provisioning takes over.
    fn linked_flow(info: &FlowInfo) -> &str;
}

fn address_key(ip: &FlowTransportIp, ignore_destination_port: bool) -> String {
    if ignore_destination_port {
        format!("{}/{}", ip.source_ip, ip.destination_ip)
    } else {
        format!(
            "{}/{}:{}",
            ip.source_ip, ip.destination_ip, ip.destination_port
        )
    }
}

/// Traffic received by the element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Incoming;

/// Traffic transmitted by the element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outgoing;

impl FlowDirection for Incoming {
    const TABLE: TableId = TableId::IncomingFlows;
    const LABEL: &'static str = "rx";
    const INTERFACE_COLUMN: &'static str = "IncomingInterface";
    const FOREIGN_KEY_COLUMN: &'static str = "ForeignKeyOutgoing";

    fn instance_key(
        ip: &FlowTransportIp,
        _interface: &str,
        ignore_destination_port: bool,
    ) -> String {
        address_key(ip, ignore_destination_port)
    }

    fn linked_flow(info: &FlowInfo) -> &str {
        &info.flow_id
    }
}

impl FlowDirection for Outgoing {
    const TABLE: TableId = TableId::OutgoingFlows;
    const LABEL: &'static str = "tx";
    const INTERFACE_COLUMN: &'static str = "OutgoingInterface";
    const FOREIGN_KEY_COLUMN: &'static str = "ForeignKeyIncoming";

    fn instance_key(
        ip: &FlowTransportIp,
        interface: &str,
        ignore_destination_port: bool,
    ) -> String {
        format!("{}/{interface}", address_key(ip, ignore_destination_port))
    }

    fn linked_flow(info: &FlowInfo) -> &str {
        &info.source_flow_id
    }
}

/// Direction selector for operator triggers and CLI arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

// ── Flow ─────────────────────────────────────────────────────────────

/// A single flow row. `instance` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Flow<D: FlowDirection> {
    instance: String,
    pub source: String,
    pub destination: String,
    pub destination_port: i32,
    /// Incoming interface for RX, outgoing interface for TX.
    pub interface: String,
    pub transport_type: FlowTransportType,
    pub bitrate: f64,
    pub expected_bitrate: f64,
    pub expected_bitrate_status: ExpectedBitrateStatus,
    pub label: String,
    pub linked_flow: String,
    pub owner: FlowOwner,
    pub is_present: bool,
    /// Instance of the paired flow in the other direction.
    pub foreign_key: String,
    #[serde(skip)]
    direction: PhantomData<D>,
}

pub type RxFlow = Flow<Incoming>;
pub type TxFlow = Flow<Outgoing>;

impl<D: FlowDirection> Flow<D> {
    /// Minimally initialized, locally owned, not present.
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            source: String::new(),
            destination: String::new(),
            destination_port: UNSET,
            interface: String::new(),
            transport_type: FlowTransportType::Ip,
            bitrate: 0.0,
            expected_bitrate: UNSET_BITRATE,
            expected_bitrate_status: ExpectedBitrateStatus::Unknown,
            label: String::new(),
            linked_flow: String::new(),
            owner: FlowOwner::LocalSystem,
            is_present: false,
            foreign_key: String::new(),
            direction: PhantomData,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Not observed and not held by provisioning.
    pub fn is_stale(&self) -> bool {
        !self.is_present && self.owner == FlowOwner::LocalSystem
    }

    /// Hand provisioning fields back to the local system.
    pub(crate) fn release_to_local(&mut self) {
        self.owner = FlowOwner::LocalSystem;
        self.linked_flow.clear();
        self.expected_bitrate = UNSET_BITRATE;
        self.expected_bitrate_status = ExpectedBitrateStatus::Unknown;
    }

    pub fn refresh_status(&mut self, tolerance_pct: f64) {
        self.expected_bitrate_status =
            ExpectedBitrateStatus::evaluate(self.bitrate, self.expected_bitrate, tolerance_pct);
    }

    // ── Table mapping ────────────────────────────────────────────────

    /// Full row; statistics columns only when requested.
    pub fn to_row(&self, include_statistics: bool) -> TableRow {
        let row = TableRow::new(self.instance.clone())
            .with(columns::DESTINATION, self.destination.as_str())
            .with(columns::DESTINATION_PORT, self.destination_port)
            .with(columns::SOURCE, self.source.as_str())
            .with(D::INTERFACE_COLUMN, self.interface.as_str())
            .with(D::FOREIGN_KEY_COLUMN, self.foreign_key.as_str())
            .with(columns::TRANSPORT_TYPE, self.transport_type.code())
            .with(columns::LABEL, self.label.as_str())
            .with(columns::LINKED_FLOW, self.linked_flow.as_str())
            .with(columns::FLOW_OWNER, self.owner.code())
            .with(columns::IS_PRESENT, self.is_present);

        if include_statistics {
            self.with_statistics(row)
        } else {
            row
        }
    }

    /// Row holding only bitrate, expected bitrate and status.
    pub fn statistics_row(&self) -> TableRow {
        self.with_statistics(TableRow::new(self.instance.clone()))
    }

    fn with_statistics(&self, row: TableRow) -> TableRow {
        row.with(columns::BITRATE, self.bitrate)
            .with(columns::EXPECTED_BITRATE, self.expected_bitrate)
            .with(
                columns::EXPECTED_BITRATE_STATUS,
                self.expected_bitrate_status.code(),
            )
    }

    /// Overwrite every persisted-origin field from a table row. Missing
    /// or unreadable cells fall back to defaults; their column names are
    /// returned so the caller can report partial rows.
    pub(crate) fn apply_row(&mut self, row: &TableRow) -> Vec<&'static str> {
        let mut missing = Vec::new();

        let mut text = |column: &'static str| match row.text(column) {
            Some(v) => v.to_owned(),
            None => {
                missing.push(column);
                String::new()
            }
        };
        self.destination = text(columns::DESTINATION);
        self.source = text(columns::SOURCE);
        self.interface = text(D::INTERFACE_COLUMN);
        self.label = text(columns::LABEL);
        self.linked_flow = text(columns::LINKED_FLOW);

        // Cross references are owned by the provisioned-flow registry and
        // only restored when the table carries them.
        if let Some(fk) = row.text(D::FOREIGN_KEY_COLUMN) {
            fk.clone_into(&mut self.foreign_key);
        }

        self.destination_port = row
            .int(columns::DESTINATION_PORT)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or_else(|| {
                missing.push(columns::DESTINATION_PORT);
                UNSET
            });
        self.transport_type = row
            .int(columns::TRANSPORT_TYPE)
            .and_then(FlowTransportType::from_code)
            .unwrap_or_else(|| {
                missing.push(columns::TRANSPORT_TYPE);
                FlowTransportType::Ip
            });
        self.bitrate = row.real(columns::BITRATE).unwrap_or_else(|| {
            missing.push(columns::BITRATE);
            0.0
        });
        self.expected_bitrate = row.real(columns::EXPECTED_BITRATE).unwrap_or_else(|| {
            missing.push(columns::EXPECTED_BITRATE);
            UNSET_BITRATE
        });
        self.owner = row
            .int(columns::FLOW_OWNER)
            .and_then(FlowOwner::from_code)
            .unwrap_or_else(|| {
                missing.push(columns::FLOW_OWNER);
                FlowOwner::LocalSystem
            });
        self.is_present = row.flag(columns::IS_PRESENT).unwrap_or_else(|| {
            missing.push(columns::IS_PRESENT);
            false
        });
        if let Some(status) = row
            .int(columns::EXPECTED_BITRATE_STATUS)
            .and_then(ExpectedBitrateStatus::from_code)
        {
            self.expected_bitrate_status = status;
        }

        missing
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(port: i32) -> FlowTransportIp {
        FlowTransportIp {
            source_ip: "10.0.0.1".into(),
            destination_ip: "10.0.0.2".into(),
            destination_port: port,
            bit_rate: 3_000_000.0,
        }
    }

    #[test]
    fn rx_key_includes_port_unless_ignored() {
        assert_eq!(
            Incoming::instance_key(&ip(5004), "eth0", false),
            "10.0.0.1/10.0.0.2:5004"
        );
        assert_eq!(
            Incoming::instance_key(&ip(5004), "eth0", true),
            "10.0.0.1/10.0.0.2"
        );
    }

    #[test]
    fn tx_key_appends_egress_interface() {
        assert_eq!(
            Outgoing::instance_key(&ip(5004), "eth1", false),
            "10.0.0.1/10.0.0.2:5004/eth1"
        );
        assert_eq!(
            Outgoing::instance_key(&ip(5004), "eth1", true),
            "10.0.0.1/10.0.0.2/eth1"
        );
    }

    #[test]
    fn new_flow_is_local_and_stale() {
        let flow = RxFlow::new("k");
        assert_eq!(flow.owner, FlowOwner::LocalSystem);
        assert_eq!(flow.expected_bitrate, UNSET_BITRATE);
        assert_eq!(flow.destination_port, UNSET);
        assert!(flow.label.is_empty());
        assert!(flow.is_stale());
    }

    #[test]
    fn status_thresholds() {
        use ExpectedBitrateStatus as S;
        assert_eq!(S::evaluate(5.0, -1.0, 10.0), S::Unknown);
        assert_eq!(S::evaluate(100.0, 100.0, 10.0), S::Ok);
        assert_eq!(S::evaluate(91.0, 100.0, 10.0), S::Ok);
        assert_eq!(S::evaluate(89.0, 100.0, 10.0), S::Low);
        assert_eq!(S::evaluate(111.0, 100.0, 10.0), S::High);
    }

    #[test]
    fn row_mapping_round_trips() {
        let mut flow = TxFlow::new("a/b:1/eth1");
        flow.source = "a".into();
        flow.destination = "b".into();
        flow.destination_port = 1;
        flow.interface = "eth1".into();
        flow.label = "studio".into();
        flow.linked_flow = "remote".into();
        flow.owner = FlowOwner::FlowEngineering;
        flow.is_present = true;
        flow.bitrate = 12.5;
        flow.expected_bitrate = 10.0;
        flow.expected_bitrate_status = ExpectedBitrateStatus::High;
        flow.foreign_key = "a/b:1".into();

        let row = flow.to_row(true);
        assert_eq!(row.text("OutgoingInterface"), Some("eth1"));
        assert_eq!(row.text("ForeignKeyIncoming"), Some("a/b:1"));

        let mut copy = TxFlow::new(row.key.clone());
        assert!(copy.apply_row(&row).is_empty());
        assert_eq!(copy, flow);
    }

    #[test]
    fn partial_row_reports_missing_columns() {
        let row = TableRow::new("x").with(columns::SOURCE, "a");
        let mut flow = RxFlow::new("x");
        let missing = flow.apply_row(&row);
        assert!(missing.contains(&columns::FLOW_OWNER));
        assert!(missing.contains(&columns::BITRATE));
        assert_eq!(flow.source, "a");
        assert_eq!(flow.owner, FlowOwner::LocalSystem);
    }

    #[test]
    fn statistics_row_has_only_statistics() {
        let flow = RxFlow::new("x");
        let row = flow.statistics_row();
        assert_eq!(row.cells.len(), 3);
        assert!(row.get(columns::BITRATE).is_some());
    }
}
