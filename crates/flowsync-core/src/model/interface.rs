// ── Interface domain types ──
//
// Physical/logical interfaces referenced by flows, plus the read-only
// index of lower-layer (DCF) interfaces they may link to. Type and
// status codes follow IF-MIB numbering.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::table::TableRow;

pub mod columns {
    pub const DESCRIPTION: &str = "Description";
    pub const DISPLAY_KEY: &str = "DisplayKey";
    pub const TYPE: &str = "Type";
    pub const ADMIN_STATUS: &str = "AdminStatus";
    pub const OPERATIONAL_STATUS: &str = "OperationalStatus";
    pub const DCF_INTERFACE_ID: &str = "DcfInterfaceId";

    pub const RX_FLOW_COUNT: &str = "RxFlowCount";
    pub const TX_FLOW_COUNT: &str = "TxFlowCount";
    pub const RX_BITRATE: &str = "RxBitrate";
    pub const TX_BITRATE: &str = "TxBitrate";
    pub const EXPECTED_RX_BITRATE: &str = "ExpectedRxBitrate";
    pub const EXPECTED_TX_BITRATE: &str = "ExpectedTxBitrate";

    pub const DCF_NAME: &str = "Name";
    pub const DCF_DYNAMIC_LINK: &str = "DynamicLink";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum InterfaceType {
    Ethernet,
    Loopback,
    Virtual,
    #[default]
    Other,
}

impl InterfaceType {
    pub fn code(self) -> i64 {
        match self {
            Self::Other => 1,
            Self::Ethernet => 6,
            Self::Loopback => 24,
            Self::Virtual => 53,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            6 => Self::Ethernet,
            24 => Self::Loopback,
            53 => Self::Virtual,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum InterfaceStatus {
    Up,
    Down,
    Testing,
    #[default]
    Unknown,
}

impl InterfaceStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
            Self::Testing => 3,
            Self::Unknown => 4,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Up,
            2 => Self::Down,
            3 => Self::Testing,
            _ => Self::Unknown,
        }
    }
}

/// Aggregated flow statistics for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub rx_flows: u32,
    pub tx_flows: u32,
    pub rx_bitrate: f64,
    pub tx_bitrate: f64,
    pub expected_rx_bitrate: f64,
    pub expected_tx_bitrate: f64,
}

/// A network interface used by flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub id: String,
    pub description: String,
    pub display_key: String,
    pub interface_type: InterfaceType,
    pub admin_status: InterfaceStatus,
    pub operational_status: InterfaceStatus,
    /// Lower-layer interface this one maps onto, if known.
    pub dcf_interface_id: Option<i32>,
    #[serde(default)]
    pub stats: InterfaceStats,
}

impl Interface {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_key: id.clone(),
            id,
            description: String::new(),
            interface_type: InterfaceType::Other,
            admin_status: InterfaceStatus::Unknown,
            operational_status: InterfaceStatus::Unknown,
            dcf_interface_id: None,
            stats: InterfaceStats::default(),
        }
    }

    pub fn from_row(row: &TableRow) -> Self {
        let mut intf = Self::new(row.key.clone());
        if let Some(v) = row.text(columns::DESCRIPTION) {
            v.clone_into(&mut intf.description);
        }
        if let Some(v) = row.text(columns::DISPLAY_KEY) {
            v.clone_into(&mut intf.display_key);
        }
        intf.interface_type = row
            .int(columns::TYPE)
            .map_or(InterfaceType::Other, InterfaceType::from_code);
        intf.admin_status = row
            .int(columns::ADMIN_STATUS)
            .map_or(InterfaceStatus::Unknown, InterfaceStatus::from_code);
        intf.operational_status = row
            .int(columns::OPERATIONAL_STATUS)
            .map_or(InterfaceStatus::Unknown, InterfaceStatus::from_code);
        intf.dcf_interface_id = row
            .int(columns::DCF_INTERFACE_ID)
            .and_then(|v| i32::try_from(v).ok())
            .filter(|v| *v >= 0);
        intf
    }

    pub fn statistics_row(&self) -> TableRow {
        TableRow::new(self.id.clone())
            .with(columns::RX_FLOW_COUNT, i64::from(self.stats.rx_flows))
            .with(columns::TX_FLOW_COUNT, i64::from(self.stats.tx_flows))
            .with(columns::RX_BITRATE, self.stats.rx_bitrate)
            .with(columns::TX_BITRATE, self.stats.tx_bitrate)
            .with(columns::EXPECTED_RX_BITRATE, self.stats.expected_rx_bitrate)
            .with(columns::EXPECTED_TX_BITRATE, self.stats.expected_tx_bitrate)
    }
}

// ── DCF interfaces ───────────────────────────────────────────────────

/// Lower-layer interface as exposed by the element's DCF table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcfInterface {
    pub id: i32,
    pub name: String,
    /// `"<group id>;<dynamic pk>"`, empty when not linked to a table row.
    pub dynamic_link: String,
}

impl DcfInterface {
    fn link_parts(&self) -> Option<(i32, &str)> {
        let (group, pk) = self.dynamic_link.split_once(';')?;
        let pk = pk.split(';').next().unwrap_or(pk);
        Some((group.trim().parse().ok()?, pk))
    }
}

/// Read-only index over DCF interfaces; looked up, never owned.
#[derive(Debug, Clone, Default)]
pub struct DcfInterfaceIndex {
    interfaces: Vec<DcfInterface>,
}

impl DcfInterfaceIndex {
    /// Build from table rows; rows with a non-numeric key are skipped.
    pub fn from_rows(rows: &[TableRow]) -> Self {
        let interfaces = rows
            .iter()
            .filter_map(|row| {
                Some(DcfInterface {
                    id: row.key.trim().parse().ok()?,
                    name: row.text(columns::DCF_NAME).unwrap_or_default().to_owned(),
                    dynamic_link: row
                        .text(columns::DCF_DYNAMIC_LINK)
                        .unwrap_or_default()
                        .to_owned(),
                })
            })
            .collect();
        Self { interfaces }
    }

    pub fn find(&self, id: i32) -> Option<&DcfInterface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    /// Interface whose dynamic link points at `dynamic_pk` in table `group_id`.
    pub fn find_linked(&self, group_id: i32, dynamic_pk: &str) -> Option<&DcfInterface> {
        self.interfaces
            .iter()
            .find(|i| i.link_parts() == Some((group_id, dynamic_pk)))
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
