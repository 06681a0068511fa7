// ── Provisioned flow ──
//
// An externally identified RX/TX pair, created and torn down as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::table::TableRow;

pub mod columns {
    pub const INCOMING_FLOW: &str = "IncomingFlow";
    pub const OUTGOING_FLOW: &str = "OutgoingFlow";
    pub const CREATED_AT: &str = "CreatedAt";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedFlow {
    pub id: Uuid,
    /// Instance key of the RX row.
    pub rx_instance: String,
    /// Instance key of the TX row.
    pub tx_instance: String,
    pub created_at: DateTime<Utc>,
}

impl ProvisionedFlow {
    pub fn to_row(&self) -> TableRow {
        TableRow::new(self.id.to_string())
            .with(columns::INCOMING_FLOW, self.rx_instance.as_str())
            .with(columns::OUTGOING_FLOW, self.tx_instance.as_str())
            .with(columns::CREATED_AT, self.created_at.to_rfc3339())
    }

    /// `None` when the key is not a UUID or either instance is missing.
    pub fn from_row(row: &TableRow) -> Option<Self> {
        let id = Uuid::parse_str(row.key.trim()).ok()?;
        let created_at = row
            .text(columns::CREATED_AT)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map_or_else(Utc::now, |v| v.with_timezone(&Utc));
        Some(Self {
            id,
            rx_instance: row.text(columns::INCOMING_FLOW)?.to_owned(),
            tx_instance: row.text(columns::OUTGOING_FLOW)?.to_owned(),
            created_at,
        })
    }

    pub fn references(&self, rx_instance: &str, tx_instance: &str) -> bool {
        self.rx_instance == rx_instance || self.tx_instance == tx_instance
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trip() {
        let flow = ProvisionedFlow {
            id: Uuid::new_v4(),
            rx_instance: "a/b:1".into(),
            tx_instance: "a/b:1/eth1".into(),
            created_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        assert_eq!(ProvisionedFlow::from_row(&flow.to_row()).unwrap(), flow);
    }

    #[test]
    fn rejects_non_uuid_key() {
        let row = TableRow::new("42")
            .with(columns::INCOMING_FLOW, "a")
            .with(columns::OUTGOING_FLOW, "b");
        assert!(ProvisionedFlow::from_row(&row).is_none());
    }
}
