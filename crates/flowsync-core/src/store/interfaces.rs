// ── Interface set ──
//
// Interfaces are discovered by the host and only read here. Flow
// statistics are aggregated per interface and written back as a
// column-subset update.

use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::registry::FlowRegistry;
use crate::error::CoreError;
use crate::model::{DcfInterfaceIndex, Flow, FlowDirection, Incoming, Interface, InterfaceStats, Outgoing};
use crate::table::{TableId, TableRow, TableStore};
use crate::wait::wait_until;

#[derive(Debug, Clone, Default)]
pub struct InterfaceSet {
    interfaces: IndexMap<String, Interface>,
}

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Interface> {
        self.interfaces.get(id)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    /// Replace the set from interface rows.
    ///
    /// A row without an explicit DCF id is resolved through the dynamic
    /// link of `dcf_group`, when one is configured.
    pub fn load(&mut self, rows: &[TableRow], dcf: &DcfInterfaceIndex, dcf_group: Option<i32>) -> usize {
        self.interfaces.clear();
        for row in rows {
            if row.key.trim().is_empty() {
                warn!("skipping interface row without id");
                continue;
            }
            let mut intf = Interface::from_row(row);
            match intf.dcf_interface_id {
                Some(id) if dcf.find(id).is_none() => {
                    warn!(interface = %intf.id, dcf_id = id, "unknown dcf interface reference dropped");
                    intf.dcf_interface_id = None;
                }
                Some(_) => {}
                None => {
                    intf.dcf_interface_id = dcf_group
                        .and_then(|group| dcf.find_linked(group, &intf.id))
                        .map(|d| d.id);
                }
            }
            self.interfaces.insert(intf.id.clone(), intf);
        }
        debug!(interfaces = self.len(), dcf = dcf.len(), "interface table loaded");
        self.len()
    }

    /// Wait for the host to fill the interface table, then load it.
    pub async fn bootstrap(
        &mut self,
        store: &dyn TableStore,
        expected_rows: usize,
        interval: Duration,
        timeout: Duration,
        dcf_group: Option<i32>,
    ) -> Result<usize, CoreError> {
        if expected_rows > 0 {
            wait_until(
                "interface table",
                || Ok(store.row_count(TableId::Interfaces)? >= expected_rows),
                interval,
                timeout,
            )
            .await?;
        }
        let dcf = DcfInterfaceIndex::from_rows(&store.read(TableId::DcfInterfaces)?);
        let loaded = self.load(&store.read(TableId::Interfaces)?, &dcf, dcf_group);
        info!(loaded, expected_rows, "interfaces bootstrapped");
        Ok(loaded)
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// Recount flows and bitrates per interface from both registries.
    /// Flows referencing an unknown interface are not counted.
    pub fn recompute_stats(&mut self, incoming: &FlowRegistry<Incoming>, outgoing: &FlowRegistry<Outgoing>) {
        for intf in self.interfaces.values_mut() {
            intf.stats = InterfaceStats::default();
        }
        for flow in incoming.iter() {
            if let Some(stats) = self.stats_for(flow) {
                stats.rx_flows += 1;
                stats.rx_bitrate += flow.bitrate;
                if flow.expected_bitrate >= 0.0 {
                    stats.expected_rx_bitrate += flow.expected_bitrate;
                }
            }
        }
        for flow in outgoing.iter() {
            if let Some(stats) = self.stats_for(flow) {
                stats.tx_flows += 1;
                stats.tx_bitrate += flow.bitrate;
                if flow.expected_bitrate >= 0.0 {
                    stats.expected_tx_bitrate += flow.expected_bitrate;
                }
            }
        }
    }

    fn stats_for<D: FlowDirection>(&mut self, flow: &Flow<D>) -> Option<&mut InterfaceStats> {
        self.interfaces.get_mut(&flow.interface).map(|i| &mut i.stats)
    }

    pub fn sync_statistics(&self, store: &dyn TableStore) -> Result<(), CoreError> {
        if self.interfaces.is_empty() {
            return Ok(());
        }
        let rows = self.interfaces.values().map(Interface::statistics_row).collect();
        // The host owns the row set; only our counters are written.
        store.update_columns(TableId::Interfaces, rows)
    }
}
