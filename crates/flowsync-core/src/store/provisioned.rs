// ── Provisioned flow registry ──
//
// Links one RX and one TX row under a single external id. The pair is
// created and torn down as a unit; the per-direction registries stay
// the owners of the rows themselves.

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::registry::{FlowRegistry, Unregistered};
use crate::error::CoreError;
use crate::message::FlowInfo;
use crate::model::{Incoming, Outgoing, ProvisionedFlow};
use crate::table::{TableId, TableRow, TableStore};

/// Outcome of tearing down a provisioned pair.
#[derive(Debug, Clone)]
pub struct Teardown {
    pub flow: ProvisionedFlow,
    /// `None` when the row was already gone or another pair still links it.
    pub rx: Option<Unregistered<Incoming>>,
    pub tx: Option<Unregistered<Outgoing>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionedFlowRegistry {
    flows: IndexMap<Uuid, ProvisionedFlow>,
}

impl ProvisionedFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<&ProvisionedFlow> {
        self.flows.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.flows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProvisionedFlow> {
        self.flows.values()
    }

    /// Pair referencing `instance` on either side.
    pub fn find_by_instance(&self, instance: &str) -> Option<&ProvisionedFlow> {
        self.flows
            .values()
            .find(|p| p.rx_instance == instance || p.tx_instance == instance)
    }

    /// Pair linking exactly `rx_instance` and `tx_instance`.
    pub fn find_pair(&self, rx_instance: &str, tx_instance: &str) -> Option<&ProvisionedFlow> {
        self.flows
            .values()
            .find(|p| p.rx_instance == rx_instance && p.tx_instance == tx_instance)
    }

    /// Register both sides and cross-link them under `id`.
    ///
    /// Both flow infos are validated before either registry is touched.
    /// Re-creating a known id with the same infos changes nothing; with
    /// different infos the previous rows are released first.
    pub fn create(
        &mut self,
        id: Uuid,
        rx_info: &FlowInfo,
        tx_info: &FlowInfo,
        incoming: &mut FlowRegistry<Incoming>,
        outgoing: &mut FlowRegistry<Outgoing>,
        ignore_destination_port: bool,
    ) -> Result<ProvisionedFlow, CoreError> {
        let rx_key = FlowRegistry::<Incoming>::provisioning_key(rx_info, ignore_destination_port)?;
        let tx_key = FlowRegistry::<Outgoing>::provisioning_key(tx_info, ignore_destination_port)?;

        let created_at = match self.flows.get(&id) {
            Some(existing) if existing.rx_instance == rx_key && existing.tx_instance == tx_key => {
                existing.created_at
            }
            Some(existing) => {
                debug!(%id, "provisioned flow re-pointed, releasing previous rows");
                let previous = existing.clone();
                if previous.rx_instance != rx_key {
                    self.release_rx(&previous, incoming);
                }
                if previous.tx_instance != tx_key {
                    self.release_tx(&previous, outgoing);
                }
                Utc::now()
            }
            None => Utc::now(),
        };

        incoming.register_from_provisioning(rx_info, ignore_destination_port)?;
        outgoing.register_from_provisioning(tx_info, ignore_destination_port)?;
        incoming.set_foreign_key(&rx_key, &tx_key);
        outgoing.set_foreign_key(&tx_key, &rx_key);

        let flow = ProvisionedFlow {
            id,
            rx_instance: rx_key,
            tx_instance: tx_key,
            created_at,
        };
        self.flows.insert(id, flow.clone());
        Ok(flow)
    }

    /// Tear down the pair known as `id`; `NotFound` if it was never created.
    ///
    /// The stored instance keys are released, so rows still observed
    /// survive as locally owned flows with their cross reference cleared.
    /// A row another pair still links is kept and re-pointed at that pair.
    pub fn delete(
        &mut self,
        id: &Uuid,
        incoming: &mut FlowRegistry<Incoming>,
        outgoing: &mut FlowRegistry<Outgoing>,
    ) -> Result<Teardown, CoreError> {
        let flow = self
            .flows
            .shift_remove(id)
            .ok_or_else(|| CoreError::provisioned_not_found(id))?;

        let rx = self.release_rx(&flow, incoming);
        let tx = self.release_tx(&flow, outgoing);
        Ok(Teardown { flow, rx, tx })
    }

    // `pair` is the one going away; any other pair on the same row wins.
    fn release_rx(
        &self,
        pair: &ProvisionedFlow,
        incoming: &mut FlowRegistry<Incoming>,
    ) -> Option<Unregistered<Incoming>> {
        let survivor = self
            .flows
            .values()
            .find(|p| p.id != pair.id && p.rx_instance == pair.rx_instance);
        match survivor {
            Some(other) => {
                debug!(rx = %pair.rx_instance, kept_for = %other.id, "rx flow still paired, kept");
                incoming.set_foreign_key(&pair.rx_instance, &other.tx_instance);
                None
            }
            None => incoming.release(&pair.rx_instance),
        }
    }

    fn release_tx(
        &self,
        pair: &ProvisionedFlow,
        outgoing: &mut FlowRegistry<Outgoing>,
    ) -> Option<Unregistered<Outgoing>> {
        let survivor = self
            .flows
            .values()
            .find(|p| p.id != pair.id && p.tx_instance == pair.tx_instance);
        match survivor {
            Some(other) => {
                debug!(tx = %pair.tx_instance, kept_for = %other.id, "tx flow still paired, kept");
                outgoing.set_foreign_key(&pair.tx_instance, &other.rx_instance);
                None
            }
            None => outgoing.release(&pair.tx_instance),
        }
    }

    /// Drop every pair referencing either instance, without touching the
    /// rows. Used once the rows were already released by transport info.
    pub fn forget_referencing(&mut self, rx_instance: &str, tx_instance: &str) -> Vec<ProvisionedFlow> {
        let ids: Vec<Uuid> = self
            .flows
            .values()
            .filter(|p| p.references(rx_instance, tx_instance))
            .map(|p| p.id)
            .collect();
        ids.iter()
            .filter_map(|id| self.flows.shift_remove(id))
            .collect()
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn load(&mut self, rows: &[TableRow]) -> usize {
        let mut loaded = 0;
        for row in rows {
            match ProvisionedFlow::from_row(row) {
                Some(flow) => {
                    self.flows.insert(flow.id, flow);
                    loaded += 1;
                }
                None => warn!(key = %row.key, "skipping unreadable provisioned flow row"),
            }
        }
        loaded
    }

    pub fn sync(&self, store: &dyn TableStore) -> Result<(), CoreError> {
        let rows = self.flows.values().map(ProvisionedFlow::to_row).collect();
        store.replace(TableId::ProvisionedFlows, rows)
    }
}
