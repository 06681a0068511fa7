// ── Flow engineering manager ──
//
// One manager per managed element. Owns both flow registries, the
// provisioned-flow index and the interface set, and writes every
// successful mutation back to the table store before returning.

pub mod cache;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ManagerOptions;
use crate::error::CoreError;
use crate::message::{ActionType, FlowInfoMessage};
use crate::model::{
    DcfInterfaceIndex, Direction, FlowDirection, Incoming, Outgoing, ProvisionedFlow, UNSET_BITRATE,
};
use crate::store::{
    FlowRegistry, FlowSample, InterfaceSet, ProvisionedFlowRegistry, Teardown, Unregistered,
};
use crate::table::{TableId, TableStore};

pub use cache::ManagerCache;

// ── ConnectionTimeline ───────────────────────────────────────────────

/// Last connect (create) and disconnect (delete) times seen by an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionTimeline {
    pub last_connect: Option<DateTime<Utc>>,
    pub last_disconnect: Option<DateTime<Utc>>,
}

impl ConnectionTimeline {
    /// Record a connect; returns the time since the previous disconnect.
    pub fn record_connect(&mut self, at: DateTime<Utc>) -> Option<TimeDelta> {
        self.last_connect = Some(at);
        self.last_disconnect.map(|prev| at - prev)
    }

    /// Record a disconnect; returns the time since the previous connect.
    pub fn record_disconnect(&mut self, at: DateTime<Utc>) -> Option<TimeDelta> {
        self.last_disconnect = Some(at);
        self.last_connect.map(|prev| at - prev)
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────

/// What a provisioning message did.
#[derive(Debug, Clone)]
pub enum ProvisioningOutcome {
    Created(ProvisionedFlow),
    /// Pair torn down by id.
    Deleted(Teardown),
    /// Rows released by transport info; `forgotten` lists pairs that
    /// referenced them.
    Released {
        rx: Option<Unregistered<Incoming>>,
        tx: Option<Unregistered<Outgoing>>,
        forgotten: Vec<ProvisionedFlow>,
    },
}

/// Row counts restored from the table store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub rx_flows: usize,
    pub tx_flows: usize,
    pub provisioned: usize,
    pub interfaces: usize,
}

// ── Manager ──────────────────────────────────────────────────────────

pub struct FlowEngineeringManager {
    element_id: String,
    options: ManagerOptions,
    store: Arc<dyn TableStore>,
    incoming: FlowRegistry<Incoming>,
    outgoing: FlowRegistry<Outgoing>,
    provisioned: ProvisionedFlowRegistry,
    interfaces: InterfaceSet,
    timeline: ConnectionTimeline,
}

impl fmt::Debug for FlowEngineeringManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowEngineeringManager")
            .field("element_id", &self.element_id)
            .field("rx_flows", &self.incoming.len())
            .field("tx_flows", &self.outgoing.len())
            .field("provisioned", &self.provisioned.len())
            .field("interfaces", &self.interfaces.len())
            .finish_non_exhaustive()
    }
}

impl FlowEngineeringManager {
    /// Empty manager. Call [`load_tables`](Self::load_tables) to restore
    /// persisted state.
    pub fn new(
        element_id: impl Into<String>,
        store: Arc<dyn TableStore>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            options,
            store,
            incoming: FlowRegistry::new(),
            outgoing: FlowRegistry::new(),
            provisioned: ProvisionedFlowRegistry::new(),
            interfaces: InterfaceSet::new(),
            timeline: ConnectionTimeline::default(),
        }
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn incoming(&self) -> &FlowRegistry<Incoming> {
        &self.incoming
    }

    pub fn outgoing(&self) -> &FlowRegistry<Outgoing> {
        &self.outgoing
    }

    pub fn provisioned(&self) -> &ProvisionedFlowRegistry {
        &self.provisioned
    }

    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    pub fn timeline(&self) -> &ConnectionTimeline {
        &self.timeline
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut ConnectionTimeline {
        &mut self.timeline
    }

    // ── Startup ──────────────────────────────────────────────────────

    /// Replay every persisted table into memory. Interfaces are read as
    /// they are; use [`bootstrap_interfaces`](Self::bootstrap_interfaces)
    /// to wait for the host to publish them.
    pub fn load_tables(&mut self) -> Result<LoadSummary, CoreError> {
        let store = Arc::clone(&self.store);
        let rx_flows = self.incoming.load(&store.read(TableId::IncomingFlows)?);
        let tx_flows = self.outgoing.load(&store.read(TableId::OutgoingFlows)?);
        let provisioned = self.provisioned.load(&store.read(TableId::ProvisionedFlows)?);
        let dcf = DcfInterfaceIndex::from_rows(&store.read(TableId::DcfInterfaces)?);
        let interfaces = self.interfaces.load(
            &store.read(TableId::Interfaces)?,
            &dcf,
            self.options.dcf_interface_group,
        );
        // Statistics are derived; persisted counters are not trusted.
        self.interfaces.recompute_stats(&self.incoming, &self.outgoing);

        let summary = LoadSummary {
            rx_flows,
            tx_flows,
            provisioned,
            interfaces,
        };
        info!(element = %self.element_id, ?summary, "tables loaded");
        Ok(summary)
    }

    /// Wait for the configured number of interface rows, then load them.
    pub async fn bootstrap_interfaces(&mut self) -> Result<usize, CoreError> {
        let store = Arc::clone(&self.store);
        let loaded = self
            .interfaces
            .bootstrap(
                store.as_ref(),
                self.options.expected_interfaces,
                self.options.bootstrap_interval,
                self.options.bootstrap_timeout,
                self.options.dcf_interface_group,
            )
            .await?;
        self.sync_interface_statistics()?;
        Ok(loaded)
    }

    // ── Provisioning ─────────────────────────────────────────────────

    /// Apply one provisioning message. Unknown actions are rejected
    /// before anything is touched.
    pub fn handle_message(&mut self, msg: &FlowInfoMessage) -> Result<ProvisioningOutcome, CoreError> {
        let outcome = match &msg.action_type {
            ActionType::Create => ProvisioningOutcome::Created(self.create_provisioned(msg)?),
            ActionType::Delete => match msg.optional_destination_identifier {
                Some(id) => ProvisioningOutcome::Deleted(self.teardown(&id)?),
                None => self.release_by_transport(msg)?,
            },
            ActionType::Other(action) => {
                return Err(CoreError::UnknownAction {
                    action: action.clone(),
                });
            }
        };
        self.sync_all()?;
        Ok(outcome)
    }

    fn create_provisioned(&mut self, msg: &FlowInfoMessage) -> Result<ProvisionedFlow, CoreError> {
        let id = match msg.optional_destination_identifier {
            Some(id) => id,
            None => self.pair_for(msg).unwrap_or_else(Uuid::new_v4),
        };
        let flow = self.provisioned.create(
            id,
            &msg.incoming_info(),
            &msg.outgoing_info(),
            &mut self.incoming,
            &mut self.outgoing,
            self.options.ignore_destination_port,
        )?;
        info!(
            element = %self.element_id,
            %id,
            rx = %flow.rx_instance,
            tx = %flow.tx_instance,
            "provisioned flow created"
        );
        Ok(flow)
    }

    // Id of an existing pair over the same rows, so a retried id-less
    // Create lands on the pair it created the first time.
    fn pair_for(&self, msg: &FlowInfoMessage) -> Option<Uuid> {
        let ignore = self.options.ignore_destination_port;
        let rx_key = FlowRegistry::<Incoming>::provisioning_key(&msg.incoming_info(), ignore).ok()?;
        let tx_key = FlowRegistry::<Outgoing>::provisioning_key(&msg.outgoing_info(), ignore).ok()?;
        self.provisioned.find_pair(&rx_key, &tx_key).map(|p| p.id)
    }

    fn teardown(&mut self, id: &Uuid) -> Result<Teardown, CoreError> {
        let teardown = self
            .provisioned
            .delete(id, &mut self.incoming, &mut self.outgoing)?;
        info!(
            element = %self.element_id,
            %id,
            rx_removed = teardown.rx.as_ref().is_some_and(Unregistered::is_removed),
            tx_removed = teardown.tx.as_ref().is_some_and(Unregistered::is_removed),
            "provisioned flow deleted"
        );
        Ok(teardown)
    }

    fn release_by_transport(&mut self, msg: &FlowInfoMessage) -> Result<ProvisioningOutcome, CoreError> {
        let rx_info = msg.incoming_info();
        let tx_info = msg.outgoing_info();
        let ignore = self.options.ignore_destination_port;
        let ip = rx_info.require_ip()?;
        let rx_key = Incoming::instance_key(ip, &rx_info.interface, ignore);
        let tx_key = Outgoing::instance_key(ip, &tx_info.interface, ignore);

        let rx = self.incoming.unregister_from_provisioning(&rx_info, ignore)?;
        let tx = self.outgoing.unregister_from_provisioning(&tx_info, ignore)?;

        // Partners of a forgotten pair that were not part of this release
        // lose their cross reference.
        let forgotten = self.provisioned.forget_referencing(&rx_key, &tx_key);
        for pair in &forgotten {
            if pair.rx_instance != rx_key {
                self.incoming.set_foreign_key(&pair.rx_instance, "");
            }
            if pair.tx_instance != tx_key {
                self.outgoing.set_foreign_key(&pair.tx_instance, "");
            }
        }

        info!(
            element = %self.element_id,
            rx = %rx_key,
            tx = %tx_key,
            forgotten = forgotten.len(),
            "flows released by transport info"
        );
        Ok(ProvisioningOutcome::Released { rx, tx, forgotten })
    }

    // ── Operator triggers ────────────────────────────────────────────

    /// Operator edit of an expected bitrate. Negative values clear the
    /// expectation. `Ok(false)` when the row does not exist. Locally owned
    /// rows accept the edit too.
    pub fn update_expected_bitrate(
        &mut self,
        direction: Direction,
        instance: &str,
        expected: f64,
    ) -> Result<bool, CoreError> {
        if !expected.is_finite() {
            return Err(CoreError::validation(format!(
                "expected bitrate must be finite, got {expected}"
            )));
        }
        let expected = if expected < 0.0 { UNSET_BITRATE } else { expected };
        let tolerance = self.options.bitrate_tolerance_pct;

        let updated = match direction {
            Direction::Rx => self.incoming.set_expected_bitrate(instance, expected, tolerance),
            Direction::Tx => self.outgoing.set_expected_bitrate(instance, expected, tolerance),
        };
        if !updated {
            debug!(%direction, instance, "expected bitrate edit for unknown row ignored");
            return Ok(false);
        }

        match direction {
            Direction::Rx => self.incoming.sync_statistics_only(self.store.as_ref())?,
            Direction::Tx => self.outgoing.sync_statistics_only(self.store.as_ref())?,
        }
        self.sync_interface_statistics()?;
        Ok(true)
    }

    /// Operator delete of a single row. `Ok(false)` when it does not exist.
    pub fn delete_flow(&mut self, direction: Direction, instance: &str) -> Result<bool, CoreError> {
        let removed = match direction {
            Direction::Rx => self.incoming.remove(instance),
            Direction::Tx => self.outgoing.remove(instance),
        };
        if !removed {
            debug!(%direction, instance, "delete for unknown row ignored");
            return Ok(false);
        }

        match direction {
            Direction::Rx => self.incoming.sync(self.store.as_ref(), true)?,
            Direction::Tx => self.outgoing.sync(self.store.as_ref(), true)?,
        }
        self.sync_interface_statistics()?;
        Ok(true)
    }

    /// Operator delete of a provisioned pair; `NotFound` for unknown ids.
    pub fn delete_provisioned_flow(&mut self, id: &Uuid) -> Result<Teardown, CoreError> {
        let teardown = self.teardown(id)?;
        self.sync_all()?;
        Ok(teardown)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Merge one discovery pass for both directions and re-evaluate
    /// bitrate status. Structural changes trigger a full sync.
    pub fn refresh_statistics(
        &mut self,
        rx_samples: &[FlowSample],
        tx_samples: &[FlowSample],
    ) -> Result<(), CoreError> {
        let tolerance = self.options.bitrate_tolerance_pct;
        let rx = self.incoming.apply_observations(rx_samples);
        let tx = self.outgoing.apply_observations(tx_samples);
        self.incoming.refresh_statuses(tolerance);
        self.outgoing.refresh_statuses(tolerance);

        debug!(
            element = %self.element_id,
            rx_created = rx.created.len(),
            rx_pruned = rx.pruned.len(),
            tx_created = tx.created.len(),
            tx_pruned = tx.pruned.len(),
            "discovery merged"
        );

        if rx.changed_rows() || tx.changed_rows() {
            self.sync_all()
        } else {
            let store = self.store.as_ref();
            self.incoming.sync_statistics_only(store)?;
            self.outgoing.sync_statistics_only(store)?;
            self.sync_interface_statistics()
        }
    }

    // ── Sync ─────────────────────────────────────────────────────────

    fn sync_all(&mut self) -> Result<(), CoreError> {
        let store = self.store.as_ref();
        self.incoming.sync(store, true)?;
        self.outgoing.sync(store, true)?;
        self.provisioned.sync(store)?;
        self.sync_interface_statistics()
    }

    fn sync_interface_statistics(&mut self) -> Result<(), CoreError> {
        self.interfaces.recompute_stats(&self.incoming, &self.outgoing);
        self.interfaces.sync_statistics(self.store.as_ref())
    }
}
