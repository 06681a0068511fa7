// ── Per-direction flow registry ──
//
// Ordered map from instance key to flow. All reconciliation between
// local discovery, remote provisioning and the persisted table goes
// through the operations below; the map itself is never handed out.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::message::FlowInfo;
use crate::model::{Flow, FlowDirection, FlowOwner, FlowTransportType, UNSET};
use crate::table::{TableRow, TableStore};

/// Result of handing a flow back from provisioning.
#[derive(Debug, Clone, PartialEq)]
pub enum Unregistered<D: FlowDirection> {
    /// Still observed: kept, ownership reverted to the local system.
    Downgraded(Flow<D>),
    /// Not observed: dropped from the registry.
    Removed(Flow<D>),
}

impl<D: FlowDirection> Unregistered<D> {
    pub fn flow(&self) -> &Flow<D> {
        match self {
            Self::Downgraded(f) | Self::Removed(f) => f,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed(_))
    }
}

/// One discovery/poll sample for a flow seen on the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSample {
    pub instance: String,
    pub bitrate: f64,
    // Identity fields only fill in rows created by this sample.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub destination_port: Option<i32>,
    #[serde(default)]
    pub interface: Option<String>,
}

impl FlowSample {
    pub fn new(instance: impl Into<String>, bitrate: f64) -> Self {
        Self {
            instance: instance.into(),
            bitrate,
            source: None,
            destination: None,
            destination_port: None,
            interface: None,
        }
    }
}

/// What a discovery pass changed structurally.
#[derive(Debug, Default)]
pub struct ObservationReport<D: FlowDirection> {
    pub created: Vec<String>,
    pub pruned: Vec<Flow<D>>,
}

impl<D: FlowDirection> ObservationReport<D> {
    pub fn changed_rows(&self) -> bool {
        !self.created.is_empty() || !self.pruned.is_empty()
    }
}

/// Keyed collection of flows of one direction.
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry<D: FlowDirection> {
    flows: IndexMap<String, Flow<D>>,
}

impl<D: FlowDirection> FlowRegistry<D> {
    pub fn new() -> Self {
        Self {
            flows: IndexMap::new(),
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get(&self, instance: &str) -> Option<&Flow<D>> {
        self.flows.get(instance)
    }

    pub fn contains(&self, instance: &str) -> bool {
        self.flows.contains_key(instance)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flow<D>> {
        self.flows.values()
    }

    pub fn instances(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Existing flow or a freshly inserted, minimally initialized one.
    pub fn get_or_create(&mut self, instance: &str) -> &mut Flow<D> {
        self.flows.entry(instance.to_owned()).or_insert_with(|| {
            debug!(direction = D::LABEL, instance, "flow created");
            Flow::new(instance)
        })
    }

    /// Instance key a provisioning call for `info` would touch. Fails for
    /// non-IP transport and for info without the remote flow id.
    pub fn provisioning_key(
        info: &FlowInfo,
        ignore_destination_port: bool,
    ) -> Result<String, CoreError> {
        let ip = info.require_ip()?;
        if D::linked_flow(info).is_empty() {
            return Err(CoreError::validation(format!(
                "{} flow without remote flow id",
                D::LABEL
            )));
        }
        Ok(D::instance_key(ip, &info.interface, ignore_destination_port))
    }

    /// Provisioning takes ownership of the flow described by `info`.
    ///
    /// Owner, linked flow, interface and expected bitrate are always
    /// overwritten; presence and observed bitrate are left alone.
    /// Repeating the call with the same input changes nothing.
    pub fn register_from_provisioning(
        &mut self,
        info: &FlowInfo,
        ignore_destination_port: bool,
    ) -> Result<&Flow<D>, CoreError> {
        let instance = Self::provisioning_key(info, ignore_destination_port)?;
        let ip = info.require_ip()?;
        let linked = D::linked_flow(info);
        let flow = self.flows.entry(instance).or_insert_with_key(|key| {
            let mut flow = Flow::new(key.clone());
            flow.source.clone_from(&ip.source_ip);
            flow.destination.clone_from(&ip.destination_ip);
            flow.destination_port = if ignore_destination_port {
                UNSET
            } else {
                ip.destination_port
            };
            flow.transport_type = FlowTransportType::Ip;
            flow
        });

        flow.owner = FlowOwner::FlowEngineering;
        linked.clone_into(&mut flow.linked_flow);
        flow.interface.clone_from(&info.interface);
        flow.expected_bitrate = ip.bit_rate;

        debug!(
            direction = D::LABEL,
            instance = flow.instance(),
            linked_flow = %flow.linked_flow,
            "flow registered from provisioning"
        );
        Ok(&*flow)
    }

    /// Provisioning lets go of the flow described by `info`.
    ///
    /// `Ok(None)` when the flow is already gone.
    pub fn unregister_from_provisioning(
        &mut self,
        info: &FlowInfo,
        ignore_destination_port: bool,
    ) -> Result<Option<Unregistered<D>>, CoreError> {
        let ip = info.require_ip()?;
        let instance = D::instance_key(ip, &info.interface, ignore_destination_port);
        Ok(self.release(&instance))
    }

    /// Release by instance key: downgrade if still observed, else remove.
    pub fn release(&mut self, instance: &str) -> Option<Unregistered<D>> {
        let flow = self.flows.get_mut(instance)?;
        if flow.is_present {
            flow.release_to_local();
            flow.foreign_key.clear();
            debug!(direction = D::LABEL, instance, "flow downgraded to local ownership");
            Some(Unregistered::Downgraded(flow.clone()))
        } else {
            debug!(direction = D::LABEL, instance, "flow removed after provisioning release");
            self.flows.shift_remove(instance).map(Unregistered::Removed)
        }
    }

    /// Direct removal by key. Returns whether a row existed.
    pub fn remove(&mut self, instance: &str) -> bool {
        let removed = self.flows.shift_remove(instance).is_some();
        if removed {
            debug!(direction = D::LABEL, instance, "flow deleted");
        }
        removed
    }

    /// Operator edit of the expected bitrate. `false` if the key is absent.
    ///
    /// Applies whoever owns the row, so a locally owned flow may carry an
    /// operator expectation; provisioning overwrites it on takeover.
    pub fn set_expected_bitrate(&mut self, instance: &str, expected: f64, tolerance_pct: f64) -> bool {
        let Some(flow) = self.flows.get_mut(instance) else {
            return false;
        };
        flow.expected_bitrate = expected;
        flow.refresh_status(tolerance_pct);
        true
    }

    pub(crate) fn set_foreign_key(&mut self, instance: &str, foreign_key: &str) {
        if let Some(flow) = self.flows.get_mut(instance) {
            foreign_key.clone_into(&mut flow.foreign_key);
        }
    }

    pub fn refresh_statuses(&mut self, tolerance_pct: f64) {
        for flow in self.flows.values_mut() {
            flow.refresh_status(tolerance_pct);
        }
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Merge persisted rows into memory. Rows missing from `rows` are kept.
    pub fn load(&mut self, rows: &[TableRow]) -> usize {
        let mut loaded = 0;
        for row in rows {
            if row.key.trim().is_empty() {
                warn!(direction = D::LABEL, "skipping persisted flow row without instance");
                continue;
            }
            let flow = self.get_or_create(&row.key);
            let missing = flow.apply_row(row);
            if !missing.is_empty() {
                warn!(
                    direction = D::LABEL,
                    instance = %row.key,
                    ?missing,
                    "persisted flow row incomplete, defaults used"
                );
            }
            loaded += 1;
        }
        debug!(direction = D::LABEL, loaded, total = self.len(), "flow table loaded");
        loaded
    }

    /// Merge one discovery pass: sampled flows become present with their
    /// bitrate, every other flow becomes absent, stale rows are pruned.
    pub fn apply_observations(&mut self, samples: &[FlowSample]) -> ObservationReport<D> {
        let mut report = ObservationReport {
            created: Vec::new(),
            pruned: Vec::new(),
        };
        let observed: HashSet<&str> = samples.iter().map(|s| s.instance.as_str()).collect();

        for sample in samples {
            if sample.instance.trim().is_empty() {
                warn!(direction = D::LABEL, "ignoring discovery sample without instance");
                continue;
            }
            let is_new = !self.flows.contains_key(&sample.instance);
            let flow = self.get_or_create(&sample.instance);
            if is_new {
                fill_identity(flow, sample);
                report.created.push(sample.instance.clone());
            }
            flow.is_present = true;
            flow.bitrate = sample.bitrate;
        }

        for flow in self.flows.values_mut() {
            if !observed.contains(flow.instance()) {
                flow.is_present = false;
                flow.bitrate = 0.0;
            }
        }

        let stale: Vec<String> = self
            .flows
            .values()
            .filter(|f| f.is_stale())
            .map(|f| f.instance().to_owned())
            .collect();
        for instance in stale {
            if let Some(flow) = self.flows.shift_remove(&instance) {
                warn!(direction = D::LABEL, %instance, "pruned stale flow");
                report.pruned.push(flow);
            }
        }

        report
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn to_rows(&self, include_statistics: bool) -> Vec<TableRow> {
        self.flows
            .values()
            .map(|f| f.to_row(include_statistics))
            .collect()
    }

    /// Write every row back. Rows absent from memory are removed from the
    /// table; without statistics the existing statistics cells are kept.
    pub fn sync(&self, store: &dyn TableStore, include_statistics: bool) -> Result<(), CoreError> {
        let rows = self.to_rows(include_statistics);
        if include_statistics {
            store.replace(D::TABLE, rows)
        } else {
            store.set_columns(D::TABLE, rows)
        }
    }

    /// Write only bitrate, expected bitrate and status columns.
    pub fn sync_statistics_only(&self, store: &dyn TableStore) -> Result<(), CoreError> {
        let rows = self.flows.values().map(Flow::statistics_row).collect();
        store.set_columns(D::TABLE, rows)
    }
}

fn fill_identity<D: FlowDirection>(flow: &mut Flow<D>, sample: &FlowSample) {
    if let Some(ref source) = sample.source {
        flow.source.clone_from(source);
    }
    if let Some(ref destination) = sample.destination {
        flow.destination.clone_from(destination);
    }
    if let Some(port) = sample.destination_port {
        flow.destination_port = port;
    }
    if let Some(ref interface) = sample.interface {
        flow.interface.clone_from(interface);
    }
}
