// ── Top-level dispatcher ──
//
// Entry point for the host's triggers. Errors end here: they are logged
// and never propagated further, so one bad message or edit cannot stop
// processing of the next.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::CoreError;
use crate::handler::{self, ReplySink};
use crate::manager::{ManagerCache, ProvisioningOutcome};
use crate::message::{FlowInfoMessage, InterAppCall, ProvisioningReply};
use crate::model::Direction;
use crate::store::FlowSample;

/// Operator-initiated write on one of the element's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum OperatorTrigger {
    SetExpectedBitrate {
        direction: Direction,
        key: String,
        value: f64,
    },
    DeleteFlow {
        direction: Direction,
        key: String,
    },
    /// Row key of the provisioned flow table, parsed as a UUID.
    DeleteProvisionedFlow { id: String },
}

/// Summary of one inbound call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallReport {
    pub applied: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    cache: Arc<ManagerCache>,
    replies: Arc<dyn ReplySink>,
}

impl Dispatcher {
    pub fn new(cache: Arc<ManagerCache>, replies: Arc<dyn ReplySink>) -> Self {
        Self { cache, replies }
    }

    pub fn cache(&self) -> &Arc<ManagerCache> {
        &self.cache
    }

    /// Parse and apply an inter-app call carrying one or more messages.
    pub fn on_raw_call(&self, element_id: &str, raw: &str) -> Result<CallReport, CoreError> {
        let call = InterAppCall::from_json(raw).inspect_err(|e| {
            error!(element = element_id, error = %e, "unreadable inter-app call");
        })?;
        Ok(self.on_call(element_id, &call))
    }

    /// Apply every message of `call` in order; failures are logged.
    pub fn on_call(&self, element_id: &str, call: &InterAppCall) -> CallReport {
        let mut report = CallReport::default();
        for msg in &call.messages {
            match self.on_message(element_id, msg) {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    error!(element = element_id, message_id = %msg.message_id, error = %e, "provisioning message failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn on_message(
        &self,
        element_id: &str,
        msg: &FlowInfoMessage,
    ) -> Result<ProvisioningOutcome, CoreError> {
        self.cache
            .with(element_id, |manager| {
                handler::handle(manager, msg, self.replies.as_ref())
            })
            .unwrap_or_else(|| {
                let err = unknown_element(element_id);
                self.replies
                    .submit(ProvisioningReply::nack(msg.message_id, err.to_string()));
                Err(err)
            })
    }

    /// Apply an operator trigger. Failures are logged and swallowed.
    pub fn on_trigger(&self, element_id: &str, trigger: &OperatorTrigger) -> bool {
        match self.apply_trigger(element_id, trigger) {
            Ok(changed) => {
                debug!(element = element_id, ?trigger, changed, "operator trigger handled");
                changed
            }
            Err(e) => {
                error!(element = element_id, ?trigger, error = %e, "operator trigger failed");
                false
            }
        }
    }

    fn apply_trigger(&self, element_id: &str, trigger: &OperatorTrigger) -> Result<bool, CoreError> {
        self.cache
            .with(element_id, |manager| match trigger {
                OperatorTrigger::SetExpectedBitrate {
                    direction,
                    key,
                    value,
                } => manager.update_expected_bitrate(*direction, key, *value),
                OperatorTrigger::DeleteFlow { direction, key } => {
                    manager.delete_flow(*direction, key)
                }
                OperatorTrigger::DeleteProvisionedFlow { id } => {
                    let id = parse_provisioned_id(id)?;
                    manager.delete_provisioned_flow(&id).map(|_| true)
                }
            })
            .unwrap_or_else(|| Err(unknown_element(element_id)))
    }

    /// Merge a discovery pass. Failures are logged and swallowed.
    pub fn on_poll(&self, element_id: &str, rx: &[FlowSample], tx: &[FlowSample]) -> bool {
        let result = self
            .cache
            .with(element_id, |manager| manager.refresh_statistics(rx, tx))
            .unwrap_or_else(|| Err(unknown_element(element_id)));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(element = element_id, error = %e, "discovery refresh failed");
                false
            }
        }
    }
}

pub fn parse_provisioned_id(raw: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| CoreError::validation(format!("invalid provisioned flow id {raw:?}: {e}")))
}

fn unknown_element(element_id: &str) -> CoreError {
    CoreError::NotFound {
        entity_type: "element".into(),
        identifier: element_id.to_owned(),
    }
}
