// ── Provisioning message handler ──
//
// Per-message adapter between the provisioning channel and the manager.
// Every message gets exactly one reply, submitted before any error is
// returned to the caller.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::manager::{FlowEngineeringManager, ProvisioningOutcome};
use crate::message::{ActionType, FlowInfoMessage, ProvisioningReply};

// ── Reply sinks ──────────────────────────────────────────────────────

/// Outbound reply channel. Submission is best-effort and never blocks;
/// delivery is not confirmed back to the handler.
pub trait ReplySink: Send + Sync {
    fn submit(&self, reply: ProvisioningReply);
}

/// Forwards replies over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelReplySink {
    tx: mpsc::UnboundedSender<ProvisioningReply>,
}

impl ChannelReplySink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProvisioningReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReplySink for ChannelReplySink {
    fn submit(&self, reply: ProvisioningReply) {
        if self.tx.send(reply).is_err() {
            warn!("reply receiver dropped, provisioning reply discarded");
        }
    }
}

/// Discards every reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReplySink;

impl ReplySink for NullReplySink {
    fn submit(&self, _reply: ProvisioningReply) {}
}

// ── Handling ─────────────────────────────────────────────────────────

/// Structural checks that do not need manager state.
pub fn validate(msg: &FlowInfoMessage) -> Result<(), CoreError> {
    if msg.message_id.is_nil() {
        return Err(CoreError::validation("message id is nil"));
    }
    if let Some(ip) = &msg.flow.flow_transport_ip {
        if ip.source_ip.trim().is_empty() {
            return Err(CoreError::validation("source ip is empty"));
        }
        if ip.destination_ip.trim().is_empty() {
            return Err(CoreError::validation("destination ip is empty"));
        }
    }
    Ok(())
}

/// Validate, execute and acknowledge one provisioning message.
pub fn handle(
    manager: &mut FlowEngineeringManager,
    msg: &FlowInfoMessage,
    replies: &dyn ReplySink,
) -> Result<ProvisioningOutcome, CoreError> {
    let result = validate(msg).and_then(|()| {
        record_timeline(manager, &msg.action_type);
        manager.handle_message(msg)
    });

    match &result {
        Ok(_) => {
            debug!(message_id = %msg.message_id, action = %msg.action_type, "provisioning message applied");
            replies.submit(ProvisioningReply::ack(msg.message_id));
        }
        Err(e) => {
            warn!(message_id = %msg.message_id, action = %msg.action_type, error = %e, "provisioning message failed");
            replies.submit(ProvisioningReply::nack(msg.message_id, e.to_string()));
        }
    }
    result
}

fn record_timeline(manager: &mut FlowEngineeringManager, action: &ActionType) {
    let now = Utc::now();
    let element = manager.element_id().to_owned();
    let timeline = manager.timeline_mut();
    let (event, elapsed) = match action {
        ActionType::Create => ("connect", timeline.record_connect(now)),
        ActionType::Delete => ("disconnect", timeline.record_disconnect(now)),
        ActionType::Other(_) => return,
    };
    match elapsed {
        Some(delta) => info!(
            element = %element,
            event,
            elapsed_ms = delta.num_milliseconds(),
            "connection timeline updated"
        ),
        None => info!(element = %element, event, "connection timeline started"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;

    use super::*;
    use crate::config::ManagerOptions;
    use crate::message::{FlowInfo, FlowTransportIp};
    use crate::table::MemoryTableStore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProvisioningReply>>);

    impl ReplySink for Recorder {
        fn submit(&self, reply: ProvisioningReply) {
            self.0.lock().unwrap().push(reply);
        }
    }

    fn manager() -> FlowEngineeringManager {
        FlowEngineeringManager::new(
            "elem",
            Arc::new(MemoryTableStore::new()),
            ManagerOptions::default(),
        )
    }

    fn create() -> FlowInfoMessage {
        FlowInfoMessage {
            message_id: Uuid::new_v4(),
            action_type: ActionType::Create,
            flow: FlowInfo {
                flow_transport_ip: Some(FlowTransportIp {
                    source_ip: "10.0.0.1".into(),
                    destination_ip: "10.0.0.2".into(),
                    destination_port: 5004,
                    bit_rate: -1.0,
                }),
                interface: "eth0".into(),
                flow_id: "fid".into(),
                source_flow_id: "sfid".into(),
            },
            outgoing_interface: None,
            optional_destination_identifier: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn success_is_acknowledged() {
        let mut mgr = manager();
        let sink = Recorder::default();
        let msg = create();
        handle(&mut mgr, &msg, &sink).unwrap();

        let replies = sink.0.lock().unwrap();
        assert_eq!(replies.as_slice(), &[ProvisioningReply::ack(msg.message_id)]);
        assert!(mgr.timeline().last_connect.is_some());
    }

    #[test]
    fn failure_is_nacked_then_returned() {
        let mut mgr = manager();
        let sink = Recorder::default();
        let mut msg = create();
        msg.action_type = ActionType::Delete;

        let err = handle(&mut mgr, &msg, &sink).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));

        let replies = sink.0.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].success);
        assert_eq!(replies[0].detail.as_deref(), Some(err.to_string().as_str()));
    }

    #[test]
    fn invalid_message_never_reaches_manager() {
        let mut mgr = manager();
        let sink = Recorder::default();
        let mut msg = create();
        msg.message_id = Uuid::nil();

        assert!(matches!(
            handle(&mut mgr, &msg, &sink),
            Err(CoreError::ValidationFailed { .. })
        ));
        assert!(mgr.incoming().is_empty());
        assert!(mgr.timeline().last_connect.is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_source_ip_is_rejected() {
        let mut msg = create();
        if let Some(ip) = msg.flow.flow_transport_ip.as_mut() {
            ip.source_ip.clear();
        }
        assert!(validate(&msg).is_err());
    }

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (sink, mut rx) = ChannelReplySink::new();
        let id = Uuid::new_v4();
        sink.submit(ProvisioningReply::ack(id));
        assert_eq!(rx.recv().await.unwrap().message_id, id);

        drop(rx);
        sink.submit(ProvisioningReply::ack(id));
    }
}
