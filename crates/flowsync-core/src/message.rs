// ── Provisioning wire types ──
//
// Inbound inter-app calls from the remote flow-provisioning subsystem
// and the replies sent back. Field names follow the wire format
// (PascalCase); transport and delivery are handled by the host.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ── ActionType ───────────────────────────────────────────────────────

/// Requested provisioning action. Unrecognized values are kept verbatim
/// so the manager can reject them with the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Create,
    Delete,
    Other(String),
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Create" => Self::Create,
            "Delete" => Self::Delete,
            _ => Self::Other(raw),
        }
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("Create"),
            Self::Delete => f.write_str("Delete"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

// ── Flow info ────────────────────────────────────────────────────────

/// IP transport description of a provisioned flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowTransportIp {
    pub source_ip: String,
    pub destination_ip: String,
    #[serde(default)]
    pub destination_port: i32,
    /// Expected bitrate in bps, -1 when the remote side has none.
    #[serde(default = "unset_bitrate")]
    pub bit_rate: f64,
}

fn unset_bitrate() -> f64 {
    -1.0
}

/// One flow endpoint as described by the provisioning subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowInfo {
    /// Present only for IP transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_transport_ip: Option<FlowTransportIp>,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub flow_id: String,
    #[serde(default)]
    pub source_flow_id: String,
}

impl FlowInfo {
    /// IP transport, or `UnsupportedTransport` for anything else.
    pub fn require_ip(&self) -> Result<&FlowTransportIp, CoreError> {
        self.flow_transport_ip
            .as_ref()
            .ok_or_else(|| CoreError::UnsupportedTransport {
                flow_id: self.flow_id.clone(),
            })
    }
}

// ── Messages ─────────────────────────────────────────────────────────

/// A create/delete request for one provisioned RX/TX pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowInfoMessage {
    pub message_id: Uuid,
    pub action_type: ActionType,
    #[serde(flatten)]
    pub flow: FlowInfo,
    /// Egress interface of the TX side when it differs from `Interface`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_interface: Option<String>,
    /// External id of the provisioned pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_destination_identifier: Option<Uuid>,
}

impl FlowInfoMessage {
    /// Flow info describing the RX side.
    pub fn incoming_info(&self) -> FlowInfo {
        self.flow.clone()
    }

    /// Flow info describing the TX side.
    pub fn outgoing_info(&self) -> FlowInfo {
        let mut info = self.flow.clone();
        if let Some(ref egress) = self.outgoing_interface {
            info.interface.clone_from(egress);
        }
        info
    }
}

/// Bulk envelope: one inbound call may carry several messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterAppCall {
    #[serde(default)]
    pub messages: Vec<FlowInfoMessage>,
}

impl InterAppCall {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ── Replies ──────────────────────────────────────────────────────────

/// Acknowledgment for a single provisioning message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningReply {
    pub message_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProvisioningReply {
    pub fn ack(message_id: Uuid) -> Self {
        Self {
            message_id,
            success: true,
            detail: None,
        }
    }

    pub fn nack(message_id: Uuid, detail: impl Into<String>) -> Self {
        Self {
            message_id,
            success: false,
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CREATE: &str = r#"{
        "MessageId": "6b0c1a52-95f4-4c1a-9a43-1a3d8e0f2b11",
        "ActionType": "Create",
        "FlowTransportIp": {
            "SourceIp": "10.0.0.1",
            "DestinationIp": "239.1.1.1",
            "DestinationPort": 5004,
            "BitRate": 1500000.0
        },
        "Interface": "eth0",
        "FlowId": "rx-1",
        "SourceFlowId": "src-1",
        "OutgoingInterface": "eth1"
    }"#;

    #[test]
    fn parses_wire_message() {
        let msg: FlowInfoMessage = serde_json::from_str(CREATE).unwrap();
        assert_eq!(msg.action_type, ActionType::Create);
        let ip = msg.flow.require_ip().unwrap();
        assert_eq!(ip.destination_port, 5004);
        assert_eq!(msg.flow.flow_id, "rx-1");
        assert!(msg.optional_destination_identifier.is_none());
    }

    #[test]
    fn outgoing_info_prefers_egress_interface() {
        let msg: FlowInfoMessage = serde_json::from_str(CREATE).unwrap();
        assert_eq!(msg.incoming_info().interface, "eth0");
        assert_eq!(msg.outgoing_info().interface, "eth1");
    }

    #[test]
    fn unknown_action_is_preserved() {
        let action: ActionType = serde_json::from_str(r#""Update""#).unwrap();
        assert_eq!(action, ActionType::Other("Update".into()));
        assert_eq!(serde_json::to_string(&action).unwrap(), r#""Update""#);
    }

    #[test]
    fn missing_ip_transport_is_unsupported() {
        let info = FlowInfo {
            flow_id: "sdi-7".into(),
            ..FlowInfo::default()
        };
        let err = info.require_ip().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedTransport { ref flow_id } if flow_id == "sdi-7"));
    }

    #[test]
    fn malformed_call_is_a_validation_error() {
        let err = InterAppCall::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn nack_carries_detail() {
        let id = Uuid::new_v4();
        let reply = ProvisioningReply::nack(id, "boom");
        assert!(!reply.success);
        assert_eq!(reply.detail.as_deref(), Some("boom"));
        assert!(ProvisioningReply::ack(id).success);
    }
}
