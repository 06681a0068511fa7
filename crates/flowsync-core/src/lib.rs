//! Flow state reconciliation engine for RX/TX media transport flows.
//!
//! Three writers touch a flow row: local discovery (presence and observed
//! bitrate), a remote provisioning subsystem (ownership, linked id,
//! expected bitrate) and the persisted table replayed at startup. This
//! crate keeps them consistent:
//!
//! - **[`FlowRegistry<D>`]**: ordered, keyed flows of one direction,
//!   generic over the [`FlowDirection`] marker ([`Incoming`] / [`Outgoing`]).
//!   Provisioning register/unregister is idempotent and tolerant of
//!   duplicate or out-of-order delivery.
//!
//! - **[`ProvisionedFlowRegistry`]**: RX/TX pairs created and torn down
//!   as a unit under an external UUID.
//!
//! - **[`FlowEngineeringManager`]**: per-element owner of all registries.
//!   Each successful mutation is synced to the [`TableStore`] before it
//!   returns. [`ManagerCache`] holds one manager per element with an
//!   explicit `reset`.
//!
//! - **[`handler`] / [`Dispatcher`]**: provisioning messages in, one
//!   [`ProvisioningReply`] out per message through a [`ReplySink`];
//!   operator triggers and discovery polls with errors logged at the top.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod manager;
pub mod message;
pub mod model;
pub mod store;
pub mod table;
pub mod wait;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ManagerOptions;
pub use dispatch::{CallReport, Dispatcher, OperatorTrigger};
pub use error::CoreError;
pub use handler::{ChannelReplySink, NullReplySink, ReplySink};
pub use manager::{
    ConnectionTimeline, FlowEngineeringManager, LoadSummary, ManagerCache, ProvisioningOutcome,
};
pub use message::{ActionType, FlowInfo, FlowInfoMessage, FlowTransportIp, InterAppCall, ProvisioningReply};
pub use store::{
    FlowRegistry, FlowSample, InterfaceSet, ObservationReport, ProvisionedFlowRegistry, Teardown,
    Unregistered,
};
pub use table::{Cell, MemoryTableStore, TableId, TableRow, TableStore};

pub use model::{
    DcfInterface, DcfInterfaceIndex, Direction, ExpectedBitrateStatus, Flow, FlowDirection,
    FlowOwner, FlowTransportType, Incoming, Interface, InterfaceStats, InterfaceStatus,
    InterfaceType, Outgoing, ProvisionedFlow, RxFlow, TxFlow,
};
