// ── Domain model ──

pub mod flow;
pub mod interface;
pub mod provisioned;

pub use flow::{
    Direction, ExpectedBitrateStatus, Flow, FlowDirection, FlowOwner, FlowTransportType, Incoming,
    Outgoing, RxFlow, TxFlow, UNSET, UNSET_BITRATE,
};
pub use interface::{
    DcfInterface, DcfInterfaceIndex, Interface, InterfaceStats, InterfaceStatus, InterfaceType,
};
pub use provisioned::ProvisionedFlow;
