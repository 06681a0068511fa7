// ── In-memory state ──
//
// Registries owned by a manager. None of them lock: every mutation runs
// under exclusive access to the owning manager.

pub mod interfaces;
pub mod provisioned;
pub mod registry;

pub use interfaces::InterfaceSet;
pub use provisioned::{ProvisionedFlowRegistry, Teardown};
pub use registry::{FlowRegistry, FlowSample, ObservationReport, Unregistered};
