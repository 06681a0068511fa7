// ── Runtime configuration for the engine ──
//
// These types are constructed by the application layer (CLI, from the
// config crate) and passed into the manager. No file or env parsing here.

use std::time::Duration;

/// Behaviour knobs for one managed element.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerOptions {
    /// Drop the destination port from instance keys.
    pub ignore_destination_port: bool,
    /// Allowed deviation from the expected bitrate, in percent.
    pub bitrate_tolerance_pct: f64,
    /// Interface rows the host must publish before bootstrap completes.
    pub expected_interfaces: usize,
    pub bootstrap_interval: Duration,
    pub bootstrap_timeout: Duration,
    /// DCF table group whose dynamic links map onto interface ids.
    pub dcf_interface_group: Option<i32>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            ignore_destination_port: false,
            bitrate_tolerance_pct: 10.0,
            expected_interfaces: 0,
            bootstrap_interval: Duration::from_millis(500),
            bootstrap_timeout: Duration::from_secs(30),
            dcf_interface_group: None,
        }
    }
}
