//! Fleetbeat heartbeat agent.
//!
//! Runs on each device and reports liveness and resource usage at a fixed
//! interval. The device role selects the reporting path:
//!
//! - `edge` devices register themselves and write property nodes directly to
//!   the coordination store ([`EdgeReporter`])
//! - `sensor` devices POST a [`HeartbeatReport`](fleetbeat_common::HeartbeatReport)
//!   to the ingestion server on their gateway ([`SensorReporter`])
//!
//! # Store layout
//!
//! ```text
//! /heartbeats
//! /heartbeats/<device>
//! /heartbeats/<device>/{device_type,device_role,cpu_cores,mem_cap,cpu,mem,gpu_cores,gpu,heartbeat}
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod linux;
pub mod role;
pub mod stats;

pub use agent::{EdgeReporter, HeartbeatAgent, Reporter, SensorReporter};
pub use config::{AgentArgs, AgentConfig, AgentSettings};
pub use error::{AgentError, Result};
pub use role::DeviceRole;
pub use stats::{HardwareType, HostFiles, HostStats, StatError, StatProvider, Usage};
