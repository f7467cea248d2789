// Domain models: probe records and network interface snapshots

mod network;
mod probe;

pub use network::{InterfaceKind, InterfaceStat, NetworkInfo};
pub use probe::{Hop, ProbeRecord, ProbeResult, ProbeTier, TraceResult};
