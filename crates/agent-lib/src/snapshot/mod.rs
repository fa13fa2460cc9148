//! Snapshot aggregation, storage and the refresh loop

mod builder;
mod r#loop;
mod store;


pub use builder::{
    cost_share, detect_instance_type, eligible_node, format_taints, node_status,
    node_under_pressure, sum_pod_requests, usage_or_requests, usage_percent, SnapshotBuilder,
    INSTANCE_TYPE_LABELS,
};
pub use r#loop::{
    LoopConfig, NetworkSummaryProvider, SnapshotError, SnapshotLoop, SnapshotLoopBuilder,
};
pub use store::SnapshotStore;
