pub mod config;
pub mod deltas;
pub mod engine;
pub mod policy;
pub mod windows;

pub use config::{AttributionConfig, AttributionPolicy};
pub use deltas::{pair_deltas, PairDelta};
pub use engine::{attribute_snapshots, AttributeRequest, AttributionEngine};
pub use policy::apply_policy;
pub use windows::{window_count, WindowPlan};
