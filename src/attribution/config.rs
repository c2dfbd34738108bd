use serde::{Deserialize, Serialize};

/// How a delta whose capture span crosses window boundaries is credited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionPolicy {
    /// Whole delta goes to the window containing the earlier snapshot.
    #[default]
    StartWindow,
    /// Delta is spread over the windows its capture span overlaps.
    Proportional,
}

/// Tunables for the attribution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AttributionConfig {
    /// Requests producing more windows than this are rejected up front.
    pub max_windows: u64,

    pub policy: AttributionPolicy,

    /// Broad fetch reaches this many intervals before the range start, so the
    /// first window sees the pair that began before it.
    pub lookbehind_intervals: i32,

    /// ...and this many after the range end, so the last window can close.
    pub lookahead_intervals: i32,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            max_windows: 10_000,
            policy: AttributionPolicy::StartWindow,
            lookbehind_intervals: 2,
            lookahead_intervals: 1,
        }
    }
}
