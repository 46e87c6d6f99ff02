use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Number of source rows materialized per aggregation window. Larger
    /// windows mean fewer scans at the cost of peak memory; the aggregated
    /// result does not depend on the value.
    pub chunk_size: usize,
    /// Inclusive year window the feature frame is restricted to.
    pub year_min: i32,
    pub year_max: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_size: 1_000_000,
            year_min: 2006,
            year_max: 2022,
        }
    }
}
