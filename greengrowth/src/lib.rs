use log::debug;
use polars::frame::DataFrame;

use crate::aggregate::AggregatedPanel;
use crate::classification::ClassificationSet;
use crate::config::Config;
use crate::countries::{CountryCodeNormalizer, MappingCoverage};
use crate::error::GreengrowthError;
use crate::irf::{HorizonResult, PatentSide, MAX_HORIZON};
use crate::source::SourceRelation;

// Re-exports
pub use column_names as COL;

// Modules
pub mod aggregate;
pub mod classification;
pub mod column_names;
pub mod config;
pub mod countries;
pub mod error;
pub mod features;
pub mod formatters;
pub mod irf;
pub mod merge;
pub mod source;

/// Everything a full pipeline run produces: the aggregated panel, the
/// country-mapping coverage, the feature frame, and one horizon sequence per
/// patent side (failed horizons carried in place).
pub struct PipelineOutput {
    pub panel: DataFrame,
    pub coverage: MappingCoverage,
    pub features: DataFrame,
    pub green: Vec<Result<HorizonResult, GreengrowthError>>,
    pub non_green: Vec<Result<HorizonResult, GreengrowthError>>,
}

/// Type for greengrowth pipeline and API
pub struct Greengrowth {
    pub config: Config,
}

impl Greengrowth {
    /// Setup the Greengrowth object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the Greengrowth object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Run the chunked aggregation stage on its own, producing the
    /// country-year panel and its row-drop report.
    pub fn build_panel(
        &self,
        source: &dyn SourceRelation,
        green: &ClassificationSet,
    ) -> Result<AggregatedPanel, GreengrowthError> {
        aggregate::aggregate(source, green, self.config.chunk_size)
    }

    /// Run the full pipeline: aggregate, normalize country codes, merge the
    /// indicator, construct features, and estimate both impulse responses.
    pub fn run(
        &self,
        source: &dyn SourceRelation,
        green: &ClassificationSet,
        indicator: &DataFrame,
    ) -> Result<PipelineOutput, GreengrowthError> {
        let aggregated = self.build_panel(source, green)?;
        let (normalized, coverage) =
            CountryCodeNormalizer::new().normalize_panel(&aggregated.panel)?;
        let merged = merge::merge_with_indicator(&normalized, indicator)?;
        let features =
            features::construct_features(&merged, self.config.year_min, self.config.year_max)?;
        let green_irf = irf::estimate(&features, PatentSide::Green, MAX_HORIZON)?;
        let non_green_irf = irf::estimate(&features, PatentSide::NonGreen, MAX_HORIZON)?;
        Ok(PipelineOutput {
            panel: aggregated.panel,
            coverage,
            features,
            green: green_irf,
            non_green: non_green_irf,
        })
    }
}

impl Default for Greengrowth {
    fn default() -> Self {
        Self::new()
    }
}
