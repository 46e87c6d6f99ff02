//! This module stores the column names used across the pipeline dataframes,
//! from the raw source relation through to the estimation output. Note that
//! the source-relation names must match the columns of the joined patent
//! table the pipeline is pointed at.

// Source relation
pub const RAW_COUNTRY: &str = "raw_country";
pub const ACTION_DATE: &str = "action_date";
pub const SECTION: &str = "section";
pub const IPC_CLASS: &str = "ipc_class";
pub const SUBCLASS: &str = "subclass";
pub const MAIN_GROUP: &str = "main_group";
pub const SUBGROUP: &str = "subgroup";

// Derived while aggregating
pub const IPC_CODE_FULL: &str = "ipc_code_full";
pub const YEAR: &str = "year";
pub const IS_GREEN: &str = "is_green";
pub const PATENT_COUNT: &str = "patent_count";

// Normalized panel and indicator series
pub const COUNTRY: &str = "country";
pub const GDP_PER_CAPITA: &str = "gdp_per_capita";

// Feature frame
pub const LOG_GDP_PC: &str = "log_gdp_pc";
pub const GDP_GROWTH: &str = "gdp_growth";
pub const GREEN_PATENTS: &str = "green_patents";
pub const TOTAL_PATENTS: &str = "total_patents";
pub const NON_GREEN_PATENTS: &str = "non_green_patents";
pub const GREEN_SHARE: &str = "green_share";
pub const LOG_GREEN: &str = "log_green";
pub const LOG_NON_GREEN: &str = "log_non_green";

// Estimation output
pub const DELTA_GDP: &str = "delta_gdp";
pub const SIDE: &str = "side";
pub const HORIZON: &str = "horizon";
pub const COEFFICIENT: &str = "coefficient";
pub const STD_ERROR: &str = "std_error";
pub const N_OBS: &str = "n_obs";
pub const STATUS: &str = "status";
