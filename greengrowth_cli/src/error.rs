use greengrowth::error::GreengrowthError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum GreengrowthCliError {
    #[error("Anyhow error")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error")]
    PolarsError(#[from] PolarsError),
    #[error("greengrowth error")]
    GreengrowthError(#[from] GreengrowthError),
    #[error("std IO error")]
    IOError(#[from] std::io::Error),
}

pub type GreengrowthCliResult<T> = Result<T, GreengrowthCliError>;
