//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum GreengrowthError {
    #[error("Classification source unusable: {0}")]
    DataSource(String),
    #[error("Source relation unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Invalid join key: {0}")]
    InvalidKey(String),
    #[error("Underdetermined model at horizon {horizon}: {n_obs} complete rows for {n_regressors} regressors plus absorbed effects")]
    UnderdeterminedModel {
        horizon: usize,
        n_obs: usize,
        n_regressors: usize,
    },
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_anyhow() {
        let anyhow_error = anyhow!("An anyhow error");
        let greengrowth_error: GreengrowthError = anyhow_error.into();
        println!("{}", greengrowth_error);
    }
}
