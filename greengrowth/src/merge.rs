//! Merge of the normalized patent panel with the macro indicator series.

use std::path::Path;

use log::debug;
use polars::prelude::*;

use crate::error::GreengrowthError;
use crate::COL;

/// Load a `(country, year, gdp_per_capita)` series from CSV.
pub fn read_indicator_csv(path: impl AsRef<Path>) -> Result<DataFrame, GreengrowthError> {
    let path = path.as_ref();
    LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .and_then(|lf| {
            lf.select([col(COL::COUNTRY), col(COL::YEAR), col(COL::GDP_PER_CAPITA)])
                .collect()
        })
        .map_err(|e| GreengrowthError::DataSource(format!("{}: {e}", path.display())))
}

fn coerce_year(df: &DataFrame) -> Result<DataFrame, GreengrowthError> {
    df.clone()
        .lazy()
        .with_column(col(COL::YEAR).strict_cast(DataType::Int32))
        .collect()
        .map_err(|e| GreengrowthError::InvalidKey(format!("year must be an integer: {e}")))
}

/// Left-join the indicator on `(country, year)`, then drop the rows without
/// an indicator value. Rows with no normalized country cannot carry the join
/// key and are excluded up front.
pub fn merge_with_indicator(
    panel: &DataFrame,
    indicator: &DataFrame,
) -> Result<DataFrame, GreengrowthError> {
    let panel = coerce_year(panel)?;
    let indicator = coerce_year(indicator)?;
    let joined = panel
        .lazy()
        .drop_nulls(Some(vec![col(COL::COUNTRY)]))
        .join(
            indicator.lazy(),
            [col(COL::COUNTRY), col(COL::YEAR)],
            [col(COL::COUNTRY), col(COL::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    let merged = joined
        .clone()
        .lazy()
        .drop_nulls(Some(vec![col(COL::GDP_PER_CAPITA)]))
        .collect()?;
    debug!(
        "dropped {} of {} panel rows without an indicator value",
        joined.height() - merged.height(),
        joined.height()
    );
    Ok(merged)
}
