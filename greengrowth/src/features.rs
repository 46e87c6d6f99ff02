//! Feature construction on the merged panel: log levels, growth, per-capita
//! patent intensities and within-country lags, one row per country-year.

use polars::prelude::*;

use crate::COL;

/// Deepest lag carried for the log variables.
pub const LAG_DEPTH: i64 = 3;

pub fn lag_name(base: &str, k: i64) -> String {
    format!("{base}_lag{k}")
}

/// Non-green counts clipped at zero. Classified counts exceeding the total
/// would signal upstream join fan-out; the clip keeps the intensity defined
/// rather than letting the anomaly poison the log transform.
fn clipped_non_green_expr() -> Expr {
    when(col(COL::TOTAL_PATENTS).gt(col(COL::GREEN_PATENTS)))
        .then(col(COL::TOTAL_PATENTS) - col(COL::GREEN_PATENTS))
        .otherwise(lit(0i64))
        .alias(COL::NON_GREEN_PATENTS)
}

fn green_share_expr() -> Expr {
    when(col(COL::TOTAL_PATENTS).eq(lit(0i64)))
        .then(lit(0.0))
        .otherwise(
            col(COL::GREEN_PATENTS).cast(DataType::Float64)
                / col(COL::TOTAL_PATENTS).cast(DataType::Float64),
        )
        .alias(COL::GREEN_SHARE)
}

/// log(1 + patents per unit of GDP per capita); log1p keeps zero-patent
/// country-years defined.
fn log_intensity_expr(patents: &str, name: &str) -> Expr {
    (col(patents).cast(DataType::Float64) / col(COL::GDP_PER_CAPITA))
        .log1p()
        .alias(name)
}

/// Derive the feature frame from the merged panel. Pure with respect to its
/// inputs; growth is differenced before the year-window cut, lags are shifted
/// after it.
pub fn construct_features(
    merged: &DataFrame,
    year_min: i32,
    year_max: i32,
) -> PolarsResult<DataFrame> {
    // Collapse the (country, year, is_green) grain to one row per
    // country-year. A side with no rows sums to zero, so country-years with
    // no green patents keep a row with green_patents = 0.
    let totals = merged
        .clone()
        .lazy()
        .group_by([col(COL::COUNTRY), col(COL::YEAR)])
        .agg([
            col(COL::PATENT_COUNT).sum().alias(COL::TOTAL_PATENTS),
            col(COL::PATENT_COUNT)
                .filter(col(COL::IS_GREEN))
                .sum()
                .alias(COL::GREEN_PATENTS),
        ]);
    let base = merged
        .clone()
        .lazy()
        .select([col(COL::COUNTRY), col(COL::YEAR), col(COL::GDP_PER_CAPITA)])
        .unique_stable(None, UniqueKeepStrategy::First);

    let mut lag_exprs: Vec<Expr> = Vec::new();
    for k in 1..=LAG_DEPTH {
        for base_col in [COL::LOG_GREEN, COL::LOG_NON_GREEN, COL::LOG_GDP_PC] {
            lag_exprs.push(
                col(base_col)
                    .shift(lit(k))
                    .over([col(COL::COUNTRY)])
                    .alias(&lag_name(base_col, k)),
            );
        }
    }

    base.join(
        totals,
        [col(COL::COUNTRY), col(COL::YEAR)],
        [col(COL::COUNTRY), col(COL::YEAR)],
        JoinArgs::new(JoinType::Left),
    )
    .with_columns([
        col(COL::GREEN_PATENTS).fill_null(lit(0)).cast(DataType::Int64),
        col(COL::TOTAL_PATENTS).fill_null(lit(0)).cast(DataType::Int64),
    ])
    .sort([COL::COUNTRY, COL::YEAR], SortMultipleOptions::default())
    .with_column(
        col(COL::GDP_PER_CAPITA)
            .log(std::f64::consts::E)
            .alias(COL::LOG_GDP_PC),
    )
    .with_column(
        (col(COL::LOG_GDP_PC) - col(COL::LOG_GDP_PC).shift(lit(1)).over([col(COL::COUNTRY)]))
            .alias(COL::GDP_GROWTH),
    )
    .with_column(green_share_expr())
    .filter(
        col(COL::YEAR)
            .gt_eq(lit(year_min))
            .and(col(COL::YEAR).lt_eq(lit(year_max))),
    )
    .with_column(clipped_non_green_expr())
    .with_columns([
        log_intensity_expr(COL::GREEN_PATENTS, COL::LOG_GREEN),
        log_intensity_expr(COL::NON_GREEN_PATENTS, COL::LOG_NON_GREEN),
    ])
    .with_columns(lag_exprs)
    .collect()
}
