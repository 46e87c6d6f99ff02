//! Chunked aggregation of the joined patent source relation into the
//! country-year panel, split by green classification.
//!
//! The scan is a two-phase map-then-reduce: each fixed-size window is grouped
//! on its own and appended to a running collection of partials, and a single
//! associative-commutative sum over the partials produces the final panel.
//! The result is therefore independent of the window size and of where the
//! window boundaries fall.

use log::{debug, info};
use polars::prelude::*;

use crate::classification::ClassificationSet;
use crate::error::GreengrowthError;
use crate::source::SourceRelation;
use crate::COL;

/// Columns materialized per window; the rest of the source relation is never
/// read.
pub const SCAN_COLUMNS: [&str; 7] = [
    COL::RAW_COUNTRY,
    COL::ACTION_DATE,
    COL::SECTION,
    COL::IPC_CLASS,
    COL::SUBCLASS,
    COL::MAIN_GROUP,
    COL::SUBGROUP,
];

/// Row-level drop counters. Malformed rows are recovered locally and
/// surfaced here in aggregate, never as errors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Rows with a null jurisdiction or a null event date.
    pub dropped_missing_fields: usize,
    /// Rows whose event date failed to parse.
    pub dropped_unparseable_date: usize,
}

#[derive(Debug)]
pub struct AggregatedPanel {
    pub panel: DataFrame,
    pub report: AggregationReport,
}

/// The five classification fragments concatenated, with a literal `/` between
/// main group and subgroup; null fragments contribute the empty string.
fn full_code_expr() -> Expr {
    concat_str(
        [
            col(COL::SECTION).fill_null(lit("")),
            col(COL::IPC_CLASS).fill_null(lit("")),
            col(COL::SUBCLASS).fill_null(lit("")),
            col(COL::MAIN_GROUP).fill_null(lit("")),
            lit("/"),
            col(COL::SUBGROUP).fill_null(lit("")),
        ],
        "",
        false,
    )
}

fn window_partial(
    window: DataFrame,
    green_codes: &Series,
    report: &mut AggregationReport,
) -> PolarsResult<DataFrame> {
    let scanned = window.height();
    let located = window
        .lazy()
        .drop_nulls(Some(vec![col(COL::RAW_COUNTRY), col(COL::ACTION_DATE)]))
        .collect()?;
    let located_height = located.height();
    let dated = located
        .lazy()
        .with_column(col(COL::ACTION_DATE).str().to_date(StrptimeOptions {
            strict: false,
            ..Default::default()
        }))
        .drop_nulls(Some(vec![col(COL::ACTION_DATE)]))
        .collect()?;
    report.dropped_missing_fields += scanned - located_height;
    report.dropped_unparseable_date += located_height - dated.height();
    report.kept_rows += dated.height();

    dated
        .lazy()
        .with_column(col(COL::ACTION_DATE).dt().year().alias(COL::YEAR))
        .with_column(full_code_expr().alias(COL::IPC_CODE_FULL))
        .with_column(
            col(COL::IPC_CODE_FULL)
                .is_in(lit(green_codes.clone()))
                .alias(COL::IS_GREEN),
        )
        .group_by([col(COL::RAW_COUNTRY), col(COL::YEAR), col(COL::IS_GREEN)])
        .agg([len().alias(COL::PATENT_COUNT)])
        .collect()
}

fn empty_panel() -> PolarsResult<DataFrame> {
    df!(
        COL::RAW_COUNTRY => Vec::<String>::new(),
        COL::YEAR => Vec::<i32>::new(),
        COL::IS_GREEN => Vec::<bool>::new(),
        COL::PATENT_COUNT => Vec::<i64>::new(),
    )
}

/// Stream the source relation in `chunk_size` row windows and aggregate it
/// into `(raw_country, year, is_green, patent_count)` rows.
pub fn aggregate(
    source: &dyn SourceRelation,
    green: &ClassificationSet,
    chunk_size: usize,
) -> Result<AggregatedPanel, GreengrowthError> {
    if chunk_size == 0 {
        return Err(anyhow::anyhow!("chunk_size must be positive").into());
    }
    let total = source.row_count()?;
    let green_codes = green.to_series();
    let mut report = AggregationReport {
        total_rows: total,
        ..Default::default()
    };
    let mut partials: Vec<LazyFrame> = Vec::new();

    let mut offset = 0;
    while offset < total {
        let limit = chunk_size.min(total - offset);
        debug!("processing rows {} to {}", offset, offset + limit);
        let window = source.scan(offset, limit, &SCAN_COLUMNS)?;
        let partial = window_partial(window, &green_codes, &mut report)?;
        partials.push(partial.lazy());
        offset += limit;
    }

    let panel = if partials.is_empty() {
        empty_panel()?
    } else {
        concat(partials, UnionArgs::default())?
            .group_by([col(COL::RAW_COUNTRY), col(COL::YEAR), col(COL::IS_GREEN)])
            .agg([col(COL::PATENT_COUNT).sum()])
            .with_column(col(COL::PATENT_COUNT).cast(DataType::Int64))
            .sort(
                [COL::RAW_COUNTRY, COL::YEAR, COL::IS_GREEN],
                SortMultipleOptions::default(),
            )
            .collect()?
    };

    info!(
        "aggregated {} of {} source rows into {} panel rows ({} missing fields, {} unparseable dates)",
        report.kept_rows,
        report.total_rows,
        panel.height(),
        report.dropped_missing_fields,
        report.dropped_unparseable_date
    );
    Ok(AggregatedPanel { panel, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    fn green_set() -> ClassificationSet {
        ClassificationSet::from_codes(["A01B3/00"]).unwrap()
    }

    fn source_df() -> DataFrame {
        df!(
            COL::RAW_COUNTRY => &[Some("US"), Some("US"), Some("DE"), None, Some("US"), Some("DE"), Some("JP")],
            COL::ACTION_DATE => &[Some("2006-01-01"), Some("2006-06-01"), Some("2007-03-05"), Some("2006-01-01"), Some("not a date"), None, Some("2007-11-20")],
            COL::SECTION => &["A", "B", "A", "A", "A", "A", "A"],
            COL::IPC_CLASS => &["01", "01", "01", "01", "01", "01", "01"],
            COL::SUBCLASS => &["B", "D", "B", "B", "B", "B", "B"],
            COL::MAIN_GROUP => &["3", "53", "3", "3", "3", "3", "3"],
            COL::SUBGROUP => &["00", "14", "00", "00", "00", "00", "00"],
        )
        .unwrap()
    }

    #[test]
    fn test_two_row_example() {
        // One green-coded and one non-green-coded patent in the same
        // country-year produce one panel row per side, each with count 1.
        let source = InMemorySource(source_df().slice(0, 2));
        let result = aggregate(&source, &green_set(), 1000).unwrap();
        let expected = df!(
            COL::RAW_COUNTRY => &["US", "US"],
            COL::YEAR => &[2006i32, 2006],
            COL::IS_GREEN => &[false, true],
            COL::PATENT_COUNT => &[1i64, 1],
        )
        .unwrap();
        assert_eq!(result.panel, expected);
    }

    #[test]
    fn test_chunk_invariance() {
        let reference = aggregate(&InMemorySource(source_df()), &green_set(), 1000)
            .unwrap()
            .panel;
        for chunk_size in [1, 2, 3, 5, 7] {
            let panel = aggregate(&InMemorySource(source_df()), &green_set(), chunk_size)
                .unwrap()
                .panel;
            assert_eq!(panel, reference, "chunk_size {chunk_size} changed the panel");
        }
    }

    #[test]
    fn test_count_conservation_and_report() {
        let result = aggregate(&InMemorySource(source_df()), &green_set(), 2).unwrap();
        let counted: i64 = result
            .panel
            .column(COL::PATENT_COUNT)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .sum();
        // Rows with a null country, a null date or an unparseable date are
        // dropped; everything else is counted exactly once.
        assert_eq!(counted, 4);
        assert_eq!(
            result.report,
            AggregationReport {
                total_rows: 7,
                kept_rows: 4,
                dropped_missing_fields: 2,
                dropped_unparseable_date: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_keys_sum_across_windows() {
        // The same (country, year, class) key split over two windows is
        // combined in the reduce phase.
        let source = InMemorySource(source_df().slice(0, 1).vstack(&source_df().slice(0, 1)).unwrap());
        let result = aggregate(&source, &green_set(), 1).unwrap();
        assert_eq!(result.panel.height(), 1);
        let count = result
            .panel
            .column(COL::PATENT_COUNT)
            .unwrap()
            .i64()
            .unwrap()
            .get(0);
        assert_eq!(count, Some(2));
    }

    #[test]
    fn test_empty_source() {
        let source = InMemorySource(source_df().slice(0, 0));
        let result = aggregate(&source, &green_set(), 10).unwrap();
        assert_eq!(result.panel.height(), 0);
        assert_eq!(result.report, AggregationReport::default());
    }
}
