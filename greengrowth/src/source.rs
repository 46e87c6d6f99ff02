//! The queryable source-relation handle the aggregator scans. The handle is
//! acquired once at pipeline start and passed explicitly through the stages.

use std::path::PathBuf;

use polars::prelude::*;

use crate::error::GreengrowthError;

/// A tabular relation that can report its size and serve fixed-size row
/// windows with column projection.
pub trait SourceRelation {
    fn row_count(&self) -> Result<usize, GreengrowthError>;

    /// Materialize `limit` rows starting at `offset`, restricted to `columns`.
    fn scan(
        &self,
        offset: usize,
        limit: usize,
        columns: &[&str],
    ) -> Result<DataFrame, GreengrowthError>;
}

/// Source relation backed by a parquet file on disk.
pub struct ParquetSource {
    path: PathBuf,
}

impl ParquetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lazy_scan(&self) -> Result<LazyFrame, GreengrowthError> {
        LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default()).map_err(|e| {
            GreengrowthError::SourceUnavailable(format!("{}: {e}", self.path.display()))
        })
    }
}

impl SourceRelation for ParquetSource {
    fn row_count(&self) -> Result<usize, GreengrowthError> {
        let counts = self
            .lazy_scan()?
            .select([len()])
            .collect()
            .map_err(|e| GreengrowthError::SourceUnavailable(format!("row count: {e}")))?;
        let count = counts
            .column("len")?
            .u32()?
            .get(0)
            .unwrap_or_default();
        Ok(count as usize)
    }

    fn scan(
        &self,
        offset: usize,
        limit: usize,
        columns: &[&str],
    ) -> Result<DataFrame, GreengrowthError> {
        let cols: Vec<Expr> = columns.iter().map(|c| col(c)).collect();
        self.lazy_scan()?
            .with_streaming(true)
            .select(cols)
            .slice(offset as i64, limit as IdxSize)
            .collect()
            .map_err(|e| {
                GreengrowthError::SourceUnavailable(format!("scan at offset {offset}: {e}"))
            })
    }
}

/// Source relation over an already materialized frame. Used in tests and for
/// sources small enough to hold wholesale.
pub struct InMemorySource(pub DataFrame);

impl SourceRelation for InMemorySource {
    fn row_count(&self) -> Result<usize, GreengrowthError> {
        Ok(self.0.height())
    }

    fn scan(
        &self,
        offset: usize,
        limit: usize,
        columns: &[&str],
    ) -> Result<DataFrame, GreengrowthError> {
        let projected = self.0.select(columns.iter().copied())?;
        Ok(projected.slice(offset as i64, limit))
    }
}
