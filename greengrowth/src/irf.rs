//! Local-projection impulse responses of GDP growth on patent intensity,
//! estimated per horizon with country and year fixed effects and
//! heteroskedasticity-robust standard errors.

use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::{Cholesky, DMatrix, DVector};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::GreengrowthError;
use crate::features::lag_name;
use crate::COL;

/// Largest forecast horizon; results are indexed `0..=MAX_HORIZON`.
pub const MAX_HORIZON: usize = 5;

const DEMEAN_TOL: f64 = 1e-10;
const MAX_DEMEAN_SWEEPS: usize = 500;

/// Which patent intensity acts as the impulse variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PatentSide {
    Green,
    NonGreen,
}

impl PatentSide {
    pub fn log_column(&self) -> &'static str {
        match self {
            PatentSide::Green => COL::LOG_GREEN,
            PatentSide::NonGreen => COL::LOG_NON_GREEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonResult {
    pub horizon: usize,
    pub coefficient: f64,
    pub std_error: f64,
    pub n_obs: usize,
}

struct FeFit {
    params: Vec<f64>,
    std_errors: Vec<f64>,
    n_obs: usize,
}

fn entity_codes(values: &StringChunked) -> (Vec<usize>, usize) {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut codes = Vec::with_capacity(values.len());
    for value in values.into_no_null_iter() {
        let next = index.len();
        codes.push(*index.entry(value).or_insert(next));
    }
    let count = index.len();
    (codes, count)
}

fn time_codes(values: &Int32Chunked) -> (Vec<usize>, usize) {
    let mut index: HashMap<i32, usize> = HashMap::new();
    let mut codes = Vec::with_capacity(values.len());
    for value in values.into_no_null_iter() {
        let next = index.len();
        codes.push(*index.entry(value).or_insert(next));
    }
    let count = index.len();
    (codes, count)
}

/// Two-way within transformation: alternately subtract entity and time group
/// means until both sets of means vanish. A single pass is exact on balanced
/// panels; unbalanced panels converge in a few sweeps.
fn demean_two_way(
    values: &mut [f64],
    entities: &[usize],
    n_entities: usize,
    times: &[usize],
    n_times: usize,
) {
    let mut entity_counts = vec![0usize; n_entities];
    let mut time_counts = vec![0usize; n_times];
    for (&e, &t) in entities.iter().zip(times) {
        entity_counts[e] += 1;
        time_counts[t] += 1;
    }
    for _ in 0..MAX_DEMEAN_SWEEPS {
        let mut largest = 0f64;

        let mut entity_means = vec![0f64; n_entities];
        for (value, &e) in values.iter().zip(entities) {
            entity_means[e] += value;
        }
        for (mean, &count) in entity_means.iter_mut().zip(&entity_counts) {
            *mean /= count as f64;
            largest = largest.max(mean.abs());
        }
        for (value, &e) in values.iter_mut().zip(entities) {
            *value -= entity_means[e];
        }

        let mut time_means = vec![0f64; n_times];
        for (value, &t) in values.iter().zip(times) {
            time_means[t] += value;
        }
        for (mean, &count) in time_means.iter_mut().zip(&time_counts) {
            *mean /= count as f64;
            largest = largest.max(mean.abs());
        }
        for (value, &t) in values.iter_mut().zip(times) {
            *value -= time_means[t];
        }

        if largest < DEMEAN_TOL {
            break;
        }
    }
}

fn f64_column(data: &DataFrame, name: &str) -> Result<Vec<f64>, GreengrowthError> {
    Ok(data
        .column(name)?
        .f64()?
        .into_no_null_iter()
        .collect())
}

/// OLS on the two-way demeaned system with a White sandwich covariance. The
/// intercept is absorbed by the within transformation together with the
/// effects, so it is not part of the solved design.
fn fit_two_way_fe(
    data: &DataFrame,
    dependent: &str,
    regressors: &[String],
    horizon: usize,
) -> Result<FeFit, GreengrowthError> {
    let n = data.height();
    let k = regressors.len();
    let underdetermined = || GreengrowthError::UnderdeterminedModel {
        horizon,
        n_obs: n,
        n_regressors: k,
    };
    if n == 0 {
        return Err(underdetermined());
    }

    let (entities, n_entities) = entity_codes(data.column(COL::COUNTRY)?.str()?);
    let (times, n_times) = time_codes(data.column(COL::YEAR)?.i32()?);
    // Degrees of freedom absorbed by the effects, grand mean included
    let absorbed = n_entities + n_times - 1;
    if n <= k + absorbed {
        return Err(underdetermined());
    }

    let mut y = f64_column(data, dependent)?;
    demean_two_way(&mut y, &entities, n_entities, &times, n_times);
    let mut x = DMatrix::zeros(n, k);
    for (j, name) in regressors.iter().enumerate() {
        let mut column = f64_column(data, name)?;
        demean_two_way(&mut column, &entities, n_entities, &times, n_times);
        for (i, value) in column.into_iter().enumerate() {
            x[(i, j)] = value;
        }
    }

    let xtx = x.transpose() * &x;
    // A non-invertible demeaned design means the regressors are collinear
    // once the effects are absorbed
    let chol = Cholesky::new(xtx).ok_or_else(underdetermined)?;
    let y = DVector::from_vec(y);
    let beta = chol.solve(&(x.transpose() * &y));
    let residuals = &y - &x * &beta;
    let bread = chol.inverse();
    let mut meat = DMatrix::zeros(k, k);
    for i in 0..n {
        let xi = x.row(i);
        meat += xi.transpose() * xi * (residuals[i] * residuals[i]);
    }
    let df_resid = (n - k - absorbed) as f64;
    let cov = &bread * meat * &bread * (n as f64 / df_resid);
    let std_errors = (0..k).map(|j| cov[(j, j)].sqrt()).collect();

    Ok(FeFit {
        params: beta.iter().copied().collect(),
        std_errors,
        n_obs: n,
    })
}

fn regressor_names(side: PatentSide) -> Vec<String> {
    let side_col = side.log_column();
    let mut names = vec![side_col.to_string()];
    for k in 1..=3 {
        names.push(lag_name(side_col, k));
    }
    names.push(lag_name(COL::LOG_GDP_PC, 2));
    names.push(lag_name(COL::LOG_GDP_PC, 3));
    names
}

/// Estimate the impulse response of log GDP per capita to the given patent
/// intensity at horizons `0..=max_horizon`. Every horizon gets a slot in the
/// returned sequence; a horizon whose regression cannot be fit is carried as
/// an `Err` rather than dropped.
pub fn estimate(
    features: &DataFrame,
    side: PatentSide,
    max_horizon: usize,
) -> Result<Vec<Result<HorizonResult, GreengrowthError>>, GreengrowthError> {
    let regressors = regressor_names(side);
    let mut results = Vec::with_capacity(max_horizon + 1);
    for horizon in 0..=max_horizon {
        // Change in log GDP from the year before the base period to
        // `horizon` years after it
        let lead = col(COL::LOG_GDP_PC)
            .shift(lit(-(horizon as i64)))
            .over([col(COL::COUNTRY)]);
        let dependent = (lead - col(&lag_name(COL::LOG_GDP_PC, 1))).alias(COL::DELTA_GDP);

        let mut selection = vec![col(COL::COUNTRY), col(COL::YEAR), dependent];
        selection.extend(regressors.iter().map(|name| col(name)));
        let complete = features
            .clone()
            .lazy()
            .sort([COL::COUNTRY, COL::YEAR], SortMultipleOptions::default())
            .select(selection)
            .drop_nulls(None)
            .collect()?;
        debug!(
            "horizon {horizon} ({side}): {} complete rows",
            complete.height()
        );

        match fit_two_way_fe(&complete, COL::DELTA_GDP, &regressors, horizon) {
            Ok(fit) => results.push(Ok(HorizonResult {
                horizon,
                coefficient: fit.params[0],
                std_error: fit.std_errors[0],
                n_obs: fit.n_obs,
            })),
            Err(e @ GreengrowthError::UnderdeterminedModel { .. }) => {
                warn!("horizon {horizon} ({side}): {e}");
                results.push(Err(e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(results)
}

/// Serialize one side's horizon sequence to a frame, failed horizons kept
/// visible through the status column.
pub fn horizon_results_to_df(
    side: PatentSide,
    results: &[Result<HorizonResult, GreengrowthError>],
) -> PolarsResult<DataFrame> {
    let horizons: Vec<u32> = (0..results.len() as u32).collect();
    let coefficients: Vec<Option<f64>> = results
        .iter()
        .map(|r| r.as_ref().ok().map(|fit| fit.coefficient))
        .collect();
    let std_errors: Vec<Option<f64>> = results
        .iter()
        .map(|r| r.as_ref().ok().map(|fit| fit.std_error))
        .collect();
    let n_obs: Vec<Option<u32>> = results
        .iter()
        .map(|r| r.as_ref().ok().map(|fit| fit.n_obs as u32))
        .collect();
    let statuses: Vec<&str> = results
        .iter()
        .map(|r| match r {
            Ok(_) => "ok",
            Err(_) => "underdetermined",
        })
        .collect();
    df!(
        COL::SIDE => vec![side.to_string(); results.len()],
        COL::HORIZON => horizons,
        COL::COEFFICIENT => coefficients,
        COL::STD_ERROR => std_errors,
        COL::N_OBS => n_obs,
        COL::STATUS => statuses,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::construct_features;

    #[test]
    fn test_fit_recovers_slope_under_two_way_effects() {
        // y = 2x + country effect + year effect, exactly; the within
        // estimator must return the slope untouched by either effect.
        let mut countries = Vec::new();
        let mut years = Vec::new();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let names = ["AUT", "BEL", "CHE", "DNK"];
        for (ci, name) in names.iter().enumerate() {
            for t in 0..10 {
                let x = ((ci * 7 + t * 13) % 11) as f64 / 3.0;
                countries.push(*name);
                years.push(2000i32 + t as i32);
                xs.push(x);
                ys.push(2.0 * x + ci as f64 * 5.0 + t as f64 * 0.25);
            }
        }
        let data = df!(
            COL::COUNTRY => countries,
            COL::YEAR => years,
            "y" => ys,
            "x" => xs,
        )
        .unwrap();
        let fit = fit_two_way_fe(&data, "y", &["x".to_string()], 0).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 1e-8, "slope {}", fit.params[0]);
        assert_eq!(fit.n_obs, 40);
        assert!(fit.std_errors[0] >= 0.0);
    }

    fn synthetic_features() -> DataFrame {
        let names = ["USA", "DEU", "JPN", "FRA", "GBR"];
        let mut countries = Vec::new();
        let mut years = Vec::new();
        let mut sides = Vec::new();
        let mut counts = Vec::new();
        let mut gdp = Vec::new();
        for (ci, name) in names.iter().enumerate() {
            for year in 2000i32..=2022 {
                let t = (year - 2000) as usize;
                let green = 1 + ((ci * 3 + t * 5) % 7) as i64;
                let non_green = 1 + ((ci * 2 + t * 3) % 5) as i64;
                let gdp_pc = 1000.0 + 50.0 * ci as f64 + 10.0 * t as f64 + ((ci * t) % 13) as f64;
                for (is_green, count) in [(true, green), (false, non_green)] {
                    countries.push(*name);
                    years.push(year);
                    sides.push(is_green);
                    counts.push(count);
                    gdp.push(gdp_pc);
                }
            }
        }
        let merged = df!(
            COL::COUNTRY => countries,
            COL::YEAR => years,
            COL::IS_GREEN => sides,
            COL::PATENT_COUNT => counts,
            COL::GDP_PER_CAPITA => gdp,
        )
        .unwrap();
        construct_features(&merged, 2006, 2022).unwrap()
    }

    #[test]
    fn test_estimate_returns_every_horizon() {
        let features = synthetic_features();
        for side in [PatentSide::Green, PatentSide::NonGreen] {
            let results = estimate(&features, side, MAX_HORIZON).unwrap();
            assert_eq!(results.len(), MAX_HORIZON + 1);
            for (horizon, result) in results.iter().enumerate() {
                let fit = result
                    .as_ref()
                    .unwrap_or_else(|e| panic!("horizon {horizon} failed: {e}"));
                assert_eq!(fit.horizon, horizon);
                assert!(fit.coefficient.is_finite());
                assert!(fit.std_error.is_finite() && fit.std_error > 0.0);
            }
            // Longer horizons lose lead observations at the end of the panel
            let first = results[0].as_ref().unwrap().n_obs;
            let last = results[MAX_HORIZON].as_ref().unwrap().n_obs;
            assert!(last < first);
        }
    }

    #[test]
    fn test_underdetermined_horizons_are_flagged_in_place() {
        let names = ["USA", "DEU"];
        let mut countries = Vec::new();
        let mut years = Vec::new();
        let mut sides = Vec::new();
        let mut counts = Vec::new();
        let mut gdp = Vec::new();
        for (ci, name) in names.iter().enumerate() {
            for year in 2006i32..=2011 {
                let t = (year - 2006) as usize;
                for (is_green, count) in [(true, 1 + ((ci + t) % 3) as i64), (false, 2i64)] {
                    countries.push(*name);
                    years.push(year);
                    sides.push(is_green);
                    counts.push(count);
                    gdp.push(900.0 + 25.0 * ci as f64 + 5.0 * t as f64);
                }
            }
        }
        let merged = df!(
            COL::COUNTRY => countries,
            COL::YEAR => years,
            COL::IS_GREEN => sides,
            COL::PATENT_COUNT => counts,
            COL::GDP_PER_CAPITA => gdp,
        )
        .unwrap();
        let features = construct_features(&merged, 2006, 2022).unwrap();

        let results = estimate(&features, PatentSide::Green, MAX_HORIZON).unwrap();
        assert_eq!(results.len(), MAX_HORIZON + 1);
        for result in &results {
            assert!(matches!(
                result,
                Err(GreengrowthError::UnderdeterminedModel { .. })
            ));
        }
    }

    #[test]
    fn test_horizon_results_frame_marks_failures() {
        let results = vec![
            Ok(HorizonResult {
                horizon: 0,
                coefficient: 0.5,
                std_error: 0.1,
                n_obs: 40,
            }),
            Err(GreengrowthError::UnderdeterminedModel {
                horizon: 1,
                n_obs: 3,
                n_regressors: 6,
            }),
        ];
        let df = horizon_results_to_df(PatentSide::Green, &results).unwrap();
        assert_eq!(df.height(), 2);
        let statuses = df.column(COL::STATUS).unwrap().str().unwrap();
        assert_eq!(statuses.get(0), Some("ok"));
        assert_eq!(statuses.get(1), Some("underdetermined"));
        let coefficients = df.column(COL::COEFFICIENT).unwrap().f64().unwrap();
        assert!(coefficients.get(1).is_none());
    }
}
