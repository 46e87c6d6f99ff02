use std::fs::File;
use std::path::Path;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use greengrowth::{
    classification::ClassificationSet,
    config::Config,
    countries::CountryCodeNormalizer,
    formatters::{CSVFormatter, JsonFormatter, OutputFormatter, OutputGenerator},
    irf::{horizon_results_to_df, PatentSide},
    merge::read_indicator_csv,
    source::ParquetSource,
    Greengrowth, COL,
};

use crate::display::{display_coverage, display_horizon_results, display_panel_summary};
use crate::error::GreengrowthCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const AGGREGATING_STRING: &str = "Aggregating patent panel";
const PIPELINE_STRING: &str = "Running pipeline";

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
    Stdout,
}

impl From<&OutputFormat> for OutputFormatter {
    fn from(value: &OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter),
            OutputFormat::Json => OutputFormatter::Json(JsonFormatter),
            OutputFormat::Stdout => OutputFormatter::Csv(CSVFormatter),
        }
    }
}

fn write_output<T, U>(
    output_generator: T,
    mut data: DataFrame,
    output_file: Option<U>,
) -> GreengrowthCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    if let Some(output_file) = output_file {
        let mut f = File::create(output_file).context("Failed to write output")?;
        output_generator.save(&mut f, &mut data)?;
    } else {
        let mut stdout_lock = std::io::stdout().lock();
        output_generator.save(&mut stdout_lock, &mut data)?;
    };
    Ok(())
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> GreengrowthCliResult<()>;
}

/// The `panel` command aggregates the joined source relation into the
/// country-year patent panel and outputs it in a given format.
#[derive(Args, Debug)]
pub struct PanelCommand {
    #[arg(
        long,
        value_name = "PARQUET",
        help = "Joined patent source relation to aggregate"
    )]
    source: String,
    #[arg(
        long,
        value_name = "CSV",
        help = "List of qualifying classification codes, one per line"
    )]
    green_codes: String,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for PanelCommand {
    fn run(&self, config: Config) -> GreengrowthCliResult<()> {
        info!("Running `panel` subcommand");
        let green = ClassificationSet::from_csv(&self.green_codes)?;
        let source = ParquetSource::new(&self.source);
        let sp = (!self.quiet).then(|| {
            Spinner::with_timer(
                DEFAULT_PROGRESS_SPINNER,
                AGGREGATING_STRING.to_string() + RUNNING_TAIL_STRING,
            )
        });
        let pipeline = Greengrowth::new_with_config(config);
        let aggregated = pipeline.build_panel(&source, &green)?;
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }
        if !self.quiet {
            display_panel_summary(&aggregated.report, &aggregated.panel)?;
        }
        let formatter: OutputFormatter = (&self.output_format).into();
        write_output(formatter, aggregated.panel, self.output_file.as_deref())?;
        Ok(())
    }
}

/// The `irf` command runs the full pipeline and estimates the impulse
/// response of GDP to green and non-green patent intensity.
#[derive(Args, Debug)]
pub struct IrfCommand {
    #[arg(
        long,
        value_name = "PARQUET",
        help = "Joined patent source relation to aggregate"
    )]
    source: String,
    #[arg(
        long,
        value_name = "CSV",
        help = "List of qualifying classification codes, one per line"
    )]
    green_codes: String,
    #[arg(
        long,
        value_name = "CSV",
        help = "GDP per capita series as (country, year, gdp_per_capita)"
    )]
    gdp: String,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Output format for the horizon results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for IrfCommand {
    fn run(&self, config: Config) -> GreengrowthCliResult<()> {
        info!("Running `irf` subcommand");
        let green = ClassificationSet::from_csv(&self.green_codes)?;
        let indicator = read_indicator_csv(&self.gdp)?;
        let source = ParquetSource::new(&self.source);
        let sp = (!self.quiet).then(|| {
            Spinner::with_timer(
                DEFAULT_PROGRESS_SPINNER,
                PIPELINE_STRING.to_string() + RUNNING_TAIL_STRING,
            )
        });
        let pipeline = Greengrowth::new_with_config(config);
        let output = pipeline.run(&source, &green, &indicator)?;
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }

        if !self.quiet {
            display_horizon_results(PatentSide::Green, &output.green)?;
            display_horizon_results(PatentSide::NonGreen, &output.non_green)?;
        }

        let green_df = horizon_results_to_df(PatentSide::Green, &output.green)?;
        let non_green_df = horizon_results_to_df(PatentSide::NonGreen, &output.non_green)?;
        let combined = green_df.vstack(&non_green_df)?;
        let formatter: OutputFormatter = (&self.output_format).into();
        write_output(formatter, combined, self.output_file.as_deref())?;
        Ok(())
    }
}

/// The `countries` command reports mapping coverage of the raw jurisdiction
/// codes in a previously built panel.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[arg(long, value_name = "CSV", help = "Previously built panel to inspect")]
    panel: String,
}

impl RunCommand for CountriesCommand {
    fn run(&self, _config: Config) -> GreengrowthCliResult<()> {
        info!("Running `countries` subcommand");
        let panel = LazyCsvReader::new(&self.panel)
            .with_has_header(true)
            .finish()?
            .collect()?;
        let (normalized, coverage) = CountryCodeNormalizer::new().normalize_panel(&panel)?;
        let unmapped = normalized
            .lazy()
            .filter(col(COL::COUNTRY).is_null())
            .select([col(COL::RAW_COUNTRY)])
            .unique_stable(None, UniqueKeepStrategy::First)
            .sort([COL::RAW_COUNTRY], SortMultipleOptions::default())
            .collect()?;
        let unmapped_codes = unmapped
            .column(COL::RAW_COUNTRY)?
            .str()?
            .into_no_null_iter()
            .map(|code| code.to_string())
            .collect_vec();
        display_coverage(coverage, &unmapped_codes)?;
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    name = "greengrowth",
    about = "Panel aggregation and impulse-response estimation for green innovation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(short, long, global = true, help = "Suppress progress and tables")]
    pub quiet: bool,
}

#[enum_dispatch(RunCommand)]
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate the source relation into the country-year patent panel
    Panel(PanelCommand),
    /// Run the full pipeline and estimate both impulse responses
    Irf(IrfCommand),
    /// Report country-code mapping coverage for a built panel
    Countries(CountriesCommand),
}
