use comfy_table::{presets::NOTHING, *};
use polars::frame::DataFrame;

use greengrowth::aggregate::AggregationReport;
use greengrowth::countries::MappingCoverage;
use greengrowth::error::GreengrowthError;
use greengrowth::irf::{HorizonResult, PatentSide};

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

pub fn display_horizon_results(
    side: PatentSide,
    results: &[Result<HorizonResult, GreengrowthError>],
) -> anyhow::Result<()> {
    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("Horizon").add_attribute(Attribute::Bold),
        Cell::new("Coefficient").add_attribute(Attribute::Bold),
        Cell::new("Robust SE").add_attribute(Attribute::Bold),
        Cell::new("95% band").add_attribute(Attribute::Bold),
        Cell::new("Obs").add_attribute(Attribute::Bold),
    ]);
    for (horizon, result) in results.iter().enumerate() {
        match result {
            Ok(fit) => {
                let lower = fit.coefficient - 1.96 * fit.std_error;
                let upper = fit.coefficient + 1.96 * fit.std_error;
                table.add_row(vec![
                    horizon.to_string(),
                    format!("{:.6}", fit.coefficient),
                    format!("{:.6}", fit.std_error),
                    format!("[{lower:.6}, {upper:.6}]"),
                    fit.n_obs.to_string(),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    horizon.to_string(),
                    format!("{e}"),
                    String::new(),
                    String::new(),
                    String::new(),
                ]);
            }
        }
    }
    println!("\nImpulse response of GDP to {side} patent intensity");
    println!("{}", table);
    Ok(())
}

pub fn display_coverage(coverage: MappingCoverage, unmapped_codes: &[String]) -> anyhow::Result<()> {
    let mut table = styled_table();
    table
        .add_row(vec![
            Cell::new("Mapped codes").add_attribute(Attribute::Bold),
            coverage.mapped.to_string().into(),
        ])
        .add_row(vec![
            Cell::new("Unmapped codes").add_attribute(Attribute::Bold),
            coverage.unmapped.to_string().into(),
        ]);
    let column = table.column_mut(0).unwrap();
    column.set_cell_alignment(CellAlignment::Right);
    println!("\n{}", table);
    if !unmapped_codes.is_empty() {
        println!("Unmapped: {}", unmapped_codes.join(", "));
    }
    Ok(())
}

pub fn display_panel_summary(report: &AggregationReport, panel: &DataFrame) -> anyhow::Result<()> {
    let mut table = styled_table();
    table
        .add_row(vec![
            Cell::new("Source rows").add_attribute(Attribute::Bold),
            report.total_rows.to_string().into(),
        ])
        .add_row(vec![
            Cell::new("Aggregated rows").add_attribute(Attribute::Bold),
            report.kept_rows.to_string().into(),
        ])
        .add_row(vec![
            Cell::new("Dropped (missing fields)").add_attribute(Attribute::Bold),
            report.dropped_missing_fields.to_string().into(),
        ])
        .add_row(vec![
            Cell::new("Dropped (unparseable date)").add_attribute(Attribute::Bold),
            report.dropped_unparseable_date.to_string().into(),
        ])
        .add_row(vec![
            Cell::new("Panel rows").add_attribute(Attribute::Bold),
            panel.height().to_string().into(),
        ]);
    let column = table.column_mut(0).unwrap();
    column.set_cell_alignment(CellAlignment::Right);
    println!("\n{}", table);
    Ok(())
}
