use std::fmt::Write;
use std::path::Path;

use crate::aggregator::DetailedReport;
use crate::models::WeatherReport;
use crate::stats;

pub fn build_markdown(detailed: &DetailedReport, days: i64) -> String {
    let report = &detailed.report;
    let mut output = String::new();

    let _ = writeln!(output, "# Weather Report for {}", report.zip_code);
    let _ = writeln!(
        output,
        "Generated {} (observations since {})",
        report.created_on.format("%Y-%m-%d %H:%M UTC"),
        stats::cutoff_date(days)
    );
    let _ = writeln!(output, "Report id: {}", report.id);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Average high: {:.2} F", report.average_high_f);
    let _ = writeln!(output, "- Average low: {:.2} F", report.average_low_f);
    let _ = writeln!(output, "- Rainfall: {:.1} in", report.rainfall_total_inches);
    let _ = writeln!(output, "- Snowfall: {:.1} in", report.snow_total_inches);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Breakdown");

    if detailed.daily.is_empty() {
        let _ = writeln!(output, "No observations recorded for this window.");
    } else {
        let _ = writeln!(output, "| Date | Low F | High F | Rain in | Snow in |");
        let _ = writeln!(output, "|------|-------|--------|---------|---------|");
        for day in detailed.daily.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                day.date,
                format_temperature(day.low_f),
                format_temperature(day.high_f),
                day.rain_inches.normalize(),
                day.snow_inches.normalize()
            );
        }
    }

    output
}

fn format_temperature(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |t| t.to_string())
}

pub fn build_history(zip: &str, reports: &[WeatherReport]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Report History for {}", zip);

    if reports.is_empty() {
        let _ = writeln!(output, "No reports saved for this zip code.");
        return output;
    }

    for report in reports.iter() {
        let _ = writeln!(
            output,
            "- {} high {:.2} F, low {:.2} F, rain {:.1} in, snow {:.1} in ({})",
            report.created_on.format("%Y-%m-%d %H:%M"),
            report.average_high_f,
            report.average_low_f,
            report.rainfall_total_inches,
            report.snow_total_inches,
            report.id
        );
    }

    output
}

pub fn write_history_csv(reports: &[WeatherReport], path: &Path) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    Ok(reports.len())
}
