use std::fmt::Write;

use super::report::{DashboardPage, ForecastOutcome, TickerSection, FORECAST_UNAVAILABLE};

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${:.2}", v))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}%", v))
}

/// Plain-text rendition of the page for the terminal
pub fn terminal_summary(page: &DashboardPage, ma_windows: [usize; 2]) -> String {
    let mut out = String::new();

    for section in &page.sections {
        match section {
            TickerSection::Failed { message, .. } => {
                let _ = writeln!(out, "{}\n", message);
            }
            TickerSection::Report(report) => {
                let s = &report.snapshot;
                let _ = writeln!(out, "=== {} ===", report.heading);
                if let Some(date) = s.last_date {
                    let _ = writeln!(out, "As of {}", date);
                }
                let _ = writeln!(out, "Last close: {} ({})", money(s.last_close), percent(s.change_pct));
                let _ = writeln!(out, "{}-day MA: {}", ma_windows[0], money(s.short_ma));
                let _ = writeln!(out, "{}-day MA: {}", ma_windows[1], money(s.long_ma));

                match &report.forecast {
                    ForecastOutcome::Ready(points) => {
                        let _ = writeln!(out, "Forecast:");
                        for (i, point) in points.iter().enumerate() {
                            let _ = writeln!(out, "Day {}: ${:.2}", i + 1, point.price);
                        }
                    }
                    ForecastOutcome::Unavailable(_) => {
                        let _ = writeln!(out, "{}", FORECAST_UNAVAILABLE);
                    }
                    ForecastOutcome::Disabled => {}
                }
                out.push('\n');
            }
        }
    }

    if !page.watchlist.is_empty() {
        let _ = writeln!(out, "=== Watchlist ===");
        for row in &page.watchlist {
            let snapshot = row.snapshot.as_ref();
            let _ = writeln!(
                out,
                "{:<8} {:>12} {:>9} {}",
                row.symbol,
                money(snapshot.and_then(|s| s.last_close)),
                percent(snapshot.and_then(|s| s.change_pct)),
                row.trend.label()
            );
        }
    }
    out
}
