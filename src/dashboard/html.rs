// External crates
use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

// Internal modules
use super::report::{
    section_heading, DashboardPage, ForecastOutcome, TickerSection, FORECAST_UNAVAILABLE,
};
use super::watchlist::WatchlistRow;
use crate::built_info;
use crate::charts::vega::Chart;

const VEGA_SCRIPTS: [&str; 3] = [
    "https://cdn.jsdelivr.net/npm/vega@5",
    "https://cdn.jsdelivr.net/npm/vega-lite@5",
    "https://cdn.jsdelivr.net/npm/vega-embed@6",
];

const STYLE: &str = "body{font-family:sans-serif;margin:2rem;color:#222}\
section{margin-bottom:3rem}\
.error{color:#b00020;font-weight:bold}\
.notice{color:#8a6d00}\
table{border-collapse:collapse}\
td,th{padding:.3rem .8rem;border-bottom:1px solid #ddd;text-align:right}\
td:first-child,th:first-child{text-align:left}\
footer{color:#888;font-size:.8rem}";

/// Escapes text for use in HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Serialises a chart spec for inline `<script>` use. `</` is escaped so a
/// value can never close the script element.
fn script_json(chart: &Chart) -> Result<String> {
    let json = serde_json::to_string(&chart.spec).context("Failed to serialise chart spec")?;
    Ok(json.replace("</", "<\\/"))
}

fn embed_chart(out: &mut String, scripts: &mut String, section_id: &str, chart: &Chart) -> Result<()> {
    let element_id = format!("{}-{}", section_id, chart.id);
    let _ = writeln!(out, "<div id=\"{}\" class=\"chart\"></div>", escape_html(&element_id));
    let _ = writeln!(
        scripts,
        "vegaEmbed({}, {}, {{\"actions\": false}});",
        serde_json::to_string(&format!("#{}", element_id))?,
        script_json(chart)?
    );
    Ok(())
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${:.2}", v))
}

fn watchlist_table(out: &mut String, rows: &[WatchlistRow]) {
    out.push_str("<section id=\"watchlist\">\n<h2>Watchlist</h2>\n<table>\n");
    out.push_str("<tr><th>Ticker</th><th>Close</th><th>Change</th><th>MA short</th><th>MA long</th><th>Trend</th></tr>\n");
    for row in rows {
        let s = row.snapshot.as_ref();
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.symbol),
            money(s.and_then(|s| s.last_close)),
            s.and_then(|s| s.change_pct)
                .map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}%", v)),
            money(s.and_then(|s| s.short_ma)),
            money(s.and_then(|s| s.long_ma)),
            row.trend.label()
        );
    }
    out.push_str("</table>\n</section>\n");
}

/// Renders the page as a standalone HTML document
pub fn render_html(page: &DashboardPage) -> Result<String> {
    let mut body = String::new();
    let mut scripts = String::new();

    for (index, section) in page.sections.iter().enumerate() {
        let section_id = format!("ticker-{}", index);
        let _ = writeln!(body, "<section id=\"{}\">", section_id);
        match section {
            TickerSection::Failed { symbol, message } => {
                let _ = writeln!(body, "<h2>{}</h2>", escape_html(&section_heading(symbol)));
                let _ = writeln!(body, "<p class=\"error\">{}</p>", escape_html(message));
            }
            TickerSection::Report(report) => {
                let _ = writeln!(body, "<h2>{}</h2>", escape_html(&report.heading));
                for chart in &report.charts {
                    embed_chart(&mut body, &mut scripts, &section_id, chart)?;
                }
                match (&report.forecast, &report.forecast_chart) {
                    (ForecastOutcome::Ready(_), Some(chart)) => {
                        embed_chart(&mut body, &mut scripts, &section_id, chart)?;
                    }
                    (ForecastOutcome::Unavailable(_), _) => {
                        let _ = writeln!(body, "<p class=\"notice\">{}</p>", FORECAST_UNAVAILABLE);
                    }
                    _ => {}
                }
            }
        }
        body.push_str("</section>\n");
    }

    if !page.watchlist.is_empty() {
        watchlist_table(&mut body, &page.watchlist);
    }

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Stock Dashboard</title>\n");
    for src in VEGA_SCRIPTS {
        let _ = writeln!(html, "<script src=\"{}\"></script>", src);
    }
    let _ = writeln!(html, "<style>{}</style>\n</head>\n<body>", STYLE);
    let _ = writeln!(html, "<h1>Stock Dashboard</h1>\n<p>Generated on {}</p>", page.generated_on);
    html.push_str(&body);
    let _ = writeln!(
        html,
        "<footer>{} v{} ({} build, {})</footer>",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE,
        built_info::RUSTC_VERSION
    );
    let _ = writeln!(html, "<script>\n{}</script>\n</body>\n</html>", scripts);
    Ok(html)
}

/// Writes the page to `{output_dir}/index.html` and returns the path
pub fn write_dashboard(page: &DashboardPage, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join("index.html");
    std::fs::write(&path, render_html(page)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Dashboard written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::report::TickerReport;
    use crate::dashboard::watchlist::{PriceSnapshot, Trend};
    use chrono::NaiveDate;
    use polars::prelude::DataFrame;
    use serde_json::json;
    use tempfile::tempdir;

    fn report(forecast: ForecastOutcome, charts: Vec<Chart>) -> TickerSection {
        TickerSection::Report(Box::new(TickerReport {
            symbol: "AAPL".into(),
            heading: "Stock Price Analysis for AAPL".into(),
            recent: DataFrame::empty(),
            snapshot: PriceSnapshot {
                last_date: None,
                last_close: Some(1.0),
                change_pct: None,
                short_ma: None,
                long_ma: None,
            },
            charts,
            forecast,
            forecast_chart: None,
        }))
    }

    fn page(sections: Vec<TickerSection>) -> DashboardPage {
        DashboardPage {
            generated_on: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            sections,
            watchlist: Vec::new(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"A&B\"</b>'"),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;&#39;"
        );
    }

    #[test]
    fn test_render_embeds_charts() {
        let chart = Chart::new("closing-price", "Closing", json!({ "title": "</script><b>" }));
        let html = render_html(&page(vec![report(ForecastOutcome::Disabled, vec![chart])])).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("vega-embed@6"));
        assert!(html.contains("<div id=\"ticker-0-closing-price\""));
        assert!(html.contains("vegaEmbed(\"#ticker-0-closing-price\""));
        assert!(html.contains("<\\/script><b>"));
        // Only the closing tag of the page's own script block remains
        assert_eq!(html.matches("</script>\n</body>").count(), 1);
        assert!(html.contains(built_info::PKG_VERSION));
        assert!(!html.contains(FORECAST_UNAVAILABLE));
    }

    #[test]
    fn test_render_error_and_unavailable_forecast() {
        let failed = TickerSection::Failed {
            symbol: "<X>".into(),
            message: "Error occurred while fetching data for <X>.".into(),
        };
        let html = render_html(&page(vec![
            failed,
            report(ForecastOutcome::Unavailable("no model".into()), Vec::new()),
        ]))
        .unwrap();

        assert!(html.contains("<h2>Stock Price Analysis for &lt;X&gt;</h2>"));
        assert!(html.contains("Error occurred while fetching data for &lt;X&gt;."));
        assert!(!html.contains("<X>"));
        assert!(html.contains(FORECAST_UNAVAILABLE));
        assert!(!html.contains("no model"));
    }

    #[test]
    fn test_render_watchlist_and_write() {
        let mut page = page(Vec::new());
        page.watchlist.push(WatchlistRow {
            symbol: "NFLX".into(),
            snapshot: None,
            trend: Trend::Unknown,
        });

        let dir = tempdir().unwrap();
        let path = write_dashboard(&page, &dir.path().join("out")).unwrap();
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("<h2>Watchlist</h2>"));
        assert!(html.contains("<td>NFLX</td>"));
    }
}
