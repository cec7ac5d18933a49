// External imports
use burn_ndarray::{NdArray, NdArrayDevice};
use chrono::NaiveDate;
use tempfile::tempdir;

// Internal imports
use crate::dashboard::html::{render_html, write_dashboard};
use crate::dashboard::report::{Dashboard, ForecastOutcome, TickerSection};
use crate::dashboard::summary::terminal_summary;
use crate::dashboard::watchlist::Trend;
use crate::forecast::step_2_min_max_scaler::MinMaxScaler;
use crate::forecast::step_3_lstm_model_arch::{PriceLstm, PriceLstmConfig};
use crate::forecast::step_4_model_serialization::{
    save_model_with_metadata, ModelArtifacts, ModelMetadata,
};
use crate::market_data::csv_source::CsvDirectory;
use crate::util::config::DashboardConfig;
use crate::util::test_utils::{generate_quotes, write_quotes_csv};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()
}

#[test]
fn test_full_dashboard_with_forecast() {
    let data = tempdir().unwrap();
    let models = tempdir().unwrap();
    let output = tempdir().unwrap();

    for (i, symbol) in ["AAPL", "TSLA", "MSFT", "NFLX", "NVDA"].iter().enumerate() {
        write_quotes_csv(data.path(), symbol, &generate_quotes(260, i as u64));
    }

    // Shared model used for every ticker
    let device = NdArrayDevice::Cpu;
    let config = PriceLstmConfig {
        hidden_size: 8,
        second_hidden_size: 8,
        dense_size: 4,
        ..PriceLstmConfig::default()
    };
    let model: PriceLstm<NdArray> = config.init(&device);
    let artifacts = ModelArtifacts::for_prefix(models.path(), "default");
    save_model_with_metadata(&model, &ModelMetadata::new(config, 60, None), &artifacts.model_path).unwrap();
    MinMaxScaler::fit(&[80.0, 200.0]).unwrap().save(&artifacts.scaler_path).unwrap();

    let mut config = DashboardConfig::default();
    config.model_dir = models.path().to_path_buf();
    config.forecast_days = 10;
    let dashboard = Dashboard::new(config, Box::new(CsvDirectory::new(data.path())), today());
    let page = dashboard.build(Some("tsla"));

    let symbols: Vec<&str> = page.sections.iter().map(|s| s.symbol()).collect();
    assert_eq!(symbols, vec!["TSLA", "AAPL"]);
    for section in &page.sections {
        match section {
            TickerSection::Report(report) => {
                assert_eq!(report.charts.len(), 4);
                match &report.forecast {
                    ForecastOutcome::Ready(points) => assert_eq!(points.len(), 10),
                    other => panic!("unexpected forecast outcome {:?}", other),
                }
                assert!(report.forecast_chart.is_some());
            }
            TickerSection::Failed { symbol, .. } => panic!("{} failed", symbol),
        }
    }

    assert_eq!(page.watchlist.len(), 5);
    assert!(page.watchlist.iter().all(|row| row.snapshot.is_some()));
    assert!(page.watchlist.iter().all(|row| row.trend != Trend::Unknown));

    let path = write_dashboard(&page, output.path()).unwrap();
    let html = std::fs::read_to_string(path).unwrap();
    assert!(html.contains("Stock Price Analysis for TSLA"));
    assert!(html.contains("ticker-1-forecast"));
    assert!(html.contains("100 & 200 Moving Average by Days"));

    let summary = terminal_summary(&page, [100, 200]);
    assert!(summary.contains("Day 10: $"));
    assert!(!summary.contains("Day 11:"));
}

#[test]
fn test_dashboard_survives_bad_ticker_and_missing_models() {
    let data = tempdir().unwrap();
    let models = tempdir().unwrap();
    write_quotes_csv(data.path(), "AAPL", &generate_quotes(150, 9));

    let mut config = DashboardConfig::default();
    config.model_dir = models.path().to_path_buf();
    config.watchlist = vec!["AAPL".into(), "ZZZZ".into()];
    let dashboard = Dashboard::new(config, Box::new(CsvDirectory::new(data.path())), today());
    let page = dashboard.build(Some("bad ticker!"));

    assert_eq!(page.sections.len(), 2);
    assert!(matches!(&page.sections[0], TickerSection::Failed { message, .. }
        if message == "Error occurred while fetching data for BAD TICKER!. Please check the ticker and try again."));

    match &page.sections[1] {
        TickerSection::Report(report) => {
            assert!(matches!(report.forecast, ForecastOutcome::Unavailable(_)));
            // 150 rows: the 200-day average never fills
            assert!(report.snapshot.long_ma.is_none());
            assert!(report.snapshot.short_ma.is_some());
        }
        TickerSection::Failed { .. } => panic!("AAPL should load"),
    }

    assert_eq!(page.watchlist[0].trend, Trend::Unknown);
    assert!(page.watchlist[1].snapshot.is_none());

    let html = render_html(&page).unwrap();
    assert!(html.contains("<h2>Stock Price Analysis for BAD TICKER!</h2>"));
    assert!(html.contains("Forecast unavailable"));
}

#[test]
fn test_unusable_shared_model_keeps_page_rendering() {
    let data = tempdir().unwrap();
    let models = tempdir().unwrap();
    write_quotes_csv(data.path(), "AAPL", &generate_quotes(120, 3));
    write_quotes_csv(data.path(), "MSFT", &generate_quotes(120, 4));

    let config = PriceLstmConfig {
        hidden_size: 4,
        second_hidden_size: 4,
        dense_size: 2,
        output_size: 2,
        ..PriceLstmConfig::default()
    };
    let model: PriceLstm<NdArray> = config.clone().init(&NdArrayDevice::Cpu);
    let artifacts = ModelArtifacts::for_prefix(models.path(), "default");
    save_model_with_metadata(&model, &ModelMetadata::new(config, 60, None), &artifacts.model_path).unwrap();
    MinMaxScaler::fit(&[80.0, 200.0]).unwrap().save(&artifacts.scaler_path).unwrap();

    let mut config = DashboardConfig::default();
    config.model_dir = models.path().to_path_buf();
    config.watchlist_enabled = false;
    let dashboard = Dashboard::new(config, Box::new(CsvDirectory::new(data.path())), today());
    let page = dashboard.build(Some("MSFT"));

    assert_eq!(page.sections.len(), 2);
    for section in &page.sections {
        match section {
            TickerSection::Report(report) => {
                assert!(matches!(report.forecast, ForecastOutcome::Unavailable(_)));
                assert_eq!(report.charts.len(), 4);
            }
            TickerSection::Failed { symbol, .. } => panic!("{} failed", symbol),
        }
    }
    let html = render_html(&page).unwrap();
    assert!(html.contains("Stock Price Analysis for MSFT"));
    assert!(html.contains("Stock Price Analysis for AAPL"));
}
