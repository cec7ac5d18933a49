/// Cross-module test suites
///
/// * `forecast_pipeline_tests` - Saved LSTM weights and scaler loaded from a model
///   directory and run through the autoregressive forecast
/// * `dashboard_tests` - Full page builds from offline CSV data, including HTML
///   rendering and the terminal summary
///
/// Everything runs offline on generated price series.
pub mod dashboard_tests;
