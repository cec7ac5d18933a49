pub mod constants;
#[cfg(test)]
pub mod test;
pub mod charts {
    pub mod price_charts;
    pub mod vega;
}
pub mod dashboard {
    pub mod html;
    pub mod report;
    pub mod summary;
    pub mod watchlist;
}
pub mod forecast;
pub mod market_data {
    pub mod csv_source;
    pub mod history;
    pub mod yahoo;
}
pub mod util {
    pub mod config;
    pub mod feature_engineering;
    #[cfg(test)]
    pub mod test_utils;
}

/// Build metadata generated by `build.rs`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
