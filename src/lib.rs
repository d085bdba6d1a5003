//! signalq: fetch daily optical-signal-quality files from a remote host,
//! flatten them into per-(lab, metric) time series, fit a linear trend per
//! series, and serve a local dashboard.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod parse;
pub mod pipeline;
pub mod quality;
pub mod remote;
pub mod series;
pub mod trend;
