use feedwatch_timeseries::TimeseriesError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
#[error("Timeseries write rejected")]
pub struct Error;

impl TimeseriesError for Error {}
