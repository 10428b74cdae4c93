//! Drivers for the pipeline stages: downloading raw extracts, aggregating
//! them per boundary and importing the aggregates into DHIS2.

pub mod aggregate;
pub mod extract;
pub mod import;

pub use aggregate::AggregationDriver;
pub use extract::ExtractionDriver;
pub use import::ImportDriver;

use crate::error::Result;
use crate::utils::reporter::RunReporter;

/// Forward an error to the run reporter before handing it back to the caller.
pub(crate) fn reported<T>(reporter: &dyn RunReporter, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        reporter.error(&e.to_string());
    }
    result
}
