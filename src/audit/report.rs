//! CSV export of accounts flagged for removal.

use std::fs::File;
use std::path::Path;

use tracing::debug;

use super::classifier::ClassificationResult;
use crate::error::ReportError;

/// Column order of the report.
pub const HEADER: [&str; 3] = ["UserId", "RoleName", "RequestType"];

/// Write `results` to `path`, replacing any existing file.
///
/// The header is always written, so an empty result set yields a header-only
/// report rather than leaving a previous run's file in place.
pub fn write_report(results: &[ClassificationResult], path: &Path) -> Result<(), ReportError> {
    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(HEADER)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;

    debug!(rows = results.len(), path = %path.display(), "Report written");
    Ok(())
}
