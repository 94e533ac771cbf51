//! Append-only timing and error telemetry.

use crate::domain::{ClientOrigin, ErrorEvent, NewErrorEvent, NewTimingEvent};
use crate::error::Result;
use crate::service::MetadataService;

impl MetadataService {
    /// Store a timing sample, registering its project on first use.
    pub fn record_timing(&self, event: &NewTimingEvent, origin: &ClientOrigin) -> Result<u64> {
        let project_id = self.resolve_project(&event.project)?;
        self.store.insert_timing(event, project_id, origin)
    }

    /// Store an error report. Reports without a project store no project at all.
    pub fn record_error(&self, event: &NewErrorEvent, origin: &ClientOrigin) -> Result<u64> {
        let project_id = match event.project.as_deref() {
            Some(project) => Some(self.resolve_project(project)?),
            None => None,
        };
        self.store.insert_error(event, project_id, origin)
    }

    /// The `count` most recent error reports, newest first.
    pub fn recent_errors(&self, count: usize) -> Result<Vec<ErrorEvent>> {
        self.store.recent_errors(count)
    }
}
