//! Issue tracking entities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest stored issue summary, in characters.
pub const ISSUE_SUMMARY_MAX_LENGTH: usize = 200;

/// Longest stored diagnostic message, in characters.
pub const ISSUE_DIAGNOSTIC_MAX_LENGTH: usize = 1000;

/// A tracked build break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Issue {
    /// Issue id.
    pub id: i64,
    /// Server time the issue was opened.
    pub created_at: NaiveDateTime,
    /// Server time the issue was read; lets clients compute ages without trusting their clock.
    pub retrieved_at: NaiveDateTime,
    /// Project the break was seen in.
    pub project: String,
    /// Sanitized summary.
    pub summary: String,
    /// Normalized owner name.
    pub owner: Option<String>,
    /// Normalized name of whoever nominated the owner.
    pub nominated_by: Option<String>,
    /// Server time the owner acknowledged the issue.
    pub acknowledged_at: Option<NaiveDateTime>,
    /// Changelist that fixed the break; 0 when none is recorded.
    pub fix_change: i32,
    /// Server time the issue was resolved.
    pub resolved_at: Option<NaiveDateTime>,
    /// Whether the requesting user watches this issue. Only set by per-user listings.
    #[serde(rename = "bNotify")]
    pub notify: bool,
}

impl Issue {
    /// Whether the issue has a resolution timestamp.
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Fields needed to open an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewIssue {
    /// Project the break was seen in.
    pub project: String,
    /// Summary; sanitized before storage.
    pub summary: String,
    /// Optional owner name.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Partial update of an issue. `None` leaves a field untouched.
///
/// `acknowledged` and `resolved` carry intent only: `true` stamps server
/// time, `false` clears the timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct IssuePatch {
    /// New summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// New owner name.
    #[serde(default)]
    pub owner: Option<String>,
    /// New nominator name.
    #[serde(default)]
    pub nominated_by: Option<String>,
    /// Set or clear the acknowledgement.
    #[serde(default)]
    pub acknowledged: Option<bool>,
    /// New fix changelist.
    #[serde(default)]
    pub fix_change: Option<i32>,
    /// Set or clear the resolution.
    #[serde(default)]
    pub resolved: Option<bool>,
}

impl IssuePatch {
    /// Whether the patch touches no field at all.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.owner.is_none()
            && self.nominated_by.is_none()
            && self.acknowledged.is_none()
            && self.fix_change.is_none()
            && self.resolved.is_none()
    }
}

/// A stored diagnostic attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct IssueDiagnostic {
    /// Issue build the diagnostic was captured from.
    pub build_id: Option<i64>,
    /// Sanitized message.
    pub message: String,
    /// Link to the full log.
    pub url: String,
}

/// A diagnostic to attach. Same shape as the stored record.
pub type NewIssueDiagnostic = IssueDiagnostic;

/// A CI job step associated with an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct IssueBuild {
    /// Build id.
    pub id: i64,
    /// Stream the job ran against.
    pub stream: String,
    /// Change the job built.
    pub change: i32,
    /// Job name.
    pub job_name: String,
    /// Job link.
    pub job_url: String,
    /// Step name.
    pub job_step_name: String,
    /// Step link.
    pub job_step_url: String,
    /// Link to the first error, if known.
    pub error_url: Option<String>,
    /// Outcome code.
    pub outcome: i32,
}

/// A CI job step to associate with an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewIssueBuild {
    /// Stream the job ran against.
    pub stream: String,
    /// Change the job built.
    pub change: i32,
    /// Job name.
    pub job_name: String,
    /// Job link.
    pub job_url: String,
    /// Step name.
    pub job_step_name: String,
    /// Step link.
    pub job_step_url: String,
    /// Link to the first error, if known.
    #[serde(default)]
    pub error_url: Option<String>,
    /// Outcome code.
    pub outcome: i32,
}

#[cfg(test)]
mod tests {
    use super::IssuePatch;

    #[test]
    fn patch_reports_emptiness() {
        assert!(IssuePatch::default().is_empty());
        let patch = IssuePatch {
            resolved: Some(false),
            ..IssuePatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_deserializes_missing_fields_as_untouched() {
        let patch: IssuePatch =
            serde_json::from_str(r#"{"Acknowledged":true,"FixChange":4411}"#).expect("patch");
        assert_eq!(patch.acknowledged, Some(true));
        assert_eq!(patch.fix_change, Some(4411));
        assert_eq!(patch.summary, None);
        assert_eq!(patch.resolved, None);
    }
}
