//! Feed and telemetry entities.
//!
//! Wire names are PascalCase so the desktop client can exchange these types
//! without a translation layer.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::MetadataError;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Stable storage label.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = MetadataError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let value = value.trim_end();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(value))
                    .ok_or_else(|| {
                        MetadataError::InvalidInput(format!(
                            "unknown {} '{value}'",
                            stringify!($name)
                        ))
                    })
            }
        }
    };
}

text_enum! {
    /// A user's verdict on a change.
    VoteVerdict {
        /// The user is syncing the change.
        Syncing => "Syncing",
        /// The change compiles locally.
        Compiles => "Compiles",
        /// The change fails to compile locally.
        DoesNotCompile => "DoesNotCompile",
        /// The change was marked good.
        Good => "Good",
        /// The change was marked bad.
        Bad => "Bad",
        /// A previous verdict was withdrawn.
        Unknown => "Unknown",
        /// The change was starred.
        Starred => "Starred",
        /// A star was removed.
        Unstarred => "Unstarred",
        /// Someone is investigating a problem at this change.
        Investigating => "Investigating",
        /// An investigation was closed.
        Resolved => "Resolved",
    }
}

text_enum! {
    /// Outcome reported by a CI badge.
    BuildResult {
        /// The build is running.
        Starting => "Starting",
        /// The build failed.
        Failure => "Failure",
        /// The build passed with warnings.
        Warning => "Warning",
        /// The build passed.
        Success => "Success",
        /// The build was skipped.
        Skipped => "Skipped",
    }
}

text_enum! {
    /// Category of a client error report.
    ErrorKind {
        /// The client crashed.
        Crash => "Crash",
    }
}

/// A stored vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Vote {
    /// Monotonic vote id.
    pub id: i64,
    /// Change number voted on.
    pub change: i32,
    /// Name of the voting user.
    pub user_name: String,
    /// The verdict.
    pub verdict: VoteVerdict,
    /// Project the vote was cast in.
    pub project: String,
}

/// A vote to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewVote {
    /// Change number voted on.
    pub change: i32,
    /// Name of the voting user.
    pub user_name: String,
    /// The verdict.
    pub verdict: VoteVerdict,
    /// Project the vote is cast in.
    pub project: String,
}

/// A stored comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Comment {
    /// Monotonic comment id.
    pub id: i64,
    /// Change number commented on.
    pub change_number: i32,
    /// Author name.
    pub user_name: String,
    /// Free-text body.
    pub text: String,
    /// Project the comment belongs to.
    pub project: String,
}

/// A comment to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewComment {
    /// Change number commented on.
    pub change_number: i32,
    /// Author name.
    pub user_name: String,
    /// Free-text body.
    pub text: String,
    /// Project the comment belongs to.
    pub project: String,
}

/// A stored CI badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Build {
    /// Monotonic build id.
    pub id: i64,
    /// Change number the badge is attached to.
    pub change_number: i32,
    /// Badge label, for example `Editor`.
    pub build_type: String,
    /// Reported outcome.
    pub result: BuildResult,
    /// Link to the CI job.
    pub url: String,
    /// Optional archive location of build products.
    pub archive_path: Option<String>,
    /// Project scope; `None` applies to every project.
    pub project: Option<String>,
}

/// A CI badge to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewBuild {
    /// Change number the badge is attached to.
    pub change_number: i32,
    /// Badge label.
    pub build_type: String,
    /// Reported outcome.
    pub result: BuildResult,
    /// Link to the CI job.
    pub url: String,
    /// Optional archive location of build products.
    #[serde(default)]
    pub archive_path: Option<String>,
    /// Project scope; `None` applies to every project.
    #[serde(default)]
    pub project: Option<String>,
}

/// Resume points for a client catching up on a project's feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct LatestIds {
    /// Watermark for votes.
    pub last_event_id: i64,
    /// Watermark for comments.
    pub last_comment_id: i64,
    /// Watermark for builds.
    pub last_build_id: i64,
}

/// Client build and address attached to every telemetry write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientOrigin {
    /// Client version string.
    pub version: String,
    /// Address the report came from.
    pub ip_address: String,
}

/// A stored client error report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorEvent {
    /// Error id.
    pub id: i64,
    /// Error category.
    #[serde(rename = "Type")]
    pub kind: ErrorKind,
    /// Error text, usually a stack trace.
    pub text: String,
    /// Reporting user.
    pub user_name: String,
    /// Project the client had open, if any.
    pub project: Option<String>,
    /// Client-side timestamp.
    pub timestamp: NaiveDateTime,
    /// Client version.
    pub version: String,
    /// Origin address.
    pub ip_address: String,
}

/// A client error report to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewErrorEvent {
    /// Error category.
    #[serde(rename = "Type")]
    pub kind: ErrorKind,
    /// Error text.
    pub text: String,
    /// Reporting user.
    pub user_name: String,
    /// Project the client had open, if any.
    #[serde(default)]
    pub project: Option<String>,
    /// Client-side timestamp.
    pub timestamp: NaiveDateTime,
}

/// A client timing sample to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NewTimingEvent {
    /// Timed action, for example `Sync`.
    pub action: String,
    /// Action result label.
    pub result: String,
    /// Reporting user.
    pub user_name: String,
    /// Project the action ran against.
    pub project: String,
    /// Client-side timestamp.
    pub timestamp: NaiveDateTime,
    /// Duration in seconds.
    pub duration: f32,
}
