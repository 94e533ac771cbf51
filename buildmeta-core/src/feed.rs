//! Incremental feed of votes, comments and build badges.
//!
//! Clients poll with the highest id they have seen. On first contact they ask
//! for [`MetadataService::last_ids`], which points roughly a hundred changes
//! back so the initial catch-up stays bounded however long the history is.

use std::collections::BTreeMap;

use log::debug;

use crate::domain::{Build, Comment, LatestIds, NewBuild, NewComment, NewVote, Vote};
use crate::error::Result;
use crate::project::{matches_project, project_pattern, same_project};
use crate::service::MetadataService;
use crate::store::FeedKind;

/// Number of distinct changes a fresh client catches up on.
pub const WATERMARK_WINDOW: usize = 100;

/// A change number together with the id of its first feed entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChangeMark {
    /// Change number.
    pub change: i32,
    /// Smallest entry id recorded for the change.
    pub id: i64,
}

/// Group entries by change, keep the smallest id per change, and return the
/// `window` highest change numbers, newest first.
pub fn recent_distinct_changes(
    entries: impl IntoIterator<Item = ChangeMark>,
    window: usize,
) -> Vec<ChangeMark> {
    let mut first_ids: BTreeMap<i32, i64> = BTreeMap::new();
    for entry in entries {
        first_ids
            .entry(entry.change)
            .and_modify(|id| *id = (*id).min(entry.id))
            .or_insert(entry.id);
    }
    first_ids
        .into_iter()
        .rev()
        .take(window)
        .map(|(change, id)| ChangeMark { change, id })
        .collect()
}

/// Id of the oldest change in a window, or 0 for an empty window.
pub fn oldest_in_window(window: &[ChangeMark]) -> i64 {
    window
        .iter()
        .min_by_key(|mark| mark.change)
        .map(|mark| mark.id)
        .unwrap_or(0)
}

impl MetadataService {
    /// Resume points for votes, comments and builds of a project, or of every
    /// project when `project` is `None`.
    pub fn last_ids(&self, project: Option<&str>) -> Result<LatestIds> {
        let pattern = project_pattern(project);
        let watermark = |kind| -> Result<i64> {
            let window = self
                .store
                .recent_changes(kind, &pattern, WATERMARK_WINDOW)?;
            Ok(oldest_in_window(&window))
        };
        Ok(LatestIds {
            last_event_id: watermark(FeedKind::Votes)?,
            last_comment_id: watermark(FeedKind::Comments)?,
            last_build_id: watermark(FeedKind::Builds)?,
        })
    }

    /// Votes newer than `last_id` cast in exactly `project`.
    pub fn votes_since(&self, project: &str, last_id: i64) -> Result<Vec<Vote>> {
        let votes: Vec<Vote> = self
            .store
            .votes_after(&project_pattern(Some(project)), last_id)?
            .into_iter()
            .filter(|vote| same_project(&vote.project, project))
            .collect();
        debug!("{} votes after {last_id} for {project}", votes.len());
        Ok(votes)
    }

    /// Comments newer than `last_id` left in exactly `project`.
    pub fn comments_since(&self, project: &str, last_id: i64) -> Result<Vec<Comment>> {
        let comments: Vec<Comment> = self
            .store
            .comments_after(&project_pattern(Some(project)), last_id)?
            .into_iter()
            .filter(|comment| same_project(&comment.project, project))
            .collect();
        debug!("{} comments after {last_id} for {project}", comments.len());
        Ok(comments)
    }

    /// Builds newer than `last_id` that apply to `project`, including
    /// unscoped badges and wildcard badges covering it.
    pub fn builds_since(&self, project: &str, last_id: i64) -> Result<Vec<Build>> {
        let builds: Vec<Build> = self
            .store
            .builds_after(&project_pattern(Some(project)), last_id)?
            .into_iter()
            .filter(|build| matches_project(build.project.as_deref(), project))
            .collect();
        debug!("{} builds after {last_id} for {project}", builds.len());
        Ok(builds)
    }

    /// Append a vote.
    pub fn post_vote(&self, vote: &NewVote) -> Result<u64> {
        let project_id = self.resolve_project(&vote.project)?;
        self.store.insert_vote(vote, project_id)
    }

    /// Append a comment.
    pub fn post_comment(&self, comment: &NewComment) -> Result<u64> {
        let project_id = self.resolve_project(&comment.project)?;
        self.store.insert_comment(comment, project_id)
    }

    /// Append a build badge. Badges without a project apply everywhere.
    pub fn post_build(&self, build: &NewBuild) -> Result<u64> {
        let project_id = match build.project.as_deref() {
            Some(project) => Some(self.resolve_project(project)?),
            None => None,
        };
        self.store.insert_build(build, project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildResult, VoteVerdict};

    fn mark(change: i32, id: i64) -> ChangeMark {
        ChangeMark { change, id }
    }

    fn badge(change_number: i32, project: Option<&str>) -> NewBuild {
        NewBuild {
            change_number,
            build_type: "Editor".to_string(),
            result: BuildResult::Success,
            url: format!("https://ci.example.com/{change_number}"),
            archive_path: None,
            project: project.map(str::to_string),
        }
    }

    #[test]
    fn window_keeps_first_id_per_change() {
        let window = recent_distinct_changes(
            [mark(10, 1), mark(11, 2), mark(10, 3), mark(12, 4), mark(11, 5)],
            100,
        );
        assert_eq!(window, vec![mark(12, 4), mark(11, 2), mark(10, 1)]);
        assert_eq!(oldest_in_window(&window), 1);
    }

    #[test]
    fn window_is_bounded_by_change_not_by_id() {
        // 150 entries over 120 changes: changes 1..=30 appear twice.
        let mut entries = Vec::new();
        let mut id = 0;
        for change in 1..=120 {
            id += 1;
            entries.push(mark(change * 10, id));
        }
        for change in 1..=30 {
            id += 1;
            entries.push(mark(change * 10, id));
        }
        assert_eq!(entries.len(), 150);

        let window = recent_distinct_changes(entries, WATERMARK_WINDOW);
        assert_eq!(window.len(), 100);
        // The oldest change still in the window is change 210, first seen as id 21.
        assert_eq!(oldest_in_window(&window), 21);
        assert_ne!(oldest_in_window(&window), 150 - 100);
    }

    #[test]
    fn empty_window_yields_zero() {
        assert_eq!(oldest_in_window(&[]), 0);
        assert!(recent_distinct_changes([], 100).is_empty());
    }

    #[test]
    fn last_ids_track_each_feed_independently() {
        let service = MetadataService::in_memory();
        for change in 1..=150 {
            service
                .post_build(&badge(1000 + change, Some("//UE5/Main")))
                .expect("post build");
        }
        service
            .post_vote(&NewVote {
                change: 1001,
                user_name: "alice".to_string(),
                verdict: VoteVerdict::Good,
                project: "//UE5/Main".to_string(),
            })
            .expect("post vote");

        let latest = service.last_ids(Some("//UE5/Main/Samples")).expect("last ids");
        assert_eq!(latest.last_build_id, 51);
        assert_eq!(latest.last_event_id, 1);
        assert_eq!(latest.last_comment_id, 0);

        let other = service.last_ids(Some("//UE5/Release")).expect("last ids");
        assert_eq!(other, LatestIds::default());
    }

    #[test]
    fn last_ids_cover_every_project_without_filter() {
        let service = MetadataService::in_memory();
        service.post_build(&badge(5, Some("//A/Main"))).expect("post");
        service.post_build(&badge(6, Some("//B/Main"))).expect("post");
        assert_eq!(service.last_ids(None).expect("last ids").last_build_id, 1);
    }

    #[test]
    fn builds_since_applies_three_way_match() {
        let service = MetadataService::in_memory();
        service.post_build(&badge(1, Some("//UE5/Main"))).expect("exact");
        service.post_build(&badge(2, None)).expect("universal");
        service.post_build(&badge(3, Some("//UE5/Main/..."))).expect("wildcard");
        service.post_build(&badge(4, Some("//UE5/Main/Other"))).expect("sibling");
        service.post_build(&badge(5, Some("//UE5/Release"))).expect("elsewhere");

        let changes: Vec<i32> = service
            .builds_since("//UE5/Main/Samples", 0)
            .expect("builds")
            .iter()
            .map(|build| build.change_number)
            .collect();
        assert_eq!(changes, vec![2, 3]);

        let changes: Vec<i32> = service
            .builds_since("//ue5/main", 1)
            .expect("builds")
            .iter()
            .map(|build| build.change_number)
            .collect();
        assert_eq!(changes, vec![2, 3]);
    }

    #[test]
    fn votes_and_comments_require_exact_project() {
        let service = MetadataService::in_memory();
        for project in ["//UE5/Main", "//UE5/Main/Samples", "//UE5/MAIN"] {
            service
                .post_vote(&NewVote {
                    change: 7,
                    user_name: "alice".to_string(),
                    verdict: VoteVerdict::Starred,
                    project: project.to_string(),
                })
                .expect("post vote");
            service
                .post_comment(&NewComment {
                    change_number: 7,
                    user_name: "alice".to_string(),
                    text: format!("seen in {project}"),
                    project: project.to_string(),
                })
                .expect("post comment");
        }

        let votes = service.votes_since("//UE5/Main", 0).expect("votes");
        assert_eq!(votes.len(), 2);
        assert!(votes.windows(2).all(|pair| pair[0].id < pair[1].id));

        let comments = service.comments_since("//UE5/Main", 1).expect("comments");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "seen in //UE5/MAIN");
    }

    #[test]
    fn non_ascii_project_names_fold_case() {
        let service = MetadataService::in_memory();
        service
            .post_vote(&NewVote {
                change: 3,
                user_name: "élise".to_string(),
                verdict: VoteVerdict::Good,
                project: "//Dépôt/Main".to_string(),
            })
            .expect("post vote");
        service
            .post_comment(&NewComment {
                change_number: 3,
                user_name: "élise".to_string(),
                text: "ça compile".to_string(),
                project: "//Dépôt/Main".to_string(),
            })
            .expect("post comment");
        service
            .post_build(&badge(3, Some("//UE5/Dépôt/...")))
            .expect("wildcard");

        assert_eq!(service.votes_since("//DÉPÔT/Main", 0).expect("votes").len(), 1);
        assert_eq!(
            service.comments_since("//dépôt/MAIN", 0).expect("comments").len(),
            1
        );
        let builds = service.builds_since("//ue5/DÉPÔT/Jeux", 0).expect("builds");
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].project.as_deref(), Some("//UE5/Dépôt/..."));
    }

    #[test]
    fn writes_require_a_project_name() {
        let service = MetadataService::in_memory();
        let result = service.post_comment(&NewComment {
            change_number: 1,
            user_name: "alice".to_string(),
            text: "hello".to_string(),
            project: String::new(),
        });
        assert!(result.is_err());
    }
}
