use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Email placed on profiles created from issue activity alone.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
}

/// One file touched by a commit, as reported by the mining collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub added: u64,
    pub removed: u64,
    pub nloc: Option<u64>,
    pub complexity: Option<u64>,
    #[serde(default)]
    pub methods: Vec<Method>,
    pub filename: String,
    /// Post-change path; `None` when the file was deleted.
    pub new_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub hash: String,
    pub msg: String,
    pub author: Person,
    pub merge: bool,
    pub modifications: Vec<Modification>,
}

/// Normalized record for one commit; element `i` of `filenames` and
/// `filepaths` always describe the same modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub is_merge: bool,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub lines_of_code: u64,
    pub complexity: u64,
    pub methods: Vec<String>,
    pub filenames: Vec<String>,
    pub filepaths: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub user: User,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        matches!(&self.pull_request, Some(v) if !v.is_null())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
    All,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    IssueOpened,
    IssueCommented,
    PullRequestOpened,
    PullRequestCommented,
}

impl ActivityKind {
    pub fn classify(pull_request: bool, opened: bool) -> Self {
        match (pull_request, opened) {
            (false, true) => ActivityKind::IssueOpened,
            (false, false) => ActivityKind::IssueCommented,
            (true, true) => ActivityKind::PullRequestOpened,
            (true, false) => ActivityKind::PullRequestCommented,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueActivity {
    pub issues_opened: Vec<u64>,
    pub issues_commented: Vec<u64>,
    pub pull_requests_opened: Vec<u64>,
    pub pull_requests_commented: Vec<u64>,
}

impl IssueActivity {
    pub fn set(&self, kind: ActivityKind) -> &[u64] {
        match kind {
            ActivityKind::IssueOpened => &self.issues_opened,
            ActivityKind::IssueCommented => &self.issues_commented,
            ActivityKind::PullRequestOpened => &self.pull_requests_opened,
            ActivityKind::PullRequestCommented => &self.pull_requests_commented,
        }
    }

    pub fn set_mut(&mut self, kind: ActivityKind) -> &mut Vec<u64> {
        match kind {
            ActivityKind::IssueOpened => &mut self.issues_opened,
            ActivityKind::IssueCommented => &mut self.issues_commented,
            ActivityKind::PullRequestOpened => &mut self.pull_requests_opened,
            ActivityKind::PullRequestCommented => &mut self.pull_requests_commented,
        }
    }

    /// Appends every number from `other` that is not already present, keeping order.
    pub fn absorb(&mut self, other: &IssueActivity) {
        for kind in [
            ActivityKind::IssueOpened,
            ActivityKind::IssueCommented,
            ActivityKind::PullRequestOpened,
            ActivityKind::PullRequestCommented,
        ] {
            let target = self.set_mut(kind);
            for number in other.set(kind) {
                if !target.contains(number) {
                    target.push(*number);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues_opened.is_empty()
            && self.issues_commented.is_empty()
            && self.pull_requests_opened.is_empty()
            && self.pull_requests_commented.is_empty()
    }
}

/// Issue activity keyed by platform login.
pub type ActivityMap = BTreeMap<String, IssueActivity>;

/// Aggregated record for one contributor identity (commit author name).
///
/// Only primary counters are held here. Derived columns (`TOTAL`, `MODIFIED`,
/// `RATIO`, `LINES_PER_COMMIT`, `FORMAT`) are computed when the profile is
/// serialized and ignored when it is read back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContributorProfile {
    #[serde(rename = "EMAIL")]
    pub email: String,
    #[serde(rename = "COMMITS", default)]
    pub commits: u64,
    #[serde(rename = "ADDED", default)]
    pub lines_added: u64,
    #[serde(rename = "REMOVED", default)]
    pub lines_removed: u64,
    /// Sorted ascending, no duplicates.
    #[serde(rename = "FILES", default)]
    pub files: Vec<String>,
    #[serde(flatten)]
    pub activity: IssueActivity,
}

impl ContributorProfile {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct ProfileRecord<'a> {
    #[serde(rename = "EMAIL")]
    email: &'a str,
    #[serde(rename = "COMMITS")]
    commits: u64,
    #[serde(rename = "ADDED")]
    added: u64,
    #[serde(rename = "REMOVED")]
    removed: u64,
    #[serde(rename = "TOTAL")]
    total: i64,
    #[serde(rename = "MODIFIED")]
    modified: u64,
    #[serde(rename = "RATIO")]
    ratio: f64,
    #[serde(rename = "LINES_PER_COMMIT")]
    lines_per_commit: u64,
    #[serde(rename = "FILES")]
    files: &'a [String],
    #[serde(rename = "FORMAT")]
    format: Vec<String>,
    #[serde(flatten)]
    activity: &'a IssueActivity,
}

impl Serialize for ContributorProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ProfileRecord {
            email: &self.email,
            commits: self.commits,
            added: self.lines_added,
            removed: self.lines_removed,
            total: self.total_lines(),
            modified: self.modified_lines(),
            ratio: self.ratio(),
            lines_per_commit: self.lines_per_commit(),
            files: &self.files,
            format: self.formats(),
            activity: &self.activity,
        }
        .serialize(serializer)
    }
}

/// Profiles keyed by contributor identity.
pub type Profiles = BTreeMap<String, ContributorProfile>;
