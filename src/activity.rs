use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::{ActivityKind, ActivityMap, Issue, IssueActivity};
use crate::store::{Document, DocumentStore, WriteMode, ACTIVITY_DOCUMENT};
use tracing::{debug, info, warn};

/// How repeated issue numbers are handled when folding into an existing map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Skip numbers already present in the target set; re-processing is a no-op.
    #[default]
    Dedupe,
    /// Always append. Processing the same issues twice double-counts them.
    Append,
}

/// Record one event, creating the login's entry on first sight.
pub fn record(activity: &mut ActivityMap, login: &str, kind: ActivityKind, number: u64, policy: MergePolicy) {
    let set = activity
        .entry(login.to_string())
        .or_insert_with(IssueActivity::default)
        .set_mut(kind);
    if policy == MergePolicy::Append || !set.contains(&number) {
        set.push(number);
    }
}

/// Fold a one-shot issue sequence into `activity`.
///
/// Comments are attributed before the opener, in the order the sequence
/// yields them. The first error aborts the fold and is returned unchanged.
pub fn collect_activity<I>(
    issues: I,
    mut activity: ActivityMap,
    policy: MergePolicy,
    cancel: &CancelToken,
) -> Result<ActivityMap>
where
    I: IntoIterator<Item = Result<Issue>>,
{
    let mut processed = 0usize;
    let mut issues = issues.into_iter();
    loop {
        cancel.check()?;
        let Some(issue) = issues.next() else {
            break;
        };
        let issue = issue?;
        let pull_request = issue.is_pull_request();

        for comment in &issue.comments {
            record(
                &mut activity,
                &comment.user.login,
                ActivityKind::classify(pull_request, false),
                issue.number,
                policy,
            );
        }
        record(
            &mut activity,
            &issue.user.login,
            ActivityKind::classify(pull_request, true),
            issue.number,
            policy,
        );

        debug!(number = issue.number, pull_request, comments = issue.comments.len(), "issue attributed");
        processed += 1;
    }
    info!(issues = processed, contributors = activity.len(), "issue activity collected");
    Ok(activity)
}

/// Read the stored activity map. Entries that do not parse are dropped.
pub fn load_activity(store: &dyn DocumentStore) -> Result<ActivityMap> {
    let doc = store.load(ACTIVITY_DOCUMENT)?;
    let mut activity = ActivityMap::new();
    for (login, value) in doc {
        match serde_json::from_value::<IssueActivity>(value) {
            Ok(a) => {
                activity.insert(login, a);
            }
            Err(e) => warn!(%login, error = %e, "skipping malformed activity entry"),
        }
    }
    Ok(activity)
}

pub fn save_activity(store: &mut dyn DocumentStore, activity: &ActivityMap, mode: WriteMode) -> Result<()> {
    let mut doc = Document::new();
    for (login, a) in activity {
        doc.insert(login.clone(), serde_json::to_value(a)?);
    }
    store.write(ACTIVITY_DOCUMENT, doc, mode)
}
