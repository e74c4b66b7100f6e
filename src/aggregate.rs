use crate::error::{CogitateError, Result};
use crate::model::{ActivityMap, CommitSummary, ContributorProfile, Profiles, NOT_AVAILABLE};
use crate::store::{Document, DocumentStore, WriteMode, PROFILE_DOCUMENT, RAW_DATA_DOCUMENT, RAW_DATA_KEY};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Verified mapping from platform login to contributor identity (author name).
pub type IdentityMap = BTreeMap<String, String>;

/// Fold the complete raw sequence into profiles. Feeding partial snapshots
/// one after another is not additive; always rebuild from everything.
pub fn build_profiles(raw: &[CommitSummary]) -> Profiles {
    let mut profiles = Profiles::new();
    for commit in raw {
        let profile = profiles
            .entry(commit.author_name.clone())
            .or_insert_with(ContributorProfile::default);
        // Last write wins when one name is used with several emails.
        profile.email = commit.author_email.clone();
        profile.commits += 1;
        profile.lines_added += commit.lines_added;
        profile.lines_removed += commit.lines_removed;
        profile.files.extend(commit.filenames.iter().cloned());
        profile.files.sort();
        profile.files.dedup();
    }
    debug!(commits = raw.len(), contributors = profiles.len(), "profiles built");
    profiles
}

/// `Ok(None)` when no raw data was collected yet.
pub fn parse_raw_data(doc: &Document) -> Result<Option<Vec<CommitSummary>>> {
    match doc.get(RAW_DATA_KEY) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| CogitateError::malformed(RAW_DATA_DOCUMENT, e.to_string())),
    }
}

/// Profiles for a raw-data document. Absent or unreadable raw data yields an
/// empty map, which tells the caller that commits must be collected first.
pub fn profiles_from_document(doc: &Document) -> Profiles {
    match parse_raw_data(doc) {
        Ok(Some(raw)) => {
            info!(commits = raw.len(), "building profiles from stored raw data");
            build_profiles(&raw)
        }
        Ok(None) => Profiles::new(),
        Err(err) => {
            warn!(%err, "raw data unreadable, treating as not collected");
            Profiles::new()
        }
    }
}

pub fn calculate_profiles(store: &dyn DocumentStore) -> Result<Profiles> {
    let doc = store.load(RAW_DATA_DOCUMENT)?;
    Ok(profiles_from_document(&doc))
}

/// Merge activity into the profiles of mapped logins. Returns the logins that
/// have no mapping; their activity is left out of the profiles.
pub fn attach_activity(profiles: &mut Profiles, activity: &ActivityMap, identities: &IdentityMap) -> Vec<String> {
    let mut unmapped = Vec::new();
    for (login, events) in activity {
        let Some(identity) = identities.get(login) else {
            unmapped.push(login.clone());
            continue;
        };
        profiles
            .entry(identity.clone())
            .or_insert_with(|| ContributorProfile::new(NOT_AVAILABLE))
            .activity
            .absorb(events);
    }
    unmapped
}

/// Fold `remove` into `keep` and delete `remove`. `keep`'s email is retained.
pub fn merge_identities(profiles: &mut Profiles, keep: &str, remove: &str) -> Result<()> {
    if !profiles.contains_key(keep) {
        return Err(CogitateError::UnknownContributor(keep.to_string()));
    }
    if keep == remove {
        return Ok(());
    }
    let removed = profiles
        .remove(remove)
        .ok_or_else(|| CogitateError::UnknownContributor(remove.to_string()))?;

    if let Some(kept) = profiles.get_mut(keep) {
        kept.commits += removed.commits;
        kept.lines_added += removed.lines_added;
        kept.lines_removed += removed.lines_removed;
        kept.files.extend(removed.files);
        kept.files.sort();
        kept.files.dedup();
        kept.activity.absorb(&removed.activity);
    }
    info!(keep, remove, "identities merged");
    Ok(())
}

pub fn profiles_document(profiles: &Profiles) -> Result<Document> {
    let mut doc = Document::new();
    for (identity, profile) in profiles {
        doc.insert(identity.clone(), serde_json::to_value(profile)?);
    }
    Ok(doc)
}

pub fn save_profiles(store: &mut dyn DocumentStore, profiles: &Profiles, mode: WriteMode) -> Result<()> {
    store.write(PROFILE_DOCUMENT, profiles_document(profiles)?, mode)
}

/// Stored profiles; entries that do not parse are reported and skipped.
pub fn load_profiles(store: &dyn DocumentStore) -> Result<Profiles> {
    let doc = store.load(PROFILE_DOCUMENT)?;
    let mut profiles = Profiles::new();
    for (identity, value) in doc {
        match serde_json::from_value::<ContributorProfile>(value) {
            Ok(p) => {
                profiles.insert(identity, p);
            }
            Err(e) => warn!(%identity, error = %e, "skipping malformed profile"),
        }
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueActivity;
    use crate::store::JsonFileStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn commit(author: &str, email: &str, added: u64, removed: u64, files: &[&str]) -> CommitSummary {
        CommitSummary {
            hash: format!("{author}-{added}-{removed}"),
            message: String::new(),
            author_name: author.into(),
            author_email: email.into(),
            is_merge: false,
            lines_added: added,
            lines_removed: removed,
            lines_of_code: 0,
            complexity: 0,
            methods: vec![],
            filenames: files.iter().map(|f| f.to_string()).collect(),
            filepaths: files.iter().map(|f| Some(f.to_string())).collect(),
        }
    }

    #[test]
    fn two_commits_fold_into_one_profile() {
        let raw = vec![
            commit("A", "a@example.com", 10, 2, &["x.py", "y.py"]),
            commit("A", "a@example.com", 5, 1, &["y.py"]),
        ];
        let profiles = build_profiles(&raw);
        let a = &profiles["A"];
        assert_eq!(a.commits, 2);
        assert_eq!(a.lines_added, 15);
        assert_eq!(a.lines_removed, 3);
        assert_eq!(a.files, vec!["x.py", "y.py"]);
        assert_eq!(a.email, "a@example.com");
        assert!(a.activity.is_empty());
    }

    #[test]
    fn last_email_wins() {
        let raw = vec![
            commit("A", "old@example.com", 1, 0, &[]),
            commit("A", "new@example.com", 1, 0, &[]),
        ];
        assert_eq!(build_profiles(&raw)["A"].email, "new@example.com");
    }

    #[test]
    fn missing_raw_data_gives_empty_profiles() {
        assert!(profiles_from_document(&Document::new()).is_empty());
        let mut doc = Document::new();
        doc.insert("OTHER".into(), json!([]));
        assert!(profiles_from_document(&doc).is_empty());
    }

    #[test]
    fn malformed_raw_data_is_reported_and_treated_empty() {
        let mut doc = Document::new();
        doc.insert(RAW_DATA_KEY.into(), json!([{"author_name": "A"}]));
        assert!(matches!(
            parse_raw_data(&doc),
            Err(CogitateError::MalformedDocument { .. })
        ));
        assert!(profiles_from_document(&doc).is_empty());
    }

    #[test]
    fn rebuilding_is_byte_identical() {
        let raw = vec![
            commit("B", "b@example.com", 3, 3, &["z.rs", "a.rs"]),
            commit("A", "a@example.com", 1, 0, &["m.rs"]),
            commit("B", "b@example.com", 2, 0, &["a.rs"]),
        ];
        let first = serde_json::to_string(&profiles_document(&build_profiles(&raw)).unwrap()).unwrap();
        let second = serde_json::to_string(&profiles_document(&build_profiles(&raw)).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn activity_attaches_only_through_the_mapping() {
        let mut profiles = build_profiles(&[commit("Bob Smith", "bob@example.com", 1, 0, &["a.rs"])]);
        let mut activity = ActivityMap::new();
        activity.insert(
            "bsmith".into(),
            IssueActivity {
                issues_opened: vec![7],
                ..Default::default()
            },
        );
        activity.insert(
            "alice".into(),
            IssueActivity {
                issues_commented: vec![7],
                ..Default::default()
            },
        );
        activity.insert(
            "carol".into(),
            IssueActivity {
                pull_requests_opened: vec![9],
                ..Default::default()
            },
        );

        let mut identities = IdentityMap::new();
        identities.insert("bsmith".into(), "Bob Smith".into());
        identities.insert("carol".into(), "Carol".into());

        let unmapped = attach_activity(&mut profiles, &activity, &identities);
        assert_eq!(unmapped, vec!["alice"]);
        assert_eq!(profiles["Bob Smith"].activity.issues_opened, vec![7]);
        assert_eq!(profiles["Bob Smith"].commits, 1);
        assert_eq!(profiles["Carol"].email, NOT_AVAILABLE);
        assert_eq!(profiles["Carol"].activity.pull_requests_opened, vec![9]);
        assert!(!profiles.contains_key("alice"));

        // attaching again changes nothing
        let before = profiles.clone();
        attach_activity(&mut profiles, &activity, &identities);
        assert_eq!(before, profiles);
    }

    #[test]
    fn merging_identities_sums_and_unions() {
        let mut profiles = build_profiles(&[
            commit("bob", "bob@example.com", 4, 1, &["b.rs", "a.rs"]),
            commit("Bob Smith", "bob@work.example", 6, 2, &["c.rs", "a.rs"]),
        ]);
        merge_identities(&mut profiles, "Bob Smith", "bob").unwrap();
        assert_eq!(profiles.len(), 1);
        let kept = &profiles["Bob Smith"];
        assert_eq!(kept.commits, 2);
        assert_eq!(kept.lines_added, 10);
        assert_eq!(kept.lines_removed, 3);
        assert_eq!(kept.files, vec!["a.rs", "b.rs", "c.rs"]);
        assert_eq!(kept.email, "bob@work.example");

        assert!(matches!(
            merge_identities(&mut profiles, "Bob Smith", "nobody"),
            Err(CogitateError::UnknownContributor(ref n)) if n == "nobody"
        ));
        assert!(matches!(
            merge_identities(&mut profiles, "nobody", "Bob Smith"),
            Err(CogitateError::UnknownContributor(_))
        ));
        assert_eq!(profiles.len(), 1);
    }

    #[test]
    fn stored_profiles_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path()).unwrap();
        let profiles = build_profiles(&[commit("A", "a@example.com", 10, 2, &["x.py"])]);
        save_profiles(&mut store, &profiles, WriteMode::Overwrite).unwrap();
        assert_eq!(load_profiles(&store).unwrap(), profiles);

        let raw_doc = store.load(PROFILE_DOCUMENT).unwrap();
        assert_eq!(raw_doc["A"]["TOTAL"], json!(8));
        assert_eq!(raw_doc["A"]["FORMAT"], json!(["x"]));
    }
}
