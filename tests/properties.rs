use cogitate::activity::{collect_activity, MergePolicy};
use cogitate::aggregate::build_profiles;
use cogitate::cancel::CancelToken;
use cogitate::metrics::{commit_average, file_formats, percentage};
use cogitate::model::{ActivityMap, Comment, CommitSummary, Issue, User};
use proptest::prelude::*;
use std::collections::BTreeSet;

const AUTHORS: [&str; 3] = ["alice", "bob", "carol"];

fn file_name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(\\.[a-z]{1,3}){0,2}"
}

fn commit() -> impl Strategy<Value = CommitSummary> {
    (0usize..AUTHORS.len(), 0u64..500, 0u64..500, prop::collection::vec(file_name(), 0..4)).prop_map(
        |(author, added, removed, files)| {
            let name = AUTHORS[author];
            CommitSummary {
                hash: format!("{name}-{added}-{removed}"),
                message: "change".into(),
                author_name: name.into(),
                author_email: format!("{name}@example.com"),
                is_merge: false,
                lines_added: added,
                lines_removed: removed,
                lines_of_code: 0,
                complexity: 0,
                methods: Vec::new(),
                filepaths: files.iter().cloned().map(Some).collect(),
                filenames: files,
            }
        },
    )
}

fn issue() -> impl Strategy<Value = Issue> {
    (
        1u64..40,
        0usize..AUTHORS.len(),
        any::<bool>(),
        prop::collection::vec(0usize..AUTHORS.len(), 0..4),
    )
        .prop_map(|(number, opener, pull_request, commenters)| Issue {
            number,
            user: User {
                login: AUTHORS[opener].into(),
            },
            pull_request: pull_request.then(|| serde_json::json!({})),
            comments: commenters
                .into_iter()
                .map(|c| Comment {
                    user: User {
                        login: AUTHORS[c].into(),
                    },
                })
                .collect(),
        })
}

fn fold(issues: &[Issue], start: ActivityMap) -> ActivityMap {
    collect_activity(
        issues.iter().cloned().map(Ok),
        start,
        MergePolicy::Dedupe,
        &CancelToken::new(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn formats_ignore_input_order(
        (files, shuffled) in prop::collection::vec(file_name(), 0..20)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let formats = file_formats(&files[..]);
        prop_assert_eq!(&formats, &file_formats(&shuffled[..]));

        let mut sorted = formats.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(formats, sorted);
    }

    #[test]
    fn profile_files_are_the_sorted_union(commits in prop::collection::vec(commit(), 0..30)) {
        let profiles = build_profiles(&commits);
        for (name, profile) in &profiles {
            let expected: Vec<String> = commits
                .iter()
                .filter(|c| &c.author_name == name)
                .flat_map(|c| c.filenames.iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            prop_assert_eq!(&profile.files, &expected);
        }
    }

    #[test]
    fn profile_counters_sum_to_the_raw_totals(commits in prop::collection::vec(commit(), 0..30)) {
        let profiles = build_profiles(&commits);
        let commit_total: u64 = profiles.values().map(|p| p.commits).sum();
        let added_total: u64 = profiles.values().map(|p| p.lines_added).sum();
        let removed_total: u64 = profiles.values().map(|p| p.lines_removed).sum();

        prop_assert_eq!(commit_total, commits.len() as u64);
        prop_assert_eq!(added_total, commits.iter().map(|c| c.lines_added).sum::<u64>());
        prop_assert_eq!(removed_total, commits.iter().map(|c| c.lines_removed).sum::<u64>());
    }

    #[test]
    fn profiles_do_not_depend_on_commit_order(
        (commits, shuffled) in prop::collection::vec(commit(), 0..20)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert_eq!(build_profiles(&commits), build_profiles(&shuffled));
    }

    #[test]
    fn dedupe_fold_is_idempotent(issues in prop::collection::vec(issue(), 0..20)) {
        let once = fold(&issues, ActivityMap::new());
        let twice = fold(&issues, once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn percentage_stays_within_bounds(total in 1u64..100_000, share in 0u64..=100) {
        let individual = total * share / 100;
        let pct = percentage(individual, total).unwrap();
        prop_assert!(pct <= 100);
        prop_assert_eq!(percentage(total, total).unwrap(), 100);
    }

    #[test]
    fn commit_average_never_overshoots(lines in 0u64..1_000_000, commits in 0u64..1000) {
        let avg = commit_average(lines, commits);
        if commits == 0 {
            prop_assert_eq!(avg, 0);
        } else {
            prop_assert!(avg * commits <= lines);
            prop_assert!(lines - avg * commits < commits);
        }
    }
}
