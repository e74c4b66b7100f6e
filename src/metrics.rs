use crate::error::{CogitateError, Result};
use crate::model::{ContributorProfile, Profiles};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Categories scored against team totals.
pub const SCORED_CATEGORIES: [&str; 3] = ["COMMITS", "ADDED", "REMOVED"];

/// Integer lines-per-commit average, `0` when there are no commits.
pub fn commit_average(lines: u64, commits: u64) -> u64 {
    if commits != 0 {
        lines / commits
    } else {
        0
    }
}

/// The "format" of a file name: its base name with the last extension removed.
pub fn parse_for_type(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

/// Unique formats across `files`, sorted ascending.
pub fn file_formats<S: AsRef<str>>(files: &[S]) -> Vec<String> {
    files
        .iter()
        .map(|f| parse_for_type(f.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `individual` as a whole-number percentage of `total`, rounding half to even.
pub fn percentage(individual: u64, total: u64) -> Result<u64> {
    if total == 0 {
        return Err(CogitateError::Division {
            numerator: individual,
        });
    }
    Ok((individual as f64 * 100.0 / total as f64).round_ties_even() as u64)
}

impl ContributorProfile {
    /// Net lines left in the codebase (`ADDED - REMOVED`).
    pub fn total_lines(&self) -> i64 {
        self.lines_added as i64 - self.lines_removed as i64
    }

    /// Lines touched in either direction (`ADDED + REMOVED`).
    pub fn modified_lines(&self) -> u64 {
        self.lines_added + self.lines_removed
    }

    /// Share of touched lines that were additions, two decimals.
    pub fn ratio(&self) -> f64 {
        let modified = self.modified_lines();
        if modified == 0 {
            return 0.0;
        }
        let ratio = self.lines_added as f64 / modified as f64;
        (ratio * 100.0).round() / 100.0
    }

    pub fn lines_per_commit(&self) -> u64 {
        commit_average(self.modified_lines(), self.commits)
    }

    pub fn formats(&self) -> Vec<String> {
        file_formats(&self.files)
    }
}

/// Per-member category values used for team contribution scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSample {
    members: BTreeMap<String, BTreeMap<String, u64>>,
}

impl TeamSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: &Profiles) -> Self {
        let mut sample = Self::new();
        for (identity, profile) in profiles {
            sample.insert(identity, "COMMITS", profile.commits);
            sample.insert(identity, "ADDED", profile.lines_added);
            sample.insert(identity, "REMOVED", profile.lines_removed);
        }
        sample
    }

    pub fn insert(&mut self, member: &str, category: &str, value: u64) {
        self.members
            .entry(member.to_string())
            .or_default()
            .insert(category.to_string(), value);
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn individual_value(&self, member: &str, category: &str) -> Option<u64> {
        self.members.get(member)?.get(category).copied()
    }

    pub fn sum_category(&self, category: &str) -> u64 {
        self.members
            .values()
            .filter_map(|values| values.get(category))
            .sum()
    }

    /// Each member's share of every category they report. Categories whose
    /// team total is zero score 0.
    pub fn contribution_percentages(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        let mut out = BTreeMap::new();
        for (member, values) in &self.members {
            let mut scores = BTreeMap::new();
            for (category, value) in values {
                let score = match self.sum_category(category) {
                    0 => 0,
                    total => percentage(*value, total).unwrap_or(0),
                };
                scores.insert(category.clone(), score);
            }
            out.insert(member.clone(), scores);
        }
        out
    }
}
