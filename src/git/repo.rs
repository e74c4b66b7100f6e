use crate::error::{CogitateError, Result};
use crate::model::{Modification, Person, RawCommit};
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use similar::{ChangeTag, TextDiff};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

const REMOTE_SCHEMES: [&str; 5] = ["http", "https", "ssh", "git", "file"];

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
    // Keeps a cloned checkout alive for as long as the repository is used.
    _checkout: Option<TempDir>,
}

/// True when `location` should be cloned rather than opened in place.
pub fn is_remote_location(location: &str) -> bool {
    match url::Url::parse(location) {
        Ok(u) => REMOTE_SCHEMES.contains(&u.scheme()),
        Err(_) => false,
    }
}

impl GitRepo {
    /// Open a URL (cloned into a temporary directory) or a local path.
    pub fn open(location: &str) -> Result<Self> {
        if is_remote_location(location) {
            Self::clone_remote(location)
        } else {
            Self::open_path(Some(location))
        }
    }

    /// Open a repository at `path`, or current dir if `None`
    pub fn open_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let repo_path = match path {
            Some(p) => p.as_ref().to_path_buf(),
            None => std::env::current_dir()?,
        };

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self {
            repo,
            path,
            _checkout: None,
        })
    }

    fn clone_remote(url: &str) -> Result<Self> {
        let checkout = tempfile::Builder::new().prefix("cogitate-").tempdir()?;
        info!(url, dest = %checkout.path().display(), "cloning repository");

        let status = Command::new("git")
            .args(["clone", "--quiet", url])
            .arg(checkout.path())
            .status()
            .map_err(|e| CogitateError::RepositoryAccess(format!("failed to run git clone: {e}")))?;
        if !status.success() {
            return Err(CogitateError::RepositoryAccess(format!(
                "git clone of {url} failed ({status})"
            )));
        }

        let repo = gix::open(checkout.path())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        Ok(Self {
            repo,
            path,
            _checkout: Some(checkout),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// History reachable from HEAD, parents before children.
    ///
    /// Only commit headers are read here; diffs are computed lazily as the
    /// returned walk is consumed.
    pub fn traverse(&self, include_merges: bool) -> Result<CommitWalk<'_>> {
        let mut head = self.repo.head()?;
        if head.is_unborn() {
            return Ok(CommitWalk {
                repo: self,
                pending: Vec::new().into_iter(),
            });
        }
        let head_commit = head.peel_to_commit_in_place()?;

        let mut order: Vec<ObjectId> = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: Vec<(ObjectId, bool)> = vec![(head_commit.id, false)];

        while let Some((commit_id, expanded)) = stack.pop() {
            if expanded {
                order.push(commit_id);
                continue;
            }
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            let is_merge = parents.len() > 1;

            if include_merges || !is_merge {
                stack.push((commit_id, true));
            }
            for pid in parents.into_iter().rev() {
                if !seen.contains(&pid) {
                    stack.push((pid, false));
                }
            }
        }

        debug!(commits = order.len(), "history ordered");
        Ok(CommitWalk {
            repo: self,
            pending: order.into_iter(),
        })
    }

    pub fn raw_commit(&self, commit_id: ObjectId) -> Result<RawCommit> {
        let commit = self.repo.find_commit(commit_id)?;
        let author = commit.author()?;
        let message = commit.message()?;
        let msg = match message.body {
            Some(body) => format!("{}\n\n{}", message.title, body),
            None => message.title.to_string(),
        };
        let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
        let merge = parents.len() > 1;

        // A merge's own diff is not attributed to its author.
        let modifications = if merge {
            Vec::new()
        } else {
            let tree = commit.tree()?;
            let parent_tree = match parents.first() {
                Some(parent_id) => Some(self.repo.find_commit(*parent_id)?.tree()?),
                None => None,
            };
            let changes: Vec<ChangeDetached> =
                self.repo
                    .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

            let mut modifications = Vec::with_capacity(changes.len());
            for change in changes {
                if let Some(m) = self.modification(change)? {
                    modifications.push(m);
                }
            }
            modifications
        };

        Ok(RawCommit {
            hash: commit_id.to_string(),
            msg,
            author: Person {
                name: author.name.to_string(),
                email: author.email.to_string(),
            },
            merge,
            modifications,
        })
    }

    fn modification(&self, change: ChangeDetached) -> Result<Option<Modification>> {
        let m = match change {
            ChangeDetached::Addition { entry_mode, .. }
            | ChangeDetached::Deletion { entry_mode, .. }
            | ChangeDetached::Modification { entry_mode, .. }
            | ChangeDetached::Rewrite { entry_mode, .. }
                if entry_mode.is_tree() =>
            {
                return Ok(None);
            }
            ChangeDetached::Addition { id, location, .. } => {
                let Ok(obj) = self.repo.find_object(id) else {
                    return Ok(None);
                };
                let text = text_of(&obj);
                let location = location.to_string();
                Modification {
                    added: text.map(|t| t.lines().count() as u64).unwrap_or(0),
                    removed: 0,
                    nloc: text.map(count_code_lines),
                    complexity: None,
                    methods: Vec::new(),
                    filename: file_name(&location),
                    new_path: Some(location),
                }
            }
            ChangeDetached::Deletion { id, location, .. } => {
                let Ok(obj) = self.repo.find_object(id) else {
                    return Ok(None);
                };
                let location = location.to_string();
                Modification {
                    added: 0,
                    removed: text_of(&obj).map(|t| t.lines().count() as u64).unwrap_or(0),
                    nloc: None,
                    complexity: None,
                    methods: Vec::new(),
                    filename: file_name(&location),
                    new_path: None,
                }
            }
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                ..
            } => {
                let (Ok(old_obj), Ok(new_obj)) =
                    (self.repo.find_object(previous_id), self.repo.find_object(id))
                else {
                    return Ok(None);
                };
                self.changed_file(&old_obj, &new_obj, location.to_string())
            }
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                ..
            } => {
                let (Ok(old_obj), Ok(new_obj)) =
                    (self.repo.find_object(source_id), self.repo.find_object(id))
                else {
                    return Ok(None);
                };
                self.changed_file(&old_obj, &new_obj, location.to_string())
            }
        };
        Ok(Some(m))
    }

    fn changed_file(&self, old: &gix::Object<'_>, new: &gix::Object<'_>, location: String) -> Modification {
        let (added, removed, nloc) = match (text_of(old), text_of(new)) {
            (Some(old_text), Some(new_text)) => {
                let (added, removed) = line_diff(old_text, new_text);
                (added, removed, Some(count_code_lines(new_text)))
            }
            _ => (0, 0, None),
        };
        Modification {
            added,
            removed,
            nloc,
            complexity: None,
            methods: Vec::new(),
            filename: file_name(&location),
            new_path: Some(location),
        }
    }
}

/// Lazily materialized commits, oldest first. Finite and not restartable.
pub struct CommitWalk<'a> {
    repo: &'a GitRepo,
    pending: std::vec::IntoIter<ObjectId>,
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<RawCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.pending.next()?;
        Some(self.repo.raw_commit(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

/// UTF-8 text of a blob, or `None` for binary content.
fn text_of<'a>(object: &'a gix::Object<'_>) -> Option<&'a str> {
    let data = object.data.as_slice();
    if data.iter().take(8192).any(|&b| b == 0) {
        return None;
    }
    std::str::from_utf8(data).ok()
}

fn count_code_lines(text: &str) -> u64 {
    text.lines().filter(|l| !l.trim().is_empty()).count() as u64
}

fn line_diff(old: &str, new: &str) -> (u64, u64) {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0u64;
    let mut removed = 0u64;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

fn file_name(location: &str) -> String {
    location.rsplit('/').next().unwrap_or(location).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_locations_need_a_known_scheme() {
        assert!(is_remote_location("https://github.com/org/repo.git"));
        assert!(is_remote_location("ssh://git@example.com/org/repo"));
        assert!(!is_remote_location("."));
        assert!(!is_remote_location("/tmp/some/repo"));
        assert!(!is_remote_location("C:\\work\\repo"));
    }

    #[test]
    fn line_diff_counts_inserts_and_deletes() {
        assert_eq!(line_diff("a\nb\nc\n", "a\nc\nd\ne\n"), (2, 1));
        assert_eq!(line_diff("same\n", "same\n"), (0, 0));
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(file_name("src/git/repo.rs"), "repo.rs");
        assert_eq!(file_name("README.md"), "README.md");
    }

    #[test]
    fn code_lines_skip_blanks() {
        assert_eq!(count_code_lines("fn a() {}\n\n   \nfn b() {}\n"), 2);
    }
}
