use crate::error::{CogitateError, Result};
use crate::model::{Comment, Issue, IssueState, User};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("cogitate/", env!("CARGO_PKG_VERSION"));
// Login GitHub shows for deleted accounts.
const GHOST_LOGIN: &str = "ghost";

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    user: Option<User>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
    #[serde(default)]
    comments: u64,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    user: Option<User>,
}

/// An authenticated handle on one `owner/name` repository.
pub struct GithubRepository {
    agent: ureq::Agent,
    api_url: String,
    token: String,
    full_name: String,
}

/// Check the token against `repo_identifier` (`owner/name`) and return a handle.
pub fn authenticate(api_url: &str, token: &str, repo_identifier: &str) -> Result<GithubRepository> {
    let (owner, name) = split_identifier(repo_identifier)?;
    let repo = GithubRepository::new(api_url, token, owner, name);
    let url = format!("{}/repos/{}", repo.api_url, repo.full_name);
    repo.get(&url).map_err(|e| match e {
        CogitateError::RepositoryAccess(_) => e,
        other => CogitateError::RepositoryAccess(other.to_string()),
    })?;
    info!(repo = %repo.full_name, "authenticated with GitHub");
    Ok(repo)
}

pub fn split_identifier(identifier: &str) -> Result<(&str, &str)> {
    match identifier.trim().split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name.trim_end_matches(".git")))
        }
        _ => Err(CogitateError::RepositoryAccess(format!(
            "invalid repository identifier '{identifier}', expected owner/name"
        ))),
    }
}

/// The `rel="next"` target of a `Link` response header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let url = pieces.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        pieces
            .any(|p| p.trim() == "rel=\"next\"")
            .then(|| url.to_string())
    })
}

impl GithubRepository {
    fn new(api_url: &str, token: &str, owner: &str, name: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            full_name: format!("{owner}/{name}"),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Every issue and pull request matching `state`, page by page, with its
    /// comments attached. `None` leaves the state to the platform default.
    pub fn issues(&self, state: Option<IssueState>) -> IssuePages<'_> {
        let mut url = format!(
            "{}/repos/{}/issues?per_page={}",
            self.api_url, self.full_name, PER_PAGE
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(state.as_str());
        }
        IssuePages {
            repo: self,
            next_url: Some(url),
            buffer: VecDeque::new(),
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        self.agent
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT)
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code @ (401 | 403 | 404), _) => {
                    CogitateError::RepositoryAccess(format!("{url} returned HTTP {code}"))
                }
                ureq::Error::Status(code, _) => CogitateError::Http(format!("{url} returned HTTP {code}")),
                ureq::Error::Transport(t) => CogitateError::Http(t.to_string()),
            })
    }

    fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<(Vec<T>, Option<String>)> {
        let resp = self.get(url)?;
        let next = resp.header("link").and_then(next_link);
        let items: Vec<T> = resp.into_json()?;
        debug!(url, items = items.len(), "page fetched");
        Ok((items, next))
    }

    fn comments(&self, number: u64) -> Result<Vec<Comment>> {
        let mut next = Some(format!(
            "{}/repos/{}/issues/{}/comments?per_page={}",
            self.api_url, self.full_name, number, PER_PAGE
        ));
        let mut comments = Vec::new();
        while let Some(url) = next {
            let (page, following) = self.get_page::<ApiComment>(&url)?;
            comments.extend(page.into_iter().map(|c| Comment {
                user: c.user.unwrap_or_else(ghost),
            }));
            next = following;
        }
        Ok(comments)
    }

    fn complete(&self, api: ApiIssue) -> Result<Issue> {
        let comments = if api.comments > 0 {
            self.comments(api.number)?
        } else {
            Vec::new()
        };
        Ok(Issue {
            number: api.number,
            user: api.user.unwrap_or_else(ghost),
            pull_request: api.pull_request,
            comments,
        })
    }
}

fn ghost() -> User {
    User {
        login: GHOST_LOGIN.to_string(),
    }
}

/// Lazy, forward-only sequence of issues. Stops after the first error.
pub struct IssuePages<'a> {
    repo: &'a GithubRepository,
    next_url: Option<String>,
    buffer: VecDeque<ApiIssue>,
}

impl Iterator for IssuePages<'_> {
    type Item = Result<Issue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(api) = self.buffer.pop_front() {
                let issue = self.repo.complete(api);
                if issue.is_err() {
                    self.buffer.clear();
                    self.next_url = None;
                }
                return Some(issue);
            }

            let url = self.next_url.take()?;
            match self.repo.get_page::<ApiIssue>(&url) {
                Ok((items, next)) => {
                    self.buffer.extend(items);
                    self.next_url = next;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_finds_next_relation() {
        let header = r#"<https://api.github.com/repositories/1/issues?page=2>; rel="next", <https://api.github.com/repositories/1/issues?page=5>; rel="last""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://api.github.com/repositories/1/issues?page=2")
        );
        let last_page = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="prev""#;
        assert_eq!(next_link(last_page), None);
    }

    #[test]
    fn identifiers_need_owner_and_name() {
        assert_eq!(split_identifier("org/repo").unwrap(), ("org", "repo"));
        assert_eq!(split_identifier("org/repo.git").unwrap(), ("org", "repo"));
        assert!(split_identifier("repo").is_err());
        assert!(split_identifier("/repo").is_err());
        assert!(split_identifier("a/b/c").is_err());
    }

    #[test]
    fn issues_without_comments_need_no_request() {
        let repo = GithubRepository::new("http://127.0.0.1:9/", "t", "org", "repo");
        let api: ApiIssue = serde_json::from_value(serde_json::json!({
            "number": 7,
            "user": null,
            "pull_request": null,
            "comments": 0
        }))
        .unwrap();
        let issue = repo.complete(api).unwrap();
        assert_eq!(issue.number, 7);
        assert_eq!(issue.user.login, "ghost");
        assert!(!issue.is_pull_request());
        assert!(issue.comments.is_empty());
    }

    #[test]
    fn issue_listing_url_carries_state() {
        let repo = GithubRepository::new("https://api.example.com/", "t", "org", "repo");
        let pages = repo.issues(Some(IssueState::Closed));
        assert_eq!(
            pages.next_url.as_deref(),
            Some("https://api.example.com/repos/org/repo/issues?per_page=100&state=closed")
        );
        assert_eq!(
            repo.issues(None).next_url.as_deref(),
            Some("https://api.example.com/repos/org/repo/issues?per_page=100")
        );
    }
}
