use crate::activity::{self, MergePolicy};
use crate::aggregate;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::git::GitRepo;
use crate::github;
use crate::harvest;
use crate::metrics::{TeamSample, SCORED_CATEGORIES};
use crate::model::{IssueState, Profiles};
use crate::report;
use crate::store::{self, Backend, Document, DocumentStore, WriteMode, PROFILE_DOCUMENT};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const INVALID_LINK_MESSAGE: &str = "The link you have entered is invalid.";
pub const MERGE_REBUILD_NOTE: &str =
    "Note: `cogitate profiles` and `cogitate run` rebuild profiles from raw data and undo this merge.";

#[derive(Parser)]
#[command(name = "cogitate")]
#[command(about = "Per-contributor metrics from git history and GitHub issue activity")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Directory holding stored documents")]
    pub store: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "Document store backend")]
    pub backend: Option<Backend>,

    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v, -vv)")]
    pub verbose: u8,
}

#[derive(Args, Clone)]
pub struct GithubArgs {
    #[arg(short = 't', long, help = "GitHub user token")]
    pub token: String,

    #[arg(short = 'r', long, help = "Repository as owner/name")]
    pub repo: String,

    #[arg(short = 's', long, value_enum, help = "State of the issues to collect")]
    pub state: Option<IssueState>,

    #[arg(long, help = "Append issue numbers even when already recorded")]
    pub legacy_append: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect issues, harvest commits, build profiles and print the report
    Run {
        #[clap(flatten)]
        github: GithubArgs,

        #[arg(short = 'l', long, help = "URL of the repository to mine")]
        link: Option<String>,

        #[arg(long, value_delimiter = ',', help = "Report columns, comma separated")]
        fields: Option<Vec<String>>,

        #[arg(long, value_parser = humantime::parse_duration, help = "Abort collection after this long (e.g. 10m)")]
        timeout: Option<Duration>,
    },
    /// Harvest commit records into raw data
    Collect {
        #[arg(help = "Repository URL or local path", default_value = ".")]
        location: String,

        #[arg(long, help = "Merge into the stored raw data instead of replacing it")]
        append: bool,

        #[arg(long, help = "Leave merge commits out")]
        no_merges: bool,

        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    /// Collect issue and pull request activity per login
    Issues {
        #[clap(flatten)]
        github: GithubArgs,

        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    /// Rebuild contributor profiles from raw data
    Profiles {
        #[arg(long, help = "Merge into stored profiles instead of replacing them")]
        append: bool,
    },
    /// Print stored profiles
    Report {
        #[arg(long, value_delimiter = ',', help = "Report columns, comma separated")]
        fields: Option<Vec<String>>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Merge one contributor identity into another
    Merge {
        #[arg(long, help = "Identity to keep")]
        keep: String,

        #[arg(long, help = "Identity merged into --keep, then deleted")]
        remove: String,
    },
    /// Each contributor's share of team commits and lines
    Scores {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

struct Session {
    config: Config,
    store: Box<dyn DocumentStore>,
}

impl Session {
    fn open(common: &CommonArgs) -> Result<Self> {
        let config = Config::load(common.config.as_deref()).context("Failed to load configuration")?;
        let dir = common.store.clone().unwrap_or_else(|| config.store.dir.clone());
        let backend = common.backend.unwrap_or(config.store.backend);
        let store = store::open_store(backend, &dir)
            .with_context(|| format!("Failed to open document store at {}", dir.display()))?;
        Ok(Self { config, store })
    }

    fn fields(&self, requested: Option<Vec<String>>) -> Vec<String> {
        requested.unwrap_or_else(|| self.config.report.fields.clone())
    }
}

/// True for an absolute http(s) URL with a host.
pub fn validate_link(link: &str) -> bool {
    match url::Url::parse(link) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

fn cancel_token(timeout: Option<Duration>) -> CancelToken {
    match timeout {
        Some(t) => CancelToken::with_timeout(t),
        None => CancelToken::new(),
    }
}

fn merge_policy(legacy_append: bool) -> MergePolicy {
    if legacy_append {
        MergePolicy::Append
    } else {
        MergePolicy::Dedupe
    }
}

fn write_mode(append: bool) -> WriteMode {
    if append {
        WriteMode::Merge
    } else {
        WriteMode::Overwrite
    }
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let mut session = Session::open(&self.common)?;
        match self.command {
            Commands::Run {
                github,
                link,
                fields,
                timeout,
            } => run(&mut session, github, link, fields, timeout),
            Commands::Collect {
                location,
                append,
                no_merges,
                timeout,
            } => collect(&mut session, &location, append, !no_merges, timeout),
            Commands::Issues { github, timeout } => {
                let cancel = cancel_token(timeout);
                let count = collect_issues(&mut session, &github, &cancel)?;
                println!("Recorded issue activity for {} logins", style(count).cyan());
                Ok(())
            }
            Commands::Profiles { append } => {
                if let Some(profiles) = build_profiles(&mut session, write_mode(append))? {
                    println!("Stored profiles for {} contributors", style(profiles.len()).cyan());
                }
                Ok(())
            }
            Commands::Report { fields, json } => show_report(&session, fields, json),
            Commands::Merge { keep, remove } => merge(&mut session, &keep, &remove),
            Commands::Scores { json } => scores(&session, json),
        }
    }
}

fn run(
    session: &mut Session,
    github: GithubArgs,
    link: Option<String>,
    fields: Option<Vec<String>>,
    timeout: Option<Duration>,
) -> Result<()> {
    let cancel = cancel_token(timeout);
    collect_issues(session, &github, &cancel)?;

    match link {
        Some(link) if validate_link(&link) => {
            let repo = GitRepo::open(&link).context("Failed to open git repository")?;
            harvest::collect_raw_data(session.store.as_mut(), &repo, true, WriteMode::Overwrite, &cancel)
                .context("Failed to collect commits from repository")?;
        }
        Some(_) => println!("{INVALID_LINK_MESSAGE}"),
        None => {}
    }

    let Some(profiles) = build_profiles(session, WriteMode::Overwrite)? else {
        return Ok(());
    };
    let fields = session.fields(fields);
    print!("{}", report::render_profiles(&profiles, &fields)?);
    Ok(())
}

fn collect(
    session: &mut Session,
    location: &str,
    append: bool,
    include_merges: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    let repo = GitRepo::open(location).context("Failed to open git repository")?;
    let count = harvest::collect_raw_data(
        session.store.as_mut(),
        &repo,
        include_merges,
        write_mode(append),
        &cancel_token(timeout),
    )
    .context("Failed to collect commits from repository")?;
    println!("Stored {} commits from {}", style(count).cyan(), repo.path().display());
    Ok(())
}

fn collect_issues(session: &mut Session, args: &GithubArgs, cancel: &CancelToken) -> Result<usize> {
    let repo = github::authenticate(&session.config.github.api_url, &args.token, &args.repo)
        .context("Failed to authenticate with GitHub")?;
    let start = activity::load_activity(session.store.as_ref()).context("Failed to load stored issue activity")?;
    let activity = activity::collect_activity(repo.issues(args.state), start, merge_policy(args.legacy_append), cancel)
        .context("Failed to collect issue activity")?;
    activity::save_activity(session.store.as_mut(), &activity, WriteMode::Overwrite)
        .context("Failed to store issue activity")?;
    Ok(activity.len())
}

/// Rebuild and store profiles; `None` when no raw data exists yet.
fn build_profiles(session: &mut Session, mode: WriteMode) -> Result<Option<Profiles>> {
    let mut profiles = aggregate::calculate_profiles(session.store.as_ref()).context("Failed to read raw data")?;
    if profiles.is_empty() {
        eprintln!(
            "No commit data collected yet. Run `cogitate collect <LOCATION>` or pass --link to `cogitate run`."
        );
        return Ok(None);
    }

    let activity = activity::load_activity(session.store.as_ref()).context("Failed to load stored issue activity")?;
    let unmapped = aggregate::attach_activity(&mut profiles, &activity, &session.config.identities);
    for login in &unmapped {
        warn!(%login, "no identity mapping for login; activity kept separate");
    }

    aggregate::save_profiles(session.store.as_mut(), &profiles, mode).context("Failed to store profiles")?;
    info!(contributors = profiles.len(), "profiles stored");
    Ok(Some(profiles))
}

fn show_report(session: &Session, fields: Option<Vec<String>>, json: bool) -> Result<()> {
    let doc = session.store.load(PROFILE_DOCUMENT).context("Failed to load profiles")?;
    let fields = session.fields(fields);
    if json {
        let output = report::report_output(&doc, &fields)?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    if doc.is_empty() {
        println!("No profiles stored yet. Run `cogitate profiles` first.");
        return Ok(());
    }
    print!("{}", report::render_table(&doc, &fields)?);
    Ok(())
}

fn merge(session: &mut Session, keep: &str, remove: &str) -> Result<()> {
    let mut profiles = aggregate::load_profiles(session.store.as_ref()).context("Failed to load profiles")?;
    aggregate::merge_identities(&mut profiles, keep, remove)?;
    aggregate::save_profiles(session.store.as_mut(), &profiles, WriteMode::Overwrite)
        .context("Failed to store profiles")?;
    println!("Merged {} into {}", style(remove).yellow(), style(keep).green());
    println!("{}", style(MERGE_REBUILD_NOTE).dim());
    Ok(())
}

fn scores(session: &Session, json: bool) -> Result<()> {
    let profiles = aggregate::load_profiles(session.store.as_ref()).context("Failed to load profiles")?;
    let percentages = TeamSample::from_profiles(&profiles).contribution_percentages();
    if json {
        println!("{}", serde_json::to_string_pretty(&percentages)?);
        return Ok(());
    }

    let mut doc = Document::new();
    for (member, categories) in &percentages {
        let row = categories
            .iter()
            .map(|(category, pct)| (category.clone(), Value::String(format!("{pct}%"))))
            .collect();
        doc.insert(member.clone(), Value::Object(row));
    }
    let fields: Vec<String> = SCORED_CATEGORIES.iter().map(|c| c.to_string()).collect();
    print!("{}", report::render_table(&doc, &fields)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_must_be_http_urls_with_a_host() {
        assert!(validate_link("https://github.com/org/repo"));
        assert!(validate_link("http://example.com/repo.git"));
        assert!(!validate_link("not a url"));
        assert!(!validate_link("ftp://example.com/repo"));
        assert!(!validate_link("None"));
        assert!(!validate_link(""));
    }

    #[test]
    fn run_parses_the_documented_flags() {
        let cli = Cli::try_parse_from([
            "cogitate", "run", "--token", "t", "--repo", "org/repo", "--state", "all", "--link",
            "https://github.com/org/repo", "--fields", "EMAIL,COMMITS",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { github, link, fields, .. } => {
                assert_eq!(github.token, "t");
                assert_eq!(github.repo, "org/repo");
                assert_eq!(github.state, Some(IssueState::All));
                assert_eq!(link.as_deref(), Some("https://github.com/org/repo"));
                assert_eq!(fields, Some(vec!["EMAIL".to_string(), "COMMITS".to_string()]));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_token_and_repo() {
        assert!(Cli::try_parse_from(["cogitate", "run", "--repo", "org/repo"]).is_err());
        assert!(Cli::try_parse_from(["cogitate", "run", "--token", "t"]).is_err());
    }

    #[test]
    fn timeouts_parse_as_durations() {
        let cli = Cli::try_parse_from(["cogitate", "collect", ".", "--timeout", "90s"]).unwrap();
        match cli.command {
            Commands::Collect { timeout, .. } => assert_eq!(timeout, Some(Duration::from_secs(90))),
            _ => panic!("expected collect"),
        }
    }
}
