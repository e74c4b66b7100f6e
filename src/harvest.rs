use crate::cancel::CancelToken;
use crate::error::Result;
use crate::git::GitRepo;
use crate::model::{CommitSummary, RawCommit};
use crate::store::{Document, DocumentStore, WriteMode, RAW_DATA_DOCUMENT, RAW_DATA_KEY};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Fold one raw commit's modifications into a summary. Unknown sizes and
/// complexities count as zero.
pub fn summarize(raw: RawCommit) -> CommitSummary {
    let mut summary = CommitSummary {
        hash: raw.hash,
        message: raw.msg,
        author_name: raw.author.name,
        author_email: raw.author.email,
        is_merge: raw.merge,
        lines_added: 0,
        lines_removed: 0,
        lines_of_code: 0,
        complexity: 0,
        methods: Vec::new(),
        filenames: Vec::with_capacity(raw.modifications.len()),
        filepaths: Vec::with_capacity(raw.modifications.len()),
    };

    for m in raw.modifications {
        summary.lines_added += m.added;
        summary.lines_removed += m.removed;
        summary.lines_of_code += m.nloc.unwrap_or(0);
        summary.complexity += m.complexity.unwrap_or(0);
        summary.methods.extend(m.methods.into_iter().map(|method| method.name));
        summary.filenames.push(m.filename);
        summary.filepaths.push(m.new_path);
    }

    summary
}

/// Consume a one-shot commit sequence in order. The first error (or a
/// cancellation noticed between commits) discards everything gathered so far.
pub fn harvest<I>(commits: I, cancel: &CancelToken) -> Result<Vec<CommitSummary>>
where
    I: IntoIterator<Item = Result<RawCommit>>,
{
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Harvesting commits...");

    let mut summaries = Vec::new();
    for raw in commits {
        if let Err(e) = cancel.check() {
            pb.abandon_with_message("Harvest cancelled");
            return Err(e);
        }
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                pb.abandon_with_message("Harvest failed");
                return Err(e);
            }
        };
        debug!(hash = %raw.hash, files = raw.modifications.len(), "commit harvested");
        summaries.push(summarize(raw));
        pb.inc(1);
    }

    pb.finish_with_message("Commits harvested");
    Ok(summaries)
}

pub fn raw_data_document(summaries: &[CommitSummary]) -> Result<Document> {
    let mut doc = Document::new();
    doc.insert(RAW_DATA_KEY.to_string(), serde_json::to_value(summaries)?);
    Ok(doc)
}

/// Harvest `repo` and persist the result under `RAW_DATA`. Nothing is written
/// unless the whole traversal succeeds.
pub fn collect_raw_data(
    store: &mut dyn DocumentStore,
    repo: &GitRepo,
    include_merges: bool,
    mode: WriteMode,
    cancel: &CancelToken,
) -> Result<usize> {
    info!(repo = %repo.path().display(), "collecting commit data");
    let summaries = harvest(repo.traverse(include_merges)?, cancel)?;
    let count = summaries.len();
    store.write(RAW_DATA_DOCUMENT, raw_data_document(&summaries)?, mode)?;
    info!(commits = count, "raw data stored");
    Ok(count)
}
