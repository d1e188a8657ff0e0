use crate::annotation::{merge, parse_document, DocumentError, Marker};
use crate::output;
use crate::store::{Connect, SessionCache, StoreError};
use std::io::{self, Write};
use std::path::PathBuf;

/// What to do with the remaining boards once one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    HaltOnFirstError,
    ContinueOnError,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub profile: String,
    pub marker: Marker,
    pub dry_run: bool,
    pub backup_dir: PathBuf,
    /// Unix seconds at process start, shared by every backup of the run.
    pub run_started: i64,
    pub policy: FailurePolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed dashboard: {0}")]
    MalformedDocument(#[from] DocumentError),
    #[error("backup to `{}` failed: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing output failed: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug)]
pub enum Outcome {
    Updated { backup: PathBuf, annotated: usize },
    Previewed { annotated: usize },
    Failed(AnnotateError),
    Skipped,
}

#[derive(Debug)]
pub struct BoardOutcome {
    pub board: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub boards: Vec<BoardOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Updated { .. } | Outcome::Previewed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.boards.iter().filter(|b| pred(&b.outcome)).count()
    }
}

/// Annotates `boards` in order, one fetch and at most one replace each.
pub fn run<C: Connect>(
    boards: &[String],
    options: &RunOptions,
    sessions: &mut SessionCache<C>,
    out: &mut dyn Write,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut halted = false;

    for board in boards {
        let outcome = if halted {
            Outcome::Skipped
        } else {
            match update_board(board, options, sessions, out) {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(board = %board, error = %error, "board failed");
                    halted = options.policy == FailurePolicy::HaltOnFirstError;
                    Outcome::Failed(error)
                }
            }
        };
        summary.boards.push(BoardOutcome {
            board: board.clone(),
            outcome,
        });
    }

    summary
}

fn update_board<C: Connect>(
    board: &str,
    options: &RunOptions,
    sessions: &mut SessionCache<C>,
    out: &mut dyn Write,
) -> Result<Outcome, AnnotateError> {
    tracing::debug!(board, profile = %options.profile, "getting board");
    let store = sessions.session(&options.profile)?;
    let document = parse_document(&store.get_dashboard(board)?)?;
    tracing::debug!(board, before = %document, "dashboard before change");

    let backup = if options.dry_run {
        None
    } else {
        let path = output::backup_path(&options.backup_dir, board, options.run_started);
        tracing::debug!(board, path = %path.display(), "backing up old dashboard");
        output::write_backup(&path, &document).map_err(|source| AnnotateError::Backup {
            path: path.clone(),
            source,
        })?;
        writeln!(out, "Old dashboard backed up at: {}", path.display())?;
        Some(path)
    };

    let merged = merge(document, &options.marker)?;
    let outcome = match backup {
        None => {
            output::write_preview(out, &merged.document)?;
            Outcome::Previewed {
                annotated: merged.annotated,
            }
        }
        Some(backup) => {
            let new_body = serde_json::to_string(&merged.document).map_err(DocumentError::from)?;
            tracing::debug!(board, new_body = %new_body, "replacing dashboard");
            let response = store.put_dashboard(board, &new_body)?;
            tracing::debug!(board, response = %response, "put_dashboard response");
            Outcome::Updated {
                backup,
                annotated: merged.annotated,
            }
        }
    };

    tracing::debug!(board, "done with board");
    Ok(outcome)
}
