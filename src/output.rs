use crate::run::{Outcome, RunSummary};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `<dir>/<board>_<run_started>_backup.json`, absolute when the working
/// directory is known. Every board of a run shares `run_started`.
pub fn backup_path(dir: &Path, board: &str, run_started: i64) -> PathBuf {
    let path = dir.join(format!("{}_{}_backup.json", file_safe(board), run_started));
    std::path::absolute(&path).unwrap_or(path)
}

/// Writes the dashboard exactly as fetched, pretty printed.
pub fn write_backup(path: &Path, document: &Value) -> io::Result<()> {
    create_parent_dirs(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.flush()
}

pub fn write_preview(out: &mut dyn Write, document: &Value) -> io::Result<()> {
    writeln!(out, "Preview of annotated board:")?;
    writeln!(out, "{}", serde_json::to_string(document)?)?;
    writeln!(out, "DRY RUN: Board not updated.")
}

pub fn write_summary(out: &mut dyn Write, summary: &RunSummary) -> io::Result<()> {
    for board in &summary.boards {
        match &board.outcome {
            Outcome::Updated { backup, annotated } => writeln!(
                out,
                "{}: updated ({} widgets annotated, backup {})",
                board.board,
                annotated,
                backup.display()
            )?,
            Outcome::Previewed { annotated } => writeln!(
                out,
                "{}: previewed ({} widgets would be annotated)",
                board.board, annotated
            )?,
            Outcome::Failed(error) => writeln!(out, "{}: failed: {}", board.board, error)?,
            Outcome::Skipped => writeln!(out, "{}: skipped", board.board)?,
        }
    }

    writeln!(
        out,
        "{} succeeded, {} failed, {} skipped",
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    )?;
    out.flush()
}

fn create_parent_dirs(file_path: &Path) -> io::Result<()> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn file_safe(board: &str) -> String {
    board.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::BoardOutcome;
    use crate::store::StoreError;
    use serde_json::json;

    #[test]
    fn backup_path_embeds_board_and_run_time() {
        let path = backup_path(Path::new("/var/backups"), "ApiDashboard", 1541437440);
        assert_eq!(path, PathBuf::from("/var/backups/ApiDashboard_1541437440_backup.json"));
    }

    #[test]
    fn backup_path_is_absolute_and_flattens_separators() {
        let path = backup_path(Path::new("."), "team/api", 7);
        assert!(path.is_absolute());
        assert!(path.ends_with("team_api_7_backup.json"));
    }

    #[test]
    fn backup_is_pretty_and_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ops_1_backup.json");
        let document = json!({ "widgets": [{ "type": "metric", "properties": {} }], "start": "-PT3H" });

        write_backup(&path, &document).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"widgets\": ["));
        assert_eq!(serde_json::from_str::<Value>(&written).unwrap(), document);
    }

    #[test]
    fn backup_keeps_integers_beyond_u64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops_1_backup.json");
        let document: Value = serde_json::from_str(r#"{"widgets":[],"big":18446744073709551616}"#).unwrap();

        write_backup(&path, &document).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"widgets\": [],\n  \"big\": 18446744073709551616\n}"
        );
    }

    #[test]
    fn preview_prints_compact_json_between_banners() {
        let mut out: Vec<u8> = Vec::new();
        write_preview(&mut out, &json!({ "widgets": [] })).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Preview of annotated board:\n{\"widgets\":[]}\nDRY RUN: Board not updated.\n"
        );
    }

    #[test]
    fn summary_lists_each_board_and_totals() {
        let summary = RunSummary {
            boards: vec![
                BoardOutcome {
                    board: "api".to_string(),
                    outcome: Outcome::Previewed { annotated: 3 },
                },
                BoardOutcome {
                    board: "gone".to_string(),
                    outcome: Outcome::Failed(StoreError::NotFound("gone".to_string()).into()),
                },
                BoardOutcome {
                    board: "later".to_string(),
                    outcome: Outcome::Skipped,
                },
            ],
        };

        let mut out: Vec<u8> = Vec::new();
        write_summary(&mut out, &summary).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "api: previewed (3 widgets would be annotated)\n\
             gone: failed: dashboard `gone` does not exist\n\
             later: skipped\n\
             1 succeeded, 1 failed, 1 skipped\n"
        );
    }
}
