use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;
use merger_engine::MergeSettings;

/// Merge the first worksheet of several .xls/.xlsx files into one workbook.
///
/// Every file must start with the same header row. Data rows whose key
/// column is blank are skipped.
#[derive(Debug, Parser)]
#[command(name = "merger", version)]
pub struct Cli {
    /// Source workbooks, merged in the given order
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// RON settings file; missing file means defaults
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Merged workbook path (defaults to the first file's folder)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Zero-based column that must be non-blank for a row to be kept
    #[arg(short, long, value_name = "N")]
    pub key_column: Option<usize>,

    /// Rows per status update
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Output row ceiling, header included
    #[arg(long, value_name = "N")]
    pub max_rows: Option<u32>,

    /// Print raw events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Log file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Also log to the terminal, at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Settings file values with command-line overrides applied.
    pub fn settings(&self) -> Result<MergeSettings> {
        let mut settings = match &self.config {
            Some(path) => MergeSettings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => MergeSettings::default(),
        };

        if let Some(key_column) = self.key_column {
            settings.key_column_index = key_column;
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(max_rows) = self.max_rows {
            settings.max_rows = max_rows;
        }
        if let Some(name) = self.output.as_ref().and_then(|p| p.file_name()) {
            settings.output_filename = name.to_string_lossy().into_owned();
        }

        settings.validate().context("invalid merge settings")?;
        Ok(settings)
    }

    /// Folder part of `--output`, if one was given.
    pub fn output_folder(&self) -> Option<PathBuf> {
        let parent = self.output.as_ref()?.parent()?;
        if parent.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(parent.to_path_buf())
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        if self.verbose {
            LogDestination::Both(self.log_file.clone())
        } else {
            LogDestination::File(self.log_file.clone())
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("merger").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["merger"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--key-column",
            "2",
            "--chunk-size",
            "0",
            "--max-rows",
            "10",
            "-o",
            "out/all.xlsx",
            "a.xlsx",
            "b.xls",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.key_column_index, 2);
        assert_eq!(settings.effective_chunk_size(), 1);
        assert_eq!(settings.max_rows, 10);
        assert_eq!(settings.output_filename, "all.xlsx");
        assert_eq!(cli.output_folder(), Some(PathBuf::from("out")));
        assert_eq!(cli.files, vec![PathBuf::from("a.xlsx"), PathBuf::from("b.xls")]);
    }

    #[test]
    fn bare_output_name_uses_current_folder() {
        let cli = parse(&["--output", "merged.xlsx", "a.xlsx"]);
        assert_eq!(cli.output_folder(), Some(PathBuf::from(".")));
    }

    #[test]
    fn no_output_leaves_folder_to_the_session() {
        let cli = parse(&["a.xlsx"]);
        assert_eq!(cli.output_folder(), None);
        assert_eq!(cli.settings().unwrap(), MergeSettings::default());
    }

    #[test]
    fn zero_row_ceiling_is_rejected() {
        let cli = parse(&["--max-rows", "0", "a.xlsx"]);
        assert!(cli.settings().is_err());
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("merger.ron");
        let stored = MergeSettings {
            key_column_index: 4,
            chunk_size: 50,
            ..MergeSettings::default()
        };
        stored.save(&path).unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let cli = parse(&["--config", &path_arg, "--key-column", "1", "a.xlsx"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.key_column_index, 1);
        assert_eq!(settings.chunk_size, 50);
    }

    #[test]
    fn verbose_logs_to_both() {
        let cli = parse(&["-v", "a.xlsx"]);
        assert_eq!(
            cli.log_destination(),
            LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE))
        );
        assert_eq!(cli.log_level(), LevelFilter::Debug);
    }
}
