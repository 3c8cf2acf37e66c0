//! `strata patterns` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use strata_core::config::StrataConfig;
use strata_scan_engine::{PatternLoader, PatternMatcher};

use crate::cli::{PatternsAction, PatternsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Pattern rule cap for validation runs.
const MAX_RULES: usize = 1_000;

/// Execute the `patterns` command.
pub async fn execute(
    args: PatternsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        PatternsAction::Validate { dir } => validate(dir, config_path, writer).await,
    }
}

async fn validate(
    dir: Option<PathBuf>,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let dir = match dir {
        Some(dir) => dir,
        None => {
            let config = if config_path.is_file() {
                StrataConfig::load(config_path).await?
            } else {
                debug!(path = %config_path.display(), "config file not found, using defaults");
                StrataConfig::default()
            };
            PathBuf::from(config.scan.pattern_dir)
        }
    };

    // Loading and compiling is exactly what engine startup does -- a pattern
    // set that validates here cannot fail a scan later.
    let rules = PatternLoader::load_directory(&dir, MAX_RULES)
        .await
        .map_err(|e| CliError::Pattern(e.to_string()))?;

    let mut matcher = PatternMatcher::with_defaults().map_err(|e| CliError::Pattern(e.to_string()))?;
    let builtin_count = matcher.pattern_count();
    for rule in rules {
        matcher
            .add_rule(rule)
            .map_err(|e| CliError::Pattern(e.to_string()))?;
    }

    let report = ValidateReport {
        dir: dir.display().to_string(),
        builtin_patterns: builtin_count,
        site_patterns: matcher.pattern_count() - builtin_count,
        rule_ids: matcher.rule_ids().iter().map(|s| (*s).to_owned()).collect(),
    };
    writer.render(&report)?;
    Ok(())
}

/// Output payload for `patterns validate`.
#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub dir: String,
    pub builtin_patterns: usize,
    pub site_patterns: usize,
    pub rule_ids: Vec<String>,
}

impl Render for ValidateReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Patterns OK: {} built-in + {} site rules from {}",
            self.builtin_patterns, self.site_patterns, self.dir
        )?;
        for id in &self.rule_ids {
            writeln!(w, "  {id}")?;
        }
        Ok(())
    }
}
