//! `strata scan` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use strata_core::config::StrataConfig;
use strata_core::pipeline::Pipeline;
use strata_core::types::{Artifact, Asset};
use strata_scan_engine::{ImageScannerBuilder, ScanEngineConfig};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    // Missing config file falls back to defaults; a present but invalid one
    // is still fatal.
    let config = if config_path.is_file() {
        StrataConfig::load(config_path).await?
    } else {
        debug!(path = %config_path.display(), "config file not found, using defaults");
        StrataConfig::default()
    };

    let mut engine_config = ScanEngineConfig::from_core(&config.scan);
    engine_config.enabled = true;
    engine_config.scan_roots = vec![args.path.display().to_string()];
    engine_config.max_scan_secs = args.max_scan_secs;
    if args.no_implicit_unwrap {
        engine_config.implicit_unwrap = false;
    }
    if let Some(dir) = &args.pattern_dir {
        engine_config.pattern_dir = dir.display().to_string();
    }
    if let Some(path) = &args.hint_db {
        engine_config.hint_db_path = path.display().to_string();
    }
    engine_config
        .validate()
        .map_err(|e| CliError::Scan(format!("invalid scan config: {e}")))?;

    info!(path = %args.path.display(), "starting scan");

    let (mut scanner, _event_rx) = ImageScannerBuilder::new()
        .config(engine_config)
        .build()
        .map_err(|e| CliError::Scan(format!("failed to build scanner: {e}")))?;

    scanner.start().await?;
    let reports = scanner.scan_once().await?;
    scanner.stop().await?;

    let report = build_scan_report(reports, args.all);
    writer.render(&report)?;

    Ok(())
}

fn build_scan_report(
    reports: Vec<strata_scan_engine::ScanReport>,
    include_deleted: bool,
) -> ScanCommandReport {
    let mut artifacts = Vec::new();
    let mut assets = Vec::new();
    let mut task_failures = 0;
    let mut tasks_abandoned = 0;

    for report in reports {
        task_failures += report.task_failures;
        tasks_abandoned += report.tasks_abandoned;
        assets.extend(report.inventory.assets);
        artifacts.extend(
            report
                .inventory
                .artifacts
                .into_iter()
                .filter(|a| include_deleted || !a.marked_for_deletion),
        );
    }

    ScanCommandReport {
        artifact_count: artifacts.len(),
        asset_count: assets.len(),
        task_failures,
        tasks_abandoned,
        artifacts,
        assets,
    }
}

/// Aggregated output payload for the `scan` command.
#[derive(Debug, Serialize)]
pub struct ScanCommandReport {
    pub artifact_count: usize,
    pub asset_count: usize,
    pub task_failures: u64,
    pub tasks_abandoned: u64,
    pub artifacts: Vec<Artifact>,
    pub assets: Vec<Asset>,
}

impl Render for ScanCommandReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Scan complete: {} artifacts, {} assets ({} task failures)",
            self.artifact_count, self.asset_count, self.task_failures
        )?;
        if self.tasks_abandoned > 0 {
            writeln!(w, "warning: {} tasks abandoned (time budget)", self.tasks_abandoned)?;
        }

        if !self.assets.is_empty() {
            writeln!(w)?;
            writeln!(w, "Assets:")?;
            for asset in &self.assets {
                writeln!(w, "  {:<40} {}", asset.id, asset.path)?;
            }
        }

        writeln!(w)?;
        writeln!(w, "{:<50} {:<12} {:<34} ISSUES", "PATH", "TYPE", "DIGEST")?;
        writeln!(w, "{}", "-".repeat(100))?;
        for artifact in &self.artifacts {
            let artifact_type = artifact.artifact_type.as_deref().unwrap_or("-");
            let digest = artifact
                .checksums
                .as_ref()
                .map(|c| c.digest.as_str())
                .unwrap_or("-");
            let issues = if artifact.issues.is_empty() {
                String::new()
            } else {
                artifact.issues_joined()
            };
            writeln!(
                w,
                "{:<50} {:<12} {:<34} {}",
                artifact.path, artifact_type, digest, issues
            )?;
        }
        Ok(())
    }
}
