// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers: read files, run the engine, write results.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use unmark_core::config::EngineConfig;
use unmark_core::error::Result;
use unmark_core::human_errors::success_message;
use unmark_core::types::{JobReport, Operation, ProcessOptions};
use unmark_pipeline::{Engine, ProcessOutput};

use crate::cli::{Cli, Commands};

/// Engine configuration from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::load(path)?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// `report.pdf` becomes `report_unmarked.pdf` in the same directory.
pub fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    input.with_file_name(format!("{stem}_unmarked.pdf"))
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    if let Commands::Config { output } = &cli.command {
        config.save(output)?;
        info!(path = %output.display(), "config written");
        return Ok(());
    }
    let engine = Engine::new(config)?;

    match cli.command {
        Commands::RemoveWatermark { input, output, report } => {
            let output = output.unwrap_or_else(|| default_output(&input));
            let result = engine
                .process(read(&input).await?, Operation::RemoveWatermark, Vec::new())
                .await?;
            emit(result, &output, report.as_deref()).await
        }
        Commands::RemoveQrcode { input, output, report } => {
            let output = output.unwrap_or_else(|| default_output(&input));
            let result = engine
                .process(read(&input).await?, Operation::RemoveQrcode, Vec::new())
                .await?;
            emit(result, &output, report.as_deref()).await
        }
        Commands::Merge { inputs, output, report } => {
            let mut documents = read_all(&inputs).await?.into_iter();
            let first = documents.next().unwrap_or_default();
            let result = engine.process(first, Operation::Merge, documents.collect()).await?;
            emit(result, &output, report.as_deref()).await
        }
        Commands::Scan { input, pretty } => {
            let scan = engine.scan_report(read(&input).await?).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&scan)?
            } else {
                serde_json::to_string(&scan)?
            };
            println!("{json}");
            Ok(())
        }
        Commands::Batch {
            inputs,
            output,
            keep_text,
            keep_qrcode,
            no_compress,
            report,
        } => {
            let options = ProcessOptions {
                remove_text: !keep_text,
                remove_qr: !keep_qrcode,
                merge: true,
                compress: !no_compress,
            };
            let result = engine.process_batch(read_all(&inputs).await?, options).await?;
            emit(result, &output, report.as_deref()).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    let data = tokio::fs::read(path).await?;
    debug!(path = %path.display(), bytes = data.len(), "input read");
    Ok(data)
}

async fn read_all(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        documents.push(read(path).await?);
    }
    Ok(documents)
}

async fn emit(result: ProcessOutput, output: &Path, report_path: Option<&Path>) -> Result<()> {
    tokio::fs::write(output, &result.bytes).await?;
    info!(path = %output.display(), bytes = result.bytes.len(), "output written");
    if let Some(path) = report_path {
        write_report(&result.report, path).await?;
    }
    println!("{}", success_message(&result.report));
    Ok(())
}

async fn write_report(report: &JobReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
