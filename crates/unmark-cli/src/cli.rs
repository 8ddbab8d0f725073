// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "unmark")]
#[command(about = "Remove scanner-app watermarks and QR stamps from PDFs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// JSON engine configuration (defaults apply to anything it leaves out)
    #[arg(long, global = true, env = "UNMARK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Strip CamScanner text watermarks
    RemoveWatermark {
        input: PathBuf,

        /// Output file (default: <input>_unmarked.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the job report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Strip the QR stamp from the bottom-right corner
    RemoveQrcode {
        input: PathBuf,

        /// Output file (default: <input>_unmarked.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the job report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Concatenate documents in the order given
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,

        /// Also write the job report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Report watermarks without changing anything
    Scan {
        input: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Write the effective configuration (defaults plus --config) as JSON
    Config {
        #[arg(short, long, default_value = "unmark.json")]
        output: PathBuf,
    },

    /// Clean every document, then merge them into one
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "unmarked.pdf")]
        output: PathBuf,

        /// Leave text watermarks in place
        #[arg(long)]
        keep_text: bool,

        /// Leave QR stamps in place
        #[arg(long)]
        keep_qrcode: bool,

        /// Skip stream compression
        #[arg(long)]
        no_compress: bool,

        /// Also write the job report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}
