use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eml2pdf::{
    collect_inputs, run_batch, BatchObserver, BatchReport, ConversionResult, Converter, ErrorKind,
    Progress, WkHtmlToPdf,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Convert .eml message files into A4 PDF documents.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Message files, or directories searched recursively for *.eml
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, short, env = "EML2PDF_OUTPUT_DIR")]
    output_dir: PathBuf,

    #[arg(long, env = "WKHTMLTOPDF_PATH", default_value = "wkhtmltopdf")]
    wkhtmltopdf_path: String,

    /// Write a JSON manifest of the batch here
    #[arg(long, env = "EML2PDF_REPORT")]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct Manifest<'a> {
    output_dir: String,
    files_attempted: usize,
    files_succeeded: usize,
    files_failed: usize,
    duration_s: f64,
    results: &'a [ConversionResult],
    sha256: BTreeMap<String, String>,
    version: String,
}

enum BatchEvent {
    Progress(Progress),
    Failure { message: String, kind: ErrorKind },
}

/// Forwards batch events from the blocking worker to the foreground task.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl BatchObserver for ChannelObserver {
    fn on_progress(&mut self, progress: Progress) {
        let _ = self.tx.send(BatchEvent::Progress(progress));
    }

    fn on_failure(&mut self, _input: &Path, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(BatchEvent::Failure {
            message: message.to_string(),
            kind,
        });
    }
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_manifest(path: &Path, args: &Args, report: &BatchReport, started: Instant) -> Result<()> {
    let mut sha = BTreeMap::new();
    for result in &report.results {
        if let ConversionResult::Success { output, .. } = result {
            let name = output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("invalid output path {}", output.display()))?;
            sha.insert(name, sha256_file(output)?);
        }
    }
    let manifest = Manifest {
        output_dir: args.output_dir.display().to_string(),
        files_attempted: report.attempted,
        files_succeeded: report.succeeded,
        files_failed: report.failed,
        duration_s: started.elapsed().as_secs_f64(),
        results: &report.results,
        sha256: sha,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let json = serde_json::to_vec_pretty(&manifest)?;
    File::create(path)
        .with_context(|| format!("create {}", path.display()))?
        .write_all(&json)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eml2pdf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let started = Instant::now();

    let inputs = collect_inputs(&args.inputs);
    if inputs.is_empty() {
        return Err(anyhow!("no .eml files found in the given inputs"));
    }
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("create output dir {}", args.output_dir.display()))?;
    info!(files = inputs.len(), output_dir = %args.output_dir.display(), "starting batch");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let converter = Converter::new(WkHtmlToPdf::new(&args.wkhtmltopdf_path));
    let output_dir = args.output_dir.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let mut observer = ChannelObserver { tx };
        run_batch(&converter, &inputs, &output_dir, &mut observer)
    });

    // The sender is dropped when the worker finishes, which ends this loop.
    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Progress(p) => info!(
                completed = p.completed,
                total = p.total,
                "progress {:.0}%",
                p.fraction() * 100.0
            ),
            BatchEvent::Failure { message, kind } => error!(?kind, "{message}"),
        }
    }

    let report = worker.await.context("batch task panicked")?;

    if let Some(path) = &args.report {
        write_manifest(path, &args, &report, started)?;
    }

    println!(
        "OK files_attempted={} succeeded={} failed={} duration_s={:.2}",
        report.attempted,
        report.succeeded,
        report.failed,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
