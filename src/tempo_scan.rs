use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use beatfield::audio::{decode_mono, TempoEstimate, TempoEstimator};

#[derive(Parser)]
#[command(name = "tempo-scan")]
#[command(about = "Estimate the tempo of audio files ahead of visualization")]
struct Args {
    /// Audio files to scan (MP3, WAV, FLAC, OGG, etc.)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write the results as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScanEntry {
    file: PathBuf,
    #[serde(flatten)]
    estimate: Option<TempoEstimate>,
    error: Option<String>,
}

fn scan(path: PathBuf) -> ScanEntry {
    let result = decode_mono(&path)
        .map(|(samples, sample_rate)| TempoEstimator::new(sample_rate).estimate(&samples));
    match result {
        Ok(estimate) => ScanEntry {
            file: path,
            estimate,
            error: None,
        },
        Err(e) => ScanEntry {
            file: path,
            estimate: None,
            error: Some(e.to_string()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Tempo scan of {} file(s)", args.files.len());

    let handles: Vec<_> = args
        .files
        .into_iter()
        .map(|path| tokio::task::spawn_blocking(move || scan(path)))
        .collect();

    let mut entries = Vec::with_capacity(handles.len());
    for handle in handles {
        let entry = handle.await?;
        match (&entry.estimate, &entry.error) {
            (Some(estimate), _) => println!(
                "{}: {:.1} bpm ({} onsets, {:.1}s)",
                entry.file.display(),
                estimate.bpm,
                estimate.onsets,
                estimate.duration_seconds
            ),
            (None, Some(e)) => warn!("{}: {}", entry.file.display(), e),
            (None, None) => println!("{}: no steady tempo found", entry.file.display()),
        }
        entries.push(entry);
    }

    if let Some(output) = &args.output {
        std::fs::write(output, serde_json::to_string_pretty(&entries)?)?;
        info!("Results saved to {}", output.display());
    }

    Ok(())
}
