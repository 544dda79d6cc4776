//! The pack pipeline: word list → concurrent fetchers → single writer
//!
//! N workers fetch and transcode definitions concurrently, feeding a
//! bounded channel. One blocking task owns the `DictFile` and drains the
//! channel; the storage layer is single-threaded by design, so all
//! writes funnel through it. The word index is flushed once at the end.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task;
use tracing::{info, warn};

use sdict_core::{AddOptions, DictFile};

use crate::config::PackConfig;
use crate::fetch::Definitions;
use crate::progress::{self, ProgressReporter};
use crate::transcode;

/// Read the word list: one word per line, lowercased, blanks skipped.
///
/// Duplicates are dropped here because the writer skips per-word
/// duplicate checks; a repeated word would otherwise surface as a
/// flush-time error.
fn load_word_list(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening word list {}", path.display()))?;
    let mut words = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let word = line.trim();
        if word.is_empty() {
            continue;
        }
        let word = word.to_ascii_lowercase();
        if seen.insert(word.clone()) {
            words.push(word);
        }
    }
    Ok(words)
}

pub async fn run(
    words_path: &Path,
    output: &Path,
    config: PackConfig,
    overwrite: bool,
) -> Result<()> {
    let api_key = fs::read_to_string(&config.api_key_file)
        .with_context(|| format!("reading API key from {}", config.api_key_file.display()))?
        .trim()
        .to_string();

    if overwrite && output.exists() {
        fs::remove_file(output)
            .with_context(|| format!("removing existing output {}", output.display()))?;
    }

    let words = load_word_list(words_path)?;
    let words_total = words.len();
    info!("packing {} words into {}", words_total, output.display());

    let fetcher = Arc::new(Definitions::new(&config.endpoint, api_key)?);
    let reporter = ProgressReporter::new(words_total as u64);

    let (word_tx, word_rx) = mpsc::channel::<String>(config.word_buffer);
    let word_rx = Arc::new(Mutex::new(word_rx));
    let (def_tx, mut def_rx) = mpsc::channel::<(String, Vec<u8>)>(config.def_buffer);

    let feeder = tokio::spawn(async move {
        for word in words {
            if word_tx.send(word).await.is_err() {
                break;
            }
        }
    });

    let mut workers = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        let word_rx = Arc::clone(&word_rx);
        let def_tx = def_tx.clone();
        let fetcher = Arc::clone(&fetcher);
        workers.push(tokio::spawn(async move {
            loop {
                let word = { word_rx.lock().await.recv().await };
                let Some(word) = word else { break };
                let json = fetcher.fetch(&word).await?;
                let cbor = transcode::json_to_cbor(&json)?;
                if def_tx.send((word, cbor)).await.is_err() {
                    break;
                }
            }
            anyhow::Ok(())
        }));
    }
    // the writer must see its channel close once all workers are done,
    // and the feeder must see the word channel close if every worker
    // dies early
    drop(def_tx);
    drop(word_rx);

    let writer_output = output.to_path_buf();
    let writer_reporter = reporter.clone();
    let writer = task::spawn_blocking(move || write_definitions(
        &writer_output,
        &mut def_rx,
        &writer_reporter,
    ));

    feeder.await?;
    let mut failed_workers = 0usize;
    for worker in workers {
        if let Err(e) = worker.await? {
            warn!("fetch worker failed: {e:#}");
            failed_workers += 1;
        }
    }
    let words_packed = writer.await??;
    reporter.finish();

    if failed_workers > 0 {
        bail!(
            "{failed_workers} fetch workers failed; {words_packed} words were packed and flushed"
        );
    }

    progress::print_pack_report(words_packed, words_total, output);
    Ok(())
}

/// The single writer: drains fetched definitions into the dictionary
/// file with batched index updates, then flushes once.
fn write_definitions(
    output: &Path,
    def_rx: &mut mpsc::Receiver<(String, Vec<u8>)>,
    reporter: &ProgressReporter,
) -> Result<usize> {
    let mut dict = DictFile::open(output)?;
    let opts = AddOptions {
        flush_words: false,
        skip_dup_check: true,
    };

    let mut packed = 0usize;
    while let Some((word, def)) = def_rx.blocking_recv() {
        dict.add_word_with(word.as_bytes(), &def, opts)?;
        packed += 1;
        reporter.inc();
    }
    dict.flush()?;
    Ok(packed)
}
