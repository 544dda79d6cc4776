//! Progress reporting for the packer

use indicatif::{ProgressBar, ProgressStyle};

/// Single progress bar tracking packed words.
///
/// Cloneable and thread-safe, so the blocking writer task can drive it
/// while the async side owns the original.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(total_words: u64) -> Self {
        let bar = ProgressBar::new(total_words);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} ({per_sec}) {msg}",
                )
                .unwrap()
                .progress_chars("█▓▒░-"),
        );
        Self { bar }
    }

    /// Record one more packed word.
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

/// Print a closing summary after a pack run.
pub fn print_pack_report(words_packed: usize, words_total: usize, output: &std::path::Path) {
    println!("\n{}", "═".repeat(60));
    println!("Pack complete");
    println!("{}", "═".repeat(60));
    println!("Output:        {}", output.display());
    println!("Words packed:  {words_packed} of {words_total}");
    println!("{}", "═".repeat(60));
}
