//! Per-file progress bars drawn from tracker snapshots.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use kbase_business::{ItemId, UploadStatus, UploadTracker};

const TEMPLATE: &str = "{spinner} {prefix:24.24} {bar:40.green/blue} {pos:>3}% {msg}";

pub struct UploadProgress {
    mp: MultiProgress,
    style: ProgressStyle,
    bars: BTreeMap<ItemId, ProgressBar>,
}

impl UploadProgress {
    pub fn new(quiet: bool) -> Result<Self> {
        let mp = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        let style = ProgressStyle::with_template(TEMPLATE)
            .context("Invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏✓")
            .progress_chars("━━─");

        Ok(Self {
            mp,
            style,
            bars: BTreeMap::new(),
        })
    }

    /// Bring the bars in line with the tracker. Called on every tick.
    pub fn render(&mut self, tracker: &UploadTracker) {
        for item in tracker.items() {
            let bar = self.bars.entry(item.id.clone()).or_insert_with(|| {
                let bar = self.mp.add(ProgressBar::new(100));
                bar.set_style(self.style.clone());
                bar.set_prefix(item.file_name.clone());
                bar
            });
            if bar.is_finished() {
                continue;
            }

            bar.set_position(u64::from(item.progress));
            match item.status {
                UploadStatus::Completed => bar.finish_with_message("done"),
                UploadStatus::Error => bar.abandon_with_message(
                    item.error_message
                        .clone()
                        .unwrap_or_else(|| "failed".to_owned()),
                ),
                status => {
                    bar.set_message(status.label());
                    bar.tick();
                }
            }
        }

        // Items removed from the tracker (cancelled) keep their last frame.
        self.bars.retain(|id, bar| {
            let tracked = tracker.get(id).is_some();
            if !tracked && !bar.is_finished() {
                bar.abandon_with_message("cancelled");
            }
            tracked
        });
    }

    /// Stop drawing; unfinished bars are left as they are.
    pub fn finish(self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        drop(self.mp.clear());
    }
}
