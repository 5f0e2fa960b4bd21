//! Upload state tracker.
//!
//! The tracker owns every [`UploadItem`] of the current selection. The owner
//! mutates it directly (intake, removal); everything else goes through a
//! cloneable [`TrackerUpdater`] whose messages are applied, in order, by
//! [`UploadTracker::sync`]. All mutations are therefore serialized on the
//! owner, whatever task the transfer runs on.
//!
//! Updates are keyed by [`ItemId`]. An update for an id that is no longer
//! tracked (the user removed it while a request was in flight) is dropped.

use flume::{Receiver, Sender};

use crate::item::{FileSource, ItemId, ItemPatch, UploadItem, UploadStatus};
use tokio_util::sync::CancellationToken;

type Update = (ItemId, ItemPatch);

/// Sending half handed to the transfer executor.
#[derive(Debug, Clone)]
pub struct TrackerUpdater {
    send: Sender<Update>,
}

impl TrackerUpdater {
    /// Queue a patch for the item. Never fails: if the tracker is gone the
    /// update has nobody to observe it.
    pub fn update(&self, id: &ItemId, patch: ItemPatch) {
        if self.send.send((id.clone(), patch)).is_err() {
            log::trace!("Tracker dropped, discarding update for {id}");
        }
    }
}

/// Counts per status, for rendering and batch decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSummary {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Everything the executor needs to run one item, detached from the tracker.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub id: ItemId,
    pub file: FileSource,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub cancel: CancellationToken,
    /// Cancelled by [`UploadTracker::cancel_all`], never by a removal.
    pub interrupt: CancellationToken,
}

#[derive(Debug)]
pub struct UploadTracker {
    items: Vec<UploadItem>,
    interrupt: CancellationToken,
    send: Sender<Update>,
    recv: Receiver<Update>,
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadTracker {
    pub fn new() -> Self {
        let (send, recv) = flume::unbounded();
        Self {
            items: Vec::new(),
            interrupt: CancellationToken::new(),
            send,
            recv,
        }
    }

    pub fn updater(&self) -> TrackerUpdater {
        TrackerUpdater {
            send: self.send.clone(),
        }
    }

    /// Append an item, keeping selection order.
    pub fn push(&mut self, item: UploadItem) -> ItemId {
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Merge a patch into the item with `id`. Returns `false` when the id is
    /// not tracked.
    pub fn update(&mut self, id: &ItemId, patch: ItemPatch) -> bool {
        match self.items.iter_mut().find(|item| item.id == *id) {
            Some(item) => {
                item.apply(patch);
                true
            }
            None => {
                log::trace!("Ignoring update for untracked item {id}");
                false
            }
        }
    }

    /// Apply every queued update. Returns how many were queued.
    pub fn sync(&mut self) -> usize {
        let mut count = 0;
        while let Ok((id, patch)) = self.recv.try_recv() {
            self.update(&id, patch);
            count += 1;
        }
        count
    }

    /// Drop an item and release its file handle.
    ///
    /// Removing an in-flight item cancels its token so the running step
    /// stops; its later updates are discarded.
    pub fn remove(&mut self, id: &ItemId) -> Option<UploadItem> {
        let index = self.items.iter().position(|item| item.id == *id)?;
        let item = self.items.remove(index);
        item.cancel.cancel();
        if item.status.is_in_flight() {
            tracing::info!(item = %id, status = %item.status, "Removed item while in flight");
        }
        Some(item)
    }

    /// Cancel every item without removing it. Used to abort a running batch.
    ///
    /// Items cancelled this way stay tracked and are reported as interrupted,
    /// not as removed. The tracker does not start them again.
    pub fn cancel_all(&self) {
        self.interrupt.cancel();
        for item in &self.items {
            item.cancel.cancel();
        }
    }

    /// Drop every item in a terminal state, returning how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.status.is_terminal());
        before - self.items.len()
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, id: &ItemId) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Jobs for every pending item, in selection order.
    pub fn pending_jobs(&self) -> Vec<TransferJob> {
        self.items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .map(|item| TransferJob {
                id: item.id.clone(),
                file: item.file.clone(),
                file_name: item.file_name.clone(),
                mime_type: item.mime_type.clone(),
                size: item.size,
                cancel: item.cancel.clone(),
                interrupt: self.interrupt.clone(),
            })
            .collect()
    }

    /// A batch can start when something is pending, nothing is running and
    /// the tracker was not interrupted.
    pub fn can_start_batch(&self) -> bool {
        let summary = self.summary();
        summary.pending > 0 && summary.in_flight == 0 && !self.is_interrupted()
    }

    pub fn summary(&self) -> TrackerSummary {
        let mut summary = TrackerSummary::default();
        for item in &self.items {
            match item.status {
                UploadStatus::Pending => summary.pending += 1,
                UploadStatus::Creating | UploadStatus::Uploading | UploadStatus::Acknowledging => {
                    summary.in_flight += 1;
                }
                UploadStatus::Completed => summary.completed += 1,
                UploadStatus::Error => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn tracked(tracker: &mut UploadTracker, name: &str) -> ItemId {
        tracker.push(UploadItem::new(
            FileSource::Memory(Arc::from(&b"data"[..])),
            name.to_owned(),
            4,
            ".txt".to_owned(),
            "text/plain".to_owned(),
        ))
    }

    #[test]
    fn test_update_is_keyed() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        let b = tracked(&mut tracker, "b.txt");

        assert!(tracker.update(&b, ItemPatch::enter(UploadStatus::Creating, 0)));

        assert_eq!(tracker.get(&a).unwrap().status, UploadStatus::Pending);
        assert_eq!(tracker.get(&b).unwrap().status, UploadStatus::Creating);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut tracker = UploadTracker::new();
        tracked(&mut tracker, "a.txt");
        assert!(!tracker.update(&ItemId::from("missing"), ItemPatch::failed("x")));
        assert_eq!(tracker.summary().pending, 1);
    }

    #[test]
    fn test_updater_applies_on_sync_in_order() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        let updater = tracker.updater();

        updater.update(&a, ItemPatch::enter(UploadStatus::Uploading, 0));
        updater.update(&a, ItemPatch::progress(30));
        updater.update(&a, ItemPatch::progress(60));
        assert_eq!(tracker.get(&a).unwrap().status, UploadStatus::Pending);

        assert_eq!(tracker.sync(), 3);
        let item = tracker.get(&a).unwrap();
        assert_eq!(item.status, UploadStatus::Uploading);
        assert_eq!(item.progress, 60);
    }

    #[test]
    fn test_remove_cancels_and_late_updates_do_not_resurrect() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        let token = tracker.get(&a).unwrap().cancellation_token();
        let updater = tracker.updater();

        tracker.update(&a, ItemPatch::enter(UploadStatus::Uploading, 0));
        let removed = tracker.remove(&a).unwrap();
        assert_eq!(removed.file_name, "a.txt");
        assert!(token.is_cancelled());

        updater.update(&a, ItemPatch::enter(UploadStatus::Acknowledging, 90));
        tracker.sync();
        assert!(tracker.is_empty());
        assert!(tracker.get(&a).is_none());
    }

    #[test]
    fn test_updater_outliving_tracker() {
        let tracker = UploadTracker::new();
        let updater = tracker.updater();
        drop(tracker);
        updater.update(&ItemId::from("gone"), ItemPatch::progress(10));
    }

    #[test]
    fn test_can_start_batch() {
        let mut tracker = UploadTracker::new();
        assert!(!tracker.can_start_batch());

        let a = tracked(&mut tracker, "a.txt");
        let b = tracked(&mut tracker, "b.txt");
        assert!(tracker.can_start_batch());

        tracker.update(&a, ItemPatch::enter(UploadStatus::Creating, 0));
        assert!(!tracker.can_start_batch());

        tracker.update(&a, ItemPatch::enter(UploadStatus::Completed, 100));
        assert!(tracker.can_start_batch());

        tracker.update(&b, ItemPatch::failed("boom"));
        assert!(!tracker.can_start_batch());
        assert_eq!(
            tracker.summary(),
            TrackerSummary {
                pending: 0,
                in_flight: 0,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_cancel_all_keeps_items_and_blocks_new_batches() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        let b = tracked(&mut tracker, "b.txt");
        let jobs = tracker.pending_jobs();

        tracker.cancel_all();

        assert!(tracker.is_interrupted());
        assert_eq!(tracker.pending_ids(), vec![a, b]);
        assert!(jobs.iter().all(|job| job.cancel.is_cancelled() && job.interrupt.is_cancelled()));
        assert!(!tracker.can_start_batch());
    }

    #[test]
    fn test_remove_does_not_interrupt_siblings() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        tracked(&mut tracker, "b.txt");
        let jobs = tracker.pending_jobs();

        tracker.remove(&a);

        assert!(jobs[0].cancel.is_cancelled());
        assert!(!jobs[0].interrupt.is_cancelled());
        assert!(!jobs[1].cancel.is_cancelled());
        assert!(tracker.can_start_batch());
    }

    #[test]
    fn test_pending_jobs_keep_selection_order() {
        let mut tracker = UploadTracker::new();
        let a = tracked(&mut tracker, "a.txt");
        let b = tracked(&mut tracker, "b.txt");
        let c = tracked(&mut tracker, "c.txt");
        tracker.update(&b, ItemPatch::enter(UploadStatus::Completed, 100));

        let ids: Vec<ItemId> = tracker.pending_jobs().into_iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![a.clone(), c.clone()]);
        assert_eq!(tracker.pending_ids(), vec![a, c]);

        assert_eq!(tracker.clear_finished(), 1);
        assert_eq!(tracker.len(), 2);
    }
}
