use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc;
use std::thread;

use image::RgbaImage;

use crate::canvas::{CanvasState, decode_png};
use crate::log_err;

/// Default snapshot history depth — oldest entries are evicted beyond this.
pub const MAX_SNAPSHOTS: usize = 50;

// ============================================================================
// UNDO STACK — bounded ring of full-raster PNG snapshots
// ============================================================================

/// Undo history for the drawing canvas.
///
/// Each snapshot is the PNG-encoded full raster at one instant. The history
/// behaves like a ring buffer: insertion-ordered, bounded, oldest evicted on
/// overflow. Decoding popped snapshots happens on a background thread; the
/// [`ReplayQueue`] guarantees restores are applied in the order the undos
/// were issued even if decode completions interleave.
pub struct UndoStack {
    snapshots: VecDeque<Vec<u8>>,
    max_depth: usize,
    next_seq: u64,
    decode_tx: mpsc::Sender<DecodeJob>,
    result_rx: mpsc::Receiver<DecodeResult>,
    replay: ReplayQueue,
}

struct DecodeJob {
    seq: u64,
    png: Vec<u8>,
}

struct DecodeResult {
    seq: u64,
    /// `None` when decoding failed — the slot is skipped but ordering holds.
    raster: Option<RgbaImage>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(MAX_SNAPSHOTS)
    }
}

impl UndoStack {
    pub fn new(max_depth: usize) -> Self {
        let (decode_tx, job_rx) = mpsc::channel::<DecodeJob>();
        let (result_tx, result_rx) = mpsc::channel::<DecodeResult>();

        // Decode worker: lives for the widget's lifetime, exits when the
        // sender side is dropped.
        thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let raster = match decode_png(&job.png) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        log_err!("undo snapshot {} failed to decode: {}", job.seq, e);
                        None
                    }
                };
                if result_tx.send(DecodeResult { seq: job.seq, raster }).is_err() {
                    break;
                }
            }
        });

        Self {
            snapshots: VecDeque::new(),
            max_depth,
            next_seq: 0,
            decode_tx,
            result_rx,
            replay: ReplayQueue::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Encode the current raster and append it, evicting the oldest snapshot
    /// when the history would exceed its depth.
    pub fn snapshot(&mut self, canvas: &CanvasState) {
        match canvas.encode_png() {
            Ok(png) => {
                self.snapshots.push_back(png);
                while self.snapshots.len() > self.max_depth {
                    self.snapshots.pop_front();
                }
            }
            Err(e) => log_err!("undo snapshot skipped: {}", e),
        }
    }

    /// Pop the most recent snapshot and queue its decode. Returns `false` on
    /// an empty history (a no-op, not an error).
    pub fn undo(&mut self) -> bool {
        let Some(png) = self.snapshots.pop_back() else {
            return false;
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.decode_tx.send(DecodeJob { seq, png }).is_err() {
            log_err!("undo decode worker is gone; restore dropped");
        }
        true
    }

    /// Drain finished decodes, returning rasters ready to apply — already
    /// serialized into undo issue order. Call once per frame and apply each
    /// returned raster as a full canvas overwrite.
    pub fn poll_restores(&mut self) -> Vec<RgbaImage> {
        let mut ready = Vec::new();
        while let Ok(res) = self.result_rx.try_recv() {
            ready.extend(self.replay.push(res.seq, res.raster));
        }
        ready
    }

    #[cfg(test)]
    fn front_snapshot(&self) -> Option<&Vec<u8>> {
        self.snapshots.front()
    }
}

// ============================================================================
// REPLAY QUEUE — reorder buffer for async decode completions
// ============================================================================

/// Buffers out-of-order decode results and releases them strictly in
/// sequence-number order. A failed decode releases its slot without
/// producing a raster, so later restores are never stalled.
pub struct ReplayQueue {
    next: u64,
    pending: BTreeMap<u64, Option<RgbaImage>>,
}

impl ReplayQueue {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, seq: u64, raster: Option<RgbaImage>) -> Vec<RgbaImage> {
        if seq < self.next {
            // Duplicate or stale completion — already released
            return Vec::new();
        }
        self.pending.insert(seq, raster);
        let mut ready = Vec::new();
        while let Some(slot) = self.pending.remove(&self.next) {
            self.next += 1;
            if let Some(img) = slot {
                ready.push(img);
            }
        }
        ready
    }
}
