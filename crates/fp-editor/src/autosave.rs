//! Debounced write-through of the whole document to a recovery sink.
//!
//! Every edit calls [`AutoSave::trigger`]; a burst of edits produces a
//! single write `delay` milliseconds after the last one. The state written
//! is always the latest one handed to `trigger`, never the one that
//! started the burst.

use crate::debounce::{Debouncer, Millis};
use crate::error::PersistError;
use fp_core::codec::{DocumentMeta, export_json};
use fp_core::store::GraphState;

pub const DEFAULT_AUTOSAVE_DELAY_MS: Millis = 2000;

/// Destination for serialized documents (local storage, a recovery file).
pub trait DocumentSink {
    fn write(&mut self, json: &str) -> Result<(), PersistError>;

    /// Last document written, if the sink can read back.
    fn read(&self) -> Result<Option<String>, PersistError> {
        Ok(None)
    }
}

impl<S: DocumentSink + ?Sized> DocumentSink for Box<S> {
    fn write(&mut self, json: &str) -> Result<(), PersistError> {
        (**self).write(json)
    }

    fn read(&self) -> Result<Option<String>, PersistError> {
        (**self).read()
    }
}

pub struct AutoSave {
    sink: Box<dyn DocumentSink>,
    meta: DocumentMeta,
    latest: GraphState,
    timer: Debouncer,
    /// Set by `trigger`, cleared only by a successful write.
    dirty: bool,
    writes: usize,
}

impl std::fmt::Debug for AutoSave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSave")
            .field("meta", &self.meta)
            .field("timer", &self.timer)
            .field("dirty", &self.dirty)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl AutoSave {
    pub fn new(sink: Box<dyn DocumentSink>, delay_ms: Millis) -> Self {
        Self {
            sink,
            meta: DocumentMeta::default(),
            latest: GraphState::default(),
            timer: Debouncer::new(delay_ms),
            dirty: false,
            writes: 0,
        }
    }

    pub fn with_meta(mut self, meta: DocumentMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn set_meta(&mut self, meta: DocumentMeta) {
        self.meta = meta;
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// An edit has not reached the sink yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of documents written so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn sink(&self) -> &dyn DocumentSink {
        self.sink.as_ref()
    }

    /// Note an edit. `state`, when given, becomes the state the next flush
    /// writes. Any pending deadline is pushed back to `now + delay`.
    pub fn trigger(&mut self, now: Millis, state: Option<GraphState>) {
        if let Some(state) = state {
            self.latest = state;
        }
        if self.timer.is_pending() {
            log::debug!("autosave: coalescing edit into pending write");
        }
        self.dirty = true;
        self.timer.schedule(now);
    }

    /// Flush if the deadline has passed. Returns whether a write happened.
    /// A failed write is retried one delay later.
    pub fn poll(&mut self, now: Millis, replaying: bool) -> Result<bool, PersistError> {
        if !self.timer.fire_if_due(now) {
            return Ok(false);
        }
        let result = self.flush(replaying);
        if result.is_err() {
            self.timer.schedule(now);
        }
        result
    }

    /// Write the latest state now. Skipped while undo/redo is swapping
    /// state in.
    pub fn flush(&mut self, replaying: bool) -> Result<bool, PersistError> {
        if replaying {
            log::debug!("autosave: skipped during replay");
            return Ok(false);
        }
        let mut meta = self.meta.clone();
        meta.description = Some(format!(
            "Autosaved at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        let json = export_json(&self.latest, &meta)?;
        self.sink.write(&json)?;
        self.dirty = false;
        self.writes += 1;
        log::debug!("autosave: wrote {} bytes", json.len());
        Ok(true)
    }

    /// Cancel the deadline and, if any edit has not been written yet,
    /// write it now.
    pub fn shutdown(&mut self) -> Result<bool, PersistError> {
        let pending = self.timer.take_pending();
        if !pending && !self.dirty {
            return Ok(false);
        }
        self.flush(false)
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("autosave: final flush failed: {e}");
        }
    }
}
