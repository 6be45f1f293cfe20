pub mod align;
pub mod autosave;
pub mod clipboard;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod grouping;
pub mod history;
pub mod persist;
pub mod sync;

pub use align::AlignOp;
pub use autosave::{AutoSave, DocumentSink};
pub use clipboard::Clipboard;
pub use config::EditorConfig;
pub use debounce::{Debouncer, Millis};
pub use editor::{Editor, TickOutcome};
pub use error::{EditError, GroupError, PersistError};
pub use history::{History, HistoryState};
pub use persist::{FolderStore, MemoryStorage, RecoveryFile, SaveBackend, SaveReceipt, VersionStore};
pub use sync::{Connection, GraphMutation, reduce};
