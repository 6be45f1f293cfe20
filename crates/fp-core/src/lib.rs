pub mod codec;
pub mod color;
pub mod error;
pub mod geometry;
pub mod id;
pub mod lint;
pub mod model;
pub mod names;
pub mod store;

pub use codec::{DocumentMeta, FlowDocument, Imported, export_json, import_json};
pub use error::{CodecError, StoreError};
pub use geometry::{Point, Rect, Size};
pub use id::{EdgeId, NodeId};
pub use lint::{LintDiagnostic, LintSeverity, lint_document};
pub use model::*;
pub use store::{EdgePatch, GraphState, GraphStore, NodePatch};
