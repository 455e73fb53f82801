//! Checker engine: admission, cancellation, probing and run orchestration.
mod cancel;
mod check;
mod engine;
mod events;
mod export;
mod gate;
mod persist;
mod probe;
mod runner;
mod source;

pub use cancel::{drain_on_cancel, CancelToken};
pub use engine::RunHandle;
pub use events::{ChannelProgressSink, DiscardSink, ProgressSink, RunEvent};
pub use export::{export_found, export_results, ExportError, ExportSummary};
pub use gate::{Admission, AdmissionGate, GatePermit};
pub use persist::{ensure_parent_dir, write_atomically, PersistError};
pub use probe::{classify_body, HttpProbe, Probe, ProbeError, ProbeSettings, KEY_PLACEHOLDER};
pub use runner::{BatchRunner, RunError};
pub use source::{read_records, read_records_from, SourceError};
