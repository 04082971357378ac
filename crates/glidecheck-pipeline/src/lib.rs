//! Video annotation driver, gear inspection and the session tying them together.

pub mod driver;
pub mod inspect;
pub mod isolate;
pub mod observer;
pub mod session;

pub use driver::{AnnotatedSequence, AnnotationDriver, DetectAndAnnotate, StageError};
pub use inspect::{GearInspector, Inspection};
pub use isolate::{map_isolated, Callbacks, Isolated, ItemTransform, MapObserver};
pub use observer::{BusObserver, LogObserver, NoopObserver, PipelineObserver};
pub use session::{ReviewSummary, Session};
