//! Core types: argument tokenizer, event records, time parsing, tracing

pub mod argv;
pub mod event;
pub mod time;
pub mod tracing;

pub use argv::{ArgvError, QuoteKind};
pub use event::{EventRecord, Participation};
pub use time::{WhenError, humanize, parse_duration, parse_when};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
