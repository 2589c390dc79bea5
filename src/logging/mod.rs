//! Structured logging for operators: one JSON object per line, or plain fmt
//! for interactive runs.

mod format;

pub use format::StructuredLogger;
