//! Faults raised inside the asynchronous part of the pipeline, and how they are reported.
//!
//! None of these abort a task: they are contained where they happen and
//! handed to an [`ErrorReporter`].

use std::fmt;

/// Contained fault observed by a worker or an emitter.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineFault {
    /// A chunk transform failed; the chunk is emitted with an empty payload.
    TransformFailed { index: usize, message: String },
    /// The sink rejected an event; emission carries on.
    SinkFailed { sink: String, message: String },
    /// A chunk index that cannot be placed in order (already emitted,
    /// duplicated, or out of range). Discarded.
    ProtocolViolation {
        index: usize,
        next_index: usize,
        chunk_count: usize,
    },
}

impl fmt::Display for PipelineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineFault::TransformFailed { index, message } => {
                write!(f, "Transform failed on chunk {}: {}", index, message)
            }
            PipelineFault::SinkFailed { sink, message } => {
                write!(f, "Sink '{}' failed: {}", sink, message)
            }
            PipelineFault::ProtocolViolation {
                index,
                next_index,
                chunk_count,
            } => write!(
                f,
                "Protocol violation: chunk {} received while expecting {} of {}",
                index, next_index, chunk_count
            ),
        }
    }
}

impl std::error::Error for PipelineFault {}

/// Trait for reporting pipeline faults.
pub trait ErrorReporter: Send + Sync {
    /// Reports a fault from a pipeline component.
    fn report(&self, component: &str, task: &str, fault: &PipelineFault);
}

/// Default reporter that forwards faults to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, task: &str, fault: &PipelineFault) {
        tracing::warn!(component, task_id = task, "{}", fault);
    }
}
