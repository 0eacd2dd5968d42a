//! Error taxonomy for Loomwork.
//!
//! Kinds raised synchronously from the configuration API (descriptor
//! building, stage/pipeline assembly) are distinguished from kinds raised
//! from `run`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid descriptor for {factory}: {reason}")]
    InvalidDescriptor { factory: String, reason: String },

    // Raised at inspection time, before any factory runs.
    #[error(
        "unsatisfied input: slot {slot_type} (id={delivery_id:?}, producer={producer:?}) on consumer {consumer} has no matching delivery"
    )]
    UnsatisfiedInput {
        slot_type: String,
        delivery_id: String,
        producer: Option<String>,
        consumer: String,
    },

    #[error("ambiguous delivery: {count} deliveries of type {slot_type} (id={delivery_id:?}) match consumer {consumer} with equal specificity")]
    AmbiguousDelivery {
        slot_type: String,
        delivery_id: String,
        consumer: String,
        count: usize,
    },

    // Raised from `run`.
    #[error("factory {factory} in stage {stage} failed: {source}")]
    RuntimeFactoryFailure {
        stage: usize,
        factory: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no match found for {0}")]
    LookupMiss(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
