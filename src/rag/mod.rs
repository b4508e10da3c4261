//! Retrieval-augmented answering over the archive.
//!
//! Retrieval finds candidate chunks, the relevance gate discards false
//! positives, and the oracle writes an answer whose bracketed citations are
//! resolved back to concrete video timestamps.

mod citation;
mod engine;

pub use citation::{deduplicate_citations, extract_citations, mmss_to_seconds, Citation};
pub use engine::{AnswerEngine, GroundedAnswer, MAX_CONTEXT_CHARS, NO_RESULTS_MESSAGE};
