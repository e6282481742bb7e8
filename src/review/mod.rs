//! Review orchestration: request validation, the per-paper pipeline, and its
//! event stream.

mod engine;

pub use engine::{
    DEFAULT_PAPERS, InputError, MAX_PAPERS, MIN_PAPERS, PaperSummary, ReviewError, ReviewEvent,
    ReviewRequest, run_review,
};
