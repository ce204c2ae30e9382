//! Data models for prediction-market research.

pub mod quote;

pub use quote::{quotes_from_frame, quotes_to_frame, LoadStats, Outcome, QuoteRecord};
