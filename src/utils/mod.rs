//! Shared utility functions for agentforge.
//!
//! Environment parsing helpers used by the configuration constructors and
//! JSON extraction from model responses.

pub mod env;
pub mod json_extraction;

pub use json_extraction::{
    decode_json_object, find_matching_brace, try_extract_json_object, JsonExtractionResult,
};
