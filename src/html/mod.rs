//! HTML filtering for memory-constrained terminals
//!
//! This module provides:
//! - Directive parsing for tag/attribute allow and deny rules
//! - A streaming engine that rewrites HTML chunks in place
//! - Internal-encoding remap for screen memory output
//! - A per-response wrapper for the HTTP filter

pub mod body_filter;
pub mod encoding;
pub mod engine;
pub mod rules;

pub use body_filter::StreamingBodyFilter;
pub use encoding::{convert_to_internal, to_internal};
pub use engine::{HtmlFilter, Mode};
pub use rules::FilterRules;
