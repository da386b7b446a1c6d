//! Feed aggregation for a content-planning workflow.
//!
//! Polls a list of RSS/Atom sources, normalizes every entry to plain text and
//! writes a category → source → items JSON dump.

pub mod aggregate;
pub mod config;
pub mod feed;
pub mod report;
pub mod util;
