//! CLI command handlers

pub mod commands;

pub use commands::{headers, lookup, merge, sheets, FileSetting, MapArg, MergeOptions};
