#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Declares one event of a test trace schema.
#[derive(Debug, Clone, Copy)]
pub struct EventDecl<'a> {
    pub name: &'a str,
    pub stream: u32,
    pub id: u32,
}

/// Builds the header line of a JSONL kernel trace.
pub fn kernel_header(events: &[EventDecl<'_>], begin: u64, end: u64) -> String {
    let mut decls = String::new();
    for (i, decl) in events.iter().enumerate() {
        if i > 0 {
            decls.push(',');
        }
        write!(
            decls,
            r#"{{"name":"{}","stream":{},"id":{}}}"#,
            decl.name, decl.stream, decl.id
        )
        .expect("write to string");
    }

    format!(
        r#"{{"env":{{"domain":"kernel"}},"events":[{decls}],"begin":{begin},"end":{end}}}"#
    )
}

/// Builds one event line of a JSONL trace. `fields` is raw JSON, e.g.
/// `r#"{"tid":7}"#`, or empty for an event without payload.
pub fn event_line(ts: u64, name: &str, fields: &str) -> String {
    if fields.is_empty() {
        format!(r#"{{"ts":{ts},"name":"{name}"}}"#)
    } else {
        format!(r#"{{"ts":{ts},"name":"{name}","fields":{fields}}}"#)
    }
}

/// Writes a JSONL trace file and returns its path.
pub fn write_trace(dir: &Path, file_name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, lines.join("\n") + "\n").expect("write trace");
    path
}
