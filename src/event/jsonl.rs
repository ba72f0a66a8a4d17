//! JSON-lines trace reader.
//!
//! The engine normally sits behind a native trace decoder; this module is
//! the reference [`TraceOpener`] used by the CLI, tests and demos. A trace
//! dump is one JSON object per line:
//!
//! ```text
//! {"env":{"domain":"kernel"},"events":[{"name":"sched_switch","stream":0,"id":0}],"begin":0,"end":1000}
//! {"ts":100,"name":"sched_switch","fields":{"prev_tid":7,"next_tid":9}}
//! {"ts":250,"name":"sched_switch","fields":{"prev_tid":9,"next_tid":7}}
//! ```
//!
//! The first line declares the schema; every following line is one event,
//! in non-decreasing timestamp order. Event ids are synthesised from the
//! declared `(stream, id)` pair with the canonical packing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::event::schema::{EventSource, TraceInfo, TraceOpener};
use crate::event::{Event, FieldValue};
use crate::types::{EventId, Time, TraceId};

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    events: Vec<EventDecl>,
    #[serde(default)]
    begin: Option<u64>,
    #[serde(default)]
    end: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventDecl {
    name: String,
    #[serde(default)]
    stream: u32,
    id: u32,
}

#[derive(Debug, Deserialize)]
struct EventLine {
    ts: u64,
    name: String,
    #[serde(default)]
    fields: Option<serde_json::Value>,
}

fn field_value_from_json(value: &serde_json::Value) -> FieldValue {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                FieldValue::Uint(u)
            } else if let Some(i) = n.as_i64() {
                FieldValue::Sint(i)
            } else {
                FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => FieldValue::Str(s.clone()),
        serde_json::Value::Object(map) => {
            let fields = map
                .iter()
                .map(|(k, v)| (k.clone(), field_value_from_json(v)))
                .collect();
            FieldValue::Dict(fields)
        }
        _ => FieldValue::Null,
    }
}

/// Reference opener for JSON-lines trace dumps.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTraceOpener;

impl TraceOpener for JsonTraceOpener {
    fn open(&self, id: TraceId, path: &Path) -> Result<(TraceInfo, Box<dyn EventSource>)> {
        let file = File::open(path).map_err(|e| {
            Error::builder(format!("cannot open trace {}", path.display())).with_source(e)
        })?;
        let mut reader = BufReader::new(file);

        let mut header_line = String::new();
        reader.read_line(&mut header_line).map_err(Error::from)?;

        let header: Header = serde_json::from_str(&header_line).map_err(|e| {
            Error::builder(format!("malformed trace header in {}", path.display())).with_source(e)
        })?;

        let mut events = BTreeMap::new();
        for decl in &header.events {
            events.insert(
                decl.name.clone(),
                EventId::from_stream(decl.stream, decl.id),
            );
        }

        let info = TraceInfo::new(
            id,
            path.to_path_buf(),
            header.env,
            events.clone(),
            header.begin.map(Time::from_nanos),
            header.end.map(Time::from_nanos),
        );

        let source = JsonEventSource {
            trace_id: id,
            path: path.to_path_buf(),
            reader,
            events,
            last_ts: None,
            line_no: 1,
        };

        Ok((info, Box::new(source)))
    }
}

struct JsonEventSource {
    trace_id: TraceId,
    path: PathBuf,
    reader: BufReader<File>,
    events: BTreeMap<String, EventId>,
    last_ts: Option<Time>,
    line_no: usize,
}

impl JsonEventSource {
    fn malformed(&self, what: &str) -> Error {
        Error::builder(format!(
            "{} at {}:{}",
            what,
            self.path.display(),
            self.line_no
        ))
    }
}

impl EventSource for JsonEventSource {
    fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).map_err(Error::from)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let parsed: EventLine = serde_json::from_str(&line)
                .map_err(|e| self.malformed("malformed event").with_source(e))?;

            let Some(&id) = self.events.get(&parsed.name) else {
                return Err(self.malformed(&format!("undeclared event \"{}\"", parsed.name)));
            };

            let ts = Time::from_nanos(parsed.ts);
            if self.last_ts.is_some_and(|last| ts < last) {
                return Err(self.malformed("events out of timestamp order"));
            }
            self.last_ts = Some(ts);

            let fields = parsed
                .fields
                .as_ref()
                .map_or(FieldValue::Null, field_value_from_json);

            return Ok(Some(Event {
                trace_id: self.trace_id,
                id,
                name: parsed.name,
                ts,
                fields,
            }));
        }
    }
}
