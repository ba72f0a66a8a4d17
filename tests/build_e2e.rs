//! End-to-end build: JSONL traces in, database directory out.

mod common;

use common::{event_line, kernel_header, write_trace, EventDecl};
use statehist::build::{BuildArgs, Builder};
use statehist::event::JsonTraceOpener;
use statehist::interval::IntervalFileReader;
use statehist::provider::HostFactories;
use statehist::state::quarkdb;
use tempfile::tempdir;

fn sched_schema() -> [EventDecl<'static>; 3] {
    [
        EventDecl { name: "sched_switch", stream: 0, id: 0 },
        EventDecl { name: "sys_open", stream: 0, id: 1 },
        EventDecl { name: "exit_syscall", stream: 0, id: 2 },
    ]
}

#[test]
fn builds_a_complete_database_directory() {
    let dir = tempdir().unwrap();

    let trace = write_trace(
        dir.path(),
        "kernel.jsonl",
        &[
            kernel_header(&sched_schema(), 100, 400),
            event_line(
                100,
                "sched_switch",
                r#"{"prev_tid":7,"next_tid":9,"cpu_id":0}"#,
            ),
            event_line(200, "sys_open", r#"{"tid":9}"#),
            event_line(300, "exit_syscall", r#"{"tid":9}"#),
            event_line(
                400,
                "sched_switch",
                r#"{"prev_tid":9,"next_tid":7,"cpu_id":0}"#,
            ),
        ],
    );

    let db_dir = dir.path().join("db");
    let builder = Builder::new(BuildArgs {
        traces: vec![trace.clone()],
        db_dir: Some(db_dir.clone()),
        force: false,
        providers: vec!["builtin:linux".to_owned()],
        params: Vec::new(),
        bind_progress: None,
    })
    .unwrap();

    let summary = builder
        .run(&JsonTraceOpener, &HostFactories::with_defaults())
        .unwrap();
    assert_eq!(summary.events, 4);
    assert!(!summary.stopped_early);

    // persisted layout
    for file in [
        "state-paths-quarks.db",
        "state-values-quarks.db",
        "state-nodes.json",
        "state-history.shd",
    ] {
        assert!(db_dir.join(file).exists(), "missing {file}");
    }

    #[cfg(unix)]
    {
        let link = db_dir.join("traces").join("0");
        assert_eq!(
            std::fs::read_link(link).unwrap(),
            trace.canonicalize().unwrap()
        );
    }

    // the history holds ordered intervals for the modelled state
    let mut reader = IntervalFileReader::open(db_dir.join("state-history.shd")).unwrap();
    let intervals = reader.read_all().unwrap();
    assert!(!intervals.is_empty());
    for interval in &intervals {
        assert!(interval.begin <= interval.end);
    }

    // the node map matches the subpath database
    let map: serde_json::Value =
        serde_json::from_reader(std::fs::File::open(db_dir.join("state-nodes.json")).unwrap())
            .unwrap();
    assert_eq!(map["id"], 0);
    let threads = &map["children"]["threads"];
    assert!(threads["children"]["7"].is_object());
    assert!(threads["children"]["9"].is_object());

    let subpaths = quarkdb::read_records(
        &mut std::fs::File::open(db_dir.join("state-paths-quarks.db")).unwrap(),
    )
    .unwrap();
    let strings: Vec<&str> = subpaths.iter().map(|(s, _)| s.as_str()).collect();
    assert!(strings.contains(&"threads"));
    assert!(strings.contains(&"status"));

    let values = quarkdb::read_records(
        &mut std::fs::File::open(db_dir.join("state-values-quarks.db")).unwrap(),
    )
    .unwrap();
    let strings: Vec<&str> = values.iter().map(|(s, _)| s.as_str()).collect();
    assert!(strings.contains(&"run"));
    assert!(strings.contains(&"wait"));
    assert!(strings.contains(&"sys_open"));
}

#[test]
fn merges_two_traces_chronologically() {
    let dir = tempdir().unwrap();

    let schema = [EventDecl { name: "sched_switch", stream: 0, id: 0 }];
    let trace_a = write_trace(
        dir.path(),
        "a.jsonl",
        &[
            kernel_header(&schema, 10, 30),
            event_line(10, "sched_switch", r#"{"prev_tid":1,"next_tid":2}"#),
            event_line(30, "sched_switch", r#"{"prev_tid":2,"next_tid":1}"#),
        ],
    );
    let trace_b = write_trace(
        dir.path(),
        "b.jsonl",
        &[
            kernel_header(&schema, 20, 20),
            event_line(20, "sched_switch", r#"{"prev_tid":3,"next_tid":4}"#),
        ],
    );

    let db_dir = dir.path().join("db");
    let builder = Builder::new(BuildArgs {
        traces: vec![trace_a, trace_b],
        db_dir: Some(db_dir.clone()),
        force: false,
        providers: vec!["builtin:linux".to_owned()],
        params: Vec::new(),
        bind_progress: None,
    })
    .unwrap();

    let summary = builder
        .run(&JsonTraceOpener, &HostFactories::with_defaults())
        .unwrap();
    assert_eq!(summary.events, 3);

    // interleaved timestamps never run the sink clock backwards, so the
    // build completes and the history is ordered
    let mut reader = IntervalFileReader::open(db_dir.join("state-history.shd")).unwrap();
    let intervals = reader.read_all().unwrap();
    for interval in &intervals {
        assert!(interval.begin <= interval.end);
    }

    #[cfg(unix)]
    {
        assert!(db_dir.join("traces").join("0").exists());
        assert!(db_dir.join("traces").join("1").exists());
    }
}

#[test]
fn progress_endpoint_receives_updates() {
    let dir = tempdir().unwrap();

    let schema = [EventDecl { name: "sched_switch", stream: 0, id: 0 }];
    let trace = write_trace(
        dir.path(),
        "a.jsonl",
        &[
            kernel_header(&schema, 0, 100),
            event_line(0, "sched_switch", r#"{"prev_tid":1,"next_tid":2}"#),
            event_line(100, "sched_switch", r#"{"prev_tid":2,"next_tid":1}"#),
        ],
    );

    let endpoint = dir.path().join("progress.jsonl");
    let builder = Builder::new(BuildArgs {
        traces: vec![trace],
        db_dir: Some(dir.path().join("db")),
        force: false,
        providers: vec!["builtin:linux".to_owned()],
        params: Vec::new(),
        bind_progress: Some(endpoint.display().to_string()),
    })
    .unwrap();

    builder
        .run(&JsonTraceOpener, &HostFactories::with_defaults())
        .unwrap();

    let published = std::fs::read_to_string(&endpoint).unwrap();
    let updates: Vec<serde_json::Value> = published
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(updates.len() >= 2);
    assert_eq!(updates.first().unwrap()["done"], false);
    let last = updates.last().unwrap();
    assert_eq!(last["done"], true);
    assert_eq!(last["events"], 2);
    assert_eq!(last["progress"], 1.0);
}

#[test]
fn unknown_provider_type_fails_the_build() {
    let dir = tempdir().unwrap();

    let schema = [EventDecl { name: "sched_switch", stream: 0, id: 0 }];
    let trace = write_trace(
        dir.path(),
        "a.jsonl",
        &[kernel_header(&schema, 0, 0)],
    );

    let bogus = dir.path().join("provider.txt");
    std::fs::write(&bogus, b"not a provider").unwrap();

    let builder = Builder::new(BuildArgs {
        traces: vec![trace],
        db_dir: Some(dir.path().join("db")),
        force: false,
        providers: vec![bogus.display().to_string()],
        params: Vec::new(),
        bind_progress: None,
    })
    .unwrap();

    let err = builder
        .run(&JsonTraceOpener, &HostFactories::with_defaults())
        .unwrap_err();
    assert_eq!(
        err.kind(),
        statehist::ErrorKind::UnknownStateProviderType
    );
}
