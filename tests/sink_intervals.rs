//! End-to-end interval emission through the on-disk history file.

use statehist::interval::IntervalFileReader;
use statehist::state::{SinkPaths, StateHistorySink, Value};
use statehist::types::Time;
use tempfile::tempdir;

fn open_sink(dir: &std::path::Path, begin: u64) -> (StateHistorySink, SinkPaths) {
    let paths = SinkPaths::in_dir(dir);
    let sink = StateHistorySink::open(paths.clone(), Time::from_nanos(begin)).unwrap();
    (sink, paths)
}

#[test]
fn two_assignments_one_interval_then_close_flush() {
    let dir = tempdir().unwrap();
    let (mut sink, paths) = open_sink(dir.path(), 100);

    sink.root_mut().child_str("a").set(Value::U32(7)).unwrap();
    sink.set_ts(Time::from_nanos(250)).unwrap();
    sink.root_mut().child_str("a").set(Value::U32(9)).unwrap();

    let node_a = sink.root_mut().child_str("a").id();
    sink.close().unwrap();

    let mut reader = IntervalFileReader::open(&paths.history).unwrap();
    let intervals = reader.read_all().unwrap();

    // one interval from the replacement, one from the close flush
    assert_eq!(intervals.len(), 2);

    assert_eq!(intervals[0].begin, Time::from_nanos(100));
    assert_eq!(intervals[0].end, Time::from_nanos(250));
    assert_eq!(intervals[0].node_id, node_a);
    assert_eq!(intervals[0].value, Value::U32(7));

    assert_eq!(intervals[1].begin, Time::from_nanos(250));
    assert_eq!(intervals[1].end, Time::from_nanos(250));
    assert_eq!(intervals[1].node_id, node_a);
    assert_eq!(intervals[1].value, Value::U32(9));
}

#[test]
fn null_previous_value_emits_nothing() {
    let dir = tempdir().unwrap();
    let (mut sink, paths) = open_sink(dir.path(), 0);

    sink.root_mut().child_str("b").set(Value::Null).unwrap();
    sink.set_ts(Time::from_nanos(10)).unwrap();
    sink.root_mut().child_str("b").set(Value::I32(-3)).unwrap();

    // nothing yet; only the close flush emits the live I32 value
    sink.close().unwrap();

    let mut reader = IntervalFileReader::open(&paths.history).unwrap();
    let intervals = reader.read_all().unwrap();
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].value, Value::I32(-3));
    assert_eq!(intervals[0].begin, Time::from_nanos(10));
}

#[test]
fn per_node_intervals_are_ordered_and_disjoint() {
    let dir = tempdir().unwrap();
    let (mut sink, paths) = open_sink(dir.path(), 0);

    for (step, ts) in [10u64, 20, 20, 35, 50].iter().enumerate() {
        sink.set_ts(Time::from_nanos(*ts)).unwrap();
        sink.root_mut()
            .child_str("counter")
            .set(Value::U64(step as u64))
            .unwrap();
        sink.root_mut()
            .child_str("mode")
            .set_str(if step % 2 == 0 { "even" } else { "odd" })
            .unwrap();
    }
    sink.close().unwrap();

    let mut reader = IntervalFileReader::open(&paths.history).unwrap();
    let intervals = reader.read_all().unwrap();

    let mut per_node: std::collections::HashMap<_, Vec<_>> = std::collections::HashMap::new();
    for interval in &intervals {
        assert!(interval.begin <= interval.end);
        per_node.entry(interval.node_id).or_default().push(*interval);
    }

    assert_eq!(per_node.len(), 2);
    for intervals in per_node.values() {
        for pair in intervals.windows(2) {
            assert!(pair[0].begin <= pair[1].begin);
            assert!(pair[0].end <= pair[1].begin);
        }
    }
}

#[test]
fn reopened_value_leaves_a_gap() {
    let dir = tempdir().unwrap();
    let (mut sink, paths) = open_sink(dir.path(), 0);

    sink.root_mut().child_str("x").set(Value::U32(1)).unwrap();
    sink.set_ts(Time::from_nanos(10)).unwrap();
    sink.root_mut().child_str("x").set_null().unwrap();
    sink.set_ts(Time::from_nanos(30)).unwrap();
    sink.root_mut().child_str("x").set(Value::U32(2)).unwrap();
    sink.set_ts(Time::from_nanos(40)).unwrap();
    sink.root_mut().child_str("x").set_null().unwrap();
    sink.close().unwrap();

    let mut reader = IntervalFileReader::open(&paths.history).unwrap();
    let intervals = reader.read_all().unwrap();

    // the null period [10, 30) is a gap, not a record
    assert_eq!(intervals.len(), 2);
    assert_eq!(
        (intervals[0].begin, intervals[0].end),
        (Time::from_nanos(0), Time::from_nanos(10))
    );
    assert_eq!(
        (intervals[1].begin, intervals[1].end),
        (Time::from_nanos(30), Time::from_nanos(40))
    );
}
