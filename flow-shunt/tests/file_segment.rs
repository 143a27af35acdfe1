//! Exercises a `FileShunt` reading a bounded segment followed by a seek,
//! confirming the worker thread honors `SegmentRequest` and reports a fresh
//! `Position` after the seek completes.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flow_core::element::Graph;
use flow_core::elements::Collector;
use flow_core::event::{Event, Position, SeekAnchor, SegmentRequest};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use flow_shunt::file::FileShunt;
use flow_shunt::options::ShuntOptions;

#[test]
fn segment_request_bounds_the_read_and_seek_reports_fresh_position() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"0123456789").unwrap();
    tmp.flush().unwrap();

    let mut graph = Graph::new();
    let file = FileShunt::open_read("file", tmp.path(), ShuntOptions::default()).expect("open");
    let file = graph.insert(Box::new(file));

    let received: Arc<Mutex<Vec<Packet>>> = Arc::new(Mutex::new(Vec::new()));
    let r = received.clone();
    let sink = graph.insert(Box::new(Collector::new("sink", move |p| {
        r.lock().unwrap().push(p);
    })));
    graph.connect(PadRef::output(file, 0), PadRef::input(sink, 0));

    graph.push_input(PadRef::input(file, 0), Packet::object(Event::SegmentRequest(SegmentRequest { length: 4 })));

    let mut bytes_seen = Vec::new();
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(20));
        graph.pump(file);
        let packets = received.lock().unwrap();
        bytes_seen = packets
            .iter()
            .filter_map(Packet::as_buffer)
            .flat_map(|b| b.to_vec())
            .collect();
        if bytes_seen.len() >= 4 {
            break;
        }
    }
    assert_eq!(bytes_seen, b"0123");

    graph.push_input(
        PadRef::input(file, 0),
        Packet::object(Event::Position(Position {
            anchor: SeekAnchor::Begin,
            offset: 0,
        })),
    );

    let mut saw_position = false;
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(20));
        graph.pump(file);
        let packets = received.lock().unwrap();
        if packets.iter().any(|p| matches!(p.as_object(), Some(Event::Position(_)))) {
            saw_position = true;
            break;
        }
    }
    assert!(saw_position, "expected a Position event after the seek");
}
