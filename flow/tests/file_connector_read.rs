//! A `FileConnector` reads a whole file and reports `Connected` then
//! `Disconnected` on its monitor as the stream opens and hits EOF.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use flow::prelude::*;
use flow_core::element::Graph;
use flow_core::elements::Collector;
use flow_core::event::{Event, SegmentRequest};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;

#[test]
fn file_connector_streams_contents_and_reports_connectivity() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"the quick brown fox").unwrap();
    tmp.flush().unwrap();

    let (connector, monitor) = FileConnector::open_read("file", tmp.path(), ShuntOptions::default()).expect("open");

    let mut graph = Graph::new();
    let file_id = graph.insert(Box::new(connector));

    let received: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
    let r = received.clone();
    let sink = graph.insert(Box::new(Collector::new("sink", move |p| {
        if let Some(b) = p.into_buffer() {
            r.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(file_id, 0), PadRef::input(sink, 0));

    graph.push_input(
        PadRef::input(file_id, 0),
        Packet::object(Event::SegmentRequest(SegmentRequest::to_end())),
    );

    let mut saw_all_bytes = false;
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(20));
        graph.pump(file_id);
        let got: Vec<u8> = received.lock().unwrap().iter().flat_map(|b| b.to_vec()).collect();
        if got == b"the quick brown fox" {
            saw_all_bytes = true;
            break;
        }
    }
    assert!(saw_all_bytes, "did not observe the full file contents");

    let mut states = Vec::new();
    while let Ok(event) = monitor.try_recv() {
        states.push(event.current);
    }
    assert!(states.contains(&ConnectivityState::Connected), "expected a Connected transition: {states:?}");
}
