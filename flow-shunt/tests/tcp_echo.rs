//! A client `TcpShunt` talking to a raw `std::net::TcpListener` accept loop
//! run directly in the test (not through `TcpListenerShunt`) — exercises
//! connect, write, and the readiness-driven read path end to end.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use flow_core::element::Graph;
use flow_core::elements::Collector;
use flow_core::event::{IpServiceDescriptor, TcpConnectOp};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use flow_shunt::options::ShuntOptions;
use flow_shunt::tcp::TcpShunt;

#[test]
fn client_shunt_round_trips_with_a_plain_echo_server() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 64];
            if let Ok(n) = stream.read(&mut buf) {
                let _ = stream.write_all(&buf[..n]);
            }
        }
    });

    let op = TcpConnectOp {
        remote: IpServiceDescriptor {
            address: addr.ip(),
            port: addr.port(),
        },
        local_port: None,
    };

    let mut graph = Graph::new();
    let client = TcpShunt::connect("client", &op, ShuntOptions::default()).expect("connect");
    let client = graph.insert(Box::new(client));

    let received = Arc::new(Mutex::new(Vec::new()));
    let r = received.clone();
    let sink = graph.insert(Box::new(Collector::new("sink", move |p| {
        if let Some(b) = p.into_buffer() {
            r.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(client, 0), PadRef::input(sink, 0));

    graph.push_input(PadRef::input(client, 0), Packet::buffer(Bytes::from_static(b"ping")));

    let mut got = Vec::new();
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(20));
        graph.pump(client);
        got = received.lock().unwrap().clone();
        if got.iter().any(|b| b.as_ref() == b"ping") {
            break;
        }
    }

    assert!(got.iter().any(|b| b.as_ref() == b"ping"), "did not observe echoed bytes: {got:?}");
}
