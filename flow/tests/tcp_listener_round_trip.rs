//! A `TcpListenerConnector` accepts a connection from a plain
//! `TcpConnector`, and the accepted `Connector` exchanges data with it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use flow::prelude::*;
use flow_core::element::{ElementId, Graph};
use flow_core::elements::Collector;
use flow_core::packet::Packet;
use flow_core::pad::PadRef;

fn pump_until(graph: &mut Graph, ids: &[ElementId], mut done: impl FnMut() -> bool, tries: usize) -> bool {
    for _ in 0..tries {
        for &id in ids {
            graph.pump(id);
        }
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    done()
}

#[test]
fn listener_accepts_and_exchanges_data_with_a_connecting_client() {
    let port = portpicker::pick_unused_port().expect("free port");
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let (listener, new_conn) = TcpListenerConnector::bind("listener", addr, ShuntOptions::default()).expect("bind listener");

    let mut graph = Graph::new();
    let listener_id = graph.insert(Box::new(listener));

    let remote = SocketIpService::from(addr);
    let (client_connector, _client_monitor) = TcpConnector::connect("client", &remote, ShuntOptions::default()).expect("connect client");
    let client_id = graph.insert(Box::new(client_connector));

    let client_received = Arc::new(Mutex::new(Vec::new()));
    let cr = client_received.clone();
    let client_sink = graph.insert(Box::new(Collector::new("client-sink", move |p| {
        if let Some(b) = p.into_buffer() {
            cr.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(client_id, 0), PadRef::input(client_sink, 0));

    let accepted = pump_until(&mut graph, &[listener_id, client_id], || !new_conn.is_empty(), 50);
    assert!(accepted, "listener never reported an accepted connection");

    let accepted_conn = new_conn.try_recv().expect("accepted connection queued");
    let server_id = graph.insert(Box::new(accepted_conn.connector));

    let server_received = Arc::new(Mutex::new(Vec::new()));
    let sr = server_received.clone();
    let server_sink = graph.insert(Box::new(Collector::new("server-sink", move |p| {
        if let Some(b) = p.into_buffer() {
            sr.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(server_id, 0), PadRef::input(server_sink, 0));

    graph.push_input(PadRef::input(client_id, 0), Packet::buffer(Bytes::from_static(b"hello server")));

    let got_server = pump_until(
        &mut graph,
        &[listener_id, client_id, server_id],
        || server_received.lock().unwrap().iter().any(|b: &Bytes| b.as_ref() == b"hello server"),
        50,
    );
    assert!(got_server, "server side never received the client's bytes");

    graph.push_input(PadRef::input(server_id, 0), Packet::buffer(Bytes::from_static(b"hello client")));

    let got_client = pump_until(
        &mut graph,
        &[listener_id, client_id, server_id],
        || client_received.lock().unwrap().iter().any(|b: &Bytes| b.as_ref() == b"hello client"),
        50,
    );
    assert!(got_client, "client side never received the server's bytes");
}
