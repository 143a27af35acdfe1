//! End-to-end composition: a `TcpListenerConnector`/`TcpConnector` pair
//! carries ciphertext for a client/server `TlsProtocol` pair, with a
//! `UserAdapter` on each plaintext side standing in for the application.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flow::prelude::*;
use flow_core::element::{ElementId, Graph};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use flow_tls::backend::RustlsBackend;
use flow_tls::element::TlsProtocol;

fn self_signed() -> (Vec<rustls::pki_types::CertificateDer<'static>>, rustls::pki_types::PrivateKeyDer<'static>) {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("generate self-signed cert");
    let cert_der = cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(signing_key.serialize_der().into());
    (vec![cert_der], key_der)
}

fn pump_all(graph: &mut Graph, ids: &[ElementId]) {
    for &id in ids {
        graph.pump(id);
    }
}

#[test]
fn tls_handshake_and_plaintext_round_trip_over_real_sockets() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let (chain, key) = self_signed();

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain.clone(), key)
        .expect("server config");
    let server_config = Arc::new(server_config);
    let mut roots = rustls::RootCertStore::empty();
    roots.add(chain[0].clone()).expect("trust self-signed cert");
    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap().to_owned();

    let port = portpicker::pick_unused_port().expect("free port");
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let (listener, new_conn) = TcpListenerConnector::bind("listener", addr, ShuntOptions::default()).expect("bind");
    let mut graph = Graph::new();
    let listener_id = graph.insert(Box::new(listener));

    let remote = SocketIpService::from(addr);
    let (client_tcp, _client_tcp_monitor) = TcpConnector::connect("client-tcp", &remote, ShuntOptions::default()).expect("connect");
    let client_tcp_id = graph.insert(Box::new(client_tcp));

    let client_conn = rustls::ClientConnection::new(Arc::new(client_config), server_name).expect("client conn");
    let client_tls_id = graph.insert(Box::new(TlsProtocol::new("client-tls", Box::new(RustlsBackend::client(client_conn)))));
    graph.connect(PadRef::output(client_tcp_id, 0), PadRef::input(client_tls_id, 1));
    graph.connect(PadRef::output(client_tls_id, 1), PadRef::input(client_tcp_id, 0));

    let (client_adapter, client_to_user, client_from_user) = UserAdapter::new("client-app");
    let client_adapter_id = graph.insert(Box::new(client_adapter));
    graph.connect(PadRef::output(client_tls_id, 0), PadRef::input(client_adapter_id, 0));
    graph.connect(PadRef::output(client_adapter_id, 0), PadRef::input(client_tls_id, 0));

    let mut accepted_ids = None;
    for _ in 0..50 {
        pump_all(&mut graph, &[listener_id, client_tcp_id, client_tls_id, client_adapter_id]);
        if !new_conn.is_empty() {
            let accepted = new_conn.try_recv().unwrap();
            let server_tcp_id = graph.insert(Box::new(accepted.connector));

            let server_conn = rustls::ServerConnection::new(server_config.clone()).expect("server conn");
            let server_tls_id = graph.insert(Box::new(TlsProtocol::new("server-tls", Box::new(RustlsBackend::server(server_conn)))));
            graph.connect(PadRef::output(server_tcp_id, 0), PadRef::input(server_tls_id, 1));
            graph.connect(PadRef::output(server_tls_id, 1), PadRef::input(server_tcp_id, 0));

            let (server_adapter, server_to_user, server_from_user) = UserAdapter::new("server-app");
            let server_adapter_id = graph.insert(Box::new(server_adapter));
            graph.connect(PadRef::output(server_tls_id, 0), PadRef::input(server_adapter_id, 0));
            graph.connect(PadRef::output(server_adapter_id, 0), PadRef::input(server_tls_id, 0));

            accepted_ids = Some((server_tcp_id, server_tls_id, server_adapter_id, server_to_user, server_from_user));
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    let (server_tcp_id, server_tls_id, server_adapter_id, server_to_user, server_from_user) =
        accepted_ids.expect("listener never reported an accepted connection");

    let all_ids = [
        listener_id,
        client_tcp_id,
        client_tls_id,
        client_adapter_id,
        server_tcp_id,
        server_tls_id,
        server_adapter_id,
    ];

    client_from_user.send(Packet::buffer(Bytes::from_static(b"hello over tls"))).unwrap();
    graph.pump(client_adapter_id);

    let mut got_server = false;
    for _ in 0..100 {
        pump_all(&mut graph, &all_ids);
        if let Ok(packet) = server_to_user.try_recv() {
            if packet.as_buffer().map(|b| b.as_ref()) == Some(&b"hello over tls"[..]) {
                got_server = true;
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(got_server, "server application never received the client's plaintext");

    server_from_user.send(Packet::buffer(Bytes::from_static(b"reply over tls"))).unwrap();
    graph.pump(server_adapter_id);

    let mut got_client = false;
    for _ in 0..100 {
        pump_all(&mut graph, &all_ids);
        if let Ok(packet) = client_to_user.try_recv() {
            if packet.as_buffer().map(|b| b.as_ref()) == Some(&b"reply over tls"[..]) {
                got_client = true;
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(got_client, "client application never received the server's reply");
}
