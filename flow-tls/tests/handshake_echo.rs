//! Two `TlsProtocol` elements wired ciphertext-to-ciphertext (standing in
//! for a transport shunt) drive a full client/server handshake, after which
//! plaintext pushed into the client's upstream pad arrives on the server's
//! upstream output, and vice versa.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use flow_core::element::Graph;
use flow_core::elements::Collector;
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

fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[test]
fn handshake_completes_and_plaintext_round_trips() {
    install_crypto_provider();
    let (chain, key) = self_signed();

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain.clone(), key)
        .expect("server config");

    let mut roots = rustls::RootCertStore::empty();
    roots.add(chain[0].clone()).expect("trust self-signed cert as root");
    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap().to_owned();
    let client_conn = rustls::ClientConnection::new(Arc::new(client_config), server_name).expect("client conn");
    let server_conn = rustls::ServerConnection::new(Arc::new(server_config)).expect("server conn");

    let mut graph = Graph::new();
    let client = graph.insert(Box::new(TlsProtocol::new("tls-client", Box::new(RustlsBackend::client(client_conn)))));
    let server = graph.insert(Box::new(TlsProtocol::new("tls-server", Box::new(RustlsBackend::server(server_conn)))));

    // Ciphertext sides talk directly to each other, standing in for a
    // transport shunt that would otherwise carry these bytes over a socket.
    graph.connect(PadRef::output(client, 1), PadRef::input(server, 1));
    graph.connect(PadRef::output(server, 1), PadRef::input(client, 1));

    let client_plain: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
    let cp = client_plain.clone();
    let client_sink = graph.insert(Box::new(Collector::new("client-sink", move |p| {
        if let Some(b) = p.into_buffer() {
            cp.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(client, 0), PadRef::input(client_sink, 0));

    let server_plain: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
    let sp = server_plain.clone();
    let server_sink = graph.insert(Box::new(Collector::new("server-sink", move |p| {
        if let Some(b) = p.into_buffer() {
            sp.lock().unwrap().push(b);
        }
    })));
    graph.connect(PadRef::output(server, 0), PadRef::input(server_sink, 0));

    // Kick off the client's first flight (ClientHello); the rest of the
    // handshake propagates through `connect`'s flush-on-wire and the
    // process_input chain triggered by each delivered flight.
    graph.pump(client);
    graph.pump(server);
    graph.pump(client);
    graph.pump(server);
    graph.pump(client);

    graph.push_input(PadRef::input(client, 0), Packet::buffer(Bytes::from_static(b"hello from client")));
    graph.pump(client);
    graph.pump(server);

    graph.push_input(PadRef::input(server, 0), Packet::buffer(Bytes::from_static(b"hello from server")));
    graph.pump(server);
    graph.pump(client);

    assert_eq!(
        server_plain.lock().unwrap().iter().flat_map(|b| b.to_vec()).collect::<Vec<u8>>(),
        b"hello from client"
    );
    assert_eq!(
        client_plain.lock().unwrap().iter().flat_map(|b| b.to_vec()).collect::<Vec<u8>>(),
        b"hello from server"
    );
}
