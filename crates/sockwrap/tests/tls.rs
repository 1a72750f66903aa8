use std::io::Write;
use std::thread;

use sockwrap::{
    ConnError, ConnectOptions, Connection, Listener, Received, TlsAcceptor, TlsConfig,
};

const CA: &[u8] = include_bytes!("fixtures/ca.pem");
const CERT: &[u8] = include_bytes!("fixtures/cert.pem");
const KEY: &[u8] = include_bytes!("fixtures/key.pem");

fn listen() -> Option<Listener> {
    match Listener::listen("127.0.0.1:0") {
        Ok(l) => Some(l),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => None,
        Err(e) => panic!("bind: {e}"),
    }
}

fn trusted() -> ConnectOptions {
    ConnectOptions::tls(TlsConfig::client_with_ca_pem(CA).expect("ca")).server_name("localhost")
}

#[test]
fn encrypted_question_and_answer() {
    let Some(listener) = listen() else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");

    let server = thread::spawn(move || {
        let mut conn = listener.accept_tls(&acceptor).expect("accept");
        let question = conn.read(100);
        assert!(conn.write("Alice"));
        let reply = conn.read(100);
        let after = conn.read(100);
        (question, reply, after)
    });

    let mut client = Connection::connect_with("127.0.0.1", port, &trusted()).expect("connect");
    assert!(client.get_ref().expect("open").is_tls());
    assert!(client.write("What is your name? "));
    assert_eq!(client.read(100), Received::Data("Alice".to_string()));
    assert!(client.write("Nice to meet you, Alice\n"));
    client.close();

    let (question, reply, after) = server.join().unwrap();
    assert_eq!(question, Received::Data("What is your name? ".to_string()));
    assert_eq!(reply, Received::Data("Nice to meet you, Alice\n".to_string()));
    assert_eq!(after, Received::Closed);
}

#[test]
fn encrypted_read_times_out_as_empty() {
    let Some(listener) = listen() else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");

    let server = thread::spawn(move || {
        let mut conn = listener.accept_tls(&acceptor).expect("accept");
        // hold the connection open until the client is done
        conn.read(1)
    });

    let options = trusted().read_timeout_ms(50);
    let mut client = Connection::connect_with("127.0.0.1", port, &options).expect("connect");
    assert_eq!(client.read(16), Received::Empty);
    client.close();

    assert_eq!(server.join().unwrap(), Received::Closed);
}

#[test]
fn certificate_name_mismatch_fails_construction() {
    let Some(listener) = listen() else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");

    let server = thread::spawn(move || listener.accept_tls(&acceptor).is_err());

    let options = trusted().server_name("not-localhost.example");
    let err = Connection::connect_with("127.0.0.1", port, &options).expect_err("must not verify");
    assert!(matches!(err, ConnError::Handshake { .. }), "{err:?}");
    assert!(server.join().unwrap());
}

#[test]
fn insecure_client_skips_verification() {
    let Some(listener) = listen() else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");

    let server = thread::spawn(move || {
        let mut conn = listener.accept_tls(&acceptor).expect("accept");
        conn.write("hi")
    });

    let options = ConnectOptions::tls(TlsConfig::client_insecure().expect("config"))
        .server_name("anything.invalid");
    let mut client = Connection::connect_with("127.0.0.1", port, &options).expect("connect");
    assert_eq!(client.read(10), Received::Data("hi".to_string()));
    assert!(server.join().unwrap());
}

// Completes a handshake, then has the server put a record on the wire that
// cannot be decrypted. The server connection is handed back so it outlives the read.
fn corrupted_after_handshake() -> Option<(Connection, thread::JoinHandle<Connection>)> {
    let listener = listen()?;
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");

    let server = thread::spawn(move || {
        let conn = listener.accept_tls(&acceptor).expect("accept");
        let mut raw = conn.get_ref().expect("open").tcp();
        raw.write_all(b"\x17\x03\x03\x00\x05garbage-not-tls").unwrap();
        conn
    });

    let client = Connection::connect_with("127.0.0.1", port, &trusted()).expect("connect");
    Some((client, server))
}

#[test]
fn undecryptable_record_reads_as_closed() {
    let Some((mut client, server)) = corrupted_after_handshake() else {
        return;
    };
    assert_eq!(client.read(100), Received::Closed);
    drop(server.join().unwrap());
}

#[test]
fn undecryptable_record_surfaces_through_try_read() {
    let Some((mut client, server)) = corrupted_after_handshake() else {
        return;
    };
    let err = client.try_read_bytes(100).expect_err("corrupt record");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    drop(server.join().unwrap());
}

#[test]
fn timeout_then_blocking_read_gets_late_data() {
    let Some(listener) = listen() else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from_pem(CERT, KEY).expect("acceptor");
    let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

    let server = thread::spawn(move || {
        let mut conn = listener.accept_tls(&acceptor).expect("accept");
        go_rx.recv().unwrap();
        assert!(conn.write("late"));
        conn.read(1)
    });

    let options = trusted().read_timeout_ms(50);
    let mut client = Connection::connect_with("127.0.0.1", port, &options).expect("connect");
    assert_eq!(client.read(16), Received::Empty);
    client.set_timeout(0);
    assert_eq!(client.timeout(), 0);
    go_tx.send(()).unwrap();
    assert_eq!(client.read(16), Received::Data("late".to_string()));
    client.close();

    assert_eq!(server.join().unwrap(), Received::Closed);
}
