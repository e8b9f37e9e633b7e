// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Request/reply between nodes over loopback.

mod common;

use common::{loopback_config, loopback_node, random_port, recorder, spin_until, STEP};
use dzmq::protocol::{Advertisement, DiscoveryHeader, MessageType};
use dzmq::transport::BroadcastSocket;
use dzmq::{Error, Guid, Node, NodeConfig};
use std::net::{Ipv4Addr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Spin `provider` on its own thread until `stop` is set.
fn serve(mut provider: Node, stop: Arc<AtomicBool>) -> thread::JoinHandle<Node> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            provider.spin_once(STEP).expect("provider spin");
        }
        provider
    })
}

#[test]
fn blocking_request_gets_echo() {
    let port = random_port();
    let mut provider = loopback_node(port);
    provider
        .srv_advertise("echo", |_name, request| request.to_vec())
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let handle = serve(provider, Arc::clone(&stop));

    let mut client = Node::new(NodeConfig {
        srv_reply_timeout: Duration::from_secs(2),
        ..loopback_config(port)
    });
    client.init().unwrap();

    let response = client.srv_request("echo", b"ping");
    let second = client.srv_request("echo", b"again");

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();

    assert_eq!(response.unwrap(), b"ping");
    assert_eq!(second.unwrap(), b"again");
    assert!(client.is_service_connected("echo"));
}

#[test]
fn request_without_provider_is_unavailable() {
    let port = random_port();
    let mut client = Node::new(NodeConfig {
        srv_retries: 3,
        srv_retry_interval: Duration::from_millis(30),
        ..loopback_config(port)
    });
    client.init().unwrap();

    let started = Instant::now();
    let result = client.srv_request("missing", b"ping");
    assert!(matches!(result, Err(Error::ServiceUnavailable(ref name)) if name == "missing"));
    assert!(started.elapsed() >= Duration::from_millis(90));
}

#[test]
fn unanswered_request_times_out() {
    let port = random_port();
    // A provider that accepts connections but never answers
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("tcp://{}", silent.local_addr().unwrap());

    let stop = Arc::new(AtomicBool::new(false));
    let announcer = thread::spawn({
        let stop = Arc::clone(&stop);
        move || {
            let socket =
                BroadcastSocket::open(port, Ipv4Addr::new(127, 255, 255, 255)).unwrap();
            let header = DiscoveryHeader::new(Guid::generate(), "slow", MessageType::AdvSvc);
            let datagram = Advertisement::new(header, address).encode().unwrap();
            while !stop.load(Ordering::Relaxed) {
                let _ = socket.send(&datagram);
                thread::sleep(Duration::from_millis(20));
            }
        }
    });

    let mut client = Node::new(NodeConfig {
        srv_reply_timeout: Duration::from_millis(100),
        ..loopback_config(port)
    });
    client.init().unwrap();
    let result = client.srv_request("slow", b"ping");

    stop.store(true, Ordering::Relaxed);
    announcer.join().unwrap();

    assert!(client.is_service_connected("slow"));
    assert!(matches!(result, Err(Error::Timeout(ref name)) if name == "slow"));
}

#[test]
fn async_request_invokes_callback() {
    let port = random_port();
    let mut nodes = vec![loopback_node(port), loopback_node(port)];
    nodes[0]
        .srv_advertise("upper", |_, request| request.to_ascii_uppercase())
        .unwrap();

    let (inbox, callback) = recorder();
    nodes[1]
        .srv_request_async("upper", b"quiet", callback)
        .unwrap();

    assert!(spin_until(&mut nodes, |_| !inbox.lock().unwrap().is_empty()));
    assert_eq!(
        *inbox.lock().unwrap(),
        vec![("upper".to_string(), b"QUIET".to_vec())]
    );
}

#[test]
fn requests_reach_the_provider_of_each_name() {
    let port = random_port();
    let mut upper = loopback_node(port);
    upper
        .srv_advertise("upper", |_, r| r.to_ascii_uppercase())
        .unwrap();
    let mut lower = loopback_node(port);
    lower
        .srv_advertise("lower", |_, r| r.to_ascii_lowercase())
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let upper_handle = serve(upper, Arc::clone(&stop));
    let lower_handle = serve(lower, Arc::clone(&stop));

    let mut client = Node::new(NodeConfig {
        srv_reply_timeout: Duration::from_secs(2),
        ..loopback_config(port)
    });
    client.init().unwrap();

    let mut answers = Vec::new();
    for _ in 0..3 {
        answers.push(client.srv_request("upper", b"MiXeD"));
        answers.push(client.srv_request("lower", b"MiXeD"));
    }

    stop.store(true, Ordering::Relaxed);
    upper_handle.join().unwrap();
    lower_handle.join().unwrap();

    for (i, answer) in answers.into_iter().enumerate() {
        let expected: &[u8] = if i % 2 == 0 { b"MIXED" } else { b"mixed" };
        assert_eq!(answer.unwrap(), expected, "answer {}", i);
    }
}

#[test]
fn replacement_provider_is_found_after_loss() {
    let port = random_port();
    let mut first = loopback_node(port);
    first
        .srv_advertise("echo", |_, request| request.to_vec())
        .unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let handle = serve(first, Arc::clone(&stop));

    let mut clients = vec![Node::new(NodeConfig {
        srv_reply_timeout: Duration::from_secs(2),
        ..loopback_config(port)
    })];
    clients[0].init().unwrap();
    assert_eq!(clients[0].srv_request("echo", b"one").unwrap(), b"one");

    stop.store(true, Ordering::Relaxed);
    drop(handle.join().unwrap());
    assert!(spin_until(&mut clients, |n| !n[0].is_service_connected("echo")));

    let mut second = loopback_node(port);
    second
        .srv_advertise("echo", |_, request| request.to_ascii_uppercase())
        .unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let handle = serve(second, Arc::clone(&stop));

    let response = clients[0].srv_request("echo", b"two");

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();

    assert_eq!(response.unwrap(), b"TWO");
    assert!(clients[0].is_service_connected("echo"));
}
