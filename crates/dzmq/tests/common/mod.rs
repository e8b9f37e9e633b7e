// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for loopback integration tests.
//!
//! Every test picks its own random discovery port so that tests running in
//! parallel never see each other's datagrams.

#![allow(dead_code)]

use dzmq::{Node, NodeConfig};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const STEP: Duration = Duration::from_millis(5);
pub const DEADLINE: Duration = Duration::from_secs(5);

/// Received `(topic, payload)` pairs.
pub type Inbox = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

pub fn random_port() -> u16 {
    20000 + fastrand::u16(0..40000)
}

/// Config for a node that talks over `lo` on `port`.
pub fn loopback_config(port: u16) -> NodeConfig {
    NodeConfig {
        local_ip: Some(Ipv4Addr::LOCALHOST),
        broadcast_ip: Some(Ipv4Addr::new(127, 255, 255, 255)),
        discovery_port: port,
        ..NodeConfig::default()
    }
}

pub fn loopback_node(port: u16) -> Node {
    let mut node = Node::new(loopback_config(port));
    node.init().expect("init loopback node");
    node
}

/// Callback that appends into the returned inbox.
pub fn recorder() -> (Inbox, impl FnMut(&str, &[u8]) + Send + 'static) {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&inbox);
    let callback = move |topic: &str, payload: &[u8]| {
        sink.lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
    };
    (inbox, callback)
}

/// Spin every node in turn until `done` holds or the deadline passes.
pub fn spin_until(nodes: &mut [Node], mut done: impl FnMut(&[Node]) -> bool) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if done(nodes) {
            return true;
        }
        for node in nodes.iter_mut() {
            node.spin_once(STEP).expect("spin_once");
        }
    }
    done(nodes)
}

/// Spin every node for a fixed duration.
pub fn spin_for(nodes: &mut [Node], duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        for node in nodes.iter_mut() {
            node.spin_once(STEP).expect("spin_once");
        }
    }
}
