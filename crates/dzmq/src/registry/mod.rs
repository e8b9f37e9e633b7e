// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-name bookkeeping for topics and services.
//!
//! A node keeps two independent [`TopicRegistry`] instances (topics and
//! services) and one [`ConnectionLedger`] per data-plane channel.

mod ledger;
mod topic;

pub use ledger::ConnectionLedger;
pub use topic::{Role, TopicRecord, TopicRegistry};

/// Invoked with `(topic, payload)` for every data message received.
pub type DataCallback = Box<dyn FnMut(&str, &[u8]) + Send>;

/// Produces the response for a service request `(service, payload)`.
pub type ReplyHandler = Box<dyn FnMut(&str, &[u8]) -> Vec<u8> + Send>;

/// Invoked with `(service, response)` for an asynchronous service call.
pub type ResponseCallback = Box<dyn FnMut(&str, &[u8]) + Send>;
