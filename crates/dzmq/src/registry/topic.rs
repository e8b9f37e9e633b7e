// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic/service records keyed by name.
//!
//! Records are created lazily by any mutator and removed again as soon as
//! they carry nothing: no role, no known address, no callback and no queued
//! request.

use super::{DataCallback, ReplyHandler, ResponseCallback};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Local role on a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This node advertises the topic (publisher) or service (provider).
    Advertised,
    /// This node subscribed to the topic or requested the service.
    Subscribed,
}

/// State kept for one topic or service name.
#[derive(Default)]
pub struct TopicRecord {
    pub advertised_by_me: bool,
    pub subscribed: bool,
    pub connected: bool,
    pub known_addresses: HashSet<String>,
    pub data_callback: Option<DataCallback>,
    pub reply_handler: Option<ReplyHandler>,
    pub response_callback: Option<ResponseCallback>,
    pub pending_requests: VecDeque<Vec<u8>>,
}

impl TopicRecord {
    fn is_idle(&self) -> bool {
        !self.advertised_by_me
            && !self.subscribed
            && self.known_addresses.is_empty()
            && self.data_callback.is_none()
            && self.reply_handler.is_none()
            && self.response_callback.is_none()
            && self.pending_requests.is_empty()
    }

    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Advertised => self.advertised_by_me,
            Role::Subscribed => self.subscribed,
        }
    }
}

impl fmt::Debug for TopicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRecord")
            .field("advertised_by_me", &self.advertised_by_me)
            .field("subscribed", &self.subscribed)
            .field("connected", &self.connected)
            .field("known_addresses", &self.known_addresses)
            .field("data_callback", &self.data_callback.is_some())
            .field("reply_handler", &self.reply_handler.is_some())
            .field("response_callback", &self.response_callback.is_some())
            .field("pending_requests", &self.pending_requests.len())
            .finish()
    }
}

/// Name-keyed registry of [`TopicRecord`]s.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    records: HashMap<String, TopicRecord>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the record for `name`.
    pub fn ensure(&mut self, name: &str) -> &mut TopicRecord {
        self.records.entry(name.to_owned()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&TopicRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    // ===== Roles =====

    pub fn set_role(&mut self, name: &str, role: Role, on: bool) {
        let record = self.ensure(name);
        match role {
            Role::Advertised => record.advertised_by_me = on,
            Role::Subscribed => record.subscribed = on,
        }
        if !on {
            self.prune(name);
        }
    }

    pub fn has_role(&self, name: &str, role: Role) -> bool {
        self.get(name).is_some_and(|r| r.has_role(role))
    }

    // ===== Addresses & connection =====

    /// Remember a remote address for `name`. Returns `true` if it was new.
    pub fn add_known_address(&mut self, name: &str, address: &str) -> bool {
        let record = self.ensure(name);
        if record.known_addresses.contains(address) {
            return false;
        }
        record.known_addresses.insert(address.to_owned())
    }

    /// Forget a remote address. Clears `connected` when none remain.
    pub fn remove_known_address(&mut self, name: &str, address: &str) -> bool {
        let Some(record) = self.records.get_mut(name) else {
            return false;
        };
        let removed = record.known_addresses.remove(address);
        if record.known_addresses.is_empty() {
            record.connected = false;
        }
        self.prune(name);
        removed
    }

    /// Names for which `address` is a known address.
    pub fn names_with_address(&self, address: &str) -> Vec<String> {
        self.names()
            .filter(|name| {
                self.get(name)
                    .is_some_and(|r| r.known_addresses.contains(address))
            })
            .map(str::to_owned)
            .collect()
    }

    pub fn known_addresses(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|r| r.known_addresses.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Set the connection flag.
    ///
    /// Marking a name connected requires at least one known address; the call
    /// is refused (returns `false`) otherwise.
    pub fn set_connected(&mut self, name: &str, connected: bool) -> bool {
        if connected {
            match self.records.get_mut(name) {
                Some(record) if !record.known_addresses.is_empty() => {
                    record.connected = true;
                    true
                }
                _ => false,
            }
        } else {
            if let Some(record) = self.records.get_mut(name) {
                record.connected = false;
            }
            true
        }
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.get(name).is_some_and(|r| r.connected)
    }

    // ===== Callbacks =====

    pub fn set_data_callback(&mut self, name: &str, callback: Option<DataCallback>) {
        let clearing = callback.is_none();
        self.ensure(name).data_callback = callback;
        if clearing {
            self.prune(name);
        }
    }

    pub fn data_callback_mut(&mut self, name: &str) -> Option<&mut DataCallback> {
        self.records.get_mut(name)?.data_callback.as_mut()
    }

    pub fn set_reply_handler(&mut self, name: &str, handler: Option<ReplyHandler>) {
        let clearing = handler.is_none();
        self.ensure(name).reply_handler = handler;
        if clearing {
            self.prune(name);
        }
    }

    pub fn reply_handler_mut(&mut self, name: &str) -> Option<&mut ReplyHandler> {
        self.records.get_mut(name)?.reply_handler.as_mut()
    }

    pub fn set_response_callback(&mut self, name: &str, callback: Option<ResponseCallback>) {
        let clearing = callback.is_none();
        self.ensure(name).response_callback = callback;
        if clearing {
            self.prune(name);
        }
    }

    pub fn response_callback_mut(&mut self, name: &str) -> Option<&mut ResponseCallback> {
        self.records.get_mut(name)?.response_callback.as_mut()
    }

    // ===== Pending requests =====

    pub fn enqueue_request(&mut self, name: &str, payload: Vec<u8>) {
        self.ensure(name).pending_requests.push_back(payload);
    }

    pub fn dequeue_request(&mut self, name: &str) -> Option<Vec<u8>> {
        let payload = self.records.get_mut(name)?.pending_requests.pop_front();
        if payload.is_some() {
            self.prune(name);
        }
        payload
    }

    pub fn has_pending_requests(&self, name: &str) -> bool {
        self.get(name).is_some_and(|r| !r.pending_requests.is_empty())
    }

    /// Names that are connected and have at least one queued request.
    pub fn ready_with_pending(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, r)| r.connected && !r.pending_requests.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn prune(&mut self, name: &str) {
        if self.records.get(name).is_some_and(TopicRecord::is_idle) {
            self.records.remove(name);
        }
    }
}
