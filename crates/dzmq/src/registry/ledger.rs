// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote endpoints already connected on one data-plane channel.

use std::collections::HashSet;

/// Addresses a channel socket has already connected to.
///
/// A repeat advertisement of a recorded address must not trigger a second
/// connect. The transport never reconnects a dropped link, so an entry is
/// forgotten when its link closes and the next advertisement connects again.
#[derive(Debug, Default, Clone)]
pub struct ConnectionLedger {
    addresses: HashSet<String>,
}

impl ConnectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Record a successful connect. Returns `false` if already present.
    pub fn record(&mut self, address: &str) -> bool {
        if self.addresses.contains(address) {
            return false;
        }
        self.addresses.insert(address.to_owned())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Drop an address whose link closed. Returns `false` if it was unknown.
    pub fn forget(&mut self, address: &str) -> bool {
        self.addresses.remove(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_once() {
        let mut ledger = ConnectionLedger::new();
        assert!(ledger.record("tcp://10.0.0.1:4000"));
        assert!(!ledger.record("tcp://10.0.0.1:4000"));
        assert!(ledger.contains("tcp://10.0.0.1:4000"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_forget_allows_record_again() {
        let mut ledger = ConnectionLedger::new();
        ledger.record("tcp://10.0.0.1:4000");
        assert!(ledger.forget("tcp://10.0.0.1:4000"));
        assert!(!ledger.forget("tcp://10.0.0.1:4000"));
        assert!(ledger.is_empty());
        assert!(ledger.record("tcp://10.0.0.1:4000"));
    }
}
