// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node identity (128-bit GUID).

use std::fmt;

/// Node GUID.
///
/// 16 raw bytes carried verbatim in every discovery header. Generated once per
/// node from a random (v4) UUID and never changed afterwards.
///
/// # Display Format
/// Hyphenated lowercase hex, 36 characters:
/// "0f8fad5b-d9cb-469f-a165-70867728950e"
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Length of the canonical string form.
    pub const STRING_LEN: usize = 36;

    /// Generate a fresh random GUID.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create GUID from raw bytes.
    ///
    /// # Examples
    /// ```
    /// use dzmq::core::Guid;
    ///
    /// let guid = Guid::from_bytes([7; 16]);
    /// assert_eq!(guid.as_bytes(), &[7; 16]);
    /// ```
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw bytes as carried on the wire.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Name of this node's in-process loopback endpoint.
    pub fn inproc_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 8-4-4-4-12 grouping
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}
