// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core primitives shared by the codec, the discovery engine and the node.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `guid` | 128-bit node identity |
//! | `cursor` | Bounds-checked reader for discovery datagrams |

pub mod cursor;
pub mod guid;

pub use guid::Guid;
