// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport layer.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `broadcast` | UDP discovery socket, interface and broadcast address helpers |
//! | `endpoint` | `tcp://` / `inproc://` endpoint strings |
//! | `frame_codec` | Length-prefixed multipart framing for TCP |
//! | `mq` | Publisher/subscriber/requester/replier sockets on one `mio::Poll` |

pub mod broadcast;
pub mod endpoint;
pub mod frame_codec;
pub mod mq;

pub use broadcast::{broadcast_for, local_ipv4, BroadcastSocket};
pub use endpoint::{is_inproc_address, Endpoint, ParseEndpointError};
pub use frame_codec::FrameCodec;
pub use mq::{Incoming, PeerId, SocketId, SocketKind, Transport, INBOX_HIGH_WATER_MARK};
