// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP broadcast socket for discovery datagrams.
//!
//! Every node on a host binds the same discovery port, so the socket is
//! opened with `SO_REUSEADDR` (and `SO_REUSEPORT` on unix) before binding
//! `0.0.0.0:<port>`. Broadcast datagrams are delivered to all of them.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

/// Non-blocking UDP socket bound to the discovery port.
#[derive(Debug)]
pub struct BroadcastSocket {
    socket: mio::net::UdpSocket,
    target: SocketAddr,
}

impl BroadcastSocket {
    /// Open the discovery socket and aim it at `broadcast_ip:port`.
    pub fn open(port: u16, broadcast_ip: Ipv4Addr) -> io::Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        #[cfg(unix)]
        set_reuseport(&socket2)?;
        socket2.set_broadcast(true)?;
        socket2.set_nonblocking(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket2.bind(&bind_addr.into())?;

        let std_socket: std::net::UdpSocket = socket2.into();
        let socket = mio::net::UdpSocket::from_std(std_socket);
        let target = SocketAddr::V4(SocketAddrV4::new(broadcast_ip, port));

        log::debug!("[UDP] discovery socket bound {} target={}", bind_addr, target);

        Ok(Self { socket, target })
    }

    /// Broadcast destination (address and port).
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one datagram to the broadcast target.
    pub fn send(&self, bytes: &[u8]) -> io::Result<usize> {
        self.socket.send_to(bytes, self.target)
    }

    /// Receive one datagram. `WouldBlock` when none is queued.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    /// Poll source for registration with the transport.
    pub fn source_mut(&mut self) -> &mut mio::net::UdpSocket {
        &mut self.socket
    }
}

/// Set SO_REUSEPORT so several nodes on one host can share the port.
#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// First non-loopback IPv4 address of this host.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[UDP] Failed to list network interfaces: {}", e);
            return None;
        }
    };

    interfaces.into_iter().find_map(|(name, ip)| match ip {
        IpAddr::V4(ipv4) if !ipv4.is_loopback() => {
            log::debug!("[UDP] using interface {} ({})", name, ipv4);
            Some(ipv4)
        }
        _ => None,
    })
}

/// Subnet broadcast address: the local address with its last octet set to 255.
///
/// Loopback addresses map to `127.255.255.255`, the only broadcast route on `lo`.
pub fn broadcast_for(ip: Ipv4Addr) -> Ipv4Addr {
    if ip.is_loopback() {
        return Ipv4Addr::new(127, 255, 255, 255);
    }
    let [a, b, c, _] = ip.octets();
    Ipv4Addr::new(a, b, c, 255)
}
