// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dzmqctl - poke at a dzmq discovery domain from the shell
//!
//! ```text
//! dzmqctl talk chatter            # publish "hello #n" once per second
//! dzmqctl listen chatter          # print everything published on chatter
//! dzmqctl serve echo --upper      # answer requests on "echo"
//! dzmqctl call echo ping          # one blocking request
//! dzmqctl dump                    # decode raw discovery traffic
//! ```

#![allow(clippy::uninlined_format_args)]

use clap::{Args, Parser, Subcommand};
use colored::*;
use dzmq::protocol::{decode_datagram, DiscoveryMessage};
use dzmq::transport::{broadcast_for, local_ipv4, BroadcastSocket};
use dzmq::{Node, NodeBuilder};
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SPIN_STEP: Duration = Duration::from_millis(100);

/// Talk, listen, serve and call on a dzmq discovery domain
#[derive(Parser, Debug)]
#[command(name = "dzmqctl")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(flatten)]
    net: NetArgs,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct NetArgs {
    /// Discovery port (default: DZMQ_BCAST_PORT or 11312)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Local IPv4 address (default: DZMQ_IP or first interface)
    #[arg(long, global = true)]
    ip: Option<Ipv4Addr>,

    /// Broadcast address (default: DZMQ_BCAST_HOST or <ip>.255)
    #[arg(long, global = true)]
    bcast: Option<Ipv4Addr>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a message periodically
    Talk {
        topic: String,
        /// Message text; a counter is appended
        #[arg(short, long, default_value = "hello")]
        message: String,
        /// Publish period in milliseconds
        #[arg(short, long, default_value = "1000")]
        rate_ms: u64,
    },
    /// Print messages published on a topic
    Listen {
        topic: String,
        /// Stop after this many messages (0 = unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,
    },
    /// Answer requests for a service (echo by default)
    Serve {
        service: String,
        /// Reply with the request upper-cased
        #[arg(long)]
        upper: bool,
    },
    /// Send one blocking request and print the reply
    Call { service: String, payload: String },
    /// Decode discovery datagrams seen on the port
    Dump,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    match &cli.command {
        Command::Talk {
            topic,
            message,
            rate_ms,
        } => talk(&cli.net, topic, message, *rate_ms, &running),
        Command::Listen { topic, count } => listen(&cli.net, topic, *count, &running),
        Command::Serve { service, upper } => serve(&cli.net, service, *upper, &running),
        Command::Call { service, payload } => call(&cli.net, service, payload),
        Command::Dump => dump(&cli.net, &running),
    }
}

fn build_node(net: &NetArgs) -> dzmq::Result<Node> {
    let mut builder = NodeBuilder::new().with_env();
    if let Some(port) = net.port {
        builder = builder.discovery_port(port);
    }
    if let Some(ip) = net.ip {
        builder = builder.local_ip(ip);
    }
    if let Some(bcast) = net.bcast {
        builder = builder.broadcast_ip(bcast);
    }
    let node = builder.build()?;
    log::debug!("{:?}", node);
    Ok(node)
}

fn spin_while(node: &mut Node, running: &AtomicBool) -> dzmq::Result<()> {
    while running.load(Ordering::SeqCst) {
        node.spin_once(SPIN_STEP)?;
    }
    Ok(())
}

fn talk(
    net: &NetArgs,
    topic: &str,
    message: &str,
    rate_ms: u64,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut node = build_node(net)?;
    node.advertise(topic)?;
    eprintln!(
        "{} {} {} from {}",
        ">>>".green().bold(),
        "Publishing on".bold(),
        topic.cyan(),
        node.publisher_endpoint()?
    );

    let topic = topic.to_string();
    let message = message.to_string();
    let mut seq = 0u64;
    node.timer(Duration::from_millis(rate_ms.max(1)), move |node| {
        seq += 1;
        let text = format!("{} #{}", message, seq);
        match node.publish(&topic, text.as_bytes()) {
            Ok(()) => println!("{} {}", format!("[{}]", seq).yellow(), text),
            Err(e) => eprintln!("{}: {}", "Warning".yellow(), e),
        }
    })?;

    spin_while(&mut node, running)?;
    Ok(())
}

fn listen(
    net: &NetArgs,
    topic: &str,
    count: u64,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut node = build_node(net)?;
    let received = Arc::new(AtomicU64::new(0));
    let seen = received.clone();
    node.subscribe(topic, move |topic, payload| {
        let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "{} {} {}",
            format!("#{}", n).yellow(),
            topic.cyan(),
            String::from_utf8_lossy(payload)
        );
    })?;
    eprintln!("{} {} {}", ">>>".green().bold(), "Subscribed to".bold(), topic.cyan());
    eprintln!("{}", "Press Ctrl+C to stop".dimmed());

    while running.load(Ordering::SeqCst) {
        if count > 0 && received.load(Ordering::SeqCst) >= count {
            break;
        }
        node.spin_once(SPIN_STEP)?;
    }

    eprintln!(
        "\n{} Received {} message(s)",
        "---".dimmed(),
        received.load(Ordering::SeqCst)
    );
    Ok(())
}

fn serve(
    net: &NetArgs,
    service: &str,
    upper: bool,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut node = build_node(net)?;
    node.srv_advertise(service, move |name, request| {
        println!("{} {} {}", "<-".green(), name.cyan(), String::from_utf8_lossy(request));
        if upper {
            request.to_ascii_uppercase()
        } else {
            request.to_vec()
        }
    })?;
    eprintln!(
        "{} {} {} at {}",
        ">>>".green().bold(),
        "Serving".bold(),
        service.cyan(),
        node.service_endpoint()?
    );

    spin_while(&mut node, running)?;
    Ok(())
}

fn call(net: &NetArgs, service: &str, payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut node = build_node(net)?;
    let response = node.srv_request(service, payload.as_bytes())?;
    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}

fn dump(net: &NetArgs, running: &AtomicBool) -> Result<(), Box<dyn std::error::Error>> {
    let config = dzmq::NodeConfig::from_env();
    let port = net.port.unwrap_or(config.discovery_port);
    let ip = net
        .ip
        .or(config.local_ip)
        .or_else(local_ipv4)
        .unwrap_or(Ipv4Addr::LOCALHOST);
    let bcast = net.bcast.or(config.broadcast_ip).unwrap_or_else(|| broadcast_for(ip));

    let socket = BroadcastSocket::open(port, bcast)?;
    eprintln!(
        "{} {} port {}",
        ">>>".green().bold(),
        "Dumping discovery on".bold(),
        port
    );

    let mut buf = [0u8; dzmq::config::UDP_MAX_SIZE];
    while running.load(Ordering::SeqCst) {
        let (len, from) = match socket.recv(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        match decode_datagram(&buf[..len]) {
            Ok(DiscoveryMessage::Advertise(adv)) => println!(
                "{} {:<8} {} {} -> {}",
                from.to_string().dimmed(),
                adv.header.kind.to_string().green(),
                adv.header.sender,
                adv.header.topic.cyan(),
                adv.address
            ),
            Ok(DiscoveryMessage::Subscribe(header)) => println!(
                "{} {:<8} {} {}",
                from.to_string().dimmed(),
                header.kind.to_string().blue(),
                header.sender,
                header.topic.cyan()
            ),
            Err(e) => println!(
                "{} {} ({} bytes): {}",
                from.to_string().dimmed(),
                "MALFORMED".red(),
                len,
                e
            ),
        }
    }
    Ok(())
}
