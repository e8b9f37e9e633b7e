// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The node facade.
//!
//! A [`Node`] is one participant: it advertises and subscribes topics, offers
//! and calls services, and is driven by [`Node::spin`] / [`Node::spin_once`]
//! from a single thread. All callbacks run inside the spin call.
//!
//! # Example
//! ```no_run
//! use dzmq::Node;
//! use std::time::Duration;
//!
//! let mut node = Node::builder().build()?;
//! node.subscribe("chatter", |topic, payload| {
//!     println!("{}: {}", topic, String::from_utf8_lossy(payload));
//! })?;
//! node.advertise("chatter")?;
//! node.timer(Duration::from_secs(1), |node| {
//!     let _ = node.publish("chatter", b"hello");
//! })?;
//! node.spin()?;
//! # Ok::<(), dzmq::Error>(())
//! ```

mod builder;
mod session;
mod timer;

pub use builder::NodeBuilder;
pub use timer::TimerCallback;

use crate::config::NodeConfig;
use crate::core::Guid;
use crate::discovery::Channel;
use crate::error::{Error, Result};
use crate::protocol::validate_topic;
use crate::registry::Role;
use crate::transport::Endpoint;
use session::Session;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use timer::TimerState;

/// A decentralized pub/sub and request/reply participant.
pub struct Node {
    config: NodeConfig,
    session: Option<Session>,
    timer: Option<TimerState>,
    /// Bumped whenever the timer is set or cleared
    timer_epoch: u64,
}

fn validate_name(name: &str) -> Result<()> {
    validate_topic(name).map_err(|e| Error::InvalidName(format!("{:?}: {}", name, e)))
}

impl Node {
    /// Create an uninitialized node. Call [`Node::init`] before use.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            session: None,
            timer: None,
            timer_epoch: 0,
        }
    }

    pub fn builder() -> NodeBuilder {
        NodeBuilder::new()
    }

    /// Open the discovery socket and the data-plane sockets.
    pub fn init(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.session = Some(Session::open(&self.config)?);
        Ok(())
    }

    /// Tear everything down. Later calls fail with [`Error::NotInitialized`].
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("[NODE] {} closed", session.guid());
        }
        self.timer = None;
        self.timer_epoch += 1;
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotInitialized)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(Error::NotInitialized)
    }

    // ===== Topics =====

    /// Announce that this node publishes `topic`.
    pub fn advertise(&mut self, topic: &str) -> Result<()> {
        validate_name(topic)?;
        let session = self.session_mut()?;
        let topics = session.engine.registry_mut(Channel::Topic);
        if topics.has_role(topic, Role::Advertised) {
            return Err(Error::AlreadyAdvertised(topic.to_owned()));
        }
        session.advertise(Channel::Topic, topic)?;
        session
            .engine
            .registry_mut(Channel::Topic)
            .set_role(topic, Role::Advertised, true);
        Ok(())
    }

    /// Stop publishing `topic`. Later [`Node::publish`] calls fail.
    pub fn unadvertise(&mut self, topic: &str) -> Result<()> {
        validate_name(topic)?;
        let topics = self.session_mut()?.engine.registry_mut(Channel::Topic);
        if !topics.has_role(topic, Role::Advertised) {
            return Err(Error::NotAdvertised(topic.to_owned()));
        }
        topics.set_role(topic, Role::Advertised, false);
        Ok(())
    }

    /// Receive `(topic, payload)` for every message published on `topic`.
    pub fn subscribe<F>(&mut self, topic: &str, callback: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) + Send + 'static,
    {
        validate_name(topic)?;
        let session = self.session_mut()?;
        let topics = session.engine.registry_mut(Channel::Topic);
        if topics.has_role(topic, Role::Subscribed) {
            return Err(Error::AlreadySubscribed(topic.to_owned()));
        }
        session.solicit(Channel::Topic, topic)?;
        session.set_topic_filter(topic, true)?;
        let topics = session.engine.registry_mut(Channel::Topic);
        topics.set_role(topic, Role::Subscribed, true);
        topics.set_data_callback(topic, Some(Box::new(callback)));
        Ok(())
    }

    pub fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        validate_name(topic)?;
        let session = self.session_mut()?;
        let topics = session.engine.registry_mut(Channel::Topic);
        if !topics.has_role(topic, Role::Subscribed) {
            return Err(Error::NotSubscribed(topic.to_owned()));
        }
        topics.set_data_callback(topic, None);
        topics.set_connected(topic, false);
        topics.set_role(topic, Role::Subscribed, false);
        session.set_topic_filter(topic, false)
    }

    /// Send `payload` to every current subscriber of `topic`.
    ///
    /// Fire-and-forget: with no subscriber connected the message is dropped.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        validate_name(topic)?;
        let session = self.session_mut()?;
        if !session
            .engine
            .registry(Channel::Topic)
            .has_role(topic, Role::Advertised)
        {
            return Err(Error::NotAdvertised(topic.to_owned()));
        }
        session.publish(topic, payload)
    }

    // ===== Services =====

    /// Serve `name`; `handler` maps each request payload to a response.
    pub fn srv_advertise<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) -> Vec<u8> + Send + 'static,
    {
        validate_name(name)?;
        let session = self.session_mut()?;
        let services = session.engine.registry_mut(Channel::Service);
        if services.has_role(name, Role::Advertised) {
            return Err(Error::AlreadyAdvertised(name.to_owned()));
        }
        session.advertise(Channel::Service, name)?;
        let services = session.engine.registry_mut(Channel::Service);
        services.set_role(name, Role::Advertised, true);
        services.set_reply_handler(name, Some(Box::new(handler)));
        Ok(())
    }

    pub fn srv_unadvertise(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let services = self.session_mut()?.engine.registry_mut(Channel::Service);
        if !services.has_role(name, Role::Advertised) {
            return Err(Error::NotAdvertised(name.to_owned()));
        }
        services.set_reply_handler(name, None);
        services.set_role(name, Role::Advertised, false);
        Ok(())
    }

    /// Call a service and wait for its response.
    ///
    /// Solicits a provider for up to `srv_retries` rounds of
    /// `srv_retry_interval`, failing with [`Error::ServiceUnavailable`] if none
    /// connects. Once sent, waits `srv_reply_timeout` for the reply, else
    /// [`Error::Timeout`]. The loop keeps spinning meanwhile, so other
    /// callbacks and the timer may run.
    pub fn srv_request(&mut self, name: &str, payload: &[u8]) -> Result<Vec<u8>> {
        validate_name(name)?;
        let session = self.session_mut()?;
        session
            .engine
            .registry_mut(Channel::Service)
            .set_role(name, Role::Subscribed, true);
        session.refresh_links()?;

        self.await_provider(name)?;
        let session = self.session_mut()?;
        if let Err(e) = session.send_request(name, payload) {
            // The provider may have gone away since the last poll
            session.refresh_links()?;
            if self.is_service_connected(name) {
                return Err(e);
            }
            self.await_provider(name)?;
            self.session_mut()?.send_request(name, payload)?;
        }

        let session = self.session_mut()?;
        session.await_reply(name);

        let deadline = Instant::now() + self.config.srv_reply_timeout;
        let spun = self.spin_until(deadline, |node| {
            node.session.as_ref().is_some_and(Session::has_awaited_reply)
        });
        let response = self.session.as_mut().and_then(Session::take_awaited);
        spun?;
        response.ok_or_else(|| Error::Timeout(name.to_owned()))
    }

    /// Solicit `name` until a provider is linked or the retry budget runs out.
    fn await_provider(&mut self, name: &str) -> Result<()> {
        let mut round = 0;
        while !self.is_service_connected(name) {
            if round == self.config.srv_retries {
                log::debug!("[NODE] {} unavailable after {} rounds", name, round);
                return Err(Error::ServiceUnavailable(name.to_owned()));
            }
            round += 1;
            self.session_mut()?.solicit(Channel::Service, name)?;
            let deadline = Instant::now() + self.config.srv_retry_interval;
            self.spin_until(deadline, |node| node.is_service_connected(name))?;
        }
        Ok(())
    }

    /// Call a service without blocking. `callback` receives `(name, response)`
    /// from a later spin once a provider answered.
    pub fn srv_request_async<F>(&mut self, name: &str, payload: &[u8], callback: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) + Send + 'static,
    {
        validate_name(name)?;
        let session = self.session_mut()?;
        let services = session.engine.registry_mut(Channel::Service);
        services.set_role(name, Role::Subscribed, true);
        services.set_response_callback(name, Some(Box::new(callback)));
        services.enqueue_request(name, payload.to_vec());
        session.solicit(Channel::Service, name)
    }

    // ===== Timer =====

    /// Call `callback` every `period` from the spin loop. Replaces any
    /// previous timer.
    pub fn timer<F>(&mut self, period: Duration, callback: F) -> Result<()>
    where
        F: FnMut(&mut Node) + Send + 'static,
    {
        self.session()?;
        self.timer = Some(TimerState::new(period, Box::new(callback)));
        self.timer_epoch += 1;
        Ok(())
    }

    pub fn clear_timer(&mut self) {
        self.timer = None;
        self.timer_epoch += 1;
    }

    fn fire_timer(&mut self, now: Instant) {
        let Some(mut timer) = self.timer.take() else {
            return;
        };
        let epoch = self.timer_epoch;
        (timer.callback)(self);
        timer.last_fired_at = now;
        // Re-armed or cleared from inside the callback: keep that decision
        if self.timer_epoch == epoch && self.session.is_some() {
            self.timer = Some(timer);
        }
    }

    // ===== Spin =====

    /// Run one turn of the loop, waiting at most `timeout` for I/O.
    ///
    /// A due timer pre-empts the turn. Dispatch failures are logged; only a
    /// failed poll ([`Error::Poll`]) is returned.
    pub fn spin_once(&mut self, timeout: Duration) -> Result<()> {
        self.session()?;
        let now = Instant::now();
        let mut wait = timeout;
        if let Some(timer) = &self.timer {
            let remaining = timer.remaining(now);
            if remaining.is_zero() {
                self.fire_timer(now);
                return Ok(());
            }
            wait = wait.min(remaining);
        }
        self.session_mut()?.run_once(wait)
    }

    /// Spin until a fatal error.
    pub fn spin(&mut self) -> Result<()> {
        let timeout = self.config.spin_timeout;
        loop {
            self.spin_once(timeout)?;
        }
    }

    fn spin_until(&mut self, deadline: Instant, done: impl Fn(&Self) -> bool) -> Result<()> {
        loop {
            if done(self) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            self.spin_once(deadline - now)?;
        }
    }

    // ===== Accessors =====

    pub fn guid(&self) -> Result<Guid> {
        Ok(self.session()?.guid())
    }

    /// Network endpoint data subscribers connect to.
    pub fn publisher_endpoint(&self) -> Result<&Endpoint> {
        Ok(self.session()?.publisher_endpoint())
    }

    /// Network endpoint service requesters connect to.
    pub fn service_endpoint(&self) -> Result<&Endpoint> {
        Ok(self.session()?.service_endpoint())
    }

    /// Where discovery datagrams are sent.
    pub fn broadcast_target(&self) -> Result<SocketAddr> {
        Ok(self.session()?.broadcast_target())
    }

    /// True once a publisher of `topic` has been linked.
    pub fn is_connected(&self, topic: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.engine.registry(Channel::Topic).is_connected(topic))
    }

    /// True once a provider of `name` has been linked.
    pub fn is_service_connected(&self, name: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.engine.registry(Channel::Service).is_connected(name))
    }

    /// Data links currently attached to the publisher (the loopback link included).
    pub fn publisher_peer_count(&self) -> usize {
        self.session.as_ref().map_or(0, Session::publisher_peer_count)
    }

    /// Remote addresses seen advertising `topic`.
    pub fn known_publishers(&self, topic: &str) -> Vec<String> {
        self.session.as_ref().map_or_else(Vec::new, |s| {
            s.engine.registry(Channel::Topic).known_addresses(topic)
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        match &self.session {
            Some(session) => s
                .field("guid", &session.guid())
                .field("publisher", session.publisher_endpoint())
                .field("service", session.service_endpoint()),
            None => s.field("initialized", &false),
        };
        s.field("timer", &self.timer).finish()
    }
}
