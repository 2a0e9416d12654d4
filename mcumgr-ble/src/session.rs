//! Request/response exchange over one [`Link`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use mcumgr_proto::{Command, FromMap, Message, Reassembler, codec};

use crate::Error;
use crate::link::{Connector, Link};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for a request to be written and its response
    /// assembled
    pub response_timeout: Duration,
    /// ATT MTU of the link, when the BLE stack cannot report it
    pub mtu: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            mtu: None,
        }
    }
}

/// Connection state of a [`Session`].
///
/// There is no connecting state: finding the device and subscribing happen
/// in [`Session::connect`] before a `Session` exists, and either finish
/// `Connected` or fail with [`Error::Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connected,
    /// A request was written and its response is being assembled. Seen
    /// outside of `send_request` only when an earlier call was cancelled.
    AwaitingResponse,
    Disconnected,
}

/// An SMP client session.
///
/// Owns the link and the queue of received notification fragments. All
/// exchanges take `&mut self`, so at most one request is ever in flight.
pub struct Session<L: Link> {
    link: L,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    reassembler: Reassembler,
    state: State,
    config: SessionConfig,
    seq: u8,
}

impl<L: Link> Session<L> {
    /// Open a link to `address` and subscribe to its notifications, all
    /// within `timeout`.
    pub async fn connect<C>(
        connector: &C,
        address: &str,
        timeout: Duration,
        config: SessionConfig,
    ) -> Result<Self, Error>
    where
        C: Connector<Link = L>,
    {
        let deadline = Instant::now() + timeout;
        let link = connector.connect(address, timeout).await?;
        Self::open_until(link, config, deadline).await
    }

    /// Subscribe to notifications on an already connected link. The
    /// subscription gets `config.response_timeout` to complete.
    pub async fn open(link: L, config: SessionConfig) -> Result<Self, Error> {
        let deadline = Instant::now() + config.response_timeout;
        Self::open_until(link, config, deadline).await
    }

    async fn open_until(
        mut link: L,
        config: SessionConfig,
        deadline: Instant,
    ) -> Result<Self, Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let subscribed = match tokio::time::timeout_at(deadline, link.subscribe(tx)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ Error::Connection(_))) => Err(e),
            Ok(Err(other)) => Err(Error::Connection(format!("subscribe failed: {other}"))),
            Err(_) => Err(Error::Connection(
                "timed out subscribing to notifications".to_string(),
            )),
        };
        if let Err(e) = subscribed {
            let _ = link.disconnect().await;
            return Err(e);
        }

        match config.mtu.or_else(|| link.mtu()) {
            Some(mtu) => log::debug!("BLE MTU is {mtu} bytes"),
            None => log::debug!("BLE MTU unknown"),
        }

        Ok(Self {
            link,
            inbound: rx,
            reassembler: Reassembler::new(),
            state: State::Connected,
            config,
            seq: 0,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Configured MTU, else whatever the link reports.
    pub fn mtu(&self) -> Option<usize> {
        self.config.mtu.or_else(|| self.link.mtu())
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Throw away anything received outside of an exchange, e.g. the late
    /// tail of a response we stopped waiting for.
    fn drain_stale(&mut self) {
        let mut stale = 0;
        while let Ok(fragment) = self.inbound.try_recv() {
            stale += fragment.len();
        }
        if stale > 0 {
            log::debug!("discarded {stale} stale bytes");
        }
        self.reassembler.reset();
    }

    async fn assemble(&mut self) -> Result<Message, Error> {
        loop {
            let fragment = self.inbound.recv().await.ok_or_else(|| {
                Error::Transport("notification stream closed".to_string())
            })?;
            if let Some(message) = self.reassembler.push(&fragment)? {
                return Ok(message);
            }
        }
    }

    async fn exchange(&mut self, bytes: &[u8]) -> Result<Message, Error> {
        let limit = self.config.response_timeout;
        let exchange = async {
            self.link.write(bytes, true).await?;
            self.assemble().await
        };
        match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(limit)),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// The response must carry the request's group and id and the matching
    /// RSP op, otherwise this is a [`mcumgr_proto::ProtocolError`].
    pub async fn send_request(&mut self, request: &Message) -> Result<Message, Error> {
        match self.state {
            State::Disconnected => {
                return Err(Error::Connection("session is disconnected".to_string()));
            }
            State::AwaitingResponse => {
                log::debug!("previous request was cancelled before its response arrived");
            }
            State::Connected => {}
        }

        self.drain_stale();
        let bytes = request.to_bytes();
        log::debug!("TX ({}): {:02x?}", bytes.len(), bytes);

        self.state = State::AwaitingResponse;
        let result = self.exchange(&bytes).await;
        self.state = State::Connected;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.drain_stale();
                return Err(e);
            }
        };

        request.header.check_response(&response.header)?;
        Ok(response)
    }

    /// Issue a catalog command and decode its response.
    ///
    /// A non-zero `rc` in the response is returned as [`Error::Device`].
    pub async fn call<C: Command>(&mut self, command: &C) -> Result<C::Response, Error> {
        let seq = self.next_seq();
        let request = command.to_message(seq)?;
        let response = self.send_request(&request).await?;

        let map = codec::decode(&response.payload)?;
        let rc = codec::rc(&map)?;
        if rc != 0 {
            return Err(Error::Device { rc });
        }

        Ok(C::Response::from_map(&map)?)
    }

    /// Unsubscribe and close the link. Calling it again does nothing.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        if self.state == State::Disconnected {
            log::debug!("session already disconnected");
            return Ok(());
        }

        let unsubscribed = self.link.unsubscribe().await;
        let disconnected = self.link.disconnect().await;
        self.state = State::Disconnected;
        self.drain_stale();

        unsubscribed.and(disconnected)
    }
}
