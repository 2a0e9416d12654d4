//! In-memory [`Link`] that plays the device side in tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mcumgr_proto::codec::{self, Map};
use mcumgr_proto::{Header, Message};

use crate::Error;
use crate::link::{Connector, Inbound, Link};

type Responder = Box<dyn FnMut(&Message) -> Vec<Message> + Send>;

/// Build the response a device would send for `request`, carrying `map`.
pub fn respond(request: &Message, map: &Map) -> Message {
    let header = Header {
        op: request.header.op.response(),
        ..request.header
    };
    Message::new(header, codec::encode(map).unwrap()).unwrap()
}

/// Pushes bytes into the session's notification queue from outside a write.
#[derive(Clone)]
pub struct Injector(Arc<Mutex<Option<Inbound>>>);

impl Injector {
    pub fn push(&self, fragment: Vec<u8>) {
        if let Some(inbound) = self.0.lock().unwrap().as_ref() {
            inbound.send(fragment).unwrap();
        }
    }
}

pub struct FakeLink {
    responder: Responder,
    fragment: usize,
    inbound: Arc<Mutex<Option<Inbound>>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    disconnected: Arc<Mutex<bool>>,
    fail_subscribe: bool,
    fail_writes: bool,
    hang_subscribe: bool,
    hang_writes: bool,
    mtu: Option<usize>,
}

impl FakeLink {
    /// `responder` sees every written request and returns the responses to
    /// notify, in order.
    pub fn new(responder: impl FnMut(&Message) -> Vec<Message> + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            fragment: 20,
            inbound: Arc::new(Mutex::new(None)),
            writes: Arc::new(Mutex::new(Vec::new())),
            disconnected: Arc::new(Mutex::new(false)),
            fail_subscribe: false,
            fail_writes: false,
            hang_subscribe: false,
            hang_writes: false,
            mtu: None,
        }
    }

    /// Split every response into notifications of at most `size` bytes.
    pub fn fragment(mut self, size: usize) -> Self {
        self.fragment = size;
        self
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = Some(mtu);
        self
    }

    pub fn fail_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Subscribing never completes, like a CCCD write the device ignores.
    pub fn hang_subscribe(mut self) -> Self {
        self.hang_subscribe = true;
        self
    }

    /// Writes are never acknowledged.
    pub fn hang_writes(mut self) -> Self {
        self.hang_writes = true;
        self
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.writes.clone()
    }

    pub fn disconnected(&self) -> Arc<Mutex<bool>> {
        self.disconnected.clone()
    }

    pub fn injector(&self) -> Injector {
        Injector(self.inbound.clone())
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn write(&mut self, data: &[u8], _ack: bool) -> Result<(), Error> {
        if self.hang_writes {
            std::future::pending::<()>().await;
        }
        if self.fail_writes {
            return Err(Error::Transport("write failed".to_string()));
        }
        self.writes.lock().unwrap().push(data.to_vec());

        let request = Message::from_bytes(data)?;
        let inbound = self.inbound.lock().unwrap().clone();
        if let Some(inbound) = inbound {
            for response in (self.responder)(&request) {
                for piece in response.to_bytes().chunks(self.fragment) {
                    let _ = inbound.send(piece.to_vec());
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&mut self, inbound: Inbound) -> Result<(), Error> {
        if self.hang_subscribe {
            std::future::pending::<()>().await;
        }
        if self.fail_subscribe {
            return Err(Error::Connection("subscribe failed".to_string()));
        }
        *self.inbound.lock().unwrap() = Some(inbound);
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), Error> {
        *self.inbound.lock().unwrap() = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        *self.disconnected.lock().unwrap() = true;
        Ok(())
    }

    fn mtu(&self) -> Option<usize> {
        self.mtu
    }
}

pub struct FakeConnector<F> {
    make: F,
    addresses: Mutex<Vec<String>>,
}

impl<F: Fn() -> FakeLink + Sync> FakeConnector<F> {
    pub fn new(make: F) -> Self {
        Self {
            make,
            addresses: Mutex::new(Vec::new()),
        }
    }

    pub fn addresses(&self) -> Vec<String> {
        self.addresses.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F: Fn() -> FakeLink + Sync> Connector for FakeConnector<F> {
    type Link = FakeLink;

    async fn connect(&self, address: &str, _timeout: Duration) -> Result<FakeLink, Error> {
        self.addresses.lock().unwrap().push(address.to_string());
        Ok((self.make)())
    }
}
