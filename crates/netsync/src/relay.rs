//! # Relay
//!
//! Connects a bus to a peer over a [`Link`]. Messages published locally
//! (`local = true`) are forwarded; messages received from the link are
//! re-published with `local = false` so the peer's interceptors and
//! collections apply them.
//!
//! ## Philosophy
//!
//! - **Typed envelopes**: the link moves messages, not bytes. Encoding for a
//!   real wire is the link implementation's business.
//! - **One pump per link**: a single tokio task drains the link. Delivery on
//!   the receiving bus is synchronous within that task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::bus::Bus;
use crate::bus::BusExt;
use crate::bus::SubscriptionId;
use crate::error::Error;
use crate::error::Result;
use crate::message::MemberCommandMessage;
use crate::message::Message;
use crate::message::MethodCallMessage;
use crate::message::PropertyChangeMessage;

/// Any message the relay carries.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    Property(PropertyChangeMessage),
    Call(MethodCallMessage),
    Member(MemberCommandMessage),
}

impl From<PropertyChangeMessage> for Envelope {
    fn from(msg: PropertyChangeMessage) -> Self {
        Envelope::Property(msg)
    }
}

impl From<MethodCallMessage> for Envelope {
    fn from(msg: MethodCallMessage) -> Self {
        Envelope::Call(msg)
    }
}

impl From<MemberCommandMessage> for Envelope {
    fn from(msg: MemberCommandMessage) -> Self {
        Envelope::Member(msg)
    }
}

/// A bidirectional message pipe to one peer.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Queues an envelope for the peer. Must not block.
    fn send(&self, envelope: Envelope) -> Result<()>;

    /// Waits for the next envelope. `Ok(None)` means the peer hung up.
    async fn recv(&self) -> Result<Option<Envelope>>;
}

/// In-memory link over tokio channels.
pub struct DuplexLink {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl DuplexLink {
    /// Two connected ends: envelopes sent on `a` arrive at `b` and vice versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self { tx: tx_a, rx: Mutex::new(rx_b) };
        let b = Self { tx: tx_b, rx: Mutex::new(rx_a) };

        (a, b)
    }
}

#[async_trait]
impl Link for DuplexLink {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.tx.send(envelope).map_err(|_| Error::Link("channel closed".into()))
    }

    async fn recv(&self) -> Result<Option<Envelope>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// A running relay. Dropping it stops forwarding and aborts the pump.
pub struct Relay {
    bus: Arc<dyn Bus>,
    subscriptions: [SubscriptionId; 3],
    pump: JoinHandle<()>,
}

impl Relay {
    /// Starts relaying between `bus` and `link`. Must be called inside a
    /// tokio runtime.
    pub fn spawn(bus: Arc<dyn Bus>, link: Arc<dyn Link>) -> Self {
        let subscriptions = [
            forward::<PropertyChangeMessage>(&bus, &link),
            forward::<MethodCallMessage>(&bus, &link),
            forward::<MemberCommandMessage>(&bus, &link),
        ];

        let pump_bus = bus.clone();
        let pump = tokio::spawn(async move {
            loop {
                match link.recv().await {
                    Ok(Some(envelope)) => {
                        if let Err(e) = deliver(pump_bus.as_ref(), envelope) {
                            warn!("relay delivery failed: {}", e);
                        }
                    }
                    Ok(None) => {
                        debug!("relay link closed");
                        break;
                    }
                    Err(e) => {
                        warn!("relay link failed: {}", e);
                        break;
                    }
                }
            }
        });

        Self { bus, subscriptions, pump }
    }

    /// True once the pump has stopped.
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        let [property, call, member] = self.subscriptions;
        self.bus.unsubscribe::<PropertyChangeMessage>(property);
        self.bus.unsubscribe::<MethodCallMessage>(call);
        self.bus.unsubscribe::<MemberCommandMessage>(member);
        self.pump.abort();
    }
}

fn forward<M>(bus: &Arc<dyn Bus>, link: &Arc<dyn Link>) -> SubscriptionId
where
    M: Message + Into<Envelope>,
{
    let link = link.clone();
    bus.subscribe::<M>(move |msg| {
        if !msg.is_local() {
            return Ok(());
        }
        link.send(msg.clone().into())
    })
}

fn deliver(bus: &dyn Bus, envelope: Envelope) -> Result<()> {
    match envelope {
        Envelope::Property(msg) => republish(bus, msg),
        Envelope::Call(msg) => republish(bus, msg),
        Envelope::Member(msg) => republish(bus, msg),
    }
}

fn republish<M: Message>(bus: &dyn Bus, msg: M) -> Result<()> {
    debug!("relay delivering change for '{}'", msg.object_id());
    bus.trigger(msg.into_remote())
}
