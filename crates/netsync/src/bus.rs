//! # Message Bus
//!
//! Type-routed publish/subscribe. A message of type `M` is delivered to every
//! handler subscribed for `M`, synchronously, on the triggering thread.
//!
//! ## Invariants
//! - The handler list is snapshotted before dispatch. Handlers may subscribe,
//!   unsubscribe, or trigger re-entrantly without deadlocking.
//! - Every subscribed handler sees a triggered message, even when an earlier
//!   one failed. The first failure is returned to the caller.

use std::any::Any;
use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tracing::warn;

use crate::error::Result;
use crate::message::Message;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub type ErasedHandler = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

/// The object-safe surface of a bus. Use [`BusExt`] for the typed API.
pub trait Bus: Send + Sync {
    fn subscribe_erased(&self, topic: TypeId, handler: ErasedHandler) -> SubscriptionId;
    fn unsubscribe_erased(&self, topic: TypeId, id: SubscriptionId) -> bool;
    fn trigger_erased(&self, topic: TypeId, message: &(dyn Any + Send + Sync)) -> Result<()>;
}

/// Typed subscribe/unsubscribe/trigger over any [`Bus`].
pub trait BusExt: Bus {
    fn subscribe<M: Message>(&self, handler: impl Fn(&M) -> Result<()> + Send + Sync + 'static) -> SubscriptionId {
        let erased: ErasedHandler = Arc::new(move |message| match message.downcast_ref::<M>() {
            Some(message) => handler(message),
            None => Ok(()),
        });
        self.subscribe_erased(TypeId::of::<M>(), erased)
    }

    fn unsubscribe<M: Message>(&self, id: SubscriptionId) -> bool {
        self.unsubscribe_erased(TypeId::of::<M>(), id)
    }

    fn trigger<M: Message>(&self, message: M) -> Result<()> {
        self.trigger_erased(TypeId::of::<M>(), &message)
    }
}

impl<B: Bus + ?Sized> BusExt for B {}

/// In-process bus keyed by message type.
#[derive(Default)]
pub struct LocalBus {
    topics: DashMap<TypeId, Vec<(SubscriptionId, ErasedHandler)>>,
    next_id: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handlers for `M`.
    pub fn subscribers<M: Message>(&self) -> usize {
        self.topics.get(&TypeId::of::<M>()).map(|entry| entry.len()).unwrap_or(0)
    }
}

impl Bus for LocalBus {
    fn subscribe_erased(&self, topic: TypeId, handler: ErasedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics.entry(topic).or_default().push((id, handler));
        id
    }

    fn unsubscribe_erased(&self, topic: TypeId, id: SubscriptionId) -> bool {
        let Some(mut entry) = self.topics.get_mut(&topic) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(sub, _)| *sub != id);
        entry.len() != before
    }

    fn trigger_erased(&self, topic: TypeId, message: &(dyn Any + Send + Sync)) -> Result<()> {
        let handlers: Vec<ErasedHandler> = match self.topics.get(&topic) {
            Some(entry) => entry.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return Ok(()),
        };

        let mut first_error = None;
        for handler in handlers {
            if let Err(e) = handler(message) {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!("additional handler failure: {}", e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
