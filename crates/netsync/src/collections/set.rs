use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;

use super::MemberChannel;
use super::arg;
use super::invalid_operation;
use super::lock;
use super::ops;
use crate::bus::Bus;
use crate::error::Error;
use crate::error::Result;
use crate::message::MemberCommandMessage;
use crate::value::Dynamic;

/// A replicated unordered set.
///
/// Set-algebra bulk operations have no single-command encoding and are
/// rejected with [`Error::NotSupported`], leaving the set untouched.
pub struct SyncSet<T> {
    items: Arc<Mutex<HashSet<T>>>,
    channel: MemberChannel,
}

impl<T> SyncSet<T>
where
    T: Dynamic + Clone + Eq + Hash + Send + 'static,
{
    pub fn new(object_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self::from_set(object_id, member_id, HashSet::new())
    }

    pub fn from_set(object_id: impl Into<String>, member_id: impl Into<String>, items: HashSet<T>) -> Self {
        Self { items: Arc::new(Mutex::new(items)), channel: MemberChannel::new(object_id, member_id) }
    }

    pub fn set_bus(&mut self, bus: Option<Arc<dyn Bus>>) {
        self.channel.set_bus(bus);
    }

    pub fn activate(&mut self) -> Result<()> {
        let items = self.items.clone();
        self.channel.activate(move |msg| replay(&items, msg))
    }

    pub fn deactivate(&mut self) {
        self.channel.deactivate();
    }

    pub fn is_active(&self) -> bool {
        self.channel.is_active()
    }

    /// Returns whether the item was newly added.
    pub fn add(&self, item: T) -> Result<bool> {
        self.channel.publish(ops::ADD, vec![item.to_value()])?;
        Ok(lock(&self.items).insert(item))
    }

    /// Collection-style add that discards whether the item was new.
    pub fn add_item(&self, item: T) -> Result<()> {
        self.channel.publish(ops::ADD_UNIT, vec![item.to_value()])?;
        lock(&self.items).insert(item);
        Ok(())
    }

    pub fn remove(&self, item: &T) -> Result<bool> {
        self.channel.publish(ops::REMOVE, vec![item.to_value()])?;
        Ok(lock(&self.items).remove(item))
    }

    pub fn clear(&self) -> Result<()> {
        self.channel.publish(ops::CLEAR, Vec::new())?;
        lock(&self.items).clear();
        Ok(())
    }

    pub fn except_with(&self, _other: impl IntoIterator<Item = T>) -> Result<()> {
        Err(Error::NotSupported { operation: "ExceptWith" })
    }

    pub fn intersect_with(&self, _other: impl IntoIterator<Item = T>) -> Result<()> {
        Err(Error::NotSupported { operation: "IntersectWith" })
    }

    pub fn symmetric_except_with(&self, _other: impl IntoIterator<Item = T>) -> Result<()> {
        Err(Error::NotSupported { operation: "SymmetricExceptWith" })
    }

    pub fn union_with(&self, _other: impl IntoIterator<Item = T>) -> Result<()> {
        Err(Error::NotSupported { operation: "UnionWith" })
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        lock(&self.items).contains(item)
    }

    pub fn is_subset(&self, other: &HashSet<T>) -> bool {
        lock(&self.items).is_subset(other)
    }

    pub fn is_superset(&self, other: &HashSet<T>) -> bool {
        lock(&self.items).is_superset(other)
    }

    pub fn overlaps(&self, other: &HashSet<T>) -> bool {
        !lock(&self.items).is_disjoint(other)
    }

    pub fn set_equals(&self, other: &HashSet<T>) -> bool {
        *lock(&self.items) == *other
    }

    pub fn to_set(&self) -> HashSet<T> {
        lock(&self.items).clone()
    }
}

fn replay<T>(items: &Mutex<HashSet<T>>, msg: &MemberCommandMessage) -> Result<()>
where
    T: Dynamic + Eq + Hash,
{
    let mut items = lock(items);
    match msg.operation.as_str() {
        ops::ADD | ops::ADD_UNIT => {
            items.insert(arg(msg, 0)?);
        }
        ops::REMOVE => {
            let item: T = arg(msg, 0)?;
            items.remove(&item);
        }
        ops::CLEAR => items.clear(),
        _ => return Err(invalid_operation(msg)),
    }
    Ok(())
}
