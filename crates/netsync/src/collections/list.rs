use std::sync::Arc;
use std::sync::Mutex;

use super::MemberChannel;
use super::arg;
use super::check_index;
use super::index_arg;
use super::invalid_operation;
use super::lock;
use super::ops;
use crate::bus::Bus;
use crate::error::Error;
use crate::error::Result;
use crate::message::MemberCommandMessage;
use crate::value::Dynamic;
use crate::value::Value;

/// A replicated ordered list.
pub struct SyncList<T> {
    items: Arc<Mutex<Vec<T>>>,
    channel: MemberChannel,
}

impl<T> SyncList<T>
where
    T: Dynamic + Clone + PartialEq + Send + 'static,
{
    pub fn new(object_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self::from_vec(object_id, member_id, Vec::new())
    }

    /// Wraps existing items. Nothing is published for them.
    pub fn from_vec(object_id: impl Into<String>, member_id: impl Into<String>, items: Vec<T>) -> Self {
        Self { items: Arc::new(Mutex::new(items)), channel: MemberChannel::new(object_id, member_id) }
    }

    /// Assigns the bus. Deactivates first if currently subscribed.
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

    pub fn add(&self, item: T) -> Result<()> {
        self.channel.publish(ops::ADD, vec![item.to_value()])?;
        lock(&self.items).push(item);
        Ok(())
    }

    /// Removes the first occurrence. Publishes even when absent, as the
    /// peer's copy may differ.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.channel.publish(ops::REMOVE, vec![item.to_value()])?;
        let mut items = lock(&self.items);
        match items.iter().position(|x| x == item) {
            Some(i) => {
                items.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_at(&self, index: usize) -> Result<T> {
        check_index(index, self.len())?;
        self.channel.publish(ops::REMOVE_AT, vec![Value::index(index)])?;
        let mut items = lock(&self.items);
        check_index(index, items.len())?;
        Ok(items.remove(index))
    }

    pub fn clear(&self) -> Result<()> {
        self.channel.publish(ops::CLEAR, Vec::new())?;
        lock(&self.items).clear();
        Ok(())
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        check_insert(index, self.len())?;
        self.channel.publish(ops::INSERT, vec![Value::index(index), item.to_value()])?;
        let mut items = lock(&self.items);
        check_insert(index, items.len())?;
        items.insert(index, item);
        Ok(())
    }

    /// Indexed assignment.
    pub fn set(&self, index: usize, item: T) -> Result<()> {
        check_index(index, self.len())?;
        self.channel.publish(ops::INDEXER, vec![Value::index(index), item.to_value()])?;
        let mut items = lock(&self.items);
        check_index(index, items.len())?;
        items[index] = item;
        Ok(())
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        lock(&self.items).get(index).cloned()
    }

    pub fn contains(&self, item: &T) -> bool {
        lock(&self.items).contains(item)
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        lock(&self.items).iter().position(|x| x == item)
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        lock(&self.items).clone()
    }
}

fn check_insert(index: usize, len: usize) -> Result<()> {
    if index <= len { Ok(()) } else { Err(Error::IndexOutOfRange { index, len }) }
}

fn replay<T>(items: &Mutex<Vec<T>>, msg: &MemberCommandMessage) -> Result<()>
where
    T: Dynamic + PartialEq,
{
    let mut items = lock(items);
    match msg.operation.as_str() {
        ops::ADD => items.push(arg(msg, 0)?),
        ops::REMOVE => {
            let item: T = arg(msg, 0)?;
            if let Some(i) = items.iter().position(|x| *x == item) {
                items.remove(i);
            }
        }
        ops::REMOVE_AT => {
            let index = index_arg(msg, 0)?;
            check_index(index, items.len())?;
            items.remove(index);
        }
        ops::CLEAR => items.clear(),
        ops::INSERT => {
            let index = index_arg(msg, 0)?;
            let item = arg(msg, 1)?;
            check_insert(index, items.len())?;
            items.insert(index, item);
        }
        ops::INDEXER => {
            let index = index_arg(msg, 0)?;
            let item = arg(msg, 1)?;
            check_index(index, items.len())?;
            items[index] = item;
        }
        _ => return Err(invalid_operation(msg)),
    }
    Ok(())
}
