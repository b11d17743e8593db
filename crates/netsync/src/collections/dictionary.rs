use std::collections::HashMap;
use std::fmt::Debug;
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

/// A replicated key/value map.
pub struct SyncDictionary<K, V> {
    entries: Arc<Mutex<HashMap<K, V>>>,
    channel: MemberChannel,
}

impl<K, V> SyncDictionary<K, V>
where
    K: Dynamic + Clone + Eq + Hash + Debug + Send + 'static,
    V: Dynamic + Clone + PartialEq + Send + 'static,
{
    pub fn new(object_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self::from_map(object_id, member_id, HashMap::new())
    }

    pub fn from_map(object_id: impl Into<String>, member_id: impl Into<String>, entries: HashMap<K, V>) -> Self {
        Self { entries: Arc::new(Mutex::new(entries)), channel: MemberChannel::new(object_id, member_id) }
    }

    pub fn set_bus(&mut self, bus: Option<Arc<dyn Bus>>) {
        self.channel.set_bus(bus);
    }

    pub fn activate(&mut self) -> Result<()> {
        let entries = self.entries.clone();
        self.channel.activate(move |msg| replay(&entries, msg))
    }

    pub fn deactivate(&mut self) {
        self.channel.deactivate();
    }

    pub fn is_active(&self) -> bool {
        self.channel.is_active()
    }

    /// Adds a new entry. Fails without publishing if `key` is present.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        self.ensure_absent(&key)?;
        self.channel.publish(ops::ADD, vec![key.to_value(), value.to_value()])?;
        insert_new(&mut *lock(&self.entries), key, value)
    }

    /// Pair form of [`add`](Self::add).
    pub fn add_item(&self, item: (K, V)) -> Result<()> {
        self.ensure_absent(&item.0)?;
        self.channel.publish(ops::ADD_ITEM, vec![item.to_value()])?;
        let (key, value) = item;
        insert_new(&mut *lock(&self.entries), key, value)
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.channel.publish(ops::REMOVE, vec![key.to_value()])?;
        Ok(lock(&self.entries).remove(key))
    }

    /// Removes the entry only if both key and value match.
    pub fn remove_item(&self, item: &(K, V)) -> Result<bool> {
        self.channel.publish(ops::REMOVE_ITEM, vec![item.to_value()])?;
        Ok(remove_matching(&mut *lock(&self.entries), &item.0, &item.1))
    }

    pub fn clear(&self) -> Result<()> {
        self.channel.publish(ops::CLEAR, Vec::new())?;
        lock(&self.entries).clear();
        Ok(())
    }

    /// Indexed assignment: inserts or overwrites.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.channel.publish(ops::INDEXER, vec![key.to_value(), value.to_value()])?;
        lock(&self.entries).insert(key, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn keys(&self) -> Vec<K> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        lock(&self.entries).values().cloned().collect()
    }

    pub fn to_map(&self) -> HashMap<K, V> {
        lock(&self.entries).clone()
    }

    fn ensure_absent(&self, key: &K) -> Result<()> {
        if lock(&self.entries).contains_key(key) {
            return Err(Error::DuplicateKey(format!("{:?}", key)));
        }
        Ok(())
    }
}

fn insert_new<K: Eq + Hash + Debug, V>(entries: &mut HashMap<K, V>, key: K, value: V) -> Result<()> {
    if entries.contains_key(&key) {
        return Err(Error::DuplicateKey(format!("{:?}", key)));
    }
    entries.insert(key, value);
    Ok(())
}

fn remove_matching<K: Eq + Hash, V: PartialEq>(entries: &mut HashMap<K, V>, key: &K, value: &V) -> bool {
    if entries.get(key) == Some(value) {
        entries.remove(key);
        true
    } else {
        false
    }
}

fn replay<K, V>(entries: &Mutex<HashMap<K, V>>, msg: &MemberCommandMessage) -> Result<()>
where
    K: Dynamic + Eq + Hash + Debug,
    V: Dynamic + PartialEq,
{
    let mut entries = lock(entries);
    match msg.operation.as_str() {
        ops::ADD => insert_new(&mut *entries, arg(msg, 0)?, arg(msg, 1)?)?,
        ops::ADD_ITEM => {
            let (key, value): (K, V) = arg(msg, 0)?;
            insert_new(&mut *entries, key, value)?;
        }
        ops::REMOVE => {
            let key: K = arg(msg, 0)?;
            entries.remove(&key);
        }
        ops::REMOVE_ITEM => {
            let (key, value): (K, V) = arg(msg, 0)?;
            remove_matching(&mut *entries, &key, &value);
        }
        ops::CLEAR => entries.clear(),
        ops::INDEXER => {
            let key: K = arg(msg, 0)?;
            let value: V = arg(msg, 1)?;
            entries.insert(key, value);
        }
        _ => return Err(invalid_operation(msg)),
    }
    Ok(())
}
