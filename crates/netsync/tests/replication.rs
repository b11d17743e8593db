//! Two peers, each with its own bus and object, joined by a relay.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use netsync::*;
use netsync::reflect::MethodDescriptor;
use netsync::reflect::PropertyDescriptor;

struct Counter {
    descriptor: TypeDescriptor,
    capability: InterceptorSlot,
    count: Mutex<i64>,
    log: Mutex<Vec<String>>,
}

impl Counter {
    fn new() -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: "Counter".into(),
                sync_name: None,
                properties: vec![PropertyDescriptor { name: "Count".into(), writable: true, ignored: false }],
                methods: vec![MethodDescriptor { name: "Note".into(), sync: Some(None), arity: 1 }],
            },
            capability: InterceptorSlot::new(),
            count: Mutex::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    fn set_count(&self, value: i64) -> netsync::Result<()> {
        self.capability.write_value("Counter", "Count", value.to_value())?;
        *self.count.lock().unwrap() = value;
        Ok(())
    }

    fn note(&self, text: &str) -> netsync::Result<()> {
        self.capability.call_function("Counter", "Note", vec![text.to_string().to_value()])?;
        self.log.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn count(&self) -> i64 {
        *self.count.lock().unwrap()
    }
}

impl Replicated for Counter {
    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn set_property(&self, _property: PropertyId, value: Value) -> netsync::Result<()> {
        let value = i64::from_value(&value)
            .ok_or_else(|| Error::ArgumentMismatch { operation: "Count".into(), details: value.kind().into() })?;
        self.set_count(value)
    }

    fn invoke(&self, _method: MethodId, arguments: &[Value]) -> netsync::Result<Value> {
        let text = arguments.first().map(|v| v.to_string()).unwrap_or_default();
        self.note(&text)?;
        Ok(Value::Null)
    }
}

struct Peer {
    bus: Arc<dyn Bus>,
    counter: Arc<Counter>,
    interceptor: Arc<DefaultInterceptor>,
    _relay: Relay,
}

fn peer(link: DuplexLink) -> Result<Peer> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let counter = Arc::new(Counter::new());
    let owner: Arc<dyn Replicated> = counter.clone();
    let interceptor = DefaultInterceptor::new(bus.clone(), &owner)?;
    counter.capability.set(Some(interceptor.clone()));
    let relay = Relay::spawn(bus.clone(), Arc::new(link));
    Ok(Peer { bus, counter, interceptor, _relay: relay })
}

async fn settle<F: Fn() -> bool>(done: F) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_property_round_trip() -> Result<()> {
    let (a, b) = DuplexLink::pair();
    let left = peer(a)?;
    let right = peer(b)?;

    left.counter.set_count(11)?;
    settle(|| right.counter.count() == 11).await;
    assert_eq!(right.counter.count(), 11);

    right.counter.set_count(12)?;
    settle(|| left.counter.count() == 12).await;
    assert_eq!(left.counter.count(), 12);

    // Give any stray echo a chance to bounce back, then confirm none did.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(left.counter.count(), 12);
    assert_eq!(right.counter.count(), 12);
    assert!(left.interceptor.is_quiet());
    assert!(right.interceptor.is_quiet());
    Ok(())
}

#[tokio::test]
async fn test_call_round_trip() -> Result<()> {
    let (a, b) = DuplexLink::pair();
    let left = peer(a)?;
    let right = peer(b)?;

    left.counter.note("hello")?;
    settle(|| right.counter.log.lock().unwrap().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(*right.counter.log.lock().unwrap(), vec!["hello".to_string()]);
    assert_eq!(*left.counter.log.lock().unwrap(), vec!["hello".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_collections_round_trip() -> Result<()> {
    let (a, b) = DuplexLink::pair();
    let left = peer(a)?;
    let right = peer(b)?;

    let mut mine = SyncList::<String>::new("Counter", "History");
    mine.set_bus(Some(left.bus.clone()));
    mine.activate()?;
    let mut theirs = SyncList::<String>::new("Counter", "History");
    theirs.set_bus(Some(right.bus.clone()));
    theirs.activate()?;

    mine.add("one".into())?;
    mine.add("two".into())?;
    mine.remove_at(0)?;
    settle(|| theirs.to_vec() == vec!["two".to_string()]).await;
    assert_eq!(theirs.to_vec(), vec!["two".to_string()]);

    theirs.insert(0, "zero".into())?;

    settle(|| theirs.to_vec() == mine.to_vec() && mine.len() == 2).await;
    assert_eq!(mine.to_vec(), vec!["zero".to_string(), "two".to_string()]);
    assert_eq!(theirs.to_vec(), mine.to_vec());
    Ok(())
}
