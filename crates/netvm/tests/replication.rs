//! Hosted objects bound to a bus through the default interceptor.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use netsync::Bus;
use netsync::BusExt;
use netsync::DefaultInterceptor;
use netsync::DuplexLink;
use netsync::LocalBus;
use netsync::Message;
use netsync::MethodCallMessage;
use netsync::PropertyChangeMessage;
use netsync::Relay;
use netsync::Replicated;
use netsync::Value;
use netvm::Host;
use netvm::Instance;

use common::*;

fn record<M: Message + Clone>(bus: &dyn Bus) -> Arc<Mutex<Vec<M>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe::<M>(move |msg| {
        sink.lock().unwrap().push(msg.clone());
        Ok(())
    });
    seen
}

struct Peer {
    object: Arc<Instance>,
    interceptor: Arc<DefaultInterceptor>,
}

fn bind(host: &Host, bus: &Arc<dyn Bus>) -> Result<Peer> {
    let object = host.instantiate(OBJECT)?;
    let owner: Arc<dyn Replicated> = object.clone();
    let interceptor = DefaultInterceptor::new(bus.clone(), &owner)?;
    object.attach(interceptor.clone())?;
    Ok(Peer { object, interceptor })
}

fn host() -> Result<Host> {
    Ok(Host::new(woven_module()?.0))
}

// ============================================================================
//  ONE BUS
// ============================================================================

#[test]
fn test_descriptor_hides_the_capability() -> Result<()> {
    let host = host()?;
    let object = host.instantiate(OBJECT)?;
    let descriptor = object.descriptor();

    assert_eq!(descriptor.network_name(), "TestNetSyncObject");
    assert!(descriptor.property("NetSyncInterceptor").is_none());
    let (_, ignored) = descriptor.property("IgnoreMeProperty").expect("property");
    assert!(ignored.ignored);
    let (_, read_only) = descriptor.property("GetterOnlyProperty").expect("property");
    assert!(!read_only.writable);

    let aliases: Vec<&str> = descriptor.methods.iter().filter_map(|m| m.alias()).collect();
    assert_eq!(aliases, vec!["DoStuff", "StuffWithInt", "DoComplexStuff", "Add"]);
    Ok(())
}

#[test]
fn test_local_set_publishes() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let host = host()?;
    let peer = bind(&host, &bus)?;
    let seen = record::<PropertyChangeMessage>(bus.as_ref());

    peer.object.set("IntValue", Value::I32(5))?;

    assert_eq!(*seen.lock().unwrap(), vec![PropertyChangeMessage::local("TestNetSyncObject", "IntValue", Value::I32(5))]);
    Ok(())
}

#[test]
fn test_remote_set_applies_without_echo() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let host = host()?;
    let peer = bind(&host, &bus)?;
    let seen = record::<PropertyChangeMessage>(bus.as_ref());

    bus.trigger(PropertyChangeMessage::remote("TestNetSyncObject", "TrickyProperty", Value::I32(3)))?;

    assert_eq!(peer.object.field("trick")?, Value::I32(6));
    assert_eq!(seen.lock().unwrap().len(), 1, "only the inbound message");
    assert!(peer.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_remote_call_applies_without_echo() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let host = host()?;
    let peer = bind(&host, &bus)?;
    let seen = record::<MethodCallMessage>(bus.as_ref());

    bus.trigger(MethodCallMessage::remote("TestNetSyncObject", "StuffWithInt", vec![Value::I32(8)]))?;

    assert_eq!(peer.object.field("back")?, Value::Str("int8".into()));
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(peer.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_remote_values_are_coerced() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let host = host()?;
    let peer = bind(&host, &bus)?;

    bus.trigger(PropertyChangeMessage::remote("TestNetSyncObject", "IntValue", Value::I64(12)))?;
    assert_eq!(peer.object.get("IntValue")?, Value::I32(12));

    let err = bus.trigger(PropertyChangeMessage::remote("TestNetSyncObject", "IntValue", Value::Str("x".into())));
    assert!(matches!(err, Err(netsync::Error::Host { .. })));
    assert!(peer.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_wrong_arity_is_reported() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let host = host()?;
    let peer = bind(&host, &bus)?;

    let err = bus.trigger(MethodCallMessage::remote("TestNetSyncObject", "Add", vec![Value::I32(1)]));
    assert!(matches!(err, Err(netsync::Error::ArgumentMismatch { .. })));
    assert!(peer.interceptor.is_quiet());
    Ok(())
}

// ============================================================================
//  TWO PEERS
// ============================================================================

async fn settle<F: Fn() -> bool>(done: F) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_peers_converge_over_a_relay() -> Result<()> {
    let host = host()?;
    let left_bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let right_bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let left = bind(&host, &left_bus)?;
    let right = bind(&host, &right_bus)?;
    let (a, b) = DuplexLink::pair();
    let _left_relay = Relay::spawn(left_bus.clone(), Arc::new(a));
    let _right_relay = Relay::spawn(right_bus.clone(), Arc::new(b));

    left.object.set("IntValue", Value::I32(11))?;
    settle(|| matches!(right.object.get("IntValue"), Ok(Value::I32(11)))).await;
    assert_eq!(right.object.get("IntValue")?, Value::I32(11));

    right.object.call("DoComplexStuff", &[Value::I32(1), Value::Str("hi".into())])?;
    settle(|| matches!(left.object.field("back"), Ok(Value::Str(s)) if s == "hihi")).await;
    assert_eq!(left.object.field("back")?, Value::Str("hihi".into()));

    // Let any stray echo bounce, then confirm both sides are at rest.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(left.object.get("IntValue")?, Value::I32(11));
    assert!(left.interceptor.is_quiet());
    assert!(right.interceptor.is_quiet());
    Ok(())
}
