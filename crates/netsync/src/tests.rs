use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::*;
use crate::collections::ops;
use crate::echo::EchoTable;

// ============================================================================
//  FIXTURES
// ============================================================================

/// Hand-woven stand-in for an instrumented object: setters and synchronized
/// methods report through the capability before doing their work.
struct Gadget {
    descriptor: TypeDescriptor,
    capability: InterceptorSlot,
    int_value: Mutex<i32>,
    silent: Mutex<i32>,
    calls: Mutex<Vec<String>>,
}

impl Gadget {
    fn new() -> Self {
        Self::with_methods(vec![
            method("DoStuff", Some(Some("StuffAlias")), 1),
            method("Plain", None, 0),
            method("Ping", Some(None), 0),
        ])
    }

    fn with_methods(methods: Vec<reflect::MethodDescriptor>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: "Gadget".into(),
                sync_name: Some("CoolGadget".into()),
                properties: vec![
                    property("IntValue", true, false),
                    property("Silent", true, false),
                    property("ReadOnly", false, false),
                    property("Hidden", true, true),
                ],
                methods,
            },
            capability: InterceptorSlot::new(),
            int_value: Mutex::new(0),
            silent: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn set_int_value(&self, value: i32) -> Result<()> {
        self.capability.write_value("CoolGadget", "IntValue", Value::I32(value))?;
        *self.int_value.lock().unwrap() = value;
        Ok(())
    }

    fn do_stuff(&self, arg: &str) -> Result<()> {
        self.capability.call_function("CoolGadget", "StuffAlias", vec![Value::Str(arg.into())])?;
        self.calls.lock().unwrap().push(format!("DoStuff({})", arg));
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.capability.call_function("CoolGadget", "Ping", Vec::new())?;
        self.calls.lock().unwrap().push("Ping".into());
        Ok(())
    }

    fn int_value(&self) -> i32 {
        *self.int_value.lock().unwrap()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Replicated for Gadget {
    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn set_property(&self, property: PropertyId, value: Value) -> Result<()> {
        let bad = || Error::ArgumentMismatch { operation: "set".into(), details: value.kind().into() };
        match property.0 {
            0 => self.set_int_value(i32::from_value(&value).ok_or_else(bad)?),
            1 => {
                *self.silent.lock().unwrap() = i32::from_value(&value).ok_or_else(bad)?;
                Ok(())
            }
            _ => Err(Error::UnknownProperty { object: "CoolGadget".into(), member: "?".into() }),
        }
    }

    fn invoke(&self, method: MethodId, arguments: &[Value]) -> Result<Value> {
        match self.descriptor.methods[method.0].name.as_str() {
            "DoStuff" => {
                let arg = arguments.first().map(|v| v.to_string()).unwrap_or_default();
                self.do_stuff(&arg)?;
            }
            "Ping" => self.ping()?,
            other => self.calls.lock().unwrap().push(other.to_string()),
        }
        Ok(Value::Null)
    }
}

fn property(name: &str, writable: bool, ignored: bool) -> reflect::PropertyDescriptor {
    reflect::PropertyDescriptor { name: name.into(), writable, ignored }
}

fn method(name: &str, sync: Option<Option<&str>>, arity: usize) -> reflect::MethodDescriptor {
    reflect::MethodDescriptor { name: name.into(), sync: sync.map(|n| n.map(String::from)), arity }
}

fn record<M: Message>(bus: &dyn Bus) -> Arc<Mutex<Vec<M>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe::<M>(move |msg| {
        sink.lock().unwrap().push(msg.clone());
        Ok(())
    });
    seen
}

struct Fixture {
    local: Arc<LocalBus>,
    bus: Arc<dyn Bus>,
    gadget: Arc<Gadget>,
    interceptor: Arc<DefaultInterceptor>,
}

fn fixture(config: InterceptorConfig) -> Result<Fixture> {
    let local = Arc::new(LocalBus::new());
    let bus: Arc<dyn Bus> = local.clone();
    let gadget = Arc::new(Gadget::new());
    let owner: Arc<dyn Replicated> = gadget.clone();
    let interceptor = DefaultInterceptor::with_config(bus.clone(), &owner, config)?;
    gadget.capability.set(Some(interceptor.clone()));
    Ok(Fixture { local, bus, gadget, interceptor })
}

// ============================================================================
//  BUS
// ============================================================================

#[test]
fn test_bus_routes_by_type() -> Result<()> {
    let bus = LocalBus::new();
    let props = record::<PropertyChangeMessage>(&bus);
    let calls = record::<MethodCallMessage>(&bus);

    bus.trigger(PropertyChangeMessage::local("a", "b", Value::I32(1)))?;

    assert_eq!(props.lock().unwrap().len(), 1);
    assert!(calls.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_bus_unsubscribe_stops_delivery() -> Result<()> {
    let bus = LocalBus::new();
    let seen = Arc::new(Mutex::new(0));
    let sink = seen.clone();
    let id = bus.subscribe::<PropertyChangeMessage>(move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });

    bus.trigger(PropertyChangeMessage::local("a", "b", Value::Null))?;
    assert!(bus.unsubscribe::<PropertyChangeMessage>(id));
    assert!(!bus.unsubscribe::<PropertyChangeMessage>(id));
    bus.trigger(PropertyChangeMessage::local("a", "b", Value::Null))?;

    assert_eq!(*seen.lock().unwrap(), 1);
    assert_eq!(bus.subscribers::<PropertyChangeMessage>(), 0);
    Ok(())
}

#[test]
fn test_bus_handlers_may_reenter() -> Result<()> {
    let bus = Arc::new(LocalBus::new());
    let inner = bus.clone();
    bus.subscribe::<PropertyChangeMessage>(move |msg| {
        if msg.member_id == "outer" {
            inner.subscribe::<MethodCallMessage>(|_| Ok(()));
            inner.trigger(MethodCallMessage::local("a", "nested", Vec::new()))?;
        }
        Ok(())
    });

    bus.trigger(PropertyChangeMessage::local("a", "outer", Value::Null))?;
    assert_eq!(bus.subscribers::<MethodCallMessage>(), 1);
    Ok(())
}

#[test]
fn test_bus_failure_reaches_caller_after_all_handlers() {
    let bus = LocalBus::new();
    bus.subscribe::<PropertyChangeMessage>(|_| Err(Error::Link("boom".into())));
    let later = record::<PropertyChangeMessage>(&bus);

    let result = bus.trigger(PropertyChangeMessage::local("a", "b", Value::Null));

    assert_eq!(result, Err(Error::Link("boom".into())));
    assert_eq!(later.lock().unwrap().len(), 1);
}

// ============================================================================
//  ECHO TABLE
// ============================================================================

#[test]
fn test_echo_consume_once() {
    let table = EchoTable::new();
    let token = table.arm("o", "m");

    assert_eq!(table.pending("o", "m"), 1);
    assert!(table.consume("o", "m"));
    assert!(!table.consume("o", "m"));
    assert!(!table.disarm(token));
    assert!(table.is_quiet());
}

#[test]
fn test_echo_counts_nested_arms() {
    let table = EchoTable::new();
    let a = table.arm("o", "m");
    let b = table.arm("o", "m");

    assert_eq!(table.pending("o", "m"), 2);
    assert!(table.consume("o", "m"));
    assert_eq!(table.pending("o", "m"), 1);
    assert!(table.consume("o", "m"));

    assert!(!table.disarm(a));
    assert!(!table.disarm(b));
    assert!(table.is_quiet());
}

#[test]
fn test_echo_disarm_withdraws_unconsumed() {
    let table = EchoTable::new();
    let token = table.arm("o", "m");

    assert!(table.disarm(token));
    assert!(!table.consume("o", "m"));
    assert!(table.is_quiet());
}

#[test]
fn test_echo_prefers_own_thread() {
    let table = Arc::new(EchoTable::new());
    let remote = {
        let table = table.clone();
        std::thread::spawn(move || table.arm("o", "m")).join().unwrap()
    };
    let mine = table.arm("o", "m");

    assert!(table.consume("o", "m"));
    // Our token went; the other thread's is still armed.
    assert!(!table.disarm(mine));
    assert!(table.disarm(remote));
    assert!(table.is_quiet());
}

#[test]
fn test_echo_ignores_other_threads_tokens() {
    let table = Arc::new(EchoTable::new());
    let remote = {
        let table = table.clone();
        std::thread::spawn(move || table.arm("o", "m")).join().unwrap()
    };

    // A write on this thread is a real change, not the other thread's echo.
    assert!(!table.consume("o", "m"));
    assert_eq!(table.pending("o", "m"), 1);
    assert!(table.disarm(remote));
    assert!(table.is_quiet());
}

// ============================================================================
//  INTERCEPTOR
// ============================================================================

#[test]
fn test_local_write_publishes_once() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;
    let seen = record::<PropertyChangeMessage>(f.bus.as_ref());

    f.gadget.set_int_value(5)?;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], PropertyChangeMessage::local("CoolGadget", "IntValue", Value::I32(5)));
    Ok(())
}

#[test]
fn test_remote_write_applies_without_echo() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;
    let seen = record::<PropertyChangeMessage>(f.bus.as_ref());

    f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "IntValue", Value::I32(42)))?;

    assert_eq!(f.gadget.int_value(), 42);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "only the inbound message, no republish");
    assert!(!seen[0].local);
    assert!(f.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_cached_mode_applies_the_same() -> Result<()> {
    let f = fixture(InterceptorConfig::new().apply_mode(ApplyMode::Cached))?;
    let seen = record::<PropertyChangeMessage>(f.bus.as_ref());

    f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "IntValue", Value::I32(7)))?;

    assert_eq!(f.gadget.int_value(), 7);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(f.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_local_flag_and_foreign_ids_are_ignored() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;

    f.bus.trigger(PropertyChangeMessage::local("CoolGadget", "IntValue", Value::I32(1)))?;
    f.bus.trigger(PropertyChangeMessage::remote("Gadget", "IntValue", Value::I32(2)))?;
    f.bus.trigger(PropertyChangeMessage::remote("Other", "IntValue", Value::I32(3)))?;

    assert_eq!(f.gadget.int_value(), 0);
    Ok(())
}

#[test]
fn test_unknown_property_is_surfaced() -> Result<()> {
    for mode in [ApplyMode::Dynamic, ApplyMode::Cached] {
        let f = fixture(InterceptorConfig::new().apply_mode(mode))?;

        let missing = f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "Nope", Value::I32(1)));
        let read_only = f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "ReadOnly", Value::I32(1)));

        assert_eq!(missing, Err(Error::UnknownProperty { object: "CoolGadget".into(), member: "Nope".into() }));
        assert!(matches!(read_only, Err(Error::UnknownProperty { .. })));
        assert!(f.interceptor.is_quiet());
    }
    Ok(())
}

#[test]
fn test_apply_without_echo_leaves_no_token() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;

    f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "Silent", Value::I32(9)))?;
    assert_eq!(*f.gadget.silent.lock().unwrap(), 9);
    assert_eq!(f.interceptor.pending_echoes("Silent"), 0);

    // The next genuine local write is not swallowed.
    let seen = record::<PropertyChangeMessage>(f.bus.as_ref());
    f.gadget.capability.write_value("CoolGadget", "Silent", Value::I32(10))?;
    assert_eq!(seen.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn test_ignored_property_is_never_applied() -> Result<()> {
    for mode in [ApplyMode::Dynamic, ApplyMode::Cached] {
        let f = fixture(InterceptorConfig::new().apply_mode(mode))?;

        let result = f.bus.trigger(PropertyChangeMessage::remote("CoolGadget", "Hidden", Value::I32(4)));

        assert_eq!(result, Err(Error::UnknownProperty { object: "CoolGadget".into(), member: "Hidden".into() }));
        assert!(f.interceptor.is_quiet());
    }
    Ok(())
}

#[test]
fn test_call_publishes_under_alias() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;
    let seen = record::<MethodCallMessage>(f.bus.as_ref());

    f.gadget.do_stuff("x")?;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method_alias, "StuffAlias");
    assert_eq!(seen[0].arguments, vec![Value::Str("x".into())]);
    Ok(())
}

#[test]
fn test_remote_call_resolves_by_alias_only() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;
    let seen = record::<MethodCallMessage>(f.bus.as_ref());

    f.bus.trigger(MethodCallMessage::remote("CoolGadget", "DoStuff", vec![Value::Str("bare".into())]))?;
    f.bus.trigger(MethodCallMessage::remote("CoolGadget", "Plain", Vec::new()))?;
    assert!(f.gadget.calls().is_empty());

    f.bus.trigger(MethodCallMessage::remote("CoolGadget", "StuffAlias", vec![Value::Str("y".into())]))?;
    f.bus.trigger(MethodCallMessage::remote("CoolGadget", "Ping", Vec::new()))?;

    assert_eq!(f.gadget.calls(), vec!["DoStuff(y)".to_string(), "Ping".to_string()]);
    assert_eq!(seen.lock().unwrap().iter().filter(|m| m.local).count(), 0);
    assert!(f.interceptor.is_quiet());
    Ok(())
}

#[test]
fn test_remote_call_with_wrong_arity_arms_nothing() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;

    let none = f.bus.trigger(MethodCallMessage::remote("CoolGadget", "StuffAlias", Vec::new()));
    let extra = f.bus.trigger(MethodCallMessage::remote("CoolGadget", "Ping", vec![Value::I32(1)]));

    assert!(matches!(none, Err(Error::ArgumentMismatch { ref operation, .. }) if operation == "StuffAlias"));
    assert!(matches!(extra, Err(Error::ArgumentMismatch { .. })));
    assert!(f.gadget.calls().is_empty());
    assert!(f.interceptor.is_quiet());

    // A later genuine local call still publishes.
    let seen = record::<MethodCallMessage>(f.bus.as_ref());
    f.gadget.ping()?;
    assert_eq!(seen.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn test_duplicate_alias_is_rejected() {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let gadget: Arc<dyn Replicated> = Arc::new(Gadget::with_methods(vec![
        method("A", Some(Some("Same")), 0),
        method("Same", Some(None), 0),
    ]));

    let result = DefaultInterceptor::new(bus, &gadget);

    assert!(matches!(result, Err(Error::DuplicateAlias { ref alias, .. }) if alias == "Same"));
}

#[test]
fn test_drop_unsubscribes() -> Result<()> {
    let f = fixture(InterceptorConfig::new())?;
    assert_eq!(f.local.subscribers::<PropertyChangeMessage>(), 1);
    assert_eq!(f.local.subscribers::<MethodCallMessage>(), 1);

    f.gadget.capability.set(None);
    drop(f.interceptor);

    assert_eq!(f.local.subscribers::<PropertyChangeMessage>(), 0);
    assert_eq!(f.local.subscribers::<MethodCallMessage>(), 0);
    Ok(())
}

#[test]
fn test_no_capability_is_transparent() -> Result<()> {
    let gadget = Gadget::new();
    gadget.set_int_value(3)?;
    gadget.do_stuff("z")?;
    assert_eq!(gadget.int_value(), 3);
    assert_eq!(gadget.calls(), vec!["DoStuff(z)".to_string()]);
    Ok(())
}

// ============================================================================
//  COLLECTIONS
// ============================================================================

fn commands(bus: &dyn Bus) -> Arc<Mutex<Vec<MemberCommandMessage>>> {
    record::<MemberCommandMessage>(bus)
}

#[test]
fn test_list_publishes_then_mutates() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let seen = commands(bus.as_ref());
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.set_bus(Some(bus.clone()));
    list.activate()?;

    list.add(1)?;
    list.add(3)?;
    list.insert(1, 2)?;
    list.set(0, 10)?;
    list.remove_at(2)?;

    assert_eq!(list.to_vec(), vec![10, 2]);
    let ops: Vec<String> = seen.lock().unwrap().iter().map(|m| m.operation.clone()).collect();
    assert_eq!(ops, vec!["Add", "Add", "Insert", "[]", "RemoveAt"]);
    Ok(())
}

#[test]
fn test_list_replay_does_not_republish() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let seen = commands(bus.as_ref());
    let mut list = SyncList::<String>::new("Obj", "Names");
    list.set_bus(Some(bus.clone()));
    list.activate()?;

    let cmd = MemberCommandMessage::local("Obj", "Names", ops::ADD, vec![Value::Str("a".into())]);
    bus.trigger(cmd.clone().into_remote())?;
    // Local-flagged and foreign-member commands are ignored.
    bus.trigger(cmd.clone())?;
    bus.trigger(MemberCommandMessage::local("Obj", "Other", ops::ADD, vec![Value::Str("b".into())]).into_remote())?;

    assert_eq!(list.to_vec(), vec!["a".to_string()]);
    assert_eq!(seen.lock().unwrap().len(), 3);
    Ok(())
}

#[test]
fn test_list_precondition_failure_publishes_nothing() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let seen = commands(bus.as_ref());
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.set_bus(Some(bus.clone()));

    assert_eq!(list.remove_at(0), Err(Error::IndexOutOfRange { index: 0, len: 0 }));
    assert_eq!(list.insert(1, 5), Err(Error::IndexOutOfRange { index: 1, len: 0 }));
    assert!(seen.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_unknown_operation_is_fatal() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.set_bus(Some(bus.clone()));
    list.activate()?;

    let result = bus.trigger(MemberCommandMessage::local("Obj", "Items", "Explode", Vec::new()).into_remote());

    assert_eq!(
        result,
        Err(Error::InvalidOperation { object: "Obj".into(), member: "Items".into(), operation: "Explode".into() })
    );
    Ok(())
}

#[test]
fn test_argument_mismatch_is_reported() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.set_bus(Some(bus.clone()));
    list.activate()?;

    let result = bus.trigger(
        MemberCommandMessage::local("Obj", "Items", ops::ADD, vec![Value::Str("nope".into())]).into_remote(),
    );

    assert!(matches!(result, Err(Error::ArgumentMismatch { .. })));
    assert!(list.is_empty());
    Ok(())
}

#[test]
fn test_activation_requires_bus() {
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.deactivate();
    assert_eq!(list.activate(), Err(Error::NoBus { object: "Obj".into(), member: "Items".into() }));
    assert!(!list.is_active());
}

#[test]
fn test_dictionary_dual_path() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let seen = commands(bus.as_ref());
    let mut dict = SyncDictionary::<String, i32>::new("Obj", "Scores");
    dict.set_bus(Some(bus.clone()));
    dict.activate()?;

    dict.add("a".into(), 1)?;
    dict.add_item(("b".into(), 2))?;
    dict.set("a".into(), 5)?;
    assert!(!dict.remove_item(&("b".into(), 3))?);
    assert!(dict.remove_item(&("b".into(), 2))?);
    assert_eq!(dict.add("a".into(), 9), Err(Error::DuplicateKey("\"a\"".into())));

    let ops: Vec<String> = seen.lock().unwrap().iter().map(|m| m.operation.clone()).collect();
    assert_eq!(ops, vec!["Add", "AddItem", "[]", "RemoveItem", "RemoveItem"]);

    bus.trigger(
        MemberCommandMessage::local("Obj", "Scores", ops::ADD_ITEM, vec![Value::pair(Value::Str("c".into()), Value::I32(3))])
            .into_remote(),
    )?;
    bus.trigger(MemberCommandMessage::local("Obj", "Scores", ops::REMOVE, vec![Value::Str("a".into())]).into_remote())?;

    assert_eq!(dict.keys(), vec!["c".to_string()]);
    assert_eq!(dict.get(&"c".to_string()), Some(3));
    assert_eq!(seen.lock().unwrap().len(), 7);
    Ok(())
}

#[test]
fn test_set_rejects_bulk_operations() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let seen = commands(bus.as_ref());
    let mut set = SyncSet::<i32>::new("Obj", "Tags");
    set.set_bus(Some(bus.clone()));
    set.activate()?;
    set.add(1)?;
    set.add_item(2)?;

    assert_eq!(set.union_with(vec![3]), Err(Error::NotSupported { operation: "UnionWith" }));
    assert_eq!(set.except_with(vec![1]), Err(Error::NotSupported { operation: "ExceptWith" }));
    assert_eq!(set.intersect_with(vec![1]), Err(Error::NotSupported { operation: "IntersectWith" }));
    assert_eq!(set.symmetric_except_with(vec![1]), Err(Error::NotSupported { operation: "SymmetricExceptWith" }));

    assert!(set.set_equals(&HashSet::from([1, 2])));
    let ops: Vec<String> = seen.lock().unwrap().iter().map(|m| m.operation.clone()).collect();
    assert_eq!(ops, vec!["Add", "Add2"]);
    Ok(())
}

#[test]
fn test_set_replays_both_adds() -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let mut set = SyncSet::<String>::new("Obj", "Tags");
    set.set_bus(Some(bus.clone()));
    set.activate()?;

    bus.trigger(MemberCommandMessage::local("Obj", "Tags", ops::ADD, vec![Value::Str("x".into())]).into_remote())?;
    bus.trigger(MemberCommandMessage::local("Obj", "Tags", ops::ADD_UNIT, vec![Value::Str("y".into())]).into_remote())?;

    assert!(set.contains(&"x".to_string()));
    assert!(set.contains(&"y".to_string()));
    assert!(set.is_superset(&HashSet::from(["x".to_string()])));
    Ok(())
}

#[test]
fn test_collection_drop_unsubscribes() -> Result<()> {
    let local = Arc::new(LocalBus::new());
    let bus: Arc<dyn Bus> = local.clone();
    let mut list = SyncList::<i32>::new("Obj", "Items");
    list.set_bus(Some(bus));
    list.activate()?;
    assert_eq!(local.subscribers::<MemberCommandMessage>(), 1);

    drop(list);
    assert_eq!(local.subscribers::<MemberCommandMessage>(), 0);
    Ok(())
}

// ============================================================================
//  RELAY
// ============================================================================

#[tokio::test]
async fn test_relay_forwards_local_messages_as_remote() -> Result<()> {
    let near: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let far: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let (a, b) = DuplexLink::pair();
    let _near_relay = Relay::spawn(near.clone(), Arc::new(a));
    let _far_relay = Relay::spawn(far.clone(), Arc::new(b));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    far.subscribe::<PropertyChangeMessage>(move |msg| {
        let _ = tx.send(msg.clone());
        Ok(())
    });

    near.trigger(PropertyChangeMessage::local("O", "P", Value::I32(1)))?;
    // Remote messages on the near side are never forwarded.
    near.trigger(PropertyChangeMessage::remote("O", "P", Value::I32(2)))?;

    let got = rx.recv().await.ok_or(Error::Link("closed".into()))?;
    assert_eq!(got, PropertyChangeMessage::remote("O", "P", Value::I32(1)));
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_relay_delivers_every_message_kind() -> Result<()> {
    let near: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let far: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let (a, b) = DuplexLink::pair();
    let _near_relay = Relay::spawn(near.clone(), Arc::new(a));
    let _far_relay = Relay::spawn(far.clone(), Arc::new(b));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(String, bool)>();
    let calls = tx.clone();
    far.subscribe::<MethodCallMessage>(move |msg| {
        let _ = calls.send((msg.object_id().to_string(), msg.is_local()));
        Ok(())
    });
    far.subscribe::<MemberCommandMessage>(move |msg| {
        let _ = tx.send((msg.object_id().to_string(), msg.is_local()));
        Ok(())
    });

    near.trigger(MethodCallMessage::local("Caller", "Ping", Vec::new()))?;
    near.trigger(MemberCommandMessage::local("Holder", "Items", ops::CLEAR, Vec::new()))?;

    let first = rx.recv().await.ok_or(Error::Link("closed".into()))?;
    let second = rx.recv().await.ok_or(Error::Link("closed".into()))?;
    assert_eq!(first, ("Caller".to_string(), false));
    assert_eq!(second, ("Holder".to_string(), false));
    Ok(())
}
