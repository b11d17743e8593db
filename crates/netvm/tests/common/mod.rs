#![allow(dead_code)]

use std::sync::Mutex;

use netsync::NetworkInterceptor;
use netsync::Value;
use netweave::Capability;
use netweave::MethodBuilder;
use netweave::ModuleBuilder;
use netweave::ModuleDef;
use netweave::PropertyBuilder;
use netweave::TypeBuilder;
use netweave::WeaveConfig;
use netweave::WeaveReport;
use netweave::Weaver;
use netweave::builder::field_ref;
use netweave::il::InstrId;
use netweave::il::OpCode;
use netweave::il::TypeRef;
use netweave::module::MethodBody;

pub const OBJECT: &str = "Game.TestNetSyncObject";
pub const RENAMED: &str = "Game.Renamed";

/// Stores `value` when even, `value * 2` otherwise.
fn tricky_setter() -> MethodBody {
    let trick = field_ref(OBJECT, "trick", TypeRef::I32);
    MethodBody::from_ops(
        Vec::new(),
        vec![
            OpCode::LdArg(0),
            OpCode::LdArg(1),
            OpCode::LdcI4(2),
            OpCode::Rem,
            OpCode::BrTrue(InstrId(8)),
            OpCode::LdArg(1),
            OpCode::StFld(trick.clone()),
            OpCode::Ret,
            OpCode::LdArg(1),
            OpCode::LdcI4(2),
            OpCode::Mul,
            OpCode::StFld(trick),
            OpCode::Ret,
        ],
    )
}

/// `mode` 0 stores `text`, 1 stores it twice, anything else stores "other".
fn complex_stuff() -> MethodBuilder {
    let back = field_ref(OBJECT, "back", TypeRef::String);
    MethodBuilder::new("DoComplexStuff").sync().param("mode", TypeRef::I32).param("text", TypeRef::String).body(
        Vec::new(),
        vec![
            OpCode::LdArg(1),
            OpCode::Switch(vec![InstrId(3), InstrId(7)]),
            OpCode::Br(InstrId(13)),
            OpCode::LdArg(0),
            OpCode::LdArg(2),
            OpCode::StFld(back.clone()),
            OpCode::Ret,
            OpCode::LdArg(0),
            OpCode::LdArg(2),
            OpCode::LdArg(2),
            OpCode::Concat,
            OpCode::StFld(back.clone()),
            OpCode::Ret,
            OpCode::LdArg(0),
            OpCode::LdStr("other".into()),
            OpCode::StFld(back),
            OpCode::Ret,
        ],
    )
}

fn test_object() -> TypeBuilder {
    let back = field_ref(OBJECT, "back", TypeRef::String);
    TypeBuilder::class("Game", "TestNetSyncObject")
        .capability_property("NetSyncInterceptor")
        .auto_property("IntValue", TypeRef::I32)
        .auto_property("Label", TypeRef::String)
        .property(PropertyBuilder::auto("IgnoreMeProperty", TypeRef::String).ignore())
        .property(PropertyBuilder::auto("GetterOnlyProperty", TypeRef::String).read_only())
        .field("trick", TypeRef::I32)
        .field("back", TypeRef::String)
        .property(PropertyBuilder::auto("TrickyProperty", TypeRef::I32).setter(tricky_setter()))
        .method(MethodBuilder::new("DoStuff").sync().body(
            Vec::new(),
            vec![OpCode::LdArg(0), OpCode::LdStr("nope".into()), OpCode::StFld(back.clone()), OpCode::Ret],
        ))
        .method(MethodBuilder::new("DoStuffWithOneParam").sync_as("StuffWithInt").param("intParam", TypeRef::I32).body(
            Vec::new(),
            vec![
                OpCode::LdArg(0),
                OpCode::LdStr("int".into()),
                OpCode::LdArg(1),
                OpCode::ToStr,
                OpCode::Concat,
                OpCode::StFld(back),
                OpCode::Ret,
            ],
        ))
        .method(complex_stuff())
        .method(
            MethodBuilder::new("Add")
                .sync()
                .param("a", TypeRef::I32)
                .param("b", TypeRef::I32)
                .returns(TypeRef::I32)
                .body(Vec::new(), vec![OpCode::LdArg(1), OpCode::LdArg(2), OpCode::Add, OpCode::Ret]),
        )
        .method(MethodBuilder::new("Helper").body(Vec::new(), vec![OpCode::Ret]))
}

fn renamed() -> TypeBuilder {
    TypeBuilder::class("Game", "Renamed").sync_as("CoolObject").capability_property("Net").auto_property("Score", TypeRef::I32)
}

/// The unwoven game module.
pub fn game_module() -> ModuleDef {
    ModuleBuilder::new("Game").add_type(test_object()).add_type(renamed()).build()
}

/// The game module after weaving with the default configuration.
pub fn woven_module() -> netweave::Result<(ModuleDef, WeaveReport)> {
    let mut module = game_module();
    let config = WeaveConfig::default();
    let capability = Capability::builtin(&config);
    let report = Weaver::new(config).weave_module(&mut module, &capability)?;
    Ok((module, report))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Write(String, String, Value),
    Call(String, String, Vec<Value>),
}

/// A capability that records what it is told, optionally failing.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
    pub fail: bool,
}

impl Recorder {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: Event) -> netsync::Result<()> {
        if self.fail {
            return Err(netsync::Error::Link("recorder refused".into()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl NetworkInterceptor for Recorder {
    fn write_value(&self, object: &str, member: &str, value: Value) -> netsync::Result<()> {
        self.record(Event::Write(object.into(), member.into(), value))
    }

    fn call_function(&self, object: &str, alias: &str, arguments: Vec<Value>) -> netsync::Result<()> {
        self.record(Event::Call(object.into(), alias.into(), arguments))
    }
}
