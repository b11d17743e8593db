//! Woven members driven through the interpreter.

mod common;

use std::sync::Arc;

use anyhow::Result;
use netsync::Value;
use netvm::Error;
use netvm::Host;
use rand::Rng;

use common::*;

fn host() -> Result<Host> {
    let (module, _) = woven_module()?;
    Ok(Host::new(module))
}

fn attached(host: &Host, ty: &str) -> Result<(Arc<netvm::Instance>, Arc<Recorder>)> {
    let instance = host.instantiate(ty)?;
    let recorder = Arc::new(Recorder::default());
    instance.attach(recorder.clone())?;
    Ok((instance, recorder))
}

// ============================================================================
//  TRANSPARENCY
// ============================================================================

#[test]
fn test_without_capability_behaves_like_the_original() -> Result<()> {
    let woven = Host::new(woven_module()?.0);
    let plain = Host::new(game_module());
    let a = woven.instantiate(OBJECT)?;
    let b = plain.instantiate(OBJECT)?;

    for object in [&a, &b] {
        object.set("IntValue", Value::I32(5))?;
        object.set("TrickyProperty", Value::I32(3))?;
        object.call("DoStuffWithOneParam", &[Value::I32(12)])?;
    }
    assert_eq!(a.get("IntValue")?, b.get("IntValue")?);
    assert_eq!(a.field("trick")?, b.field("trick")?);
    assert_eq!(a.field("back")?, Value::Str("int12".into()));
    assert_eq!(a.call("Add", &[Value::I32(2), Value::I32(3)])?, Value::I32(5));
    Ok(())
}

#[test]
fn test_random_values_round_trip_unattached() -> Result<()> {
    let host = host()?;
    let object = host.instantiate(OBJECT)?;
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let n: i32 = rng.r#gen();
        object.set("IntValue", Value::I32(n))?;
        assert_eq!(object.get("IntValue")?, Value::I32(n));

        let (a, b) = (rng.gen_range(-1000..1000), rng.gen_range(-1000..1000));
        assert_eq!(object.call("Add", &[Value::I32(a), Value::I32(b)])?, Value::I32(a + b));
    }
    Ok(())
}

// ============================================================================
//  INTERCEPTION
// ============================================================================

#[test]
fn test_setter_reports_then_stores() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, OBJECT)?;

    object.set("IntValue", Value::I32(7))?;
    object.set("Label", Value::Str("hello".into()))?;

    assert_eq!(object.get("IntValue")?, Value::I32(7));
    assert_eq!(
        recorder.events(),
        vec![
            Event::Write("TestNetSyncObject".into(), "IntValue".into(), Value::I32(7)),
            Event::Write("TestNetSyncObject".into(), "Label".into(), Value::Str("hello".into())),
        ]
    );
    Ok(())
}

#[test]
fn test_tricky_setter_keeps_its_branches() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, OBJECT)?;

    object.set("TrickyProperty", Value::I32(2))?;
    assert_eq!(object.field("trick")?, Value::I32(2));
    object.set("TrickyProperty", Value::I32(3))?;
    assert_eq!(object.field("trick")?, Value::I32(6));

    let reported: Vec<Event> = recorder.events();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[1], Event::Write("TestNetSyncObject".into(), "TrickyProperty".into(), Value::I32(3)));
    Ok(())
}

#[test]
fn test_ignored_and_capability_setters_are_silent() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, OBJECT)?;

    object.set("IgnoreMeProperty", Value::Str("quiet".into()))?;
    assert_eq!(object.get("IgnoreMeProperty")?, Value::Str("quiet".into()));
    object.detach()?;
    object.set("IntValue", Value::I32(1))?;

    assert!(recorder.events().is_empty());
    assert!(object.set("GetterOnlyProperty", Value::Null).is_err());
    Ok(())
}

#[test]
fn test_methods_report_alias_and_arguments() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, OBJECT)?;

    object.call("DoStuff", &[])?;
    object.call("DoStuffWithOneParam", &[Value::I32(4)])?;
    let sum = object.call("Add", &[Value::I32(20), Value::I32(22)])?;
    object.call("Helper", &[])?;

    assert_eq!(sum, Value::I32(42));
    assert_eq!(object.field("back")?, Value::Str("int4".into()));
    assert_eq!(
        recorder.events(),
        vec![
            Event::Call("TestNetSyncObject".into(), "DoStuff".into(), Vec::new()),
            Event::Call("TestNetSyncObject".into(), "StuffWithInt".into(), vec![Value::I32(4)]),
            Event::Call("TestNetSyncObject".into(), "Add".into(), vec![Value::I32(20), Value::I32(22)]),
        ]
    );
    Ok(())
}

#[test]
fn test_switch_body_survives_weaving() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, OBJECT)?;

    for (mode, expected) in [(0, "ab"), (1, "abab"), (7, "other")] {
        object.call("DoComplexStuff", &[Value::I32(mode), Value::Str("ab".into())])?;
        assert_eq!(object.field("back")?, Value::Str(expected.into()));
    }
    assert_eq!(
        recorder.events()[1],
        Event::Call("TestNetSyncObject".into(), "DoComplexStuff".into(), vec![Value::I32(1), Value::Str("ab".into())])
    );
    Ok(())
}

#[test]
fn test_class_alias_names_the_object() -> Result<()> {
    let host = host()?;
    let (object, recorder) = attached(&host, RENAMED)?;

    object.set("Score", Value::I32(3))?;
    assert_eq!(recorder.events(), vec![Event::Write("CoolObject".into(), "Score".into(), Value::I32(3))]);
    Ok(())
}

#[test]
fn test_capability_failure_aborts_the_member() -> Result<()> {
    let host = host()?;
    let object = host.instantiate(OBJECT)?;
    object.attach(Arc::new(Recorder::failing()))?;

    let err = object.set("IntValue", Value::I32(9)).expect_err("capability refused");
    assert!(matches!(err, Error::Interceptor(netsync::Error::Link(_))));
    assert_eq!(object.get("IntValue")?, Value::I32(0));

    assert!(object.call("DoStuff", &[]).is_err());
    assert_eq!(object.field("back")?, Value::Null);
    Ok(())
}

#[test]
fn test_module_survives_the_image_round_trip() -> Result<()> {
    let (module, _) = woven_module()?;
    let path = std::env::temp_dir().join(format!("netvm-woven-{}.nsym", std::process::id()));
    netweave::image::write_file(&path, &module)?;
    let host = Host::load(&path);
    let _ = std::fs::remove_file(&path);
    let host = host?;

    let object = host.instantiate(OBJECT)?;
    let recorder = Arc::new(Recorder::default());
    object.attach(recorder.clone())?;
    object.set("TrickyProperty", Value::I32(5))?;

    assert_eq!(object.field("trick")?, Value::I32(10));
    assert_eq!(recorder.events().len(), 1);
    Ok(())
}
