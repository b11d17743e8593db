use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use anyhow::Result;
use netweave::Capability;
use netweave::Error;
use netweave::ModuleBuilder;
use netweave::ModuleResolver;
use netweave::Outcome;
use netweave::TypeBuilder;
use netweave::WeaveConfig;
use netweave::Weaver;
use netweave::il::TypeRef;
use netweave::image;

static NEXT: AtomicU32 = AtomicU32::new(0);

/// Fresh directory under the system temp dir, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Result<Self> {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("netweave-{}-{}", std::process::id(), n));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn path(&self, file: &str) -> PathBuf {
        self.0.join(file)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn game_module() -> netweave::ModuleDef {
    ModuleBuilder::new("Game")
        .add_type(
            TypeBuilder::class("Game", "Player")
                .capability_property("NetSyncInterceptor")
                .auto_property("Health", TypeRef::I32),
        )
        .build()
}

#[test]
fn test_weave_file_rewrites_in_place() -> Result<()> {
    let dir = Scratch::new()?;
    let target = dir.path("Game.nsym");
    image::write_file(&target, &game_module())?;

    let report = match Weaver::new(WeaveConfig::default()).weave_file(&target, &dir.0)? {
        Outcome::Woven(report) => report,
        other => anyhow::bail!("expected the module to be woven, got {:?}", other),
    };
    assert_eq!(report.types[0].properties, vec!["Health".to_string()]);

    let reread = image::read_file(&target)?;
    assert!(reread.references.contains(&"NetSync".to_string()));
    let player = reread.find_type("Game.Player").expect("type");
    let setter = &player.methods[player.method_index("set_Health").expect("setter")];
    assert!(setter.body.as_ref().expect("body").instructions.len() > 4);
    Ok(())
}

#[test]
fn test_weave_file_without_candidates_leaves_file_alone() -> Result<()> {
    let dir = Scratch::new()?;
    let target = dir.path("Plain.nsym");
    let module = ModuleBuilder::new("Plain").add_type(TypeBuilder::class("Plain", "Thing").auto_property("X", TypeRef::I32)).build();
    image::write_file(&target, &module)?;
    let before = std::fs::read(&target)?;

    assert_eq!(Weaver::new(WeaveConfig::default()).weave_file(&target, &dir.0)?, Outcome::Unchanged);
    assert_eq!(std::fs::read(&target)?, before);
    Ok(())
}

#[test]
fn test_refuses_capability_module() -> Result<()> {
    let dir = Scratch::new()?;
    let config = WeaveConfig::default();
    let capability = Capability::builtin(&config);
    let target = dir.path("NetSync.nsym");
    image::write_file(&target, &capability.module(&config))?;
    let before = std::fs::read(&target)?;

    let outcome = Weaver::new(config).weave_file(&target, &dir.0)?;
    assert!(matches!(outcome, Outcome::Refused(_)));
    assert_eq!(std::fs::read(&target)?, before);
    Ok(())
}

#[test]
fn test_refuses_self_location() -> Result<()> {
    let dir = Scratch::new()?;
    let target = dir.path("Game.nsym");
    image::write_file(&target, &game_module())?;
    let before = std::fs::read(&target)?;

    let config = WeaveConfig::new().self_location(&target);
    assert!(matches!(Weaver::new(config).weave_file(&target, &dir.0)?, Outcome::Refused(_)));
    assert_eq!(std::fs::read(&target)?, before);
    Ok(())
}

#[test]
fn test_mismatched_capability_on_search_path_is_fatal() -> Result<()> {
    let dir = Scratch::new()?;
    let config = WeaveConfig::default();
    let mut capability_module = Capability::builtin(&config).module(&config);
    capability_module.types[0].methods.pop();
    image::write_file(&dir.path("NetSync.nsym"), &capability_module)?;

    let target = dir.path("Game.nsym");
    image::write_file(&target, &game_module())?;
    let before = std::fs::read(&target)?;

    let err = Weaver::new(config).weave_file(&target, &dir.0).expect_err("mismatch");
    assert!(matches!(err, Error::CapabilityMismatch(_)));
    assert_eq!(std::fs::read(&target)?, before);
    Ok(())
}

#[test]
fn test_failed_weave_leaves_file_alone() -> Result<()> {
    let dir = Scratch::new()?;
    let target = dir.path("Twice.nsym");
    let module = ModuleBuilder::new("Twice")
        .add_type(TypeBuilder::class("Twice", "T").capability_property("A").capability_property("B"))
        .build();
    image::write_file(&target, &module)?;
    let before = std::fs::read(&target)?;

    assert!(Weaver::new(WeaveConfig::default()).weave_file(&target, &dir.0).is_err());
    assert_eq!(std::fs::read(&target)?, before);
    Ok(())
}

#[test]
fn test_resolver_first_directory_wins_and_caches() -> Result<()> {
    let first = Scratch::new()?;
    let second = Scratch::new()?;
    image::write_file(&first.path("Game.nsym"), &game_module())?;
    image::write_file(&second.path("Game.nsym"), &ModuleBuilder::new("Other").build())?;

    let mut resolver = ModuleResolver::new();
    resolver.add_search_dir(&first.0);
    resolver.add_search_dir(&second.0);
    assert_eq!(resolver.locate("Game"), Some(first.path("Game.nsym")));
    assert_eq!(resolver.locate("Missing"), None);

    let (_, module) = resolver.resolve("Game")?.expect("found");
    assert_eq!(module.name, "Game");
    assert!(resolver.is_cached("Game"));
    assert!(resolver.resolve("Missing")?.is_none());
    Ok(())
}

#[test]
fn test_missing_target_is_io_error() {
    let dir = Scratch::new().expect("scratch");
    let err = Weaver::new(WeaveConfig::default()).weave_file(&dir.path("absent.nsym"), &dir.0).expect_err("missing");
    assert!(matches!(err, Error::Io { .. }));
}
