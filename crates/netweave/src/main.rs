use std::path::PathBuf;
use std::process::ExitCode;

use netweave::Outcome;
use netweave::WeaveConfig;
use netweave::Weaver;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: netweave <target> <include-dir> [verbose]

  target       module image to weave in place
  include-dir  directory searched for referenced modules
  verbose      'true' to log every injected member";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(target), Some(include_dir)) = (args.first(), args.get(1)) else {
        eprintln!("NETSYNCERR : netweave missing arguments!");
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };
    let verbose = args.get(2).is_some_and(|v| v.eq_ignore_ascii_case("true"));
    init_tracing(verbose);

    match run(PathBuf::from(target), PathBuf::from(include_dir)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}(0) : error NETSYNCEX : {}", target, e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(target: PathBuf, include_dir: PathBuf) -> anyhow::Result<()> {
    let mut config = WeaveConfig::new();
    if let Ok(exe) = std::env::current_exe() {
        config = config.self_location(exe);
    }
    match Weaver::new(config).weave_file(&target, &include_dir)? {
        Outcome::Refused(path) => info!(path = %path.display(), "skipped"),
        Outcome::Unchanged => info!(path = %target.display(), "nothing to weave"),
        Outcome::Woven(report) => {
            for ty in &report.types {
                info!(
                    ty = %ty.type_name,
                    network_name = %ty.network_name,
                    properties = ty.properties.len(),
                    methods = ty.methods.len(),
                    "woven"
                );
            }
        }
    }
    Ok(())
}
