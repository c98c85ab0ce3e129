use std::path::PathBuf;

use host::{Console, dump};
use vm::{State, Vm};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

/// Kiln program runner
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Program image to load and execute
    image: PathBuf,

    /// Stop after executing this many instructions
    #[clap(long)]
    max_steps: Option<usize>,

    /// Print the stack and registers after execution
    #[clap(long)]
    dump: bool,

    /// Log every instruction as it executes
    #[clap(long)]
    trace: bool,
}

fn print_dumps(vm: &Vm) {
    print!("{}", dump::stack(vm));
    print!("{}", dump::registers(vm));
}

fn main() -> Result<()> {
    let args = Args::parse();

    let env = env_logger::Env::default()
        .filter_or("KILN_LOG", if args.trace { "trace" } else { "info" })
        .write_style_or("KILN_LOG", "always");
    env_logger::init_from_env(env);

    let prog = host::load(&args.image)
        .with_context(|| format!("failed to load {:?}", args.image))?;

    let mut vm = Vm::new(prog);
    let mut console = Console::new();

    let start = std::time::Instant::now();
    let limit = args.max_steps.unwrap_or(usize::MAX);
    let r = vm.run_until(&mut console, |_vm, _console, i| i >= limit);
    info!("execution finished in {:?}", start.elapsed());

    console.output().print().context("failed to write output")?;
    if args.dump || r.is_err() {
        print_dumps(&vm);
    }

    match r? {
        Some(State::Halted) => Ok(()),
        Some(state) => {
            info!("program ended without HLT ({state:?})");
            Ok(())
        }
        None => {
            warn!("step limit reached at ip {}", vm.ip());
            anyhow::bail!("program did not finish within {limit} steps")
        }
    }
}
