//! Thin CLI shell over [`wasmc::compile_file`].

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use wasmc_common::options::CompileOptions;

/// Compile a source file to a WebAssembly module.
#[derive(Parser, Debug)]
#[command(name = "wasmc", version, about = "Compiles a restricted JavaScript-family surface language to WebAssembly")]
struct Args {
    /// Input source file.
    input: PathBuf,

    /// Pointer-sized integer width targeted by the compilation (4 or 8).
    #[arg(long = "uintptr-size", default_value_t = 4)]
    uintptr_size: u32,

    /// Skip allocator integration and declare the module's own memory.
    #[arg(long)]
    no_lib: bool,

    /// Suppress diagnostic output on stderr.
    #[arg(long)]
    silent: bool,

    /// Output `.wasm` path. Defaults to the input path with its extension
    /// replaced by `.wasm`.
    #[arg(short, long = "out", alias = "o")]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    let options = match CompileOptions::builder().uintptr_size(args.uintptr_size).no_lib(args.no_lib).silent(args.silent).build() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}: {err}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };

    match run(&args, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err:#}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, options: CompileOptions) -> anyhow::Result<()> {
    let module = wasmc::compile_file(&args.input, options).map_err(|()| anyhow::anyhow!("compilation failed"))?;

    let out_path = args.out.clone().unwrap_or_else(|| args.input.with_extension("wasm"));
    let mut module = module;
    let bytes = module.emit_wasm();
    std::fs::write(&out_path, bytes).with_context(|| format!("writing {}", out_path.display()))?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry().with(filter).with(tracing_tree::HierarchicalLayer::new(2)).try_init();
}
