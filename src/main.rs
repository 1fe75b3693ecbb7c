use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as Cli;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use undefer::emit::emit_string;
use undefer::parser::Parser;
use undefer::resolve::resolve;

/// Lower defer-extended C to plain C.
#[derive(Debug, Cli)]
#[command(name = "undefer", version, about)]
struct Args {
    /// Input C file.
    input: PathBuf,

    /// Output file; standard output when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the parsed item tree instead of C.
    #[arg(long)]
    tree: bool,

    /// Print back without lowering `defer` statements.
    #[arg(long)]
    no_resolve: bool,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: {count} error(s)")]
    Invalid { path: String, count: usize },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match run(&Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("undefer: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), DriverError> {
    let path = args.input.display().to_string();
    let source = fs::read_to_string(&args.input).map_err(|source| DriverError::Read {
        path: path.clone(),
        source,
    })?;

    let mut p = Parser::new(source);
    p.parse();
    if !p.has_fatal() && !args.no_resolve {
        resolve(&mut p);
    }
    for err in &p.errors {
        eprintln!("{}", p.render_error(err));
    }
    if p.has_fatal() {
        return Err(DriverError::Invalid {
            path,
            count: p.errors.len(),
        });
    }

    let out = if args.tree {
        p.dump_tree()
    } else {
        emit_string(&p, &path)
    };
    match &args.output {
        Some(dest) => fs::write(dest, out).map_err(|source| DriverError::Write {
            path: dest.display().to_string(),
            source,
        })?,
        None => print!("{}", out),
    }
    Ok(())
}
