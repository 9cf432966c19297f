#![allow(dead_code)]
#[macro_use]
mod errors;
mod repl;
mod storage;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "bplustore", version = VERSION, about = "Single-file B+tree row store with a tiny shell.")]
struct Cli {
    /// Path to the database file; created if it doesn't exist.
    #[arg(default_value = "bplustore.db")]
    database: PathBuf,

    /// The server host address to bind to, inherited for parity; not supported.
    #[arg(long, env = "BPLUSTORE_HOST", default_value = "0.0.0.0")]
    host: Option<String>,
    /// The server port number to listen on, inherited for parity; not supported.
    #[arg(long, env = "BPLUSTORE_PORT", default_value = "4012")]
    port: Option<u16>,
    /// Start as a standalone server process; not supported.
    #[arg(long, short, env = "BPLUSTORE_SERVER", default_value = "false")]
    server: bool,
}

fn main() {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("bplustore.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.server {
        println!("Server mode is not supported yet.");
        return;
    }

    match repl::console::start(&cli.database) {
        Ok(()) => (),
        Err(errors::Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => (),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
