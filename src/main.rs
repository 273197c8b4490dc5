use std::path::PathBuf;

use clap::Parser;

mod server;

/// GDB remote stub bridging a debugger to an m68k target.
#[derive(Debug, Parser)]
#[command(name = "rspbridge", version, about)]
pub(crate) struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Address to listen on, overriding `server.listen`.
    #[arg(short, long)]
    pub(crate) listen: Option<String>,

    /// Flat binary image to serve, overriding `target.image`.
    #[arg(short, long)]
    pub(crate) image: Option<PathBuf>,

    /// Exit after the first debugger session.
    #[arg(long)]
    pub(crate) once: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = server::run_server(cli) {
        eprintln!("rspbridge: {:#}", e);
        std::process::exit(1);
    }
}
