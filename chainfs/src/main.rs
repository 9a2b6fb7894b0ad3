//! chainfsd - the file server daemon.
//!
//! Opens (or creates) the backing image and serves the line protocol on
//! the given address until killed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use chainfs::constants::{BLOCK_SIZE, IMAGE_SIZE, MAXBLOCKS, MAXFILES};
use chainfs::{FileServer, FileSystem};

#[derive(Parser)]
#[command(name = "chainfsd", about = "Block filesystem server speaking the line protocol over TCP")]
struct Args {
    /// Backing disk image path (created if missing)
    #[arg(short, long, default_value = "filesystem.img")]
    image: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0")]
    addr: String,

    /// Listen port
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: &Args) -> chainfs::Result<()> {
    info!(
        target: "main",
        "image {:?}: {} files x {} blocks x {} bytes",
        args.image, MAXFILES, MAXBLOCKS, BLOCK_SIZE
    );

    let fs = Arc::new(FileSystem::open(&args.image, IMAGE_SIZE as u64)?);
    let server = FileServer::bind((args.addr.as_str(), args.port), fs)?;
    server.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    chainfs::klog::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "main", "{}", e);
            ExitCode::FAILURE
        }
    }
}
