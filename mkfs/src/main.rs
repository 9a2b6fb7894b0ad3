//! mkfs - format and inspect chainfs disk images from the host.
//!
//! Formats a fresh image (empty tables persisted at offset 0), optionally
//! imports the regular files of a directory, and can print the contents
//! of an existing image.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use chainfs::constants::{BLOCK_SIZE, IMAGE_SIZE, MAXBLOCKS, MAXFILES, NAME_LEN};
use chainfs::{FileSystem, FsError};

#[derive(Parser)]
#[command(name = "mkfs", about = "Create and inspect chainfs disk images")]
struct Args {
    /// Disk image path
    #[arg(short, long)]
    output: PathBuf,

    /// Directory to import files from
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// List the image's contents instead of formatting it
    #[arg(short, long)]
    list: bool,

    /// Recreate the image even if it already exists
    #[arg(short, long)]
    force: bool,
}

fn run(args: &Args) -> chainfs::Result<()> {
    if args.list {
        // Listing is inspection only; opening a missing path would
        // format a fresh image as a side effect.
        if !args.output.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such image: {}", args.output.display()),
            )
            .into());
        }
        let fs = FileSystem::open(&args.output, IMAGE_SIZE as u64)?;
        list_image(&fs);
        return Ok(());
    }

    if args.force {
        let _ = std::fs::remove_file(&args.output);
    }

    let fs = FileSystem::open(&args.output, IMAGE_SIZE as u64)?;

    println!(
        "chainfs image {:?}: {} bytes, {} file slots, {} blocks x {} bytes",
        args.output, IMAGE_SIZE, MAXFILES, MAXBLOCKS, BLOCK_SIZE
    );

    let mut imported = 0u32;
    if let Some(ref src_dir) = args.dir {
        imported = import_directory(&fs, src_dir)?;
    }

    println!("Done. {} files imported.", imported);
    Ok(())
}

fn list_image(fs: &FileSystem) {
    println!("SIZE   NAME");
    println!("-----  -----------");
    for info in fs.files() {
        println!("{:<5}  {}", info.size, info.name);
    }
}

/// Import every regular file in `dir` (non-recursive). Files whose names
/// do not fit the image's limits are skipped with a warning rather than
/// aborting the whole import.
fn import_directory(fs: &FileSystem, dir: &PathBuf) -> chainfs::Result<u32> {
    let mut imported = 0u32;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.len() > NAME_LEN {
            println!("  Skipping {}: name too long (max {} bytes)", name, NAME_LEN);
            continue;
        }

        let data = std::fs::read(&path)?;
        match fs
            .create(name)
            .and_then(|()| fs.write(name, &data))
        {
            Ok(()) => {
                println!("  Imported {} ({} bytes)", name, data.len());
                imported += 1;
            }
            Err(e @ (FsError::TableFull | FsError::FileTooLarge | FsError::InsufficientSpace)) => {
                println!("  Skipping {}: {}", name, e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(imported)
}


fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mkfs: {}", e);
            ExitCode::FAILURE
        }
    }
}
