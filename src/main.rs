use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use despeckle::{PatchError, Patcher};

#[derive(Parser)]
#[command(name = "despeckle")]
#[command(version, about = "Reduce video speckles in a cart file")]
#[command(
    long_about = "Reduce video speckles in a cart file.\n\n\
                  Inverts pattern bytes (and swaps the paired color nibbles) wherever that\n\
                  lowers the number of pixels changing between consecutive pages. The file\n\
                  is modified in place. Don't run on non-video cart files; the magic check\n\
                  on video page 1 is the only guard."
)]
struct Cli {
    /// Cartridge image to patch in place
    cart: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too; only real usage problems
            // fail, and they exit 1 rather than clap's default 2
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let mut patcher = match Patcher::open(&cli.cart) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match patcher.run() {
        Ok(()) => {
            println!("{}", patcher.stats());
            ExitCode::SUCCESS
        }
        Err(e @ PatchError::Read { .. }) if patcher.stats().pages > 0 => {
            // A mid-run read error stops the pass; everything up to it was
            // still patched, so report it before failing.
            eprintln!("{e}");
            println!("{}", patcher.stats());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
