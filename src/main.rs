//! abiguard - golden ABI compatibility checker
//!
//! Checks the shared libraries of a target against golden symbol and vtable
//! dumps and exits non-zero when any library is incompatible.

use anyhow::Result;
use clap::Parser;
use abiguard::cli::{Args, CliApp};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let app = CliApp::new(args);
    app.init_logging();
    let exit_code = app.run()?;

    // Exit with the appropriate code
    std::process::exit(exit_code);
}
