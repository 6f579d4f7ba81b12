//! CLI argument parsing module
//!
//! This module defines the command-line interface for the abiguard checker.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// abiguard - golden ABI compatibility checker for shared libraries
#[derive(Parser, Debug)]
#[command(name = "abiguard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check shared libraries against golden ABI dumps")]
#[command(long_about = r#"
abiguard verifies that a set of shared libraries still exports every dynamic
symbol and keeps every vtable slot recorded in golden dumps captured at a prior
release.

Examples:
  abiguard check --target-root ./device --sdk-version 28 --cpu-abi arm64-v8a --is-64bit
  abiguard scan --dump-dir golden/28/arm --lib-dir vendor/lib --lib-dir system/lib
  abiguard parse-vtables golden/28/arm/libutils.so_vtable.dump
  abiguard inspect ./device/system/lib64/libutils.so
  abiguard --format json check ...            # Output the report as JSON
"#)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'f', long = "format", global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Suppress colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long = "log-level", global = true, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long = "log-format", global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the 32-bit (and 64-bit) libraries of a target against golden dumps
    Check {
        /// Local mirror of the target filesystem (contains vendor/ and system/)
        #[arg(long, value_name = "DIR")]
        target_root: PathBuf,

        /// Platform version selecting the golden dump directory
        #[arg(long, env = "ABIGUARD_SDK_VERSION")]
        sdk_version: String,

        /// CPU ABI of the target, e.g. arm64-v8a
        #[arg(long, env = "ABIGUARD_CPU_ABI")]
        cpu_abi: String,

        /// Also check 64-bit libraries
        #[arg(long)]
        is_64bit: bool,

        /// Root of the golden dump tree
        #[arg(
            long,
            value_name = "DIR",
            env = "ABIGUARD_DUMP_ROOT",
            default_value = "vts/testcases/vndk/golden"
        )]
        dump_root: PathBuf,
    },

    /// Compare one golden dump directory with an explicit list of library directories
    Scan {
        /// Directory holding <lib>_symbol.dump and <lib>_vtable.dump files
        #[arg(long, value_name = "DIR")]
        dump_dir: PathBuf,

        /// Library search directory; earlier directories take precedence
        #[arg(long = "lib-dir", value_name = "DIR", required = true)]
        lib_dirs: Vec<PathBuf>,
    },

    /// Parse a golden vtable dump and print its layout
    ParseVtables {
        /// Path to the vtable dump
        #[arg(value_name = "DUMP")]
        file_path: PathBuf,
    },

    /// Show the exported symbols and vtables of a shared library
    Inspect {
        /// Path to the shared library
        #[arg(value_name = "LIBRARY")]
        file_path: PathBuf,

        /// Also list every exported symbol
        #[arg(long)]
        show_symbols: bool,

        /// Also list every vtable slot
        #[arg(long)]
        show_vtables: bool,
    },

    /// Show version information and exit
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed human-readable output (default)
    Pretty,
    /// JSON output
    Json,
    /// Simple text output (minimal formatting)
    Simple,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Simple => write!(f, "simple"),
        }
    }
}

/// Log record format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}
