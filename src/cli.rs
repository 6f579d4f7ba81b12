//! CLI module for the abiguard compatibility checker
//!
//! This module provides the command-line interface functionality including
//! argument parsing, logging setup and output formatting.

pub mod args;
pub mod logging;
pub mod output;

pub use args::{Args, Commands, LogFormat, OutputFormat};
pub use output::{Color, OutputFormatter};

use crate::binary::{detect_format, BinaryIntrospector, ElfIntrospector};
use crate::dump::read_vtable_dump;
use crate::scan::{check_compatibility, CheckConfig, Scanner};
use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Main CLI application runner
pub struct CliApp {
    args: Args,
}

impl CliApp {
    /// Create a new CLI application with parsed arguments
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Install the tracing subscriber described by the global flags
    pub fn init_logging(&self) {
        let level = logging::effective_level(&self.args.log_level, self.args.verbose);
        logging::init_logging(&level, self.args.log_format, !self.args.no_color);
    }

    /// Run the CLI application, returning the process exit code
    pub fn run(&self) -> Result<i32> {
        match &self.args.command {
            Commands::Check {
                target_root,
                sdk_version,
                cpu_abi,
                is_64bit,
                dump_root,
            } => {
                let config = CheckConfig {
                    dump_root: dump_root.clone(),
                    sdk_version: sdk_version.clone(),
                    cpu_abi: cpu_abi.clone(),
                    is_64bit: *is_64bit,
                    target_root: target_root.clone(),
                    ..Default::default()
                };
                self.run_check(&config)
            }
            Commands::Scan { dump_dir, lib_dirs } => self.run_scan(dump_dir, lib_dirs),
            Commands::ParseVtables { file_path } => self.run_parse_vtables(file_path),
            Commands::Inspect {
                file_path,
                show_symbols,
                show_vtables,
            } => self.run_inspect(file_path, *show_symbols, *show_vtables),
            Commands::Version => self.run_version(),
        }
    }

    fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new(
            self.args.format.clone(),
            !self.args.no_color,
            self.args.verbose,
        )
    }

    /// Run the check command
    fn run_check(&self, config: &CheckConfig) -> Result<i32> {
        if !config.target_root.is_dir() {
            return Err(anyhow!(
                "Target root not found: {}",
                config.target_root.display()
            ));
        }

        let introspector = ElfIntrospector::new();
        let report = check_compatibility(config, &introspector)?;

        let mut stdout = io::stdout();
        self.formatter().write_check_report(&mut stdout, &report)?;

        Ok(if report.passed() { 0 } else { 1 })
    }

    /// Run the scan command
    fn run_scan(&self, dump_dir: &Path, lib_dirs: &[PathBuf]) -> Result<i32> {
        let introspector = ElfIntrospector::new();
        let outcome = Scanner::new(&introspector).scan_directory(dump_dir, lib_dirs)?;

        let mut stdout = io::stdout();
        self.formatter()
            .write_scan_outcome(&mut stdout, dump_dir, &outcome)?;

        Ok(if outcome.error_count == 0 { 0 } else { 1 })
    }

    /// Run the parse-vtables command
    fn run_parse_vtables(&self, file_path: &Path) -> Result<i32> {
        let layout = read_vtable_dump(file_path)
            .with_context(|| format!("Invalid vtable dump: {}", file_path.display()))?;

        let mut stdout = io::stdout();
        self.formatter()
            .write_vtable_layout(&mut stdout, file_path, &layout)?;
        Ok(0)
    }

    /// Run the inspect command
    fn run_inspect(&self, file_path: &Path, show_symbols: bool, show_vtables: bool) -> Result<i32> {
        // Validate file exists
        if !file_path.exists() {
            return Err(anyhow!("File not found: {}", file_path.display()));
        }

        let data = std::fs::read(file_path)?;
        if detect_format(&data).is_none() {
            return Err(anyhow!(
                "Unsupported binary format: {} (only ELF shared objects are supported)",
                file_path.display()
            ));
        }

        let introspector = ElfIntrospector::new();
        let info = introspector
            .binary_info(file_path)?
            .ok_or_else(|| anyhow!("{} reported no binary info", introspector.name()))?;
        let mut symbols: Vec<String> = introspector
            .global_dynamic_symbols(file_path)?
            .into_iter()
            .collect();
        symbols.sort();
        let layout = introspector.vtables(file_path)?;

        let mut stdout = io::stdout();
        self.formatter().write_inspection(
            &mut stdout,
            &info,
            &symbols,
            &layout,
            show_symbols,
            show_vtables,
        )?;
        Ok(0)
    }

    /// Run the version command
    fn run_version(&self) -> Result<i32> {
        match self.args.format {
            OutputFormat::Json => {
                let version_info = serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                    "description": env!("CARGO_PKG_DESCRIPTION"),
                });
                println!("{}", serde_json::to_string_pretty(&version_info)?);
            }
            _ => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            }
        }
        Ok(0)
    }
}
