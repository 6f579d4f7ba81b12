//! CLI output formatting module
//!
//! This module renders check reports, scan outcomes, parsed vtable dumps and
//! library inspections in the supported formats (pretty, JSON, simple text).

use crate::binary::{BinaryFormat, BinaryInfo};
use crate::cli::args::OutputFormat;
use crate::diff::VtableMismatch;
use crate::dump::VtableLayout;
use crate::scan::{CheckReport, LibraryDiff, ScanOutcome};
use anyhow::Result;
use colored::*;
use std::io::Write;
use std::path::Path;

/// Main output formatter that handles different formats
pub struct OutputFormatter {
    format: OutputFormat,
    use_color: bool,
    verbose: bool,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(format: OutputFormat, use_color: bool, verbose: bool) -> Self {
        Self {
            format,
            use_color,
            verbose,
        }
    }

    /// Format and write the result of a full check
    pub fn write_check_report<W: Write>(&self, writer: &mut W, report: &CheckReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                writeln!(writer, "{}", serde_json::to_string_pretty(report)?)?;
            }
            OutputFormat::Pretty => {
                self.write_header(writer, "ABI Compatibility Check")?;
                writeln!(writer, "SDK version: {}", report.sdk_version)?;
                writeln!(writer, "CPU ABI: {}", report.cpu_abi)?;
                for width in &report.widths {
                    writeln!(writer)?;
                    writeln!(
                        writer,
                        "{}",
                        self.colorize(
                            &format!("📦 {} libraries ({})", width.width, width.abi_family),
                            Color::Blue
                        )
                    )?;
                    writeln!(writer, "Dump directory: {}", width.dump_dir.display())?;
                    self.write_pretty_outcome(writer, &width.outcome)?;
                }
                writeln!(writer)?;
                self.write_verdict(writer, report.error_count)?;
            }
            OutputFormat::Simple => {
                for width in &report.widths {
                    self.write_simple_outcome(writer, &width.outcome)?;
                }
                writeln!(writer, "Total number of errors: {}", report.error_count)?;
            }
        }
        Ok(())
    }

    /// Format and write the result of a single scan pass
    pub fn write_scan_outcome<W: Write>(
        &self,
        writer: &mut W,
        dump_dir: &Path,
        outcome: &ScanOutcome,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                writeln!(writer, "{}", serde_json::to_string_pretty(outcome)?)?;
            }
            OutputFormat::Pretty => {
                self.write_header(writer, "ABI Scan Results")?;
                writeln!(writer, "Dump directory: {}", dump_dir.display())?;
                self.write_pretty_outcome(writer, outcome)?;
                writeln!(writer)?;
                self.write_verdict(writer, outcome.error_count)?;
            }
            OutputFormat::Simple => {
                self.write_simple_outcome(writer, outcome)?;
                writeln!(writer, "Total number of errors: {}", outcome.error_count)?;
            }
        }
        Ok(())
    }

    /// Write a parsed vtable dump
    pub fn write_vtable_layout<W: Write>(
        &self,
        writer: &mut W,
        source: &Path,
        layout: &VtableLayout,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "source": source.display().to_string(),
                    "vtable_count": layout.len(),
                    "entry_count": layout.entry_count(),
                    "vtables": layout,
                });
                writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
            }
            OutputFormat::Pretty => {
                self.write_header(writer, "Vtable Dump")?;
                writeln!(writer, "Source: {}", source.display())?;
                writeln!(
                    writer,
                    "Vtables: {}, entries: {}",
                    layout.len(),
                    layout.entry_count()
                )?;
                self.write_layout_blocks(writer, layout)?;
            }
            OutputFormat::Simple => {
                self.write_layout_blocks(writer, layout)?;
            }
        }
        Ok(())
    }

    /// Write what the introspector sees in a library
    pub fn write_inspection<W: Write>(
        &self,
        writer: &mut W,
        info: &BinaryInfo,
        symbols: &[String],
        layout: &VtableLayout,
        show_symbols: bool,
        show_vtables: bool,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "binary_info": info,
                    "exported_symbols": symbols,
                    "vtables": layout,
                });
                writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
            }
            OutputFormat::Pretty => {
                self.write_header(writer, "Library Inspection")?;
                writeln!(writer, "Path: {}", info.path)?;
                writeln!(writer, "Format: {}", self.format_binary_format(&info.format))?;
                writeln!(writer, "Architecture: {}", info.architecture)?;
                writeln!(writer, "Bitness: {}-bit", info.bitness)?;
                if let Some(soname) = &info.soname {
                    writeln!(writer, "SONAME: {}", soname)?;
                }
                if !info.dependencies.is_empty() {
                    writeln!(writer, "Dependencies:")?;
                    for dep in &info.dependencies {
                        writeln!(writer, "  - {}", dep)?;
                    }
                }
                writeln!(writer)?;
                writeln!(writer, "Exported dynamic symbols: {}", symbols.len())?;
                writeln!(
                    writer,
                    "Vtables: {} ({} slots)",
                    layout.len(),
                    layout.entry_count()
                )?;

                if show_symbols || self.verbose {
                    writeln!(writer)?;
                    writeln!(writer, "{}", self.colorize("Exported Symbols", Color::Blue))?;
                    for symbol in symbols {
                        writeln!(writer, "  {}", symbol)?;
                    }
                }
                if show_vtables || self.verbose {
                    self.write_layout_blocks(writer, layout)?;
                }
            }
            OutputFormat::Simple => {
                if show_symbols {
                    for symbol in symbols {
                        writeln!(writer, "{}", symbol)?;
                    }
                }
                if show_vtables {
                    self.write_layout_blocks(writer, layout)?;
                }
                if !show_symbols && !show_vtables {
                    writeln!(
                        writer,
                        "{} {} {}-bit symbols={} vtables={}",
                        info.path,
                        info.architecture,
                        info.bitness,
                        symbols.len(),
                        layout.len()
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Write header information
    fn write_header<W: Write>(&self, writer: &mut W, title: &str) -> Result<()> {
        writeln!(
            writer,
            "{}",
            self.colorize(&format!("🔍 {}", title), Color::Cyan)
        )?;
        writeln!(writer, "{}", "=".repeat(50))?;
        Ok(())
    }

    fn write_pretty_outcome<W: Write>(&self, writer: &mut W, outcome: &ScanOutcome) -> Result<()> {
        for library in outcome.incompatible() {
            self.write_library_diff(writer, library)?;
        }

        if self.verbose {
            for library in outcome.libraries.iter().filter(|l| l.is_compatible()) {
                writeln!(
                    writer,
                    "{} {}",
                    self.colorize("✓", Color::Green),
                    library.relative_path
                )?;
            }
        }

        if !outcome.not_found.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                self.colorize("Not found on target:", Color::Yellow)
            )?;
            for name in &outcome.not_found {
                writeln!(writer, "  {}", name)?;
            }
        }

        if !outcome.unrecognized_dumps.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                self.colorize("⚠️  Unknown dumps", Color::Yellow)
            )?;
            for path in &outcome.unrecognized_dumps {
                writeln!(writer, "  {}", path.display())?;
            }
        }

        writeln!(writer)?;
        writeln!(
            writer,
            "Compared: {}, passed: {}, incompatible: {}, not found: {}",
            outcome.libraries.len(),
            outcome.pass_count(),
            outcome.error_count,
            outcome.not_found.len()
        )?;
        Ok(())
    }

    fn write_library_diff<W: Write>(&self, writer: &mut W, library: &LibraryDiff) -> Result<()> {
        writeln!(writer)?;
        writeln!(
            writer,
            "{} {}",
            self.colorize("✗", Color::Red),
            self.colorize(&library.relative_path, Color::Red)
        )?;

        for failure in &library.failures {
            writeln!(writer, "  Cannot diff {}", failure)?;
        }

        if !library.missing_symbols.is_empty() {
            writeln!(writer, "  Missing Symbols:")?;
            for symbol in &library.missing_symbols {
                writeln!(writer, "    {}", symbol)?;
            }
        }

        if !library.vtable_diff.is_empty() {
            writeln!(writer, "  Vtable Difference:")?;
            self.write_vtable_table(writer, &library.vtable_diff)?;
        }
        Ok(())
    }

    /// Column-aligned `vtable symbol expected actual` table
    fn write_vtable_table<W: Write>(&self, writer: &mut W, rows: &[VtableMismatch]) -> Result<()> {
        const HEADER: [&str; 4] = ["vtable", "symbol", "expected", "actual"];

        let rows: Vec<[String; 4]> = rows.iter().map(VtableMismatch::to_row).collect();
        let mut widths = HEADER.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let header: Vec<String> = HEADER
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        writeln!(
            writer,
            "    {}",
            self.colorize(header.join("  ").trim_end(), Color::Cyan)
        )?;

        for row in &rows {
            let cells: Vec<String> = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect();
            writeln!(writer, "    {}", cells.join("  ").trim_end())?;
        }
        Ok(())
    }

    /// One line per finding, space separated, for scripts
    fn write_simple_outcome<W: Write>(&self, writer: &mut W, outcome: &ScanOutcome) -> Result<()> {
        for library in &outcome.libraries {
            if library.is_compatible() {
                writeln!(writer, "PASS {}", library.relative_path)?;
                continue;
            }
            writeln!(writer, "FAIL {}", library.relative_path)?;
            for failure in &library.failures {
                writeln!(writer, "ERROR {} {}", library.relative_path, failure)?;
            }
            for symbol in &library.missing_symbols {
                writeln!(writer, "MISSING {} {}", library.relative_path, symbol)?;
            }
            for mismatch in &library.vtable_diff {
                writeln!(writer, "VTABLE {} {}", library.relative_path, mismatch)?;
            }
        }
        for name in &outcome.not_found {
            writeln!(writer, "NOTFOUND {}", name)?;
        }
        Ok(())
    }

    /// Write a layout back in dump grammar
    fn write_layout_blocks<W: Write>(&self, writer: &mut W, layout: &VtableLayout) -> Result<()> {
        for (vtable, entries) in layout.iter() {
            writeln!(writer)?;
            writeln!(writer, "{}: {} entries", vtable, entries.len())?;
            for entry in entries {
                writeln!(writer, "{} {}", entry.offset, entry.symbol)?;
            }
        }
        Ok(())
    }

    fn write_verdict<W: Write>(&self, writer: &mut W, error_count: usize) -> Result<()> {
        if error_count == 0 {
            writeln!(
                writer,
                "{}",
                self.colorize("✓ All libraries are ABI compatible", Color::Green)
            )?;
        } else {
            writeln!(
                writer,
                "{}",
                self.colorize(
                    &format!("✗ Total number of errors: {}", error_count),
                    Color::Red
                )
            )?;
        }
        Ok(())
    }

    /// Format binary format with color
    fn format_binary_format(&self, format: &BinaryFormat) -> String {
        let color = match format {
            BinaryFormat::ELF => Color::Green,
        };
        self.colorize(&format.to_string(), color)
    }

    /// Apply color to text if colors are enabled
    pub fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_color {
            match color {
                Color::Red => text.red().to_string(),
                Color::Green => text.green().to_string(),
                Color::Yellow => text.yellow().to_string(),
                Color::Blue => text.blue().to_string(),
                Color::Cyan => text.cyan().to_string(),
            }
        } else {
            text.to_string()
        }
    }
}

/// Color enumeration for output formatting
#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ActualOffsets;
    use crate::dump::VtableEntry;
    use crate::scan::{AbiWidth, WidthReport};
    use std::path::PathBuf;

    fn create_test_outcome() -> ScanOutcome {
        ScanOutcome {
            error_count: 1,
            libraries: vec![
                LibraryDiff {
                    name: "libbad.so".to_string(),
                    relative_path: "system/lib/libbad.so".to_string(),
                    missing_symbols: vec!["_ZN7android6Parcel4readEPvj".to_string()],
                    vtable_diff: vec![VtableMismatch {
                        vtable: "_ZTVN7android7RefBaseE".to_string(),
                        symbol: "_ZN7android7RefBase10onFirstRefEv".to_string(),
                        expected_offset: 16,
                        actual: ActualOffsets::At(vec![8, 24]),
                    }],
                    failures: Vec::new(),
                },
                LibraryDiff {
                    name: "libgood.so".to_string(),
                    relative_path: "vendor/lib/libgood.so".to_string(),
                    ..Default::default()
                },
            ],
            not_found: vec!["libgone.so".to_string()],
            unrecognized_dumps: Vec::new(),
        }
    }

    fn render<F>(format: OutputFormat, write: F) -> String
    where
        F: FnOnce(&OutputFormatter, &mut Vec<u8>) -> Result<()>,
    {
        let formatter = OutputFormatter::new(format, false, false);
        let mut buffer = Vec::new();
        write(&formatter, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = OutputFormatter::new(OutputFormat::Pretty, true, false);
        assert_eq!(formatter.format, OutputFormat::Pretty);
        assert!(formatter.use_color);
        assert!(!formatter.verbose);
    }

    #[test]
    fn test_pretty_scan_output() {
        let outcome = create_test_outcome();
        let output = render(OutputFormat::Pretty, |f, w| {
            f.write_scan_outcome(w, Path::new("golden/28/arm"), &outcome)
        });

        assert!(output.contains("system/lib/libbad.so"));
        assert!(output.contains("Missing Symbols:"));
        assert!(output.contains("_ZN7android6Parcel4readEPvj"));
        assert!(output.contains("vtable"));
        assert!(output.contains("8,24"));
        assert!(output.contains("libgone.so"));
        assert!(output.contains("Total number of errors: 1"));
        assert!(!output.contains("libgood.so"));
    }

    #[test]
    fn test_simple_scan_output() {
        let outcome = create_test_outcome();
        let output = render(OutputFormat::Simple, |f, w| {
            f.write_scan_outcome(w, Path::new("golden/28/arm"), &outcome)
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "FAIL system/lib/libbad.so");
        assert_eq!(
            lines[1],
            "MISSING system/lib/libbad.so _ZN7android6Parcel4readEPvj"
        );
        assert_eq!(
            lines[2],
            "VTABLE system/lib/libbad.so _ZTVN7android7RefBaseE _ZN7android7RefBase10onFirstRefEv 16 8,24"
        );
        assert_eq!(lines[3], "PASS vendor/lib/libgood.so");
        assert_eq!(lines[4], "NOTFOUND libgone.so");
        assert_eq!(lines[5], "Total number of errors: 1");
    }

    #[test]
    fn test_json_check_report() {
        let report = CheckReport {
            sdk_version: "28".to_string(),
            cpu_abi: "arm64-v8a".to_string(),
            widths: vec![WidthReport {
                width: AbiWidth::Bits32,
                abi_family: "arm".to_string(),
                dump_dir: PathBuf::from("golden/28/arm"),
                outcome: create_test_outcome(),
            }],
            error_count: 1,
        };
        let output = render(OutputFormat::Json, |f, w| f.write_check_report(w, &report));

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["error_count"], 1);
        assert_eq!(value["widths"][0]["width"], "32");
        let library = &value["widths"][0]["outcome"]["libraries"][0];
        assert_eq!(library["vtable_diff"][0]["actual"], "8,24");
        assert_eq!(library["vtable_diff"][0]["expected_offset"], 16);
    }

    #[test]
    fn test_vtable_layout_round_trips_through_simple_output() {
        let mut layout = VtableLayout::new();
        layout.insert(
            "_ZTV1A",
            vec![VtableEntry::new(0, "0"), VtableEntry::new(16, "_ZN1A1fEv")],
        );
        let output = render(OutputFormat::Simple, |f, w| {
            f.write_vtable_layout(w, Path::new("liba.so_vtable.dump"), &layout)
        });

        assert_eq!(crate::dump::read_vtable_layout(&output).unwrap(), layout);
    }

    #[test]
    fn test_colorize() {
        let formatter_no_color = OutputFormatter::new(OutputFormat::Pretty, false, false);
        let plain_text = formatter_no_color.colorize("test", Color::Red);
        assert_eq!(plain_text, "test");
    }
}
