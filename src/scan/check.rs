//! Two-width compatibility check over a mirrored target filesystem

use super::{ScanOutcome, Scanner};
use crate::binary::BinaryIntrospector;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Word width of a library set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AbiWidth {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl AbiWidth {
    pub fn bitness(self) -> u8 {
        match self {
            AbiWidth::Bits32 => 32,
            AbiWidth::Bits64 => 64,
        }
    }

    /// Library directory name under `vendor/` and `system/`
    pub fn lib_dir_name(self) -> &'static str {
        match self {
            AbiWidth::Bits32 => "lib",
            AbiWidth::Bits64 => "lib64",
        }
    }
}

impl fmt::Display for AbiWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bitness())
    }
}

/// Golden dump directory names for the 32-bit and 64-bit variants of a CPU family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbiFamily {
    pub abi_32: &'static str,
    pub abi_64: &'static str,
}

impl AbiFamily {
    const FAMILIES: [(&'static str, AbiFamily); 3] = [
        ("arm", AbiFamily { abi_32: "arm", abi_64: "arm64" }),
        ("x86", AbiFamily { abi_32: "x86", abi_64: "x86_64" }),
        ("mips", AbiFamily { abi_32: "mips", abi_64: "mips64" }),
    ];

    /// Map a CPU ABI string such as `arm64-v8a` or `x86_64` to its family
    pub fn from_cpu_abi(cpu_abi: &str) -> Result<Self> {
        Self::FAMILIES
            .iter()
            .find(|(prefix, _)| cpu_abi.starts_with(prefix))
            .map(|(_, family)| *family)
            .ok_or_else(|| Error::Configuration(format!("Unknown ABI {}", cpu_abi)))
    }

    pub fn name(&self, width: AbiWidth) -> &'static str {
        match width {
            AbiWidth::Bits32 => self.abi_32,
            AbiWidth::Bits64 => self.abi_64,
        }
    }
}

/// Inputs of a full compatibility check
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Root of the golden dump tree, `<root>/<sdk>/<abi>/`
    pub dump_root: PathBuf,
    /// Platform version the golden dumps were captured at
    pub sdk_version: String,
    /// CPU ABI of the target, e.g. `arm64-v8a`
    pub cpu_abi: String,
    /// Whether 64-bit libraries are checked too
    pub is_64bit: bool,
    /// Local mirror of the target filesystem
    pub target_root: PathBuf,
    /// Partitions searched for libraries, highest priority first
    pub partitions: Vec<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            dump_root: PathBuf::from("vts/testcases/vndk/golden"),
            sdk_version: String::new(),
            cpu_abi: String::new(),
            is_64bit: false,
            target_root: PathBuf::from("."),
            partitions: vec!["vendor".to_string(), "system".to_string()],
        }
    }
}

impl CheckConfig {
    /// 32-bit always, 64-bit when the target supports it
    pub fn required_widths(&self) -> Vec<AbiWidth> {
        if self.is_64bit {
            vec![AbiWidth::Bits32, AbiWidth::Bits64]
        } else {
            vec![AbiWidth::Bits32]
        }
    }

    pub fn dump_dir(&self, family: &AbiFamily, width: AbiWidth) -> PathBuf {
        self.dump_root
            .join(&self.sdk_version)
            .join(family.name(width))
    }

    /// Library search directories for `width` in priority order
    pub fn lib_dirs(&self, width: AbiWidth) -> Vec<PathBuf> {
        self.partitions
            .iter()
            .map(|partition| self.target_root.join(partition).join(width.lib_dir_name()))
            .collect()
    }
}

/// Outcome of the scan pass for one width
#[derive(Debug, Clone, Serialize)]
pub struct WidthReport {
    pub width: AbiWidth,
    pub abi_family: String,
    pub dump_dir: PathBuf,
    pub outcome: ScanOutcome,
}

/// Outcome of a full check
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub sdk_version: String,
    pub cpu_abi: String,
    pub widths: Vec<WidthReport>,
    /// Incompatible libraries summed over all widths
    pub error_count: usize,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }
}

/// Run one scan pass per required width and sum the incompatible counts.
///
/// Every required dump directory is checked before any library is examined;
/// a missing one is a [`Error::Configuration`].
pub fn check_compatibility(
    config: &CheckConfig,
    introspector: &dyn BinaryIntrospector,
) -> Result<CheckReport> {
    let family = AbiFamily::from_cpu_abi(&config.cpu_abi)?;
    let widths = config.required_widths();

    for width in &widths {
        let dump_dir = config.dump_dir(&family, *width);
        ensure_dump_dir(&dump_dir, &config.sdk_version)?;
    }

    let mut report = CheckReport {
        sdk_version: config.sdk_version.clone(),
        cpu_abi: config.cpu_abi.clone(),
        widths: Vec::with_capacity(widths.len()),
        error_count: 0,
    };

    for width in widths {
        info!("Check {} libraries", width);
        let dump_dir = config.dump_dir(&family, width);
        let outcome = Scanner::new(introspector)
            .with_report_root(&config.target_root)
            .with_expected_bitness(width.bitness())
            .scan_directory(&dump_dir, &config.lib_dirs(width))?;

        report.error_count += outcome.error_count;
        report.widths.push(WidthReport {
            width,
            abi_family: family.name(width).to_string(),
            dump_dir,
            outcome,
        });
    }

    info!("Total number of errors: {}", report.error_count);
    Ok(report)
}

fn ensure_dump_dir(dump_dir: &Path, sdk_version: &str) -> Result<()> {
    if dump_dir.is_dir() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "No dump files for SDK version {} ({} missing)",
            sdk_version,
            dump_dir.display()
        )))
    }
}
