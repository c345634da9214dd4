//! Bus description file
//!
//! Describes the emulated bus the CLI runs against:
//!
//! ```toml
//! clock_hz = "8000000"
//! preserve_psram = false
//! chip_selects = [1, 2, 3]
//!
//! [[chip]]
//! cs = 1
//! kind = "nor"
//! model = "w25q128"
//! image = "nor.bin"
//!
//! [[chip]]
//! cs = 3
//! kind = "psram"
//! ```
//!
//! Chips with an `image` are loaded from that file on start and written
//! back on exit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spimem_core::bus::ChipSelect;
use spimem_core::probe::DEFAULT_PROBE_CLOCK_HZ;
use spimem_dummy::{
    DummyBus, DummyChip, DummyNand, DummyNandConfig, DummyNor, DummyNorConfig, DummyPsram,
    DummyPsramConfig,
};
use spimem_manager::ManagerConfig;

use crate::error::{CliError, Result};

/// Top-level bus description
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Probe clock
    #[serde(default = "default_clock", deserialize_with = "deserialize_hex_u32")]
    pub clock_hz: u32,
    /// Skip the PSRAM reset sequence while probing
    #[serde(default)]
    pub preserve_psram: bool,
    /// Lines to scan; defaults to the lines that carry a chip
    #[serde(default)]
    pub chip_selects: Vec<ChipSelect>,
    /// Emulated chips
    #[serde(default, rename = "chip")]
    pub chips: Vec<ChipConfig>,
}

/// One emulated chip
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipConfig {
    /// Chip-select line
    pub cs: ChipSelect,
    /// Memory family
    pub kind: ChipKind,
    /// Part to emulate, the family default if absent
    pub model: Option<String>,
    /// Backing image file
    pub image: Option<PathBuf>,
}

/// Memory family of an emulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipKind {
    /// Serial NOR flash
    Nor,
    /// SPI-NAND flash
    Nand,
    /// PSRAM
    Psram,
}

fn default_clock() -> u32 {
    DEFAULT_PROBE_CLOCK_HZ
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB", "4KiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl Default for BusConfig {
    /// One chip of each family on lines 1 to 3
    fn default() -> Self {
        let chip = |cs, kind| ChipConfig {
            cs,
            kind,
            model: None,
            image: None,
        };
        Self {
            clock_hz: DEFAULT_PROBE_CLOCK_HZ,
            preserve_psram: false,
            chip_selects: Vec::new(),
            chips: vec![
                chip(1, ChipKind::Nor),
                chip(2, ChipKind::Nand),
                chip(3, ChipKind::Psram),
            ],
        }
    }
}

impl BusConfig {
    /// Load a bus description from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a bus description from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        for (i, chip) in config.chips.iter().enumerate() {
            if config.chips[..i].iter().any(|c| c.cs == chip.cs) {
                return Err(CliError::InvalidConfig(format!(
                    "CS {} carries more than one chip",
                    chip.cs
                )));
            }
        }
        Ok(config)
    }

    /// Registry settings
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            probe_clock_hz: self.clock_hz,
            preserve_psram: self.preserve_psram,
        }
    }

    /// Lines to scan
    pub fn scan_lines(&self) -> Vec<ChipSelect> {
        if self.chip_selects.is_empty() {
            self.chips.iter().map(|c| c.cs).collect()
        } else {
            self.chip_selects.clone()
        }
    }

    /// Build the emulated bus, loading chip images
    pub fn build_bus(&self) -> Result<DummyBus> {
        let mut bus = DummyBus::new();
        for chip in &self.chips {
            let mut dummy = chip.build()?;
            if let Some(path) = chip.image.as_deref().filter(|p| p.exists()) {
                let image = fs::read(path)?;
                log::info!("CS {}: loaded {} bytes from {}", chip.cs, image.len(), path.display());
                dummy.memory_mut().load_image(&image);
            }
            bus.attach(chip.cs, dummy);
        }
        Ok(bus)
    }

    /// Write chip contents back to their image files
    pub fn save_images(&self, bus: &DummyBus) -> Result<()> {
        for chip in &self.chips {
            let (Some(path), Some(dummy)) = (chip.image.as_deref(), bus.chip(chip.cs)) else {
                continue;
            };
            fs::write(path, dummy.memory().to_image())?;
            log::debug!("CS {}: saved image to {}", chip.cs, path.display());
        }
        Ok(())
    }
}

impl ChipConfig {
    fn build(&self) -> Result<DummyChip> {
        let model = self.model.as_deref().map(str::to_lowercase);
        let unknown = |m: &str| CliError::InvalidConfig(format!("unknown {:?} model '{}'", self.kind, m));

        let chip: DummyChip = match (self.kind, model.as_deref()) {
            (ChipKind::Nor, None | Some("w25q128")) => DummyNor::new(DummyNorConfig::w25q128()).into(),
            (ChipKind::Nor, Some("mx25l6433f")) => DummyNor::new(DummyNorConfig::mx25l6433f()).into(),
            (ChipKind::Nand, None | Some("mx35lf1ge4ab")) => {
                DummyNand::new(DummyNandConfig::mx35lf1ge4ab()).into()
            }
            (ChipKind::Nand, Some("mx35lf2ge4ad")) => {
                DummyNand::new(DummyNandConfig::mx35lf2ge4ad()).into()
            }
            (ChipKind::Nand, Some("mx35lf4ge4ad")) => {
                DummyNand::new(DummyNandConfig::mx35lf4ge4ad()).into()
            }
            (ChipKind::Psram, None | Some("aps6404")) => {
                DummyPsram::new(DummyPsramConfig::aps6404()).into()
            }
            (ChipKind::Psram, Some("aps1604")) => DummyPsram::new(DummyPsramConfig::aps1604()).into(),
            (_, Some(m)) => return Err(unknown(m)),
        };
        Ok(chip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("0x1000"), Ok(4096));
        assert_eq!(parse_size("4 KiB"), Ok(4096));
        assert_eq!(parse_size("16MiB"), Ok(16 * 1024 * 1024));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_bus_config() {
        let config = BusConfig::from_toml_str(
            r#"
            clock_hz = "0x7A1200"
            chip_selects = [1, 2, 5]

            [[chip]]
            cs = 1
            kind = "nor"
            model = "MX25L6433F"

            [[chip]]
            cs = 2
            kind = "psram"
            "#,
        )
        .unwrap();
        assert_eq!(config.clock_hz, 8_000_000);
        assert_eq!(config.scan_lines(), vec![1, 2, 5]);
        assert_eq!(config.chips[1].kind, ChipKind::Psram);

        let bus = config.build_bus().unwrap();
        assert!(matches!(bus.chip(1), Some(DummyChip::Nor(_))));
        assert!(bus.chip(5).is_none());
    }

    #[test]
    fn test_rejects_bad_config() {
        let dup = "[[chip]]\ncs = 1\nkind = \"nor\"\n[[chip]]\ncs = 1\nkind = \"psram\"\n";
        assert!(matches!(
            BusConfig::from_toml_str(dup),
            Err(CliError::InvalidConfig(_))
        ));

        let bad_model = BusConfig::from_toml_str("[[chip]]\ncs = 1\nkind = \"nor\"\nmodel = \"x\"\n")
            .unwrap();
        assert!(bad_model.build_bus().is_err());
        assert!(BusConfig::from_toml_str("clock = 1").is_err());
    }

    #[test]
    fn test_default_bus_has_every_family() {
        let config = BusConfig::default();
        assert_eq!(config.scan_lines(), vec![1, 2, 3]);
        let bus = config.build_bus().unwrap();
        assert!(matches!(bus.chip(2), Some(DummyChip::Nand(_))));
    }
}
