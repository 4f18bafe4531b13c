use crate::{
    display::{ConsoleStyle, SurfaceKind},
    sensor::{iio::DEFAULT_IIO_ROOT, SamplingRate},
    Error, Result,
};
use std::path::{Path, PathBuf};

pub mod loader;

pub const DEFAULT_COLS: u8 = 16;
pub const DEFAULT_ROWS: u8 = 2;
pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_PCF8574_ADDR: Pcf8574Addr = Pcf8574Addr::Auto;
const APP_NAME: &str = "luxmeter";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pcf8574Addr {
    Auto,
    Addr(u8),
}

impl std::str::FromStr for Pcf8574Addr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_pcf_addr(s)
    }
}

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub surface: SurfaceKind,
    pub console_style: ConsoleStyle,
    pub iio_root: String,
    pub sampling_rate: SamplingRate,
    pub cols: u8,
    pub rows: u8,
    pub i2c_bus: u8,
    pub pcf8574_addr: Pcf8574Addr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            surface: SurfaceKind::default(),
            console_style: ConsoleStyle::default(),
            iio_root: DEFAULT_IIO_ROOT.to_string(),
            sampling_rate: SamplingRate::default(),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            i2c_bus: DEFAULT_I2C_BUS,
            pcf8574_addr: DEFAULT_PCF8574_ADDR,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }
}

/// `<config dir>/luxmeter/config.toml`, following XDG on Linux.
pub fn config_path() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or_else(|| {
            Error::InvalidArgs("no home directory; cannot locate config directory".into())
        })
}

pub(crate) fn validate(cfg: &Config) -> Result<()> {
    if !(1..=40).contains(&cfg.cols) {
        return Err(Error::InvalidArgs(format!(
            "cols must be between 1 and 40 (got {})",
            cfg.cols
        )));
    }
    if !(1..=4).contains(&cfg.rows) {
        return Err(Error::InvalidArgs(format!(
            "rows must be between 1 and 4 (got {})",
            cfg.rows
        )));
    }
    if cfg.iio_root.trim().is_empty() {
        return Err(Error::InvalidArgs("iio_root must not be empty".into()));
    }
    Ok(())
}

fn parse_pcf_addr(raw: &str) -> std::result::Result<Pcf8574Addr, String> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Pcf8574Addr::Auto);
    }
    let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse::<u8>(),
    }
    .map_err(|_| "expected 'auto' or a hex/decimal address (e.g., 0x27)".to_string())?;
    Ok(Pcf8574Addr::Addr(value))
}

fn format_pcf_addr(addr: &Pcf8574Addr) -> String {
    match addr {
        Pcf8574Addr::Auto => "\"auto\"".into(),
        Pcf8574Addr::Addr(a) => format!("\"{a:#04x}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn parses_pcf_addresses() {
        assert_eq!("auto".parse::<Pcf8574Addr>(), Ok(Pcf8574Addr::Auto));
        assert_eq!("0x3f".parse::<Pcf8574Addr>(), Ok(Pcf8574Addr::Addr(0x3f)));
        assert_eq!("39".parse::<Pcf8574Addr>(), Ok(Pcf8574Addr::Addr(39)));
        assert!("0xzz".parse::<Pcf8574Addr>().is_err());
    }

    #[test]
    fn loads_default_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::load_from_path(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_valid_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let contents = r#"
            # wall unit in the hallway
            surface = "lcd"
            console_style = "plain"
            iio_root = "/tmp/iio"
            sampling_rate = "250ms"
            cols = 20
            rows = 4
            i2c_bus = 0
            pcf8574_addr = "0x3f"
        "#;
        fs::write(&path, contents).unwrap();
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.surface, SurfaceKind::Lcd);
        assert_eq!(cfg.console_style, ConsoleStyle::Plain);
        assert_eq!(cfg.iio_root, "/tmp/iio");
        assert_eq!(
            cfg.sampling_rate,
            SamplingRate::Custom(Duration::from_millis(250))
        );
        assert_eq!(cfg.cols, 20);
        assert_eq!(cfg.rows, 4);
        assert_eq!(cfg.i2c_bus, 0);
        assert_eq!(cfg.pcf8574_addr, Pcf8574Addr::Addr(0x3f));
    }

    #[test]
    fn rejects_unknown_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "baud = 9600").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("unknown config key 'baud' on line 1"));
    }

    #[test]
    fn rejects_out_of_range_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "rows = 5").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("rows must be between 1 and 4"));
    }

    #[test]
    fn saves_and_loads_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let cfg = Config {
            surface: SurfaceKind::Json,
            console_style: ConsoleStyle::InPlace,
            iio_root: "/sys/bus/iio/devices".into(),
            sampling_rate: SamplingRate::Ui,
            cols: 20,
            rows: 4,
            i2c_bus: 3,
            pcf8574_addr: Pcf8574Addr::Addr(0x27),
        };
        cfg.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
