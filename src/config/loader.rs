use std::{fs, path::Path};

use crate::{Error, Result};

use super::{config_path, Config};

/// Load the user config, writing the defaults out on first run.
pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        if let Err(err) = cfg.save_to_path(&path) {
            log::warn!("could not write default config to {}: {err}", path.display());
        }
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# luxmeter config\n\
surface = \"{}\"\n\
console_style = \"{}\"\n\
iio_root = \"{}\"\n\
sampling_rate = \"{}\"\n\
cols = {}\n\
rows = {}\n\
i2c_bus = {}\n\
pcf8574_addr = {}\n",
        config.surface,
        config.console_style,
        config.iio_root,
        config.sampling_rate,
        config.cols,
        config.rows,
        config.i2c_bus,
        super::format_pcf_addr(&config.pcf8574_addr),
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::InvalidArgs(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim().trim_matches('"');
        match key {
            "surface" => {
                cfg.surface = value.parse().map_err(|e: String| {
                    Error::InvalidArgs(format!("invalid surface on line {}: {e}", idx + 1))
                })?;
            }
            "console_style" => {
                cfg.console_style = value.parse().map_err(|e: String| {
                    Error::InvalidArgs(format!("invalid console_style on line {}: {e}", idx + 1))
                })?;
            }
            "iio_root" => cfg.iio_root = value.to_string(),
            "sampling_rate" => {
                cfg.sampling_rate = value.parse().map_err(|e: String| {
                    Error::InvalidArgs(format!("invalid sampling_rate on line {}: {e}", idx + 1))
                })?;
            }
            "cols" => {
                cfg.cols = value.parse().map_err(|_| {
                    Error::InvalidArgs(format!("invalid cols value on line {}", idx + 1))
                })?;
            }
            "rows" => {
                cfg.rows = value.parse().map_err(|_| {
                    Error::InvalidArgs(format!("invalid rows value on line {}", idx + 1))
                })?;
            }
            "i2c_bus" => {
                cfg.i2c_bus = value.parse().map_err(|_| {
                    Error::InvalidArgs(format!("invalid i2c_bus value on line {}", idx + 1))
                })?;
            }
            "pcf8574_addr" => {
                cfg.pcf8574_addr = super::parse_pcf_addr(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid pcf8574_addr on line {}: {e}", idx + 1))
                })?;
            }
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown config key '{other}' on line {}",
                    idx + 1
                )));
            }
        }
    }

    super::validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let cfg = parse("# heading\n\n   # indented\ncols = 20\n").unwrap();
        assert_eq!(cfg.cols, 20);
    }

    #[test]
    fn missing_equals_reports_line() {
        let err = parse("cols = 16\nrows 2\n").unwrap_err();
        assert!(format!("{err}").contains("invalid config line 2"));
    }

    #[test]
    fn bad_rate_reports_line() {
        let err = parse("sampling_rate = \"sometimes\"").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("invalid sampling_rate on line 1"));
        assert!(msg.contains("fastest|game|ui|normal"));
    }

    #[test]
    fn saved_file_is_parseable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        save_to_path(&Config::default(), &path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# luxmeter config\n"));
        assert!(raw.contains("pcf8574_addr = \"auto\""));
        assert_eq!(parse(&raw).unwrap(), Config::default());
    }
}
