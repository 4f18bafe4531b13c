use std::path::PathBuf;

use log::LevelFilter;

use crate::{
    config::Pcf8574Addr,
    display::{ConsoleStyle, SurfaceKind},
    sensor::SamplingRate,
    Error, Result,
};

/// Options for the `run` and `list` commands; values are `None` when not
/// provided on the CLI so the config file can fill them in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub surface: Option<SurfaceKind>,
    pub console_style: Option<ConsoleStyle>,
    pub iio_root: Option<String>,
    pub rate: Option<SamplingRate>,
    pub cols: Option<u8>,
    pub rows: Option<u8>,
    pub i2c_bus: Option<u8>,
    pub pcf8574_addr: Option<Pcf8574Addr>,
    pub log_level: Option<LevelFilter>,
    pub log_file: Option<PathBuf>,
    pub demo: bool,
    pub once: bool,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Box<RunOptions>),
    ListSensors(Box<RunOptions>),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Command::Run(Box::default()));
        }

        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            Some("run") => Ok(Command::Run(Box::new(parse_run_options(&mut iter)?))),
            Some("list") => Ok(Command::ListSensors(Box::new(parse_run_options(
                &mut iter,
            )?))),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // `run` is implied when the first argument is already a flag.
                let mut flags: Vec<String> = Vec::with_capacity(args.len());
                flags.push(flag.to_string());
                flags.extend(iter.map(|s| s.to_string()));
                let mut iter = flags.iter();
                Ok(Command::Run(Box::new(parse_run_options(&mut iter)?)))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
            None => Ok(Command::Run(Box::default())),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "luxmeter - ambient light meter\n",
            "\n",
            "USAGE:\n",
            "  luxmeter [run] [OPTIONS]\n",
            "  luxmeter list [--iio-root <path>] [--demo]\n",
            "  luxmeter --help\n",
            "  luxmeter --version\n",
            "\n",
            "OPTIONS:\n",
            "  --config <path>         Config file (default: ~/.config/luxmeter/config.toml)\n",
            "  --surface <kind>        lcd | console | json (default: console)\n",
            "  --console-style <style> auto | plain | in-place (default: auto)\n",
            "  --iio-root <path>       IIO device directory (default: /sys/bus/iio/devices)\n",
            "  --rate <rate>           fastest | game | ui | normal, or a duration like 500ms\n",
            "  --cols <number>         LCD columns (default: 16)\n",
            "  --rows <number>         LCD rows (default: 2)\n",
            "  --i2c-bus <number>      I2C bus for the LCD backpack (default: 1)\n",
            "  --pcf8574-addr <addr>   Backpack address or 'auto' (default: auto)\n",
            "  --log-level <level>     off | error | warn | info | debug | trace (default: info)\n",
            "  --log-file <path>       Also append log lines to this file\n",
            "  --demo                  Use a simulated light sensor\n",
            "  --once                  Exit after the first reading is shown\n",
            "  -h, --help              Show this help\n",
            "  -V, --version           Show version\n",
            "\n",
            "SIGNALS:\n",
            "  SIGUSR1 pauses sensor updates, SIGUSR2 resumes them, SIGINT/SIGTERM exit.\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => {
                opts.config = Some(PathBuf::from(take_value(flag, iter)?));
            }
            "--surface" => {
                let raw = take_value(flag, iter)?;
                opts.surface = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--surface: {e}")))?,
                );
            }
            "--console-style" => {
                let raw = take_value(flag, iter)?;
                opts.console_style = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--console-style: {e}")))?,
                );
            }
            "--iio-root" => {
                opts.iio_root = Some(take_value(flag, iter)?);
            }
            "--rate" => {
                let raw = take_value(flag, iter)?;
                opts.rate = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--rate: {e}")))?,
                );
            }
            "--cols" => {
                let raw = take_value(flag, iter)?;
                opts.cols = Some(
                    raw.parse()
                        .map_err(|_| Error::InvalidArgs("cols must be a positive integer".to_string()))?,
                );
            }
            "--rows" => {
                let raw = take_value(flag, iter)?;
                opts.rows = Some(
                    raw.parse()
                        .map_err(|_| Error::InvalidArgs("rows must be a positive integer".to_string()))?,
                );
            }
            "--i2c-bus" => {
                let raw = take_value(flag, iter)?;
                opts.i2c_bus = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("i2c-bus must be a non-negative integer".to_string())
                })?);
            }
            "--pcf8574-addr" => {
                let raw = take_value(flag, iter)?;
                opts.pcf8574_addr = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--pcf8574-addr: {e}")))?,
                );
            }
            "--log-level" => {
                let raw = take_value(flag, iter)?;
                opts.log_level = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs(format!(
                        "--log-level: expected off|error|warn|info|debug|trace, got '{raw}'"
                    ))
                })?);
            }
            "--log-file" => {
                opts.log_file = Some(PathBuf::from(take_value(flag, iter)?));
            }
            "--demo" => opts.demo = true,
            "--once" => opts.once = true,
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_defaults_with_no_args() {
        let cmd = Command::parse(&[]).unwrap();
        assert_eq!(cmd, Command::Run(Box::default()));
    }

    #[test]
    fn parse_run_with_overrides() {
        let cmd = Command::parse(&args(&[
            "run",
            "--config",
            "/tmp/lux.toml",
            "--surface",
            "lcd",
            "--console-style",
            "plain",
            "--iio-root",
            "/tmp/iio",
            "--rate",
            "ui",
            "--cols",
            "20",
            "--rows",
            "4",
            "--i2c-bus",
            "0",
            "--pcf8574-addr",
            "0x3f",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/lux.log",
            "--demo",
            "--once",
        ]))
        .unwrap();
        let expected = RunOptions {
            config: Some("/tmp/lux.toml".into()),
            surface: Some(SurfaceKind::Lcd),
            console_style: Some(ConsoleStyle::Plain),
            iio_root: Some("/tmp/iio".into()),
            rate: Some(SamplingRate::Ui),
            cols: Some(20),
            rows: Some(4),
            i2c_bus: Some(0),
            pcf8574_addr: Some(Pcf8574Addr::Addr(0x3f)),
            log_level: Some(LevelFilter::Debug),
            log_file: Some("/tmp/lux.log".into()),
            demo: true,
            once: true,
        };
        assert_eq!(cmd, Command::Run(Box::new(expected)));
    }

    #[test]
    fn parse_run_allows_implicit_subcommand() {
        let cmd = Command::parse(&args(&["--rate", "500ms", "--once"])).unwrap();
        let expected = RunOptions {
            rate: Some(SamplingRate::Custom(Duration::from_millis(500))),
            once: true,
            ..RunOptions::default()
        };
        assert_eq!(cmd, Command::Run(Box::new(expected)));
    }

    #[test]
    fn parse_list_takes_run_flags() {
        let cmd = Command::parse(&args(&["list", "--iio-root", "/tmp/iio"])).unwrap();
        let expected = RunOptions {
            iio_root: Some("/tmp/iio".into()),
            ..RunOptions::default()
        };
        assert_eq!(cmd, Command::ListSensors(Box::new(expected)));
    }

    #[test]
    fn parse_help_and_version() {
        assert_eq!(Command::parse(&args(&["--help"])).unwrap(), Command::ShowHelp);
        assert_eq!(Command::parse(&args(&["-V"])).unwrap(), Command::ShowVersion);
    }

    #[test]
    fn parse_rejects_unknown_flag() {
        let err = Command::parse(&args(&["--nope"])).unwrap_err();
        assert!(format!("{err}").contains("unknown flag"));
    }

    #[test]
    fn parse_rejects_bad_surface() {
        let err = Command::parse(&args(&["--surface", "oled"])).unwrap_err();
        assert!(format!("{err}").contains("expected lcd|console|json"));
    }

    #[test]
    fn parse_rejects_missing_value() {
        let err = Command::parse(&args(&["run", "--cols"])).unwrap_err();
        assert!(format!("{err}").contains("expected a value after --cols"));
    }
}
