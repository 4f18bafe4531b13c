use std::{io::Write, path::PathBuf};

use calloop::channel::channel;
use log::LevelFilter;

use crate::{
    cli::RunOptions,
    config::{config_path, Config, Pcf8574Addr},
    controller::DisplayController,
    display::{ConsoleStyle, ConsoleSurface, JsonLinesSurface, Lcd, LcdSurface, SurfaceKind, TextSurface},
    sensor::{IioBroker, SamplingRate, SensorBroker, SimulatedBroker},
    Result,
};

pub mod event_loop;
pub mod lifecycle;
pub mod logger;

pub use event_loop::LoopOptions;
pub use lifecycle::Lifecycle;
pub use logger::Logger;

/// Config for the daemon: the config file with CLI overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub surface: SurfaceKind,
    pub console_style: ConsoleStyle,
    pub iio_root: String,
    pub sampling_rate: SamplingRate,
    pub cols: u8,
    pub rows: u8,
    pub i2c_bus: u8,
    pub pcf8574_addr: Pcf8574Addr,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub demo: bool,
    pub once: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_sources(Config::default(), RunOptions::default())
    }
}

impl AppConfig {
    pub fn from_sources(config: Config, opts: RunOptions) -> Self {
        Self {
            surface: opts.surface.unwrap_or(config.surface),
            console_style: opts.console_style.unwrap_or(config.console_style),
            iio_root: opts.iio_root.unwrap_or(config.iio_root),
            sampling_rate: opts.rate.unwrap_or(config.sampling_rate),
            cols: opts.cols.unwrap_or(config.cols),
            rows: opts.rows.unwrap_or(config.rows),
            i2c_bus: opts.i2c_bus.unwrap_or(config.i2c_bus),
            pcf8574_addr: opts.pcf8574_addr.unwrap_or(config.pcf8574_addr),
            log_level: opts.log_level.unwrap_or(LevelFilter::Info),
            log_file: opts.log_file,
            demo: opts.demo,
            once: opts.once,
        }
    }

    /// Same range checks the config file gets, applied after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        crate::config::validate(&Config {
            surface: self.surface,
            console_style: self.console_style,
            iio_root: self.iio_root.clone(),
            sampling_rate: self.sampling_rate,
            cols: self.cols,
            rows: self.rows,
            i2c_bus: self.i2c_bus,
            pcf8574_addr: self.pcf8574_addr.clone(),
        })
    }
}

pub struct App {
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Merge the config file with `opts` and install the logger. Writes the
    /// default config on first run.
    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = match opts.config.as_deref() {
            Some(path) => Config::load_from_path(path)?,
            None => Config::load_or_default()?,
        };
        Self::with_config_file(cfg_file, opts)
    }

    /// Like [`App::from_options`], but never creates a config file.
    pub fn from_options_read_only(opts: RunOptions) -> Result<Self> {
        let path = match opts.config.clone() {
            Some(path) => path,
            None => config_path()?,
        };
        let cfg_file = Config::load_from_path(&path)?;
        Self::with_config_file(cfg_file, opts)
    }

    fn with_config_file(cfg_file: Config, opts: RunOptions) -> Result<Self> {
        let merged = AppConfig::from_sources(cfg_file, opts);
        let logger = Logger::with_env_overrides(merged.log_level, merged.log_file.clone());
        if let Err(err) = logger.init() {
            log::debug!("keeping existing logger: {err}");
        }
        Self::new(merged)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the daemon.
    pub fn run(&self) -> Result<()> {
        let config = &self.config;

        // Before any thread exists, so every thread inherits the blocked mask.
        let signals = lifecycle::visibility_signals()?;
        let (lifecycle_tx, lifecycle_rx) = channel();
        lifecycle::install_shutdown_handler(lifecycle_tx)?;

        let broker = self.build_broker()?;
        let surface = self.build_surface()?;
        log::info!(
            "luxmeter start (surface={}, rate={}, demo={})",
            config.surface,
            config.sampling_rate,
            config.demo
        );

        let (sensor_tx, sensor_rx) = channel();
        let controller = DisplayController::new(
            broker,
            surface,
            Box::new(sensor_tx),
            config.sampling_rate,
        )?;
        event_loop::run(
            controller,
            sensor_rx,
            lifecycle_rx,
            signals,
            LoopOptions { once: config.once },
        )
    }

    /// Print every sensor the configured back-end can see.
    pub fn list_sensors<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.config.demo {
            for sensor in SimulatedBroker::new().sensors() {
                writeln!(out, "{}\t{}\t{}", sensor.handle.0, sensor.kind, sensor.name)?;
            }
            return Ok(());
        }

        let broker = IioBroker::with_root(&self.config.iio_root)?;
        let sensors = broker.sensors();
        if sensors.is_empty() {
            writeln!(out, "no sensors found under {}", broker.root().display())?;
            return Ok(());
        }
        for sensor in sensors {
            let value = broker
                .read_now(&sensor)
                .map(|v| v.to_string())
                .unwrap_or_else(|_| "?".into());
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                sensor.handle.0, sensor.kind, sensor.name, value
            )?;
        }
        Ok(())
    }

    fn build_broker(&self) -> Result<Box<dyn SensorBroker>> {
        if self.config.demo {
            log::info!("demo mode: using simulated light sensor");
            return Ok(Box::new(SimulatedBroker::new()));
        }
        Ok(Box::new(IioBroker::with_root(&self.config.iio_root)?))
    }

    fn build_surface(&self) -> Result<Box<dyn TextSurface>> {
        let config = &self.config;
        Ok(match config.surface {
            SurfaceKind::Lcd => {
                let lcd = Lcd::open(
                    config.i2c_bus,
                    config.pcf8574_addr.clone(),
                    config.cols,
                    config.rows,
                )?;
                Box::new(LcdSurface::new(lcd))
            }
            SurfaceKind::Console => Box::new(ConsoleSurface::stdout(config.console_style)),
            SurfaceKind::Json => Box::new(JsonLinesSurface::stdout()),
        })
    }
}
