pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod display;
pub mod lcd_driver;
pub mod sensor;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("display error: {0}")]
    Display(String),
    #[error("event loop error: {0}")]
    EventLoop(String),
}
