//! Text output surfaces: the one "label" the controller writes into.

use std::{fmt, str::FromStr};

use crate::Result;

pub mod console;
pub mod lcd;
pub mod memory;

pub use console::{ConsoleSurface, JsonLinesSurface};
pub use lcd::{Lcd, LcdSurface};
pub use memory::MemorySurface;

/// A single mutable line of text.
pub trait TextSurface {
    /// Replace the displayed text.
    fn set_text(&mut self, text: &str) -> Result<()>;

    /// Called once when the daemon exits.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: TextSurface + ?Sized> TextSurface for Box<T> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        (**self).set_text(text)
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}

/// Which surface the daemon renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceKind {
    Lcd,
    #[default]
    Console,
    Json,
}

impl FromStr for SurfaceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lcd" => Ok(SurfaceKind::Lcd),
            "console" | "stdout" => Ok(SurfaceKind::Console),
            "json" => Ok(SurfaceKind::Json),
            other => Err(format!("expected lcd|console|json, got '{other}'")),
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SurfaceKind::Lcd => "lcd",
            SurfaceKind::Console => "console",
            SurfaceKind::Json => "json",
        })
    }
}

/// How the console surface presents updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleStyle {
    /// In-place when stdout is a terminal, plain otherwise.
    #[default]
    Auto,
    Plain,
    InPlace,
}

impl FromStr for ConsoleStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ConsoleStyle::Auto),
            "plain" => Ok(ConsoleStyle::Plain),
            "in-place" | "inplace" => Ok(ConsoleStyle::InPlace),
            other => Err(format!("expected auto|plain|in-place, got '{other}'")),
        }
    }
}

impl fmt::Display for ConsoleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleStyle::Auto => "auto",
            ConsoleStyle::Plain => "plain",
            ConsoleStyle::InPlace => "in-place",
        })
    }
}
