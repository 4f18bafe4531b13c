use std::io::{self, Write};

use serde::Serialize;

use super::{ConsoleStyle, TextSurface};
use crate::{controller::NO_SENSOR_TEXT, Error, Result};

/// Carriage return plus "erase whole line".
const REWRITE_LINE: &str = "\r\x1b[2K";

/// Terminal surface: either one line per update or a single line rewritten
/// in place.
pub struct ConsoleSurface<W: Write> {
    out: W,
    in_place: bool,
    line_open: bool,
}

impl ConsoleSurface<io::Stdout> {
    pub fn stdout(style: ConsoleStyle) -> Self {
        let in_place = match style {
            ConsoleStyle::Plain => false,
            ConsoleStyle::InPlace => true,
            ConsoleStyle::Auto => stdout_is_terminal(),
        };
        Self::new(io::stdout(), in_place)
    }
}

#[cfg(unix)]
fn stdout_is_terminal() -> bool {
    rustix::termios::isatty(io::stdout())
}

#[cfg(not(unix))]
fn stdout_is_terminal() -> bool {
    false
}

impl<W: Write> ConsoleSurface<W> {
    pub fn new(out: W, in_place: bool) -> Self {
        Self {
            out,
            in_place,
            line_open: false,
        }
    }

    pub fn is_in_place(&self) -> bool {
        self.in_place
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TextSurface for ConsoleSurface<W> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.in_place {
            write!(self.out, "{REWRITE_LINE}{text}")?;
            self.line_open = true;
        } else {
            writeln!(self.out, "{text}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.out.flush()?;
            self.line_open = false;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    text: &'a str,
    class: &'static str,
}

/// One `{"text": ..., "class": ...}` object per line, the shape status bars
/// such as waybar read from custom modules. `class` is `absent` while the
/// placeholder is shown and `light` otherwise.
pub struct JsonLinesSurface<W: Write> {
    out: W,
}

impl JsonLinesSurface<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TextSurface for JsonLinesSurface<W> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let class = if text == NO_SENSOR_TEXT {
            "absent"
        } else {
            "light"
        };
        serde_json::to_writer(&mut self.out, &JsonLine { text, class })
            .map_err(|e| Error::Display(format!("failed to encode update: {e}")))?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_style_prints_one_line_per_update() {
        let mut surface = ConsoleSurface::new(Vec::new(), false);
        surface.set_text("Light Intensity: 1 lx").unwrap();
        surface.set_text("Light Intensity: 2 lx").unwrap();
        surface.shutdown().unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(out, "Light Intensity: 1 lx\nLight Intensity: 2 lx\n");
    }

    #[test]
    fn in_place_style_rewrites_and_closes_line_on_shutdown() {
        let mut surface = ConsoleSurface::new(Vec::new(), true);
        surface.set_text("a").unwrap();
        surface.set_text("b").unwrap();
        surface.shutdown().unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(out, "\r\x1b[2Ka\r\x1b[2Kb\n");
    }

    #[test]
    fn forced_styles_ignore_terminal_detection() {
        assert!(ConsoleSurface::stdout(ConsoleStyle::InPlace).is_in_place());
        assert!(!ConsoleSurface::stdout(ConsoleStyle::Plain).is_in_place());
    }

    #[test]
    fn json_lines_escape_text() {
        let mut surface = JsonLinesSurface::new(Vec::new());
        surface.set_text("No Light Sensor Found!").unwrap();
        surface.set_text("say \"hi\"").unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(
            out,
            concat!(
                "{\"text\":\"No Light Sensor Found!\",\"class\":\"absent\"}\n",
                "{\"text\":\"say \\\"hi\\\"\",\"class\":\"light\"}\n",
            )
        );
    }
}
