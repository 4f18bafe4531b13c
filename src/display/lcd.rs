use super::TextSurface;
use crate::{
    config::Pcf8574Addr,
    lcd_driver::{pcf8574::RppalBus, Backlight, Hd44780, I2cBus, CANDIDATE_ADDRS, DEFAULT_I2C_ADDR},
    Result,
};

/// Character LCD facade over the HD44780 driver.
pub struct Lcd<B: I2cBus = RppalBus> {
    driver: Hd44780<B>,
}

impl Lcd<RppalBus> {
    /// Open the backpack on `/dev/i2c-<bus>`, probing for its address when
    /// asked to.
    pub fn open(i2c_bus: u8, addr: Pcf8574Addr, cols: u8, rows: u8) -> Result<Self> {
        let mut bus = RppalBus::open(i2c_bus)?;
        let addr = match addr {
            Pcf8574Addr::Auto => bus.detect_address(&CANDIDATE_ADDRS, DEFAULT_I2C_ADDR),
            Pcf8574Addr::Addr(a) => a,
        };
        log::info!("lcd: pcf8574 at {addr:#04x} on i2c-{i2c_bus} ({cols}x{rows})");
        Self::with_bus(bus, addr, cols, rows)
    }
}

impl<B: I2cBus> Lcd<B> {
    pub fn with_bus(bus: B, addr: u8, cols: u8, rows: u8) -> Result<Self> {
        let driver = Hd44780::new(bus, addr, cols, rows)?;
        Ok(Self { driver })
    }

    pub fn cols(&self) -> u8 {
        self.driver.cols()
    }

    pub fn rows(&self) -> u8 {
        self.driver.rows()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.driver.clear()
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.driver
            .set_backlight(if on { Backlight::On } else { Backlight::Off })
    }

    pub fn write_line(&mut self, row: u8, content: &str) -> Result<()> {
        self.driver.write_line(row, content)
    }
}

/// Surface that word-wraps the text over the LCD rows. Rows are padded to the
/// full width so stale characters get overwritten without a clear, and rows
/// that did not change are not resent.
pub struct LcdSurface<B: I2cBus = RppalBus> {
    lcd: Lcd<B>,
    shown: Vec<String>,
}

impl<B: I2cBus> LcdSurface<B> {
    pub fn new(lcd: Lcd<B>) -> Self {
        Self {
            lcd,
            shown: Vec::new(),
        }
    }

    pub fn shown(&self) -> &[String] {
        &self.shown
    }
}

impl<B: I2cBus> TextSurface for LcdSurface<B> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let rows = layout_rows(text, self.lcd.cols() as usize, self.lcd.rows() as usize);
        for (idx, row) in rows.iter().enumerate() {
            if self.shown.get(idx) != Some(row) {
                self.lcd.write_line(idx as u8, row)?;
            }
        }
        self.shown = rows;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.lcd.clear()?;
        self.lcd.set_backlight(false)?;
        self.shown.clear();
        Ok(())
    }
}

/// Word-wrap `text` into exactly `rows` lines of exactly `cols` characters.
/// Words longer than a row are split; text beyond the last row is dropped.
pub fn layout_rows(text: &str, cols: usize, rows: usize) -> Vec<String> {
    let cols = cols.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed <= cols {
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        while word.len() > cols {
            let rest = word.split_off(cols);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        current = word.into_iter().collect();
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.truncate(rows);
    lines.resize(rows, String::new());
    lines
        .into_iter()
        .map(|line| format!("{line:<cols$}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd_driver::mock::MockBus;

    #[test]
    fn reading_wraps_onto_two_rows() {
        assert_eq!(
            layout_rows("Light Intensity: 42.5 lx", 16, 2),
            vec!["Light Intensity:", "42.5 lx         "]
        );
    }

    #[test]
    fn placeholder_wraps_onto_two_rows() {
        assert_eq!(
            layout_rows("No Light Sensor Found!", 16, 2),
            vec!["No Light Sensor ", "Found!          "]
        );
    }

    #[test]
    fn wide_display_keeps_short_text_on_one_row() {
        assert_eq!(
            layout_rows("Light Intensity: 7 lx", 24, 2),
            vec!["Light Intensity: 7 lx   ", "                        "]
        );
    }

    #[test]
    fn long_words_are_split_and_overflow_dropped() {
        assert_eq!(layout_rows("abcdefghij", 4, 2), vec!["abcd", "efgh"]);
        assert_eq!(layout_rows("", 3, 1), vec!["   "]);
    }

    #[test]
    fn surface_only_rewrites_changed_rows() {
        let lcd = Lcd::with_bus(MockBus::default(), 0x27, 16, 2).unwrap();
        let mut surface = LcdSurface::new(lcd);
        surface.set_text("Light Intensity: 1 lx").unwrap();
        surface.lcd.driver_bus_reset();
        surface.set_text("Light Intensity: 2 lx").unwrap();
        assert_eq!(surface.lcd.driver_bus_text(), "2 lx            ");
        assert_eq!(surface.shown()[1], "2 lx            ");
    }

    #[test]
    fn shutdown_clears_and_darkens() {
        let lcd = Lcd::with_bus(MockBus::default(), 0x27, 16, 2).unwrap();
        let mut surface = LcdSurface::new(lcd);
        surface.set_text("Light Intensity: 1 lx").unwrap();
        surface.shutdown().unwrap();
        assert!(surface.shown().is_empty());
        assert_eq!(surface.lcd.driver.backlight(), Backlight::Off);
    }

    impl Lcd<MockBus> {
        fn driver_bus_reset(&mut self) {
            self.driver.bus_mut().reset();
        }

        fn driver_bus_text(&self) -> String {
            self.driver.bus().text()
        }
    }
}
