//! HD44780 character LCD behind a PCF8574 I2C backpack, driven in 4-bit mode.
//!
//! Backpack wiring (bit → LCD pin): P0 = RS, P1 = RW, P2 = E, P3 = backlight,
//! P4..P7 = D4..D7.

use std::time::Duration;

use crate::Result;

pub mod pcf8574;

pub const DEFAULT_I2C_ADDR: u8 = 0x27;
/// Addresses a PCF8574/PCF8574A backpack is commonly strapped to.
pub const CANDIDATE_ADDRS: [u8; 8] = [0x27, 0x26, 0x25, 0x24, 0x23, 0x22, 0x21, 0x20];

/// Byte-level access to the backpack so the driver can run against a mock.
pub trait I2cBus {
    fn write_byte(&mut self, addr: u8, byte: u8) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backlight {
    On,
    Off,
}

const MASK_RS: u8 = 0x01;
const MASK_E: u8 = 0x04;
const SHIFT_BACKLIGHT: u8 = 3;
const SHIFT_DATA: u8 = 4;

const CMD_CLEAR: u8 = 0x01;
const CMD_HOME: u8 = 0x02;
const CMD_ENTRY_MODE: u8 = 0x04;
const ENTRY_INCREMENT: u8 = 0x02;
const CMD_DISPLAY_CTRL: u8 = 0x08;
const DISPLAY_ON: u8 = 0x04;
const CMD_FUNCTION: u8 = 0x20;
const FUNCTION_2LINES: u8 = 0x08;
const FUNCTION_RESET: u8 = 0x30;
const CMD_DDRAM: u8 = 0x80;
const ROW_ODD_OFFSET: u8 = 0x40;

pub struct Hd44780<B: I2cBus> {
    bus: B,
    addr: u8,
    cols: u8,
    rows: u8,
    backlight: Backlight,
}

impl<B: I2cBus> Hd44780<B> {
    /// Run the power-on init sequence. The display ends up on, cleared, with
    /// the backlight lit.
    pub fn new(bus: B, addr: u8, cols: u8, rows: u8) -> Result<Self> {
        let mut driver = Self {
            bus,
            addr,
            cols: cols.clamp(1, 40),
            rows: rows.clamp(1, 4),
            backlight: Backlight::On,
        };

        driver.bus.write_byte(addr, 0)?;
        sleep_ms(20);
        // Three 8-bit resets then switch to 4-bit, per the datasheet.
        for delay in [5, 1, 1] {
            driver.pulse_nibble(FUNCTION_RESET, false)?;
            sleep_ms(delay);
        }
        driver.pulse_nibble(CMD_FUNCTION, false)?;
        sleep_ms(1);

        let mut function = CMD_FUNCTION;
        if driver.rows > 1 {
            function |= FUNCTION_2LINES;
        }
        driver.command(function)?;
        driver.display_off()?;
        driver.clear()?;
        driver.command(CMD_ENTRY_MODE | ENTRY_INCREMENT)?;
        driver.display_on()?;
        Ok(driver)
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn backlight(&self) -> Backlight {
        self.backlight
    }

    pub fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR)?;
        self.command(CMD_HOME)
    }

    pub fn display_on(&mut self) -> Result<()> {
        self.command(CMD_DISPLAY_CTRL | DISPLAY_ON)
    }

    pub fn display_off(&mut self) -> Result<()> {
        self.command(CMD_DISPLAY_CTRL)
    }

    pub fn set_backlight(&mut self, backlight: Backlight) -> Result<()> {
        self.backlight = backlight;
        let mask = self.backlight_mask();
        self.bus.write_byte(self.addr, mask)
    }

    /// Put `text` at the start of `row`, cut to the display width.
    /// Characters outside ASCII are shown as `?`.
    pub fn write_line(&mut self, row: u8, text: &str) -> Result<()> {
        self.move_to(0, row)?;
        for ch in text.chars().take(self.cols as usize) {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.data(byte)?;
        }
        Ok(())
    }

    pub fn move_to(&mut self, col: u8, row: u8) -> Result<()> {
        let row = row.min(self.rows - 1);
        let col = col.min(self.cols - 1);
        self.command(CMD_DDRAM | ddram_addr(self.cols, col, row))
    }

    fn command(&mut self, cmd: u8) -> Result<()> {
        self.pulse_nibble(cmd, false)?;
        self.pulse_nibble(cmd << 4, false)?;
        if cmd == CMD_CLEAR || cmd == CMD_HOME {
            sleep_ms(5);
        }
        Ok(())
    }

    fn data(&mut self, byte: u8) -> Result<()> {
        self.pulse_nibble(byte, true)?;
        self.pulse_nibble(byte << 4, true)
    }

    /// Clock the high nibble of `value` into the controller.
    fn pulse_nibble(&mut self, value: u8, is_data: bool) -> Result<()> {
        let mut byte = self.backlight_mask() | ((value >> 4) << SHIFT_DATA);
        if is_data {
            byte |= MASK_RS;
        }
        self.bus.write_byte(self.addr, byte | MASK_E)?;
        self.bus.write_byte(self.addr, byte)
    }

    fn backlight_mask(&self) -> u8 {
        match self.backlight {
            Backlight::On => 1 << SHIFT_BACKLIGHT,
            Backlight::Off => 0,
        }
    }
}

#[cfg(test)]
impl<B: I2cBus> Hd44780<B> {
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

/// Rows 2 and 3 continue rows 0 and 1 one display width further on, so the
/// offset depends on the module's column count.
fn ddram_addr(cols: u8, col: u8, row: u8) -> u8 {
    let mut addr = col;
    if row & 1 == 1 {
        addr += ROW_ODD_OFFSET;
    }
    if row & 2 == 2 {
        addr += cols;
    }
    addr
}

fn sleep_ms(ms: u64) {
    if cfg!(test) {
        return;
    }
    std::thread::sleep(Duration::from_millis(ms));
}


#[cfg(test)]
mod tests {
    use super::mock::MockBus;
    use super::*;

    fn driver(cols: u8, rows: u8) -> Hd44780<MockBus> {
        let mut driver = Hd44780::new(MockBus::default(), DEFAULT_I2C_ADDR, cols, rows).unwrap();
        driver.bus.reset();
        driver
    }

    #[test]
    fn init_starts_with_reset_nibbles() {
        let driver = Hd44780::new(MockBus::default(), 0x27, 16, 2).unwrap();
        let writes = &driver.bus.writes;
        assert_eq!(writes[0], (0x27, 0));
        // 0x30 reset nibble with backlight (0x08) and E (0x04) raised, then dropped.
        assert_eq!(writes[1], (0x27, 0x3C));
        assert_eq!(writes[2], (0x27, 0x38));
        assert!(writes.iter().all(|&(addr, _)| addr == 0x27));
    }

    #[test]
    fn write_line_addresses_row_and_sends_text() {
        let mut driver = driver(16, 2);
        driver.write_line(1, "42.5 lx").unwrap();
        assert_eq!(driver.bus.commands(), vec![CMD_DDRAM | 0x40]);
        assert_eq!(driver.bus.text(), "42.5 lx");
    }

    #[test]
    fn write_line_truncates_to_width() {
        let mut driver = driver(8, 2);
        driver.write_line(0, "Light Intensity:").unwrap();
        assert_eq!(driver.bus.text(), "Light In");
    }

    #[test]
    fn non_ascii_is_replaced() {
        let mut driver = driver(16, 2);
        driver.write_line(0, "5 µW").unwrap();
        assert_eq!(driver.bus.text(), "5 ?W");
    }

    #[test]
    fn four_row_offsets() {
        let mut driver = driver(20, 4);
        driver.move_to(0, 2).unwrap();
        driver.move_to(3, 3).unwrap();
        assert_eq!(
            driver.bus.commands(),
            vec![CMD_DDRAM | 0x14, CMD_DDRAM | (0x54 + 3)]
        );
    }

    #[test]
    fn four_row_offsets_follow_sixteen_column_width() {
        let mut driver = driver(16, 4);
        driver.move_to(0, 2).unwrap();
        driver.move_to(0, 3).unwrap();
        driver.write_line(3, "lx").unwrap();
        assert_eq!(
            driver.bus.commands(),
            vec![CMD_DDRAM | 0x10, CMD_DDRAM | 0x50, CMD_DDRAM | 0x50]
        );
        assert_eq!(driver.bus.text(), "lx");
    }

    #[test]
    fn steady_state_writes_do_not_clear() {
        let mut driver = driver(16, 2);
        driver.write_line(0, "first").unwrap();
        driver.write_line(0, "second").unwrap();
        assert!(!driver.bus.commands().contains(&CMD_CLEAR));
    }

    #[test]
    fn backlight_off_drops_the_bit_from_later_writes() {
        let mut driver = driver(16, 2);
        driver.set_backlight(Backlight::Off).unwrap();
        driver.write_line(0, "x").unwrap();
        assert_eq!(driver.backlight(), Backlight::Off);
        assert!(driver
            .bus
            .writes
            .iter()
            .all(|&(_, b)| b & (1 << SHIFT_BACKLIGHT) == 0));
    }
}
