use crate::{lcd_driver::I2cBus, Error, Result};

#[cfg(target_os = "linux")]
fn map_i2c_err(err: rppal::i2c::Error) -> Error {
    Error::Io(std::io::Error::other(err.to_string()))
}

/// PCF8574 backpack on a Linux I2C bus via rppal.
#[cfg(target_os = "linux")]
pub struct RppalBus {
    inner: rppal::i2c::I2c,
    selected: Option<u8>,
}

#[cfg(target_os = "linux")]
impl RppalBus {
    /// Open `/dev/i2c-<bus>`.
    pub fn open(bus: u8) -> Result<Self> {
        let inner = rppal::i2c::I2c::with_bus(bus).map_err(map_i2c_err)?;
        Ok(Self {
            inner,
            selected: None,
        })
    }

    /// First address in `candidates` that acknowledges a write, or `fallback`.
    pub fn detect_address(&mut self, candidates: &[u8], fallback: u8) -> u8 {
        for &addr in candidates {
            if self.inner.set_slave_address(addr.into()).is_ok() && self.inner.write(&[0]).is_ok()
            {
                self.selected = Some(addr);
                return addr;
            }
        }
        fallback
    }
}

#[cfg(target_os = "linux")]
impl I2cBus for RppalBus {
    fn write_byte(&mut self, addr: u8, byte: u8) -> Result<()> {
        if self.selected != Some(addr) {
            self.inner
                .set_slave_address(addr.into())
                .map_err(map_i2c_err)?;
            self.selected = Some(addr);
        }
        self.inner.write(&[byte]).map_err(map_i2c_err)?;
        Ok(())
    }
}

/// Non-Linux stub so the crate builds on dev hosts; opening always fails.
#[cfg(not(target_os = "linux"))]
pub struct RppalBus;

#[cfg(not(target_os = "linux"))]
impl RppalBus {
    pub fn open(_bus: u8) -> Result<Self> {
        Err(Error::Display(
            "I2C LCD output is only available on Linux targets".into(),
        ))
    }

    pub fn detect_address(&mut self, _candidates: &[u8], fallback: u8) -> u8 {
        fallback
    }
}

#[cfg(not(target_os = "linux"))]
impl I2cBus for RppalBus {
    fn write_byte(&mut self, _addr: u8, _byte: u8) -> Result<()> {
        Err(Error::Display(
            "I2C LCD output is only available on Linux targets".into(),
        ))
    }
}
