//! Register transport for the sensor.
//!
//! The driver only needs three primitives against one fixed device address:
//! read a register, write a register, and read a run of contiguous registers.
//! [`I2cRegisters`] provides them over any [`embedded_hal::i2c::I2c`] bus.
//!
//! # Example (Linux)
//!
//! ```rust,ignore
//! use roomclock::{open_linux_bus, Bme280, SensorConfig};
//!
//! let bus = open_linux_bus(&SensorConfig::default())?;
//! let mut sensor = Bme280::new(bus);
//! sensor.initialize()?;
//! ```

use embedded_hal::i2c::I2c;

use crate::error::Error;

/// Byte-wide register access to one device.
///
/// Failures are returned as-is; implementations must not retry.
pub trait RegisterBus {
    /// Read one register.
    fn read_register(&mut self, register: u8) -> Result<u8, Error>;

    /// Write one register.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error>;

    /// Read `buf.len()` contiguous registers starting at `start`.
    ///
    /// The default issues one [`read_register`](Self::read_register) per byte.
    /// Transports that support it should override this with a single burst
    /// transaction so the bytes belong to the same sample.
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), Error> {
        for (offset, byte) in buf.iter_mut().enumerate() {
            let register = u8::try_from(offset)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| {
                    Error::Bus(format!("register range overflows at 0x{:02X}", start))
                })?;
            *byte = self.read_register(register)?;
        }
        Ok(())
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        (**self).write_register(register, value)
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_registers(start, buf)
    }
}

/// [`RegisterBus`] over an embedded-hal I2C bus, bound to one 7-bit address.
#[derive(Debug)]
pub struct I2cRegisters<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cRegisters<I> {
    /// Bind `i2c` to the device at `address`.
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Get the device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }
}

fn bus_error<E: embedded_hal::i2c::Error>(err: E) -> Error {
    Error::Bus(err.kind().to_string())
}

impl<I: I2c> RegisterBus for I2cRegisters<I> {
    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut data = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut data)
            .map_err(bus_error)?;
        Ok(data[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(bus_error)
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.i2c
            .write_read(self.address, &[start], buf)
            .map_err(bus_error)
    }
}

/// Open `/dev/i2c-{bus}` and bind it to the configured sensor address.
#[cfg(feature = "linux")]
pub fn open_linux_bus(
    config: &crate::SensorConfig,
) -> Result<I2cRegisters<linux_embedded_hal::I2cdev>, Error> {
    let path = config.device_path();
    let i2c = linux_embedded_hal::I2cdev::new(&path)
        .map_err(|e| Error::Io(format!("Failed to open {}: {}", path, e)))?;
    tracing::info!(
        "Opened {} for sensor at 0x{:02X}",
        path,
        config.address
    );
    Ok(I2cRegisters::new(i2c, config.address))
}
