#![no_std]

//! Driver for the MCP23017 I2C port expander, register-level.
//!
//! Only port A is set up by [`Mcp23017::init`] — the panel uses it as an
//! 8-button input bank — but the full register map is exposed for direct
//! access to either port.
//!
//! Datasheet: <http://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf>

use embedded_hal::blocking::i2c as hal_i2c;

/// Device address with all three hardware address pins grounded.
pub const DEFAULT_ADDRESS: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpanderError {
    /// A bus transaction was not acknowledged. Distinct from a valid `0x00`
    /// register read.
    BusError,
}

/// Register map with `IOCON.BANK = 0` (port A/B registers interleaved).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// I/O Direction, port A (1 = input)
    IODIRA = 0x00,
    /// I/O Direction, port B
    IODIRB = 0x01,
    /// Input Polarity, port A (1 = inverted)
    IPOLA = 0x02,
    /// Input Polarity, port B
    IPOLB = 0x03,
    /// Interrupt-on-Change Enable, port A
    GPINTENA = 0x04,
    /// Interrupt-on-Change Enable, port B
    GPINTENB = 0x05,
    /// Default Compare value for interrupts, port A
    DEFVALA = 0x06,
    /// Default Compare value for interrupts, port B
    DEFVALB = 0x07,
    /// Interrupt Control, port A (0 = compare against previous value)
    INTCONA = 0x08,
    /// Interrupt Control, port B
    INTCONB = 0x09,
    /// Device Configuration
    IOCON = 0x0A,
    /// Pull-Up Enable, port A
    GPPUA = 0x0C,
    /// Pull-Up Enable, port B
    GPPUB = 0x0D,
    /// Interrupt Flags, port A
    INTFA = 0x0E,
    /// Interrupt Flags, port B
    INTFB = 0x0F,
    /// Interrupt Capture, port A (pin states at the moment of interrupt)
    INTCAPA = 0x10,
    /// Interrupt Capture, port B
    INTCAPB = 0x11,
    /// Live pin values, port A
    GPIOA = 0x12,
    /// Live pin values, port B
    GPIOB = 0x13,
    /// Output Latches, port A
    OLATA = 0x14,
    /// Output Latches, port B
    OLATB = 0x15,
}

/// Driver for one MCP23017.
pub struct Mcp23017<I2C> {
    bus: I2C,
    address: u8,
}

impl<I2C, E> Mcp23017<I2C>
where
    I2C: hal_i2c::Write<Error = E> + hal_i2c::WriteRead<Error = E>,
{
    pub fn new(bus: I2C) -> Self {
        Self::with_address(bus, DEFAULT_ADDRESS)
    }

    pub fn with_address(bus: I2C, address: u8) -> Self {
        Self { bus, address }
    }

    /// Configure port A as an inverted-polarity button bank.
    ///
    /// All port A pins become pulled-up inputs with inverted polarity, so
    /// active-low buttons read 1 when pressed. With `interrupts`, the
    /// expander additionally drives INTA (active-low) on any pin change,
    /// comparing each pin against its previous value; the live and capture
    /// registers are then read once to discard any interrupt pending from
    /// before setup.
    pub fn init(&mut self, interrupts: bool) -> Result<(), ExpanderError> {
        // BANK = 0, sequential addressing, active-driver INT output pulled
        // low on interrupt. All of that is the reset state, but the device
        // may not have been reset with us.
        self.write_register(Register::IOCON, 0x00)?;
        self.write_register(Register::IODIRA, 0xFF)?;
        self.write_register(Register::IPOLA, 0xFF)?;
        self.write_register(Register::GPPUA, 0xFF)?;

        if interrupts {
            self.write_register(Register::GPINTENA, 0xFF)?;
            self.write_register(Register::INTCONA, 0x00)?;
        }

        self.read_register(Register::GPIOA)?;
        self.read_register(Register::INTCAPA)?;
        Ok(())
    }

    /// Write one register: start, device address, register address, data,
    /// stop.
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), ExpanderError> {
        self.bus
            .write(self.address, &[register as u8, value])
            .map_err(|_| ExpanderError::BusError)
    }

    /// Read one register: the register address is written first, then a
    /// repeated start switches to read mode for a single unacknowledged data
    /// byte.
    pub fn read_register(&mut self, register: Register) -> Result<u8, ExpanderError> {
        let mut buf = [0x00];
        self.bus
            .write_read(self.address, &[register as u8], &mut buf)
            .map_err(|_| ExpanderError::BusError)?;
        Ok(buf[0])
    }

    /// Snapshot of the port A pin states captured at the last interrupt.
    ///
    /// Reading this also releases the INTA line.
    pub fn interrupt_capture(&mut self) -> Result<u8, ExpanderError> {
        self.read_register(Register::INTCAPA)
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.bus
    }
}

/// Bit-flags for the IOCON (device configuration) register.
pub mod iocon {
    pub const BANK: u8 = 0x80;
    pub const MIRROR: u8 = 0x40;
    pub const SEQOP: u8 = 0x20;
    pub const DISSLW: u8 = 0x10;
    pub const HAEN: u8 = 0x08;
    pub const ODR: u8 = 0x04;
    pub const INTPOL: u8 = 0x02;
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Transaction {
        Write(u8, Vec<u8>),
        WriteRead(u8, Vec<u8>),
    }

    /// Mock bus recording every transaction; reads answer `read_value` and
    /// everything fails once `fail` is set.
    #[derive(Default)]
    struct MockBus {
        transactions: Vec<Transaction>,
        read_value: u8,
        fail: bool,
    }

    impl hal_i2c::Write for MockBus {
        type Error = ();

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
            self.transactions
                .push(Transaction::Write(address, bytes.to_vec()));
            if self.fail {
                Err(())
            } else {
                Ok(())
            }
        }
    }

    impl hal_i2c::WriteRead for MockBus {
        type Error = ();

        fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
            self.transactions
                .push(Transaction::WriteRead(address, bytes.to_vec()));
            if self.fail {
                return Err(());
            }
            for b in buffer.iter_mut() {
                *b = self.read_value;
            }
            Ok(())
        }
    }

    #[test]
    fn init_configures_port_a_in_order() {
        let mut mcp = Mcp23017::new(MockBus::default());
        mcp.init(true).unwrap();

        let bus = mcp.release();
        assert_eq!(
            bus.transactions,
            vec![
                Transaction::Write(0x20, vec![0x0A, 0x00]), // IOCON
                Transaction::Write(0x20, vec![0x00, 0xFF]), // IODIRA
                Transaction::Write(0x20, vec![0x02, 0xFF]), // IPOLA
                Transaction::Write(0x20, vec![0x0C, 0xFF]), // GPPUA
                Transaction::Write(0x20, vec![0x04, 0xFF]), // GPINTENA
                Transaction::Write(0x20, vec![0x08, 0x00]), // INTCONA
                Transaction::WriteRead(0x20, vec![0x12]),   // GPIOA discard
                Transaction::WriteRead(0x20, vec![0x10]),   // INTCAPA discard
            ]
        );
    }

    #[test]
    fn init_without_interrupts_skips_interrupt_registers() {
        let mut mcp = Mcp23017::new(MockBus::default());
        mcp.init(false).unwrap();

        let bus = mcp.release();
        assert!(!bus
            .transactions
            .iter()
            .any(|t| matches!(t, Transaction::Write(_, bytes) if bytes[0] == 0x04)));
    }

    #[test]
    fn read_register_uses_repeated_start_transaction() {
        let mut bus = MockBus::default();
        bus.read_value = 0xA5;
        let mut mcp = Mcp23017::new(bus);

        assert_eq!(mcp.read_register(Register::INTCAPA).unwrap(), 0xA5);
        let bus = mcp.release();
        assert_eq!(
            bus.transactions,
            vec![Transaction::WriteRead(0x20, vec![0x10])]
        );
    }

    #[test]
    fn bus_failure_is_an_error_not_a_zero_read() {
        let mut bus = MockBus::default();
        bus.fail = true;
        let mut mcp = Mcp23017::new(bus);

        assert_eq!(
            mcp.read_register(Register::GPIOA),
            Err(ExpanderError::BusError)
        );
        assert_eq!(mcp.init(true), Err(ExpanderError::BusError));
    }

    #[test]
    fn custom_address_is_used_on_the_bus() {
        let mut mcp = Mcp23017::with_address(MockBus::default(), 0x27);
        mcp.write_register(Register::OLATA, 0x55).unwrap();

        let bus = mcp.release();
        assert_eq!(bus.transactions, vec![Transaction::Write(0x27, vec![0x14, 0x55])]);
    }
}
