//! SPI slave responder for the polling master.
//!
//! SPI2 runs as a hardware-NSS slave; the master owns the clock, so the
//! response to a command has to be in the data register before the master
//! starts the following transfer. The handler therefore only ever moves one
//! byte between the data register and the button accumulator. No bus I/O,
//! nothing that blocks.

use core::cell::RefCell;

use cortex_m::interrupt::Mutex;
use stm32f3xx_hal::pac::{self, interrupt};

use common::poll;

use crate::sampler::BUTTONS;

static RESPONDER: Mutex<RefCell<Option<pac::SPI2>>> = Mutex::new(RefCell::new(None));

/// Put SPI2 into slave mode (8-bit frames, mode 0, hardware NSS) and enable
/// the receive interrupt.
///
/// Pins must already be configured for their SPI2 alternate function. The
/// data register is pre-loaded so the very first transfer answers zero
/// instead of whatever the register held at reset. The SPI2 interrupt stays
/// masked in the NVIC until `main` unmasks it.
pub fn install(spi: pac::SPI2) {
    // SAFETY: only the SPI2 clock-enable bit is touched.
    unsafe {
        let rcc = &(*pac::RCC::ptr());
        rcc.apb1enr.modify(|_, w| w.spi2en().set_bit());
    }

    spi.cr2.write(|w| {
        // 8-bit frames, RXNE as soon as a single byte arrived.
        unsafe { w.ds().bits(0b0111) };
        w.frxth().set_bit().rxneie().set_bit()
    });
    write_dr(&spi, 0x00);
    // MSTR stays clear: slave mode, NSS driven by the master.
    spi.cr1.modify(|_, w| w.spe().set_bit());

    cortex_m::interrupt::free(|cs| {
        RESPONDER.borrow(cs).replace(Some(spi));
    });
}

/// The data register must be accessed as a single byte: a 16-bit access
/// would be packed into two 8-bit frames by the TX FIFO (RM0316 28.4.13).
fn write_dr(spi: &pac::SPI2, value: u8) {
    // SAFETY: byte-wide volatile access to SPI2_DR.
    unsafe { core::ptr::write_volatile(&spi.dr as *const _ as *mut u8, value) };
}

fn read_dr(spi: &pac::SPI2) -> u8 {
    // SAFETY: see write_dr().
    unsafe { core::ptr::read_volatile(&spi.dr as *const _ as *const u8) }
}

#[interrupt]
fn SPI2() {
    static mut SPI: Option<pac::SPI2> = None;

    if SPI.is_none() {
        cortex_m::interrupt::free(|cs| {
            *SPI = RESPONDER.borrow(cs).take();
        });
    }

    let spi = match SPI {
        Some(spi) => spi,
        None => return,
    };

    if spi.sr.read().rxne().bit_is_set() {
        let command = read_dr(spi);
        let response = cortex_m::interrupt::free(|cs| {
            let buttons = BUTTONS.borrow(cs);
            let mut accumulator = buttons.get();
            let response = poll::respond(command, &mut accumulator);
            buttons.set(accumulator);
            response
        });
        // Becomes visible to the master on its next transfer.
        write_dr(spi, response);
    }

    if spi.sr.read().ovr().bit_is_set() {
        // Overrun clear sequence: read DR, then SR.
        let _ = read_dr(spi);
        let _ = spi.sr.read();
    }
}
