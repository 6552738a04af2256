#![no_std]
#![no_main]

use panic_rtt_target as _;
use rtt_target::rprintln;

use stm32f3xx_hal::{self as hal, pac, prelude::*};

/// The data register must be accessed as a single byte for 8-bit frames, or
/// the TX FIFO packs the access into two frames.
fn write_dr(spi: &pac::SPI2, value: u8) {
    unsafe { core::ptr::write_volatile(&spi.dr as *const _ as *mut u8, value) };
}

fn read_dr(spi: &pac::SPI2) -> u8 {
    unsafe { core::ptr::read_volatile(&spi.dr as *const _ as *const u8) }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    rtt_target::rtt_init_print!();

    let dp = pac::Peripherals::take().unwrap();

    let mut flash = dp.FLASH.constrain();
    let mut rcc = dp.RCC.constrain();

    let _clocks = rcc
        .cfgr
        .use_hse(8u32.MHz())
        .sysclk(48u32.MHz())
        .pclk1(24u32.MHz())
        .freeze(&mut flash.acr);

    let mut gpiob = dp.GPIOB.split(&mut rcc.ahb);

    let _nss: hal::gpio::gpiob::PB12<hal::gpio::Alternate<hal::gpio::PushPull, 5>> = gpiob
        .pb12
        .into_af_push_pull(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrh);
    let _sck: hal::gpio::gpiob::PB13<hal::gpio::Alternate<hal::gpio::PushPull, 5>> = gpiob
        .pb13
        .into_af_push_pull(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrh);
    let _miso: hal::gpio::gpiob::PB14<hal::gpio::Alternate<hal::gpio::PushPull, 5>> = gpiob
        .pb14
        .into_af_push_pull(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrh);
    let _mosi: hal::gpio::gpiob::PB15<hal::gpio::Alternate<hal::gpio::PushPull, 5>> = gpiob
        .pb15
        .into_af_push_pull(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrh);

    // SPI2 as a mode 0 slave with hardware NSS, 8-bit frames. Echo every
    // received byte back on the next transfer: wire up a master, clock a
    // sequence through and it should come back shifted by one byte.
    let spi = dp.SPI2;
    unsafe {
        let rcc = &(*pac::RCC::ptr());
        rcc.apb1enr.modify(|_, w| w.spi2en().set_bit());
    }

    spi.cr2.write(|w| {
        unsafe { w.ds().bits(0b0111) };
        w.frxth().set_bit()
    });
    write_dr(&spi, 0x00);
    spi.cr1.modify(|_, w| w.spe().set_bit());

    rprintln!("SPI2 slave ready, echoing.");

    loop {
        if spi.sr.read().rxne().bit_is_set() {
            let byte = read_dr(&spi);
            write_dr(&spi, byte);
            rprintln!("echoed {:#04x}", byte);
        }

        if spi.sr.read().ovr().bit_is_set() {
            let _ = read_dr(&spi);
            let _ = spi.sr.read();
            rprintln!("overrun cleared");
        }
    }
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("Hard Fault: {:#?}", ef);
}
