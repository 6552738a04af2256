#![no_std]
#![no_main]

use panic_rtt_target as _;
use rtt_target::rprintln;

use stm32f3xx_hal::{self as hal, pac, prelude::*};

use mcp23017::{Mcp23017, Register};

#[cortex_m_rt::entry]
fn main() -> ! {
    rtt_target::rtt_init_print!();

    let dp = pac::Peripherals::take().unwrap();

    let mut flash = dp.FLASH.constrain();
    let mut rcc = dp.RCC.constrain();

    let clocks = rcc
        .cfgr
        .use_hse(8u32.MHz())
        .sysclk(48u32.MHz())
        .pclk1(24u32.MHz())
        .freeze(&mut flash.acr);

    let mut gpioa = dp.GPIOA.split(&mut rcc.ahb);
    let mut gpiob = dp.GPIOB.split(&mut rcc.ahb);

    let mut scl =
        gpiob
            .pb6
            .into_af_open_drain(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrl);
    let mut sda =
        gpiob
            .pb7
            .into_af_open_drain(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrl);
    scl.internal_pull_up(&mut gpiob.pupdr, true);
    sda.internal_pull_up(&mut gpiob.pupdr, true);

    let exp_int = gpioa
        .pa10
        .into_floating_input(&mut gpioa.moder, &mut gpioa.pupdr);

    let i2c = hal::i2c::I2c::new(dp.I2C1, (scl, sda), 100_000.Hz(), clocks, &mut rcc.apb1);

    rprintln!("Initialization completed.");

    let mut mcp = Mcp23017::new(i2c);
    match mcp.init(true) {
        Ok(()) => rprintln!("MCP23017 initialized."),
        Err(e) => rprintln!("MCP23017 init failed: {:?}", e),
    }

    if exp_int.is_low().unwrap() {
        rprintln!("INTA is asserted when it should not be!");
    }

    rprintln!("Ready for the action!");

    loop {
        rprintln!("Waiting for interrupt...");
        while exp_int.is_high().unwrap() {}

        // Which pins changed, and what the port looked like at that moment.
        let flags = mcp.read_register(Register::INTFA);
        let capture = mcp.interrupt_capture();
        let live = mcp.read_register(Register::GPIOA);

        match (flags, capture, live) {
            (Ok(flags), Ok(capture), Ok(live)) => {
                rprintln!(
                    "INTFA: {:08b}  INTCAPA: {:08b}  GPIOA: {:08b}",
                    flags,
                    capture,
                    live
                );
            }
            _ => rprintln!("Bus error while reading the interrupt state"),
        }
    }
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("Hard Fault: {:#?}", ef);
}
