#![no_std]
#![no_main]

use panic_rtt_target as _;
use rtt_target::rprintln;

use stm32f3xx_hal::{self as hal, pac, prelude::*};

use core::fmt::Write as _;

mod clock;
mod reporter;
mod sampler;
mod spi_slave;
mod status_leds;

trait ResultWarn {
    fn err_warn(self, msg: &str);
}

impl<T, E> ResultWarn for Result<T, E> {
    fn err_warn(self, msg: &str) {
        match self {
            Ok(_) => (),
            Err(_) => {
                rprintln!("Error: {}", msg);
            }
        }
    }
}

fn get_device_serial(buf: &mut [u8; 16]) -> &str {
    use numtoa::NumToA;

    // SAFETY: Read-only device identifiers
    let coords = unsafe { core::ptr::read_volatile(0x1FFF_F7AC as *const u32) };
    let lotwafer = unsafe { core::ptr::read_volatile(0x1FFF_F7B0 as *const u32) };

    let serial = lotwafer.wrapping_add(coords);
    serial.numtoa_str(16, buf)
}

#[cortex_m_rt::entry]
fn main() -> ! {
    rtt_target::rtt_init_print!();

    let dp = pac::Peripherals::take().unwrap();
    let mut cp = cortex_m::Peripherals::take().unwrap();

    /*
     * Clocks
     * ======
     */

    let mut flash = dp.FLASH.constrain();
    let mut rcc = dp.RCC.constrain();

    let clocks = rcc
        .cfgr
        .use_hse(8u32.MHz())
        .sysclk(48u32.MHz())
        .pclk1(24u32.MHz())
        .freeze(&mut flash.acr);

    assert!(clocks.usbclk_valid());

    rprintln!("Hello World!");

    let mut buf = [0; 16];
    let serial_no = get_device_serial(&mut buf);
    rprintln!("Device Serial: {}", serial_no);
    rprintln!("");

    /*
     * GPIO blocks
     * ===========
     */

    let mut gpioa = dp.GPIOA.split(&mut rcc.ahb);
    let mut gpiob = dp.GPIOB.split(&mut rcc.ahb);
    let mut gpioe = dp.GPIOE.split(&mut rcc.ahb);

    /*
     * Status LEDs
     * ===========
     */

    let mut leds = status_leds::StatusLeds {
        power: gpioe
            .pe9
            .into_push_pull_output(&mut gpioe.moder, &mut gpioe.otyper),
        link: gpioe
            .pe11
            .into_push_pull_output(&mut gpioe.moder, &mut gpioe.otyper),
        error: gpioe
            .pe14
            .into_push_pull_output(&mut gpioe.moder, &mut gpioe.otyper),
    };
    let activity_led = gpioe
        .pe13
        .into_push_pull_output(&mut gpioe.moder, &mut gpioe.otyper);

    leds.set_power(true).err_warn("Failed setting LEDs");

    rprintln!("LEDs initialized.");

    /*
     * Millisecond clock
     * =================
     */

    clock::start(dp.TIM2);

    /*
     * USB FS + virtual serial port
     * ============================
     */

    /*
     * F3 Discovery board has a pull-up resistor on the D+ line.
     * Pull the D+ pin down to send a RESET condition to the USB bus.
     * This forced reset is needed only for development, without it host
     * will not reset your device when you upload new firmware.
     */
    let mut usb_dp = gpioa
        .pa12
        .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper);
    usb_dp.set_low().ok();
    cortex_m::asm::delay(clocks.sysclk().0 / 100);

    let usb = hal::usb::Peripheral {
        usb: dp.USB,
        pin_dm: gpioa.pa11.into_af_push_pull(
            &mut gpioa.moder,
            &mut gpioa.otyper,
            &mut gpioa.afrh,
        ),
        pin_dp: usb_dp.into_af_push_pull(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrh),
    };
    let usb_bus = hal::usb::UsbBus::new(usb);

    let mut serial = usbd_serial::SerialPort::new(&usb_bus);

    let mut usb_dev = usb_device::prelude::UsbDeviceBuilder::new(
        &usb_bus,
        usb_device::prelude::UsbVidPid(0x16c0, 0x27dd),
    )
    .manufacturer("DIY")
    .product("Panel Bridge")
    .serial_number(serial_no)
    .device_class(usbd_serial::USB_CLASS_CDC)
    .build();

    rprintln!("USB device initialized.");

    // Status lines queue up here until the host opens the port (DTR).
    let mut reporter = reporter::Reporter::new();
    reporter.report(
        &mut reporter::SerialSink {
            dev: &mut usb_dev,
            serial: &mut serial,
        },
        "serial link initialized\r\n",
    );

    /*
     * I2C bus + MCP23017 expander
     * ===========================
     */

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

    rprintln!("I2C bus initialized.");

    let mut expander = mcp23017::Mcp23017::new(i2c);
    match expander.init(true) {
        Ok(()) => {
            reporter.report(
                &mut reporter::SerialSink {
                    dev: &mut usb_dev,
                    serial: &mut serial,
                },
                "MCP23017 initialized\r\n",
            );
            rprintln!("MCP23017 initialized.");
        }
        Err(e) => {
            // Not fatal: the panel keeps running, it just won't see buttons
            // until the expander comes back.
            leds.set_error(true).err_warn("Failed setting LEDs");
            rprintln!("Failed to initialize MCP23017: {:?}", e);

            let mut msg = heapless::String::<64>::new();
            write!(msg, "failed to initialize MCP23017: {:?}\r\n", e).ok();
            reporter.report(
                &mut reporter::SerialSink {
                    dev: &mut usb_dev,
                    serial: &mut serial,
                },
                &msg,
            );
        }
    }

    if exp_int.is_low().unwrap() {
        rprintln!("Expander interrupt is asserted when it should not be!");
    }

    sampler::install(expander, activity_led, dp.SYSCFG, dp.EXTI);

    /*
     * SPI slave link to the polling master
     * ====================================
     */

    // Only the pins go through the hal; the peripheral itself is set up at
    // the register level because the hal only models master mode.
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

    spi_slave::install(dp.SPI2);

    /*
     * Interrupts
     * ==========
     */

    // The SPI responder has to meet the master's clock, so it preempts the
    // sampler's slow, blocking capture read. The tick can wait for both.
    unsafe {
        cp.NVIC.set_priority(pac::Interrupt::SPI2, 0x00);
        cp.NVIC.set_priority(pac::Interrupt::EXTI15_10, 0x10);
        cp.NVIC.set_priority(pac::Interrupt::TIM2, 0x20);

        // Unmask last, once all shared state is in place.
        pac::NVIC::unmask(pac::Interrupt::TIM2);
        pac::NVIC::unmask(pac::Interrupt::EXTI15_10);
        pac::NVIC::unmask(pac::Interrupt::SPI2);
    }

    rprintln!("Ready.");
    rprintln!("");

    let mut usb_state = usb_dev.state();
    let mut host_ready_line = false;

    loop {
        usb_dev.poll(&mut [&mut serial]);

        let state = usb_dev.state();
        if state != usb_state {
            usb_state = state;
            leds.set_usb_state(state).err_warn("Failed setting LEDs");
        }

        // Host readiness follows the DTR control line.
        let dtr = serial.dtr();
        if dtr != host_ready_line {
            host_ready_line = dtr;
            reporter.host_ready_changed(
                &mut reporter::SerialSink {
                    dev: &mut usb_dev,
                    serial: &mut serial,
                },
                dtr,
            );
        }

        // Throw away whatever the host sends; an unread OUT buffer would
        // eventually stall the port.
        let mut recv = [0u8; 64];
        let _ = serial.read(&mut recv);
    }
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("Hard Fault: {:#?}", ef);
}
