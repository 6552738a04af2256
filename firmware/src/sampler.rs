//! Debounced sampling of the expander buttons.
//!
//! The expander pulls its INTA line low whenever a port A pin changes; that
//! line is wired to PA10 and routed to EXTI line 10. The handler debounces
//! the edge against the millisecond clock, reads the interrupt capture
//! register (the pin states at the moment of the change) and ORs every set
//! bit into the shared accumulator. Bits stay set until the SPI master
//! drains them, so presses between two polls accumulate instead of
//! overwriting each other.

use core::cell::{Cell, RefCell};

use cortex_m::interrupt::Mutex;
use embedded_hal::digital::v2::OutputPin;
use stm32f3xx_hal::gpio;
use stm32f3xx_hal::pac::{self, interrupt};

use common::debounce::EdgeFilter;
use mcp23017::Mcp23017;

use crate::clock;

type Scl = gpio::gpiob::PB6<gpio::Alternate<gpio::OpenDrain, 4>>;
type Sda = gpio::gpiob::PB7<gpio::Alternate<gpio::OpenDrain, 4>>;

/// The I2C bus with the expander on it.
pub type ExpanderBus = stm32f3xx_hal::i2c::I2c<pac::I2C1, (Scl, Sda)>;

/// LED flashed while a capture is read.
pub type ActivityLed = gpio::gpioe::PE13<gpio::Output<gpio::PushPull>>;

/// Buttons seen pressed since the last poll, one bit per input line.
///
/// Set here on accepted edges, drained by the SPI responder. Only ever
/// touched inside `interrupt::free` sections.
pub static BUTTONS: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

static SAMPLER: Mutex<RefCell<Option<InputSampler>>> = Mutex::new(RefCell::new(None));

struct InputSampler {
    expander: Mcp23017<ExpanderBus>,
    activity_led: ActivityLed,
    filter: EdgeFilter,
    exti: pac::EXTI,
}

/// Route PA10 to EXTI line 10, trigger on the falling edge of INTA, and hand
/// the expander over to the interrupt handler.
///
/// The EXTI15_10 interrupt stays masked in the NVIC until `main` unmasks it.
pub fn install(
    expander: Mcp23017<ExpanderBus>,
    activity_led: ActivityLed,
    syscfg: pac::SYSCFG,
    exti: pac::EXTI,
) {
    // SAFETY: only the SYSCFG clock-enable bit is touched.
    unsafe {
        let rcc = &(*pac::RCC::ptr());
        rcc.apb2enr.modify(|_, w| w.syscfgen().set_bit());
    }

    // EXTI10 <- port A
    syscfg.exticr3.modify(|_, w| unsafe { w.exti10().bits(0b0000) });
    exti.ftsr1.modify(|_, w| w.tr10().set_bit());
    exti.imr1.modify(|_, w| w.mr10().set_bit());

    cortex_m::interrupt::free(|cs| {
        SAMPLER.borrow(cs).replace(Some(InputSampler {
            expander,
            activity_led,
            filter: EdgeFilter::new(),
            exti,
        }));
    });
}

impl InputSampler {
    fn handle_edge(&mut self) {
        // Acknowledge the edge first: a change arriving during the capture
        // read re-pends the interrupt instead of getting lost.
        self.exti.pr1.write(|w| w.pr10().set_bit());

        if !self.filter.accept(clock::now_ms()) {
            return;
        }

        self.activity_led.set_high().ok();
        // A failed capture read counts as "no buttons seen"; bus health is
        // checked and reported at init time, not from here.
        if let Ok(capture) = self.expander.interrupt_capture() {
            cortex_m::interrupt::free(|cs| {
                let buttons = BUTTONS.borrow(cs);
                buttons.set(buttons.get() | capture);
            });
        }
        self.activity_led.set_low().ok();
    }
}

#[interrupt]
fn EXTI15_10() {
    // Owned by this handler after the first edge; the blocking capture read
    // then runs without holding a critical section, so the SPI responder can
    // still preempt it.
    static mut SAMPLER_STATE: Option<InputSampler> = None;

    if SAMPLER_STATE.is_none() {
        cortex_m::interrupt::free(|cs| {
            *SAMPLER_STATE = SAMPLER.borrow(cs).take();
        });
    }

    if let Some(sampler) = SAMPLER_STATE {
        sampler.handle_edge();
    }
}
