//! Free-running millisecond clock.
//!
//! TIM2 fires once per millisecond and its handler does nothing but bump a
//! shared counter. The counter wraps after about 49 days; all elapsed-time
//! math on it must use `wrapping_sub`.

use core::cell::{Cell, RefCell};

use cortex_m::interrupt::Mutex;
use stm32f3xx_hal::pac::{self, interrupt};

static TIMER: Mutex<RefCell<Option<pac::TIM2>>> = Mutex::new(RefCell::new(None));
static MILLISECONDS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

/// Start the 1 kHz tick.
///
/// TIM2 is clocked at twice PCLK1 (48 MHz with our clock tree): prescale to
/// 1 MHz and reload every 1000 counts. The interrupt stays masked in the
/// NVIC until `main` unmasks it.
pub fn start(tim: pac::TIM2) {
    // SAFETY: only the TIM2 clock-enable bit is touched.
    unsafe {
        let rcc = &(*pac::RCC::ptr());
        rcc.apb1enr.modify(|_, w| w.tim2en().set_bit());
    }

    tim.psc.write(|w| unsafe { w.bits(47) });
    tim.arr.write(|w| unsafe { w.bits(999) });
    tim.dier.write(|w| w.uie().set_bit());
    tim.cr1.modify(|_, w| w.cen().set_bit());

    cortex_m::interrupt::free(|cs| {
        TIMER.borrow(cs).replace(Some(tim));
    });
}

/// Current value of the millisecond counter.
pub fn now_ms() -> u32 {
    cortex_m::interrupt::free(|cs| MILLISECONDS.borrow(cs).get())
}

#[interrupt]
fn TIM2() {
    cortex_m::interrupt::free(|cs| {
        if let Some(tim) = TIMER.borrow(cs).borrow_mut().as_mut() {
            tim.sr.modify(|_, w| w.uif().clear_bit());
        }
        let ms = MILLISECONDS.borrow(cs);
        ms.set(ms.get().wrapping_add(1));
    });
}
