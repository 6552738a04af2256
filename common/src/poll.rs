//! Single-byte command/response protocol served to the SPI master.
//!
//! The master clocks one command byte out and reads the response on its
//! *next* transfer (the slave's data register is double-buffered). The only
//! recognized command drains the button accumulator; everything else is a
//! no-op answering zero.

/// Command byte: "return the buttons pressed since the last poll and clear".
pub const POLL_BUTTONS: u8 = 0x80;

/// Compute the response to one received command byte.
///
/// [`POLL_BUTTONS`] takes the accumulator's current value as the response and
/// resets it to zero in the same step, so a button press is reported to
/// exactly one poll. Any other command responds zero and leaves the
/// accumulator untouched.
///
/// The caller is responsible for making the read-modify-write of the
/// accumulator atomic with respect to the input sampler.
pub fn respond(command: u8, accumulator: &mut u8) -> u8 {
    if command == POLL_BUTTONS {
        let drained = *accumulator;
        *accumulator = 0;
        drained
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_drains_the_accumulator() {
        let mut acc = 0b0000_0011;
        assert_eq!(respond(POLL_BUTTONS, &mut acc), 0b0000_0011);
        assert_eq!(acc, 0);
    }

    #[test]
    fn second_poll_reads_zero() {
        let mut acc = 0b1010_0000;
        assert_eq!(respond(POLL_BUTTONS, &mut acc), 0b1010_0000);
        assert_eq!(respond(POLL_BUTTONS, &mut acc), 0);
    }

    #[test]
    fn unrecognized_commands_answer_zero_and_keep_state() {
        let mut acc = 0b0001_1000;
        for command in (0..=u8::MAX).filter(|&c| c != POLL_BUTTONS) {
            assert_eq!(respond(command, &mut acc), 0);
            assert_eq!(acc, 0b0001_1000);
        }
    }

    #[test]
    fn presses_accumulate_between_polls() {
        let mut acc = 0;
        // Two accepted edges with different capture snapshots, then a poll.
        acc |= 0b0000_0001;
        acc |= 0b0000_0010;
        assert_eq!(respond(POLL_BUTTONS, &mut acc), 0b0000_0011);
    }
}
