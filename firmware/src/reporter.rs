//! Status output over the CDC serial port.

use usb_device::bus::UsbBus;
use usb_device::device::UsbDevice;
use usbd_serial::SerialPort;

use common::report::{StatusReporter, StatusSink};

/// Capacity of the pre-connection status backlog.
pub const BACKLOG_CAPACITY: usize = 1024;

/// Reporter with the firmware's backlog capacity.
pub type Reporter = StatusReporter<BACKLOG_CAPACITY>;

/// Best-effort sink writing to the live CDC stream.
///
/// The class buffers outgoing data in chunks far smaller than the backlog,
/// so on a short write the device is polled until space opens up again. If
/// the host disappears mid-write, the rest of the message is dropped.
pub struct SerialSink<'a, 'b, B: UsbBus> {
    pub dev: &'a mut UsbDevice<'b, B>,
    pub serial: &'a mut SerialPort<'b, B>,
}

impl<'a, 'b, B: UsbBus> StatusSink for SerialSink<'a, 'b, B> {
    fn write_all(&mut self, data: &[u8]) {
        let mut offset = 0;
        while offset < data.len() {
            match self.serial.write(&data[offset..]) {
                Ok(len) if len > 0 => offset += len,
                Ok(_) | Err(usb_device::UsbError::WouldBlock) => {
                    self.dev.poll(&mut [&mut *self.serial]);
                }
                Err(_) => break,
            }
        }
    }
}
