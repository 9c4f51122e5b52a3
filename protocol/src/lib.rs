#![no_std]
#![allow(non_camel_case_types)]

//! Wire-level types shared by the USB-SPI bridge firmware and host tools
//!
//! Everything here is CDC-ACM (PSTN subclass) framing: the class request codes
//! the bridge answers, the 7-byte line coding record, the control line bits
//! and the SERIAL_STATE notification.

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use enumn::N;

/// `bmRequestType` bit 7: set for device-to-host requests
pub const REQUEST_DIR_DEVICE_TO_HOST: u8 = 0x80;
/// `bmRequestType` bits 6..5
pub const REQUEST_TYPE_MASK: u8 = 0x60;
pub const REQUEST_TYPE_STANDARD: u8 = 0x00;
pub const REQUEST_TYPE_CLASS: u8 = 0x20;
pub const REQUEST_TYPE_VENDOR: u8 = 0x40;
/// `bmRequestType` bits 4..0
pub const REQUEST_RECIPIENT_MASK: u8 = 0x1f;
pub const REQUEST_RECIPIENT_INTERFACE: u8 = 0x01;

/// Length of the line coding record exchanged by GET/SET_LINE_CODING
pub const LINE_CODING_LEN: usize = 7;

/// Length of a SERIAL_STATE notification, header plus 2 data bytes
pub const SERIAL_STATE_NOTIFICATION_LEN: usize = 10;

/// Class-specific requests on the communications interface
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u8)]
pub enum ClassRequest {
    SEND_ENCAPSULATED_COMMAND = 0x00,
    GET_ENCAPSULATED_RESPONSE = 0x01,
    SET_COMM_FEATURE = 0x02,
    GET_COMM_FEATURE = 0x03,
    CLEAR_COMM_FEATURE = 0x04,
    SET_LINE_CODING = 0x20,
    GET_LINE_CODING = 0x21,
    SET_CONTROL_LINE_STATE = 0x22,
    /// wValue carries the break duration; the bridge uses bit 0 as a level
    SEND_BREAK = 0x23,
}

/// `bNotification` codes sent on the interrupt endpoint
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u8)]
pub enum Notification {
    NETWORK_CONNECTION = 0x00,
    RESPONSE_AVAILABLE = 0x01,
    SERIAL_STATE = 0x20,
}

bitflags! {
    /// wValue of SET_CONTROL_LINE_STATE
    pub struct ControlLineState: u16 {
        /// Data Terminal Ready, drives the chip select / DTS line
        const DTR = 0x0001;
        /// Request To Send / carrier activation
        const RTS = 0x0002;
    }
}

bitflags! {
    /// Data field of the SERIAL_STATE notification
    pub struct SerialState: u16 {
        /// bRxCarrier, DCD
        const DCD = 0x0001;
        /// bTxCarrier, DSR
        const DSR = 0x0002;
        const BREAK = 0x0004;
        const RING = 0x0008;
        const FRAMING = 0x0010;
        const PARITY = 0x0020;
        const OVERRUN = 0x0040;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u8)]
pub enum StopBits {
    One = 0,
    OnePointFive = 1,
    Two = 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u8)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
    Mark = 3,
    Space = 4,
}

/// The line coding record, `dwDTERate`, `bCharFormat`, `bParityType`, `bDataBits`
///
/// Fields are kept as raw bytes so a record written by the host reads back
/// verbatim, even when it holds values this crate has no name for.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineCoding {
    pub baud: u32,
    pub stop_bits: u8,
    pub parity: u8,
    pub data_bits: u8,
}

impl LineCoding {
    pub const fn new(baud: u32, stop_bits: u8, parity: u8, data_bits: u8) -> Self {
        Self {
            baud,
            stop_bits,
            parity,
            data_bits,
        }
    }

    /// Returns `None` if `buf` is shorter than [`LINE_CODING_LEN`]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < LINE_CODING_LEN {
            return None;
        }

        Some(Self {
            baud: LittleEndian::read_u32(&buf[0..4]),
            stop_bits: buf[4],
            parity: buf[5],
            data_bits: buf[6],
        })
    }

    pub fn encode(&self) -> [u8; LINE_CODING_LEN] {
        let mut buf = [0; LINE_CODING_LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.baud);
        buf[4] = self.stop_bits;
        buf[5] = self.parity;
        buf[6] = self.data_bits;
        buf
    }

    pub fn stop_bits(&self) -> Option<StopBits> {
        StopBits::n(self.stop_bits)
    }

    pub fn parity(&self) -> Option<Parity> {
        Parity::n(self.parity)
    }
}

impl Default for LineCoding {
    /// 9600 baud, 8N1
    fn default() -> Self {
        Self::new(9600, StopBits::One as u8, Parity::None as u8, 8)
    }
}

/// SERIAL_STATE notification sent to the host after the port is opened
///
/// Some host serial stacks only let a tty be opened once carrier detect has
/// been reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SerialStateNotification {
    /// Communications interface number, sent as wIndex
    pub interface: u16,
    pub state: SerialState,
}

impl SerialStateNotification {
    /// Carrier present: DCD and DSR set
    pub fn carrier(interface: u16) -> Self {
        Self {
            interface,
            state: SerialState::DCD | SerialState::DSR,
        }
    }

    pub fn encode(&self) -> [u8; SERIAL_STATE_NOTIFICATION_LEN] {
        let mut buf = [0; SERIAL_STATE_NOTIFICATION_LEN];
        buf[0] = REQUEST_DIR_DEVICE_TO_HOST | REQUEST_TYPE_CLASS | REQUEST_RECIPIENT_INTERFACE;
        buf[1] = Notification::SERIAL_STATE as u8;
        // wValue stays zero
        LittleEndian::write_u16(&mut buf[4..6], self.interface);
        LittleEndian::write_u16(&mut buf[6..8], 2);
        LittleEndian::write_u16(&mut buf[8..10], self.state.bits());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_requests_decode() {
        assert_eq!(ClassRequest::n(0x21), Some(ClassRequest::GET_LINE_CODING));
        assert_eq!(ClassRequest::n(0x23), Some(ClassRequest::SEND_BREAK));
        assert_eq!(ClassRequest::n(0x10), None);
    }

    #[test]
    fn line_coding_is_little_endian() {
        let coding = LineCoding::decode(&[0x80, 0x25, 0, 0, 0, 0, 8]).unwrap();
        assert_eq!(coding.baud, 9600);
        assert_eq!(coding.stop_bits(), Some(StopBits::One));
        assert_eq!(coding.parity(), Some(Parity::None));
        assert_eq!(coding.data_bits, 8);
        assert_eq!(coding, LineCoding::default());

        let coding = LineCoding::new(115_200, 2, 2, 7);
        assert_eq!(coding.encode(), [0x00, 0xc2, 0x01, 0x00, 2, 2, 7]);
    }

    #[test]
    fn line_coding_keeps_unnamed_values() {
        let raw = [0x01, 0x02, 0x03, 0x04, 9, 7, 5];
        let coding = LineCoding::decode(&raw).unwrap();
        assert_eq!(coding.stop_bits(), None);
        assert_eq!(coding.parity(), None);
        assert_eq!(coding.encode(), raw);
    }

    #[test]
    fn short_line_coding_is_rejected() {
        assert_eq!(LineCoding::decode(&[0x80, 0x25, 0, 0, 0, 0]), None);
    }

    #[test]
    fn carrier_notification_bytes() {
        assert_eq!(
            SerialStateNotification::carrier(0).encode(),
            [0xa1, 0x20, 0, 0, 0, 0, 2, 0, 3, 0]
        );
        assert_eq!(
            SerialStateNotification::carrier(2).encode(),
            [0xa1, 0x20, 0, 0, 2, 0, 2, 0, 3, 0]
        );
    }

    #[test]
    fn control_line_bits() {
        let state = ControlLineState::from_bits_truncate(0x0003);
        assert!(state.contains(ControlLineState::DTR));
        assert!(state.contains(ControlLineState::RTS));
        assert!(!ControlLineState::from_bits_truncate(0x0002).contains(ControlLineState::DTR));
    }
}
