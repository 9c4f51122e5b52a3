#![cfg_attr(not(test), no_std)]

//! A USB CDC-ACM device whose serial byte stream is shifted through an SPI
//! peripheral
//!
//! Every bulk OUT packet is one batch: its bytes are clocked out full duplex
//! and the bytes clocked back in are returned in one bulk IN packet. DTR
//! drives the peripheral's chip select, and SEND_BREAK drives a second line
//! that is usually wired to its reset.
//!
//! ```ignore
//! let mut class = UsbSpi::new(
//!     &bus_allocator,
//!     HardwareSpi::new(spi),
//!     BasicSpiDevice::new(cs_pin, reset_pin),
//!     watchdog,
//!     BridgeConfig::new(),
//! );
//! let mut device = UsbDeviceBuilder::new(&bus_allocator, UsbVidPid(0x16c0, 0x05e1))
//!     .device_class(USB_CLASS_CDC)
//!     .max_packet_size_0(8)?
//!     .build();
//!
//! loop {
//!     device.poll(&mut [&mut class]);
//!     class.service().ok();
//! }
//! ```

#[macro_use]
mod log;

pub mod bridge;
pub mod buffers;
pub mod config;
pub mod control;
pub mod engine;
mod error;
pub mod link;
pub mod notify;
pub mod spi_device;
pub mod transfer;

#[cfg(test)]
mod fakes;

pub use bridge::Bridge;
pub use buffers::PACKET_SIZE;
pub use config::BridgeConfig;
pub use control::{ControlAction, SetupRequest};
pub use error::Error;
pub use link::HostLink;
pub use spi_device::{BasicSpiDevice, SpiDevice};
pub use transfer::ByteTransfer;

use embedded_hal::watchdog::Watchdog;
use usb_device::{
    class_prelude::*,
    control::{Recipient, Request, RequestType},
    Result,
};

/// This should be used as `device_class` when building the `UsbDevice`.
pub const USB_CLASS_CDC: u8 = 0x02;

const USB_CLASS_CDC_DATA: u8 = 0x0a;
const CDC_SUBCLASS_ACM: u8 = 0x02; // PSTN Abstract Control Model
const CDC_PROTOCOL_NONE: u8 = 0x00;

const CS_INTERFACE: u8 = 0x24;
const CDC_TYPE_HEADER: u8 = 0x00;
const CDC_TYPE_CALL_MANAGEMENT: u8 = 0x01;
const CDC_TYPE_ACM: u8 = 0x02;
const CDC_TYPE_UNION: u8 = 0x06;

/// SEND_BREAK, plus the line coding and control line state requests
const ACM_CAPABILITIES: u8 = 0x06;

/// Device handles call management, over the data interface
const CALL_MANAGEMENT_CAPABILITIES: u8 = 0x03;

/// The endpoints, which is all the bridge sees of the USB stack
struct Endpoints<'a, B: UsbBus> {
    comm_ep: EndpointIn<'a, B>,
    read_ep: EndpointOut<'a, B>,
    write_ep: EndpointIn<'a, B>,

    /// While false the OUT endpoint isn't read, so the hardware NAKs the
    /// host until the loaded batch starts draining
    out_enabled: bool,
}

impl<B: UsbBus> HostLink for Endpoints<'_, B> {
    fn set_out_enabled(&mut self, enabled: bool) {
        self.out_enabled = enabled;
    }

    fn out_enabled(&self) -> bool {
        self.out_enabled
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_ep.read(buf)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        self.write_ep.write(data)
    }

    fn write_notification(&mut self, data: &[u8]) -> Result<usize> {
        self.comm_ep.write(data)
    }
}

/// A USB CDC to SPI
pub struct UsbSpi<'a, B, T, D, W>
where
    B: UsbBus,
{
    comm_if: InterfaceNumber,
    data_if: InterfaceNumber,
    link: Endpoints<'a, B>,
    bridge: Bridge<T, D, W>,
}

impl<'a, B, T, D, W> UsbSpi<'a, B, T, D, W>
where
    B: UsbBus,
    T: ByteTransfer,
    D: SpiDevice,
    W: Watchdog,
{
    /// `config.comm_interface` is replaced by the interface number allocated
    /// here
    pub fn new(
        alloc: &'a UsbBusAllocator<B>,
        spi: T,
        lines: D,
        watchdog: W,
        config: BridgeConfig,
    ) -> Self {
        let comm_if = alloc.interface();
        let config = config.comm_interface(u8::from(comm_if));

        Self {
            comm_if,
            data_if: alloc.interface(),
            link: Endpoints {
                comm_ep: alloc.interrupt(8, 255),
                read_ep: alloc.bulk(PACKET_SIZE as u16),
                write_ep: alloc.bulk(PACKET_SIZE as u16),
                out_enabled: true,
            },
            bridge: Bridge::new(spi, lines, watchdog, config),
        }
    }

    /// Main-loop step, to be called after every `UsbDevice::poll`
    ///
    /// Feeds the watchdog, shifts a loaded batch through SPI, and sends
    /// whatever the host is owed.
    pub fn service(&mut self) -> core::result::Result<(), Error<T::Error>> {
        self.bridge.pull_out(&mut self.link);
        self.bridge.service(&mut self.link)
    }

    pub fn bridge(&self) -> &Bridge<T, D, W> {
        &self.bridge
    }

    pub fn release(self) -> (T, D, W) {
        self.bridge.release()
    }

    fn is_ours(&self, req: &Request) -> bool {
        addressed_to(req, u8::from(self.comm_if))
    }
}

/// A class request for the communications interface `comm_if`
fn addressed_to(req: &Request, comm_if: u8) -> bool {
    req.request_type == RequestType::Class
        && req.recipient == Recipient::Interface
        && req.index == comm_if as u16
}

fn setup_request(req: &Request) -> SetupRequest {
    SetupRequest::new(
        req.direction as u8 | (req.request_type as u8) << 5 | req.recipient as u8,
        req.request,
        req.value,
    )
}

impl<B, T, D, W> UsbClass<B> for UsbSpi<'_, B, T, D, W>
where
    B: UsbBus,
    T: ByteTransfer,
    D: SpiDevice,
    W: Watchdog,
{
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        writer.iad(
            self.comm_if,
            2,
            USB_CLASS_CDC,
            CDC_SUBCLASS_ACM,
            CDC_PROTOCOL_NONE,
            None,
        )?;

        writer.interface(
            self.comm_if,
            USB_CLASS_CDC,
            CDC_SUBCLASS_ACM,
            CDC_PROTOCOL_NONE,
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_HEADER, // bDescriptorSubtype
                0x10,
                0x01, // bcdCDC (1.10)
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_ACM,     // bDescriptorSubtype
                ACM_CAPABILITIES, // bmCapabilities
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_UNION,      // bDescriptorSubtype
                self.comm_if.into(), // bControlInterface
                self.data_if.into(), // bSubordinateInterface
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_CALL_MANAGEMENT,     // bDescriptorSubtype
                CALL_MANAGEMENT_CAPABILITIES, // bmCapabilities
                self.data_if.into(),          // bDataInterface
            ],
        )?;

        writer.endpoint(&self.link.comm_ep)?;

        writer.interface(self.data_if, USB_CLASS_CDC_DATA, 0x00, 0x00)?;

        writer.endpoint(&self.link.write_ep)?;
        writer.endpoint(&self.link.read_ep)?;

        Ok(())
    }

    fn reset(&mut self) {
        info!("USB reset, dropping any batch in flight");
        self.bridge.reset(&mut self.link);
    }

    fn poll(&mut self) {
        self.bridge.pull_out(&mut self.link);
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr == self.link.read_ep.address() {
            self.bridge.pull_out(&mut self.link);
        }
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();
        if !self.is_ours(&req) {
            return;
        }

        match self.bridge.on_control_request(setup_request(&req)) {
            ControlAction::DeferRead => {
                let bridge = &mut self.bridge;
                xfer.accept(|buf| Ok(bridge.on_read(buf)))
                    .unwrap_or_else(|_| {
                        error!("USB-SPI Failed to accept GET_LINE_CODING");
                    });
            }

            ControlAction::Ack | ControlAction::DeferWrite => {
                xfer.accept_with(&[]).unwrap_or_else(|_| {
                    error!("USB-SPI Failed to accept control IN request");
                });
            }
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();
        if !self.is_ours(&req) {
            return;
        }

        match self.bridge.on_control_request(setup_request(&req)) {
            ControlAction::DeferWrite => {
                // A malformed line coding is logged and dropped, never stalled
                self.bridge.on_write(xfer.data());
                xfer.accept().unwrap_or_else(|_| {
                    error!("USB-SPI Failed to accept SET_LINE_CODING");
                });
            }

            ControlAction::Ack | ControlAction::DeferRead => {
                xfer.accept().unwrap_or_else(|_| {
                    error!("USB-SPI Failed to accept control OUT request");
                });
            }
        }
    }
}
