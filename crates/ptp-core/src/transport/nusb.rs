//! nusb-based USB channel implementation.

use nusb::transfer::{Bulk, In, Interrupt, Out};
use nusb::{Interface, MaybeFuture, list_devices};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::traits::{TransportError, UsbChannel};
use crate::config::CameraConfig;
use crate::protocol::values::{USB_CLASS_IMAGE, USB_PROTOCOL_PTP, USB_SUBCLASS_STILL_IMAGE};

/// nusb-backed channel bound to one PTP interface.
pub struct NusbChannel {
    interface: Interface,
    bulk_in: u8,
    bulk_out: u8,
    interrupt_in: u8,
    transfer_timeout: Duration,
    vid: u16,
    pid: u16,
}

impl NusbChannel {
    /// Open the first device exposing a PTP (still-image class 6/1/1)
    /// interface, honoring the config's optional VID/PID filter.
    #[instrument(level = "info", skip(config))]
    pub fn open(config: &CameraConfig) -> Result<Self, TransportError> {
        let devices = list_devices()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        for device_info in devices {
            if let Some(vid) = config.vendor_id {
                if device_info.vendor_id() != vid {
                    continue;
                }
            }
            if let Some(pid) = config.product_id {
                if device_info.product_id() != pid {
                    continue;
                }
            }

            let ptp_interface = device_info.interfaces().find(|iface| {
                iface.class() == USB_CLASS_IMAGE
                    && iface.subclass() == USB_SUBCLASS_STILL_IMAGE
                    && iface.protocol() == USB_PROTOCOL_PTP
            });

            if let Some(iface) = ptp_interface {
                let interface_number = iface.interface_number();
                return Self::open_device_info(device_info, interface_number, config);
            }
        }

        Err(TransportError::DeviceNotFound {
            vid: config.vendor_id,
            pid: config.product_id,
        })
    }

    fn open_device_info(
        device_info: nusb::DeviceInfo,
        interface_number: u8,
        config: &CameraConfig,
    ) -> Result<Self, TransportError> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();

        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            interface = interface_number,
            "Found PTP device"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let interface = device.claim_interface(interface_number).wait().map_err(|e| {
            TransportError::ClaimInterfaceFailed {
                interface: interface_number,
                message: e.to_string(),
            }
        })?;

        // Resolve the three PTP endpoints from the active configuration.
        let mut bulk_in: u8 = 0;
        let mut bulk_out: u8 = 0;
        let mut interrupt_in: u8 = 0;

        for dev_config in device.configurations() {
            for iface in dev_config.interfaces() {
                if iface.interface_number() != interface_number {
                    continue;
                }
                for alt in iface.alt_settings() {
                    for ep in alt.endpoints() {
                        match ep.transfer_type() {
                            nusb::descriptors::TransferType::Bulk => {
                                if ep.direction() == nusb::transfer::Direction::In {
                                    bulk_in = ep.address();
                                } else {
                                    bulk_out = ep.address();
                                }
                            }
                            nusb::descriptors::TransferType::Interrupt => {
                                if ep.direction() == nusb::transfer::Direction::In {
                                    interrupt_in = ep.address();
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        if bulk_in == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Bulk".into(),
                direction: "In".into(),
            });
        }
        if bulk_out == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Bulk".into(),
                direction: "Out".into(),
            });
        }
        if interrupt_in == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "In".into(),
            });
        }

        info!(
            bulk_in = %format!("0x{:02X}", bulk_in),
            bulk_out = %format!("0x{:02X}", bulk_out),
            interrupt_in = %format!("0x{:02X}", interrupt_in),
            "PTP endpoints resolved"
        );

        Ok(Self {
            interface,
            bulk_in,
            bulk_out,
            interrupt_in,
            transfer_timeout: config.transfer_timeout(),
            vid,
            pid,
        })
    }

    fn map_read_err(&self, e: std::io::Error) -> TransportError {
        if e.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout {
                timeout_ms: self.transfer_timeout.as_millis() as u64,
            }
        } else {
            TransportError::ReadFailed(e.to_string())
        }
    }
}

impl UsbChannel for NusbChannel {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn bulk_write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let ep = self
            .interface
            .endpoint::<Bulk, Out>(self.bulk_out)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        let mut writer = ep.writer(4096);
        writer
            .write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        debug!(bytes_written = data.len(), "Bulk write complete");
        Ok(data.len())
    }

    #[instrument(skip(self), fields(max_len))]
    fn bulk_read(&self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let ep = self
            .interface
            .endpoint::<Bulk, In>(self.bulk_in)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        let mut reader = ep.reader(4096);
        reader.set_read_timeout(self.transfer_timeout);
        let mut buf = vec![0u8; max_len];

        let n = reader.read(&mut buf).map_err(|e| self.map_read_err(e))?;

        buf.truncate(n);
        debug!(bytes_read = n, "Bulk read complete");
        Ok(buf)
    }

    #[instrument(skip(self), fields(max_len))]
    fn interrupt_read(&self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let ep = self
            .interface
            .endpoint::<Interrupt, In>(self.interrupt_in)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        let mut reader = ep.reader(1024);
        reader.set_read_timeout(timeout);
        let mut buf = vec![0u8; max_len];

        let n = reader.read(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                TransportError::ReadFailed(e.to_string())
            }
        })?;

        buf.truncate(n);
        debug!(bytes_read = n, "Interrupt read complete");
        Ok(buf)
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}
