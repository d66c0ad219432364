use log::{debug, info};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;

use crate::{error::Error, printer::Config};

/// Byte pipe to the printer.
///
/// Both calls block until the transfer completes or `timeout` elapses and
/// report how many bytes actually moved. A timed out read with nothing to
/// deliver is reported as `Error::Usb(rusb::Error::Timeout)`.
pub trait Transport {
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, Error>;

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error>;

    /// End the session, releasing whatever the transport holds.
    fn close(self) -> Result<(), Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// USB bulk transport to the printer.
///
/// Owns the libusb context and device handle. Once [`UsbTransport::open`]
/// returns the interface is claimed; it is released by [`Transport::close`]
/// or, failing that, when the transport is dropped.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    iface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
    claimed: bool,
}

impl UsbTransport {
    pub fn open(config: &Config) -> Result<Self, Error> {
        let context = Context::new()?;
        let (device, device_desc, handle) =
            Self::open_device(&context, config.vendor_id(), config.product_id())?;

        let iface = config.get_interface();
        let endpoint_in = Self::find_endpoint(&device, &device_desc, iface, Direction::In)
            .unwrap_or_else(|| config.endpoint_in());
        let endpoint_out = Self::find_endpoint(&device, &device_desc, iface, Direction::Out)
            .unwrap_or_else(|| config.endpoint_out());
        debug!(
            "Using endpoints in {:#04x} out {:#04x}",
            endpoint_in, endpoint_out
        );

        // Not every platform can tell; treat "unknown" as no driver bound.
        if let Ok(true) = handle.kernel_driver_active(iface) {
            handle
                .detach_kernel_driver(iface)
                .map_err(Error::open("detach kernel driver"))?;
            info!("Detached kernel driver from interface {}", iface);
        }
        handle
            .claim_interface(iface)
            .map_err(Error::open("claim interface"))?;
        info!(
            "Opened printer {:04x}:{:04x}",
            config.vendor_id(),
            config.product_id()
        );

        Ok(UsbTransport {
            handle,
            iface,
            endpoint_in,
            endpoint_out,
            claimed: true,
        })
    }

    fn open_device(
        context: &Context,
        vid: u16,
        pid: u16,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), Error> {
        let devices = match context.devices() {
            Ok(devices) => devices,
            Err(err) => {
                debug!("Failed to read device list: {:?}", err);
                return Err(Error::DeviceListNotReadable);
            }
        };

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() == vid && device_desc.product_id() == pid {
                let handle = device.open().map_err(Error::open("open device"))?;
                return Ok((device, device_desc, handle));
            }
        }
        debug!("No device match with {:04x}:{:04x}", vid, pid);
        Err(Error::DeviceNotFound {
            vendor_id: vid,
            product_id: pid,
        })
    }

    fn find_endpoint(
        device: &Device<Context>,
        device_desc: &DeviceDescriptor,
        iface: u8,
        direction: Direction,
    ) -> Option<u8> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    if interface_desc.interface_number() != iface {
                        continue;
                    }
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == TransferType::Bulk
                        {
                            return Some(endpoint_desc.address());
                        }
                    }
                }
            }
        }
        None
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, Error> {
        Ok(self.handle.write_bulk(self.endpoint_out, buf, timeout)?)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        Ok(self.handle.read_bulk(self.endpoint_in, buf, timeout)?)
    }

    fn close(mut self) -> Result<(), Error> {
        self.claimed = false;
        self.handle.release_interface(self.iface)?;
        info!("Released interface {}", self.iface);
        Ok(())
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if self.claimed {
            if let Err(err) = self.handle.release_interface(self.iface) {
                debug!("Failed to release interface {}: {:?}", self.iface, err);
            }
        }
    }
}
