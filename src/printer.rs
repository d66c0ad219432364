use log::{debug, info};
use std::time::Duration;

use crate::{
    bitmap::Bitmap,
    command::{self, Alignment, BitmapMode, PrintStyle},
    error::Error,
    transport::{Transport, UsbTransport},
    PRINTER_WIDTH,
};

/// USB vendor identifier of the EM5820.
pub const VENDOR_ID: u16 = 0x28E9;
/// USB product identifier of the EM5820.
pub const PRODUCT_ID: u16 = 0x0289;

const ENDPOINT_IN: u8 = 0x81;
const ENDPOINT_OUT: u8 = 0x03;
const WRITE_TIMEOUT: Duration = Duration::from_millis(5000);
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
const LINES_PER_BATCH: u32 = 50;

/// Printer session.
///
/// Every operation first discards whatever status bytes the printer has
/// queued, then writes its command and returns the number of bytes the
/// device accepted. A write the device only partly accepts fails with
/// [`Error::ShortTransfer`] and is not retried.
///
/// A session is not meant to be shared; open one per print job.
pub struct Printer<T: Transport = UsbTransport> {
    transport: T,
    config: Config,
}

impl Printer<UsbTransport> {
    /// Find the printer on USB and open a session to it.
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = UsbTransport::open(&config)?;
        Ok(Printer { transport, config })
    }
}

impl<T: Transport> Printer<T> {
    /// Run a session over an already open transport.
    pub fn with_transport(transport: T, config: Config) -> Self {
        Printer { transport, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// End the session and release the device.
    pub fn close(self) -> Result<(), Error> {
        self.transport.close()
    }

    /// Discard pending inbound bytes.
    ///
    /// Reads with the short drain timeout until a read comes back empty or
    /// fails. Returns the number of bytes thrown away.
    pub fn drain_input(&mut self) -> usize {
        let mut buf = [0x00; 64];
        let mut drained = 0;
        loop {
            match self.transport.read(&mut buf, self.config.drain_timeout) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(Error::Usb(rusb::Error::Timeout)) => break,
                Err(err) => {
                    debug!("drain stopped: {:?}", err);
                    break;
                }
            }
        }
        if drained > 0 {
            debug!("drained {} stale bytes", drained);
        }
        drained
    }

    /// Drain stale input, then write `buf` in a single transfer.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.drain_input();

        let n = self.transport.write(buf, self.config.write_timeout)?;
        if n != buf.len() {
            debug!(
                "write error: bytes wrote {} != bytes supplied {}, possibly timeout ?",
                n,
                buf.len()
            );
            return Err(Error::ShortTransfer {
                requested: buf.len(),
                transferred: n,
            });
        }
        Ok(n)
    }

    pub fn reset(&mut self) -> Result<usize, Error> {
        self.write_bytes(&command::reset())
    }

    pub fn set_text_scale(&mut self, horizontal: u8, vertical: u8) -> Result<usize, Error> {
        self.write_bytes(&command::set_text_scale(horizontal, vertical))
    }

    pub fn set_print_style(&mut self, style: PrintStyle) -> Result<usize, Error> {
        self.write_bytes(&command::set_print_style(style))
    }

    pub fn write_string(&mut self, s: &str) -> Result<usize, Error> {
        self.write_bytes(&command::text(s))
    }

    pub fn feed_dots(&mut self, dots: u8) -> Result<usize, Error> {
        self.write_bytes(&command::feed_dots(dots))
    }

    pub fn feed_lines(&mut self, lines: u8) -> Result<usize, Error> {
        self.write_bytes(&command::feed_lines(lines))
    }

    pub fn set_horizontal_position(&mut self, position: u16) -> Result<usize, Error> {
        self.write_bytes(&command::set_horizontal_position(position))
    }

    pub fn set_alignment(&mut self, alignment: Alignment) -> Result<usize, Error> {
        self.write_bytes(&command::set_alignment(alignment))
    }

    pub fn set_underline(&mut self, thickness: u8) -> Result<usize, Error> {
        self.write_bytes(&command::set_underline(thickness))
    }

    /// Send the whole bitmap after a single header.
    ///
    /// Large images risk a transfer timeout this way; prefer
    /// [`Printer::print_bitmap_lines`].
    pub fn print_bitmap(&mut self, mode: BitmapMode, bitmap: &Bitmap) -> Result<usize, Error> {
        let width = self.check_width(bitmap)?;
        let height = u16::try_from(bitmap.height()).map_err(|_| {
            Error::InvalidBitmap(format!("height {} exceeds 65535 rows", bitmap.height()))
        })?;

        let sent = self.write_bytes(&command::bitmap_header(mode, width, height))?;
        Ok(sent + self.write_bytes(bitmap.as_bytes())?)
    }

    /// Send the bitmap in batches of at most `lines_per_batch` rows.
    ///
    /// Each batch gets its own header carrying the batch height, followed by
    /// that batch's rows, so no single transfer grows with the image.
    pub fn print_bitmap_lines(
        &mut self,
        mode: BitmapMode,
        bitmap: &Bitmap,
    ) -> Result<usize, Error> {
        let width = self.check_width(bitmap)?;
        let lines = self.config.lines_per_batch;
        let mut sent = 0;

        for batch in bitmap.batches(lines) {
            debug!(
                "sending rows {}..{} of {}",
                batch.first_row,
                batch.first_row + batch.rows,
                bitmap.height()
            );
            // rows <= lines_per_batch <= u16::MAX
            let header = command::bitmap_header(mode, width, batch.rows as u16);
            sent += self.write_bytes(&header)?;
            sent += self.write_bytes(batch.data)?;
        }
        Ok(sent)
    }

    fn check_width(&self, bitmap: &Bitmap) -> Result<u16, Error> {
        if bitmap.width() > self.config.max_width {
            return Err(Error::InvalidBitmap(format!(
                "width {} exceeds {} dots",
                bitmap.width(),
                self.config.max_width
            )));
        }
        Ok(bitmap.width() as u16)
    }
}

/// Session configuration.
///
/// Defaults match the EM5820 on interface 0. Values are set with chained
/// builder calls:
///
/// ```
/// use em5820::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .write_timeout(Duration::from_secs(10))
///     .lines_per_batch(24);
/// assert_eq!(config.get_lines_per_batch(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    vendor_id: u16,
    product_id: u16,
    interface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
    write_timeout: Duration,
    drain_timeout: Duration,
    lines_per_batch: u32,
    max_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            interface: 0,
            endpoint_in: ENDPOINT_IN,
            endpoint_out: ENDPOINT_OUT,
            write_timeout: WRITE_TIMEOUT,
            drain_timeout: DRAIN_TIMEOUT,
            lines_per_batch: LINES_PER_BATCH,
            max_width: PRINTER_WIDTH,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `EM5820_VENDOR_ID`, `EM5820_PRODUCT_ID` and
    /// `EM5820_LINES_PER_BATCH` from the process environment.
    pub fn with_env(self) -> Result<Self, Error> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env<F>(self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self;
        if let Some(v) = lookup("EM5820_VENDOR_ID") {
            config.vendor_id = parse_id("EM5820_VENDOR_ID", &v)?;
        }
        if let Some(v) = lookup("EM5820_PRODUCT_ID") {
            config.product_id = parse_id("EM5820_PRODUCT_ID", &v)?;
        }
        if let Some(v) = lookup("EM5820_LINES_PER_BATCH") {
            let lines = v.trim().parse::<u16>().map_err(|e| {
                Error::InvalidConfig(format!("EM5820_LINES_PER_BATCH={}: {}", v, e))
            })?;
            config = config.lines_per_batch(lines as u32);
        }
        info!(
            "Config: device {:04x}:{:04x}, {} lines per batch",
            config.vendor_id, config.product_id, config.lines_per_batch
        );
        Ok(config)
    }

    pub fn device(self, vendor_id: u16, product_id: u16) -> Self {
        Config {
            vendor_id,
            product_id,
            ..self
        }
    }

    pub fn interface(self, interface: u8) -> Self {
        Config { interface, ..self }
    }

    /// Bulk endpoints used when the device descriptors don't advertise any.
    pub fn endpoints(self, endpoint_in: u8, endpoint_out: u8) -> Self {
        Config {
            endpoint_in,
            endpoint_out,
            ..self
        }
    }

    pub fn write_timeout(self, write_timeout: Duration) -> Self {
        Config {
            write_timeout,
            ..self
        }
    }

    pub fn drain_timeout(self, drain_timeout: Duration) -> Self {
        Config {
            drain_timeout,
            ..self
        }
    }

    /// Rows per bitmap transfer, clamped to `1..=65535`.
    pub fn lines_per_batch(self, lines: u32) -> Self {
        Config {
            lines_per_batch: lines.clamp(1, u16::MAX as u32),
            ..self
        }
    }

    /// Widest image accepted, rounded down to a multiple of 8 and kept
    /// within `8..=384`.
    pub fn max_width(self, width: u32) -> Self {
        Config {
            max_width: (width / 8 * 8).clamp(8, PRINTER_WIDTH),
            ..self
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn get_interface(&self) -> u8 {
        self.interface
    }

    pub fn endpoint_in(&self) -> u8 {
        self.endpoint_in
    }

    pub fn endpoint_out(&self) -> u8 {
        self.endpoint_out
    }

    pub fn get_write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn get_drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn get_lines_per_batch(&self) -> u32 {
        self.lines_per_batch
    }

    pub fn get_max_width(&self) -> u32 {
        self.max_width
    }
}

fn parse_id(key: &str, value: &str) -> Result<u16, Error> {
    let v = value.trim();
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => v.parse::<u16>(),
    };
    parsed.map_err(|e| Error::InvalidConfig(format!("{}={}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Read(usize),
        Write(Vec<u8>),
    }

    #[derive(Default)]
    struct FakeTransport {
        inbound: VecDeque<Vec<u8>>,
        accept: Option<usize>,
        fail_write: bool,
        events: Vec<Event>,
    }

    impl FakeTransport {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Write(buf) => Some(buf.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for FakeTransport {
        fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, Error> {
            assert_eq!(timeout, WRITE_TIMEOUT);
            self.events.push(Event::Write(buf.to_vec()));
            if self.fail_write {
                return Err(Error::Usb(rusb::Error::Pipe));
            }
            Ok(self.accept.map_or(buf.len(), |n| n.min(buf.len())))
        }

        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
            assert_eq!(timeout, DRAIN_TIMEOUT);
            match self.inbound.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    self.events.push(Event::Read(chunk.len()));
                    Ok(chunk.len())
                }
                None => Err(Error::Usb(rusb::Error::Timeout)),
            }
        }
    }

    fn printer(transport: FakeTransport) -> Printer<FakeTransport> {
        Printer::with_transport(transport, Config::new())
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.vendor_id(), 10473);
        assert_eq!(config.product_id(), 649);
        assert_eq!(config.get_write_timeout(), Duration::from_millis(5000));
        assert_eq!(config.get_drain_timeout(), Duration::from_millis(100));
        assert_eq!(config.get_lines_per_batch(), 50);
        assert_eq!(config.get_max_width(), 384);
    }

    #[test]
    fn builder_clamps_values() {
        let config = Config::new().lines_per_batch(0).max_width(1000);
        assert_eq!(config.get_lines_per_batch(), 1);
        assert_eq!(config.get_max_width(), 384);
        assert_eq!(Config::new().max_width(100).get_max_width(), 96);
        assert_eq!(Config::new().max_width(3).get_max_width(), 8);
    }

    #[test]
    fn env_overrides() {
        let config = Config::new()
            .apply_env(|key| match key {
                "EM5820_VENDOR_ID" => Some("0x0416".to_string()),
                "EM5820_PRODUCT_ID" => Some("20512".to_string()),
                "EM5820_LINES_PER_BATCH" => Some("24".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.vendor_id(), 0x0416);
        assert_eq!(config.product_id(), 20512);
        assert_eq!(config.get_lines_per_batch(), 24);

        let err = Config::new()
            .apply_env(|key| (key == "EM5820_VENDOR_ID").then(|| "printer".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn stale_input_is_drained_before_each_write() {
        let mut transport = FakeTransport::default();
        transport.inbound.push_back(vec![0x12; 4]);
        transport.inbound.push_back(vec![0x34; 2]);
        let mut printer = printer(transport);

        assert_eq!(printer.reset().unwrap(), 2);
        assert_eq!(
            printer.transport.events,
            vec![Event::Read(4), Event::Read(2), Event::Write(vec![0x1B, 0x40])]
        );
    }

    #[test]
    fn drain_stops_on_empty_read() {
        let mut transport = FakeTransport::default();
        transport.inbound.push_back(vec![0x01]);
        transport.inbound.push_back(vec![]);
        transport.inbound.push_back(vec![0x02]);
        let mut printer = printer(transport);

        assert_eq!(printer.drain_input(), 1);
        assert_eq!(printer.transport.inbound.len(), 1);
    }

    #[test]
    fn short_transfer_is_an_error() {
        let transport = FakeTransport {
            accept: Some(10),
            ..Default::default()
        };
        let mut printer = printer(transport);

        match printer.write_bytes(&[0xAA; 20]) {
            Err(Error::ShortTransfer {
                requested,
                transferred,
            }) => {
                assert_eq!((requested, transferred), (20, 10));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(printer.transport.writes().len(), 1);
    }

    #[test]
    fn transport_errors_propagate() {
        let transport = FakeTransport {
            fail_write: true,
            ..Default::default()
        };
        let mut printer = printer(transport);
        assert!(matches!(
            printer.feed_lines(3),
            Err(Error::Usb(rusb::Error::Pipe))
        ));
    }

    #[test]
    fn primitives_report_bytes_sent() {
        let mut printer = printer(FakeTransport::default());
        let sent = printer.set_alignment(Alignment::Center).unwrap()
            + printer.set_print_style(PrintStyle::BOLD).unwrap()
            + printer.set_text_scale(1, 1).unwrap()
            + printer.set_underline(9).unwrap()
            + printer.set_horizontal_position(300).unwrap()
            + printer.feed_dots(10).unwrap()
            + printer.write_string("abc").unwrap();
        assert_eq!(sent, 3 + 3 + 3 + 3 + 4 + 3 + 3);
        assert_eq!(
            printer.transport.writes(),
            vec![
                vec![0x1B, 0x61, 0x01],
                vec![0x1B, 0x21, 0x08],
                vec![0x1D, 0x21, 0x11],
                vec![0x1B, 0x2D, 0x02],
                vec![0x1B, 0x24, 0x2C, 0x01],
                vec![0x1B, 0x4A, 10],
                b"abc".to_vec(),
            ]
        );
    }

    #[test]
    fn empty_writes_are_skipped() {
        let mut printer = printer(FakeTransport::default());
        assert_eq!(printer.write_string("").unwrap(), 0);
        assert!(printer.transport.events.is_empty());
    }

    #[test]
    fn bitmap_is_sent_in_batches() {
        let data: Vec<u8> = (0..48 * 120).map(|i| i as u8).collect();
        let bitmap = Bitmap::from_bytes(384, 120, data.clone()).unwrap();
        let mut printer = printer(FakeTransport::default());

        let sent = printer
            .print_bitmap_lines(BitmapMode::Normal, &bitmap)
            .unwrap();
        assert_eq!(sent, 3 * 8 + data.len());

        let writes = printer.transport.writes();
        assert_eq!(writes.len(), 6);
        assert_eq!(writes[0], vec![0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0x32, 0x00]);
        assert_eq!(writes[1], data[..2400].to_vec());
        assert_eq!(writes[2], vec![0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0x32, 0x00]);
        assert_eq!(writes[3], data[2400..4800].to_vec());
        assert_eq!(writes[4], vec![0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0x14, 0x00]);
        assert_eq!(writes[5], data[4800..].to_vec());
    }

    #[test]
    fn batch_failure_stops_the_job() {
        let bitmap = Bitmap::new(16, 10).unwrap();
        let transport = FakeTransport {
            accept: Some(8),
            ..Default::default()
        };
        let mut printer = Printer::with_transport(transport, Config::new().lines_per_batch(5));

        // The header fits in 8 bytes, the first 10-byte batch doesn't.
        assert!(matches!(
            printer.print_bitmap_lines(BitmapMode::Normal, &bitmap),
            Err(Error::ShortTransfer {
                requested: 10,
                transferred: 8
            })
        ));
        assert_eq!(printer.transport.writes().len(), 2);
    }

    #[test]
    fn single_bitmap_uses_one_header() {
        let bitmap = Bitmap::from_bytes(16, 3, vec![0xFF; 6]).unwrap();
        let mut printer = printer(FakeTransport::default());

        assert_eq!(printer.print_bitmap(BitmapMode::Wide, &bitmap).unwrap(), 14);
        assert_eq!(
            printer.transport.writes(),
            vec![
                vec![0x1D, 0x76, 0x30, 0x01, 0x02, 0x00, 0x03, 0x00],
                vec![0xFF; 6],
            ]
        );
    }

    #[test]
    fn rejects_bitmap_wider_than_configured_width() {
        let bitmap = Bitmap::new(384, 1).unwrap();
        let config = Config::new().max_width(256);
        let mut printer = Printer::with_transport(FakeTransport::default(), config);
        assert!(matches!(
            printer.print_bitmap_lines(BitmapMode::Normal, &bitmap),
            Err(Error::InvalidBitmap(_))
        ));
        assert!(printer.transport.events.is_empty());
    }
}
