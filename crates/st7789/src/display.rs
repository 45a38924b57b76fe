//! Core display operations

use embedded_hal::delay::DelayNs;

use crate::command::*;
use crate::config::{Config, Dimensions};
use crate::error::Error;
use crate::interface::DisplayInterface;

/// Pixels serialized per SPI transfer when streaming RAM writes
const PIXEL_CHUNK: usize = 64;

/// Vendor panel tuning for the 1.69" ST7789V2 module, applied after MADCTL/COLMOD
const PANEL_TUNING: &[(u8, &[u8])] = &[
    (PORCH_CONTROL, &[0x0B, 0x0B, 0x00, 0x33, 0x35]),
    (GATE_CONTROL, &[0x11]),
    (VCOM_SETTING, &[0x35]),
    (LCM_CONTROL, &[0x2C]),
    (VDV_VRH_ENABLE, &[0x01]),
    (VRH_SET, &[0x0D]),
    (VDV_SET, &[0x20]),
    (FRAME_RATE_CONTROL, &[0x13]),
    (POWER_CONTROL_1, &[0xA4, 0xA1]),
    (POWER_CONTROL_EXTRA, &[0xA1]),
    (
        POSITIVE_GAMMA,
        &[
            0xF0, 0x06, 0x0B, 0x0A, 0x09, 0x26, 0x29, 0x33, 0x41, 0x18, 0x16, 0x15, 0x29, 0x2D,
        ],
    ),
    (
        NEGATIVE_GAMMA,
        &[
            0xF0, 0x04, 0x08, 0x08, 0x07, 0x03, 0x28, 0x32, 0x40, 0x3B, 0x19, 0x18, 0x2A, 0x2E,
        ],
    ),
    (GATE_CONTROL_EXTRA, &[0x25, 0x00, 0x00]),
];

/// Core display driver for ST7789
///
/// Pixels are written straight into controller RAM; there is no frame buffer
/// on the host side. For embedded-graphics support enable the `graphics`
/// feature.
pub struct Display<I>
where
    I: DisplayInterface,
{
    /// Hardware interface
    interface: I,
    /// Display configuration
    config: Config,
    /// Whether DISPON has been sent
    is_display_on: bool,
}

impl<I> Display<I>
where
    I: DisplayInterface,
{
    /// Create a new Display instance
    pub fn new(interface: I, config: Config) -> Self {
        Self {
            interface,
            config,
            is_display_on: false,
        }
    }

    /// Perform hardware reset followed by the panel init sequence
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.interface.reset(delay).map_err(Error::Interface)?;
        self.init(delay)
    }

    /// Initialize the controller with configuration
    fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.send_command(MEMORY_DATA_ACCESS_CONTROL)?;
        self.send_data(&[self.config.madctl(false)])?;

        self.send_command(INTERFACE_PIXEL_FORMAT)?;
        self.send_data(&[COLMOD_RGB565])?;

        for (command, params) in PANEL_TUNING {
            self.send_command(*command)?;
            self.send_data(params)?;
        }

        self.send_command(if self.config.invert_colors {
            INVERSION_ON
        } else {
            INVERSION_OFF
        })?;

        self.send_command(SLEEP_OUT)?;
        delay.delay_ms(120);

        self.send_command(DISPLAY_ON)?;
        delay.delay_ms(20);
        self.is_display_on = true;

        log::info!(
            "[LCD] ST7789 ready {}x{} offset=({},{})",
            self.config.dimensions.width,
            self.config.dimensions.height,
            self.config.offset.x,
            self.config.offset.y
        );
        Ok(())
    }

    /// Open a RAM write window covering `x0..=x1`, `y0..=y1` (panel coordinates)
    ///
    /// Pixel data written with [`Display::write_pixels`] afterwards fills the
    /// window left to right, top to bottom.
    pub fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Error<I>> {
        let dims = self.config.dimensions;
        if x0 > x1 || y0 > y1 || x1 >= dims.width || y1 >= dims.height {
            return Err(Error::OutOfBounds {
                x: x0,
                y: y0,
                width: x1.saturating_sub(x0).saturating_add(1),
                height: y1.saturating_sub(y0).saturating_add(1),
            });
        }

        let offset = self.config.offset;
        let (cx0, cx1) = (x0 + offset.x, x1 + offset.x);
        let (ry0, ry1) = (y0 + offset.y, y1 + offset.y);

        self.send_command(COLUMN_ADDRESS_SET)?;
        self.send_data(&[
            (cx0 >> 8) as u8,
            (cx0 & 0xFF) as u8,
            (cx1 >> 8) as u8,
            (cx1 & 0xFF) as u8,
        ])?;

        self.send_command(ROW_ADDRESS_SET)?;
        self.send_data(&[
            (ry0 >> 8) as u8,
            (ry0 & 0xFF) as u8,
            (ry1 >> 8) as u8,
            (ry1 & 0xFF) as u8,
        ])?;

        self.send_command(MEMORY_WRITE)
    }

    /// Stream 565 pixel words into the open window, high byte first
    pub fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Error<I>> {
        let mut bytes = [0u8; PIXEL_CHUNK * 2];
        for chunk in pixels.chunks(PIXEL_CHUNK) {
            for (i, px) in chunk.iter().enumerate() {
                let [hi, lo] = px.to_be_bytes();
                bytes[i * 2] = hi;
                bytes[i * 2 + 1] = lo;
            }
            self.send_data(&bytes[..chunk.len() * 2])?;
        }
        Ok(())
    }

    /// Fill a rectangle with one color
    pub fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: u16,
    ) -> Result<(), Error<I>> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let x1 = x.checked_add(width - 1).ok_or(Error::OutOfBounds {
            x,
            y,
            width,
            height,
        })?;
        let y1 = y.checked_add(height - 1).ok_or(Error::OutOfBounds {
            x,
            y,
            width,
            height,
        })?;
        self.set_window(x, y, x1, y1)?;

        let run = [color; PIXEL_CHUNK];
        let mut remaining = width as usize * height as usize;
        while remaining > 0 {
            let n = remaining.min(PIXEL_CHUNK);
            self.write_pixels(&run[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Fill the whole visible area with one color
    pub fn clear(&mut self, color: u16) -> Result<(), Error<I>> {
        let dims = self.config.dimensions;
        self.fill_rect(0, 0, dims.width, dims.height, color)
    }

    /// Turn the display output on or off (RAM contents are kept)
    pub fn set_display_on(&mut self, on: bool) -> Result<(), Error<I>> {
        self.send_command(if on { DISPLAY_ON } else { DISPLAY_OFF })?;
        self.is_display_on = on;
        Ok(())
    }

    /// Enter sleep mode
    pub fn sleep<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.set_display_on(false)?;
        self.send_command(SLEEP_IN)?;
        delay.delay_ms(5);
        Ok(())
    }

    /// Leave sleep mode and turn the output back on
    pub fn wake<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.send_command(SLEEP_OUT)?;
        delay.delay_ms(120);
        self.set_display_on(true)
    }

    /// Issue a software reset; [`Display::reset`] must follow before drawing
    pub fn soft_reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.send_command(SOFT_RESET)?;
        delay.delay_ms(150);
        self.is_display_on = false;
        Ok(())
    }

    /// Whether the output stage is enabled
    pub fn is_display_on(&self) -> bool {
        self.is_display_on
    }

    /// Send a command to the display controller
    fn send_command(&mut self, cmd: u8) -> Result<(), Error<I>> {
        self.interface.send_command(cmd).map_err(Error::Interface)
    }

    /// Send data to the display controller
    fn send_data(&mut self, data: &[u8]) -> Result<(), Error<I>> {
        self.interface.send_data(data).map_err(Error::Interface)
    }

    /// Get visible dimensions
    pub fn dimensions(&self) -> &Dimensions {
        &self.config.dimensions
    }

    /// Access the underlying configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release the interface
    pub fn release(self) -> I {
        self.interface
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::config::{Builder, Offset};

    #[derive(Debug, PartialEq)]
    enum Op {
        Command(u8),
        Data(Vec<u8>),
    }

    #[derive(Default)]
    struct RecordingInterface {
        ops: Vec<Op>,
        resets: usize,
    }

    impl DisplayInterface for RecordingInterface {
        type Error = core::convert::Infallible;

        fn send_command(&mut self, command: u8) -> Result<(), Self::Error> {
            self.ops.push(Op::Command(command));
            Ok(())
        }

        fn send_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.ops.push(Op::Data(data.to_vec()));
            Ok(())
        }

        fn reset<D: DelayNs>(&mut self, _delay: &mut D) -> Result<(), Self::Error> {
            self.resets += 1;
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn display() -> Display<RecordingInterface> {
        let config = Builder::new()
            .dimensions(Dimensions::new(240, 280).unwrap())
            .offset(Offset { x: 0, y: 20 })
            .build()
            .unwrap();
        Display::new(RecordingInterface::default(), config)
    }

    #[test]
    fn reset_runs_vendor_sequence_in_order() {
        let mut display = display();
        display.reset(&mut NoDelay).unwrap();
        let interface = display.release();
        assert_eq!(interface.resets, 1);

        let commands: Vec<u8> = interface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Command(c) => Some(*c),
                Op::Data(_) => None,
            })
            .collect();
        assert_eq!(commands.first(), Some(&MEMORY_DATA_ACCESS_CONTROL));
        assert_eq!(commands[1], INTERFACE_PIXEL_FORMAT);
        assert_eq!(
            &commands[commands.len() - 3..],
            &[INVERSION_ON, SLEEP_OUT, DISPLAY_ON]
        );
        assert_eq!(interface.ops[1], Op::Data(vec![0x00]));
        assert_eq!(interface.ops[3], Op::Data(vec![COLMOD_RGB565]));
    }

    #[test]
    fn set_window_applies_row_offset() {
        let mut display = display();
        display.set_window(0, 0, 239, 9).unwrap();
        let ops = display.release().ops;
        assert_eq!(
            ops,
            vec![
                Op::Command(COLUMN_ADDRESS_SET),
                Op::Data(vec![0, 0, 0, 239]),
                Op::Command(ROW_ADDRESS_SET),
                Op::Data(vec![0, 20, 0, 29]),
                Op::Command(MEMORY_WRITE),
            ]
        );
    }

    #[test]
    fn set_window_rejects_area_past_panel() {
        let mut display = display();
        let err = display.set_window(0, 275, 239, 280).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                y: 275,
                height: 6,
                ..
            }
        ));
        assert!(display.release().ops.is_empty());
    }

    #[test]
    fn write_pixels_sends_high_byte_first_in_chunks() {
        let mut display = display();
        let pixels: Vec<u16> = (0..100u16).map(|i| 0xAB00 | i).collect();
        display.write_pixels(&pixels).unwrap();
        let ops = display.release().ops;
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Op::Data(bytes) => {
                assert_eq!(bytes.len(), PIXEL_CHUNK * 2);
                assert_eq!(&bytes[..4], &[0xAB, 0x00, 0xAB, 0x01]);
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &ops[1] {
            Op::Data(bytes) => assert_eq!(bytes.len(), (100 - PIXEL_CHUNK) * 2),
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn fill_rect_streams_exact_pixel_count() {
        let mut display = display();
        display.fill_rect(10, 10, 20, 5, 0xF800).unwrap();
        let ops = display.release().ops;
        let data_bytes: usize = ops
            .iter()
            .skip(5)
            .map(|op| match op {
                Op::Data(bytes) => bytes.len(),
                Op::Command(_) => 0,
            })
            .sum();
        assert_eq!(data_bytes, 20 * 5 * 2);
    }
}
