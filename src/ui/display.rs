//! SSD1306 OLED display wrapper.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use heapless::String;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use scale_link::error::Error;
use scale_link::timer::split_minutes;
use scale_link::Grams;

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Initialise the SSD1306 display and clear the screen.
pub fn init<I2C>(i2c: I2C) -> Result<Display<I2C>, Error>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    display.init().map_err(|_| Error::Display)?;
    display.clear_buffer();
    display.flush().map_err(|_| Error::Display)?;
    Ok(display)
}

fn small() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn large() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_10X20)
        .text_color(BinaryColor::On)
        .build()
}

/// Render the main screen: link status, weight, brew timer.
pub fn draw_scale<I2C>(
    display: &mut Display<I2C>,
    ready: bool,
    weight: Grams,
    seconds: u32,
) -> Result<(), Error>
where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();

    let status = if ready { "Scale ready" } else { "Searching..." };
    let _ = Text::new(status, Point::new(0, 10), small()).draw(display);

    let mut line: String<16> = String::new();
    if ready {
        write!(line, "{} g", weight).map_err(|_| Error::BufferOverflow)?;
    } else {
        let _ = line.push_str("--.- g");
    }
    let _ = Text::new(line.as_str(), Point::new(0, 36), large()).draw(display);

    line.clear();
    let (minutes, secs) = split_minutes(seconds);
    write!(line, "{:02}:{:02}", minutes, secs).map_err(|_| Error::BufferOverflow)?;
    let _ = Text::new(line.as_str(), Point::new(0, 60), large()).draw(display);

    display.flush().map_err(|_| Error::Display)
}
