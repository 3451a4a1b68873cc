/// RGBA8888
pub type Color = [u8; 4];

pub const BLACK: Color = [0x00, 0x00, 0x00, 0xff];

/// Expands a 15-bit little endian palette entry (`0bXBBBBBGGGGGRRRRR`) to RGBA.
pub fn from_rgb555(value: u16) -> Color {
    let red = (value & 0x1f) as u8;
    let green = ((value >> 5) & 0x1f) as u8;
    let blue = ((value >> 10) & 0x1f) as u8;

    [expand(red), expand(green), expand(blue), 0xff]
}

#[inline]
fn expand(channel: u8) -> u8 {
    (channel << 3) | (channel >> 2)
}
