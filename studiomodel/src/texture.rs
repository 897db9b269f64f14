//! Paletted texture expansion.

use crate::cursor::LeCursor;
use crate::version::PALETTE_ENTRIES;
use crate::Error;

/// Expands 8-bit palette indices to RGBA8.
///
/// `palette` holds `PALETTE_ENTRIES` RGB triples. Every pixel is opaque.
pub fn expand_palette(indices: &[u8], palette: &[u8]) -> Result<Vec<u8>, Error> {
    if palette.len() != PALETTE_ENTRIES * 3 {
        return Err(Error::format(format!(
            "palette must hold {} bytes, got {}",
            PALETTE_ENTRIES * 3,
            palette.len()
        )));
    }

    let mut rgba = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        let color = usize::from(index) * 3;
        rgba.extend_from_slice(&palette[color..color + 3]);
        rgba.push(0xff);
    }
    Ok(rgba)
}

/// Reads `width * height` index bytes at `offset`, followed directly by the palette, and
/// expands them.
pub(crate) fn read_texture_pixels(
    input: &mut LeCursor<'_>,
    offset: usize,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, Error> {
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| Error::format(format!("texture size {width}x{height} overflows")))?;
    let indices = input.read_bytes_at(offset, pixel_count)?;
    let palette = input.read_bytes(PALETTE_ENTRIES * 3)?;
    expand_palette(indices, palette)
}
