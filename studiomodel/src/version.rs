//! Studio Model format constants.

/// File magic, `"IDST"` read as a little-endian `u32`.
pub const STUDIO_MAGIC: u32 = 0x5453_4449;

/// The only supported format version.
pub const STUDIO_VERSION: u32 = 10;

/// Size of the fixed file header in bytes.
pub const HEADER_SIZE: usize = 244;

/// Number of RGB entries in an embedded texture palette.
pub const PALETTE_ENTRIES: usize = 256;
