//! Random-access reader over an in-memory byte buffer.

use crate::Error;
use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;
use std::marker::PhantomData;

/// The byte order every Studio Model file uses.
pub type LeCursor<'a> = ByteCursor<'a, LittleEndian>;

/// A movable read position over an immutable buffer with a fixed byte order.
///
/// Every read advances the position by the width of the value. The `_at` variants first seek to
/// an absolute offset. Reads that would run past the end of the buffer fail with
/// [`Error::BufferRange`] and leave the position untouched.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a, B: ByteOrder = LittleEndian> {
    bytes: &'a [u8],
    position: usize,
    order: PhantomData<B>,
}

macro_rules! primitive_reads {
    ($($(#[$meta:meta])* $read:ident, $read_at:ident -> $ty:ty, $width:expr, |$buf:ident| $decode:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $read(&mut self) -> Result<$ty, Error> {
                let $buf = self.take($width)?;
                Ok($decode)
            }

            pub fn $read_at(&mut self, offset: usize) -> Result<$ty, Error> {
                self.seek(offset)?;
                self.$read()
            }
        )*
    };
}

impl<'a, B: ByteOrder> ByteCursor<'a, B> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    /// Moves to an absolute offset. Seeking to exactly the end of the buffer is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<(), Error> {
        if offset > self.bytes.len() {
            return Err(Error::BufferRange {
                offset,
                len: 0,
                buffer_len: self.bytes.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::BufferRange {
                offset: self.position,
                len,
                buffer_len: self.bytes.len(),
            })?;
        let out = &self.bytes[self.position..end];
        self.position = end;
        Ok(out)
    }

    primitive_reads! {
        read_u8, read_u8_at -> u8, 1, |b| b[0];
        read_i8, read_i8_at -> i8, 1, |b| b[0] as i8;
        read_u16, read_u16_at -> u16, 2, |b| B::read_u16(b);
        read_i16, read_i16_at -> i16, 2, |b| B::read_i16(b);
        read_u32, read_u32_at -> u32, 4, |b| B::read_u32(b);
        read_i32, read_i32_at -> i32, 4, |b| B::read_i32(b);
        read_f32, read_f32_at -> f32, 4, |b| B::read_f32(b);
        /// Three consecutive `f32` values.
        read_vec3, read_vec3_at -> Vec3, 12, |b| Vec3::new(
            B::read_f32(&b[0..4]),
            B::read_f32(&b[4..8]),
            B::read_f32(&b[8..12]),
        );
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.take(len)
    }

    pub fn read_bytes_at(&mut self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        self.seek(offset)?;
        self.take(len)
    }

    /// Reads a fixed-width, NUL-padded string field.
    ///
    /// The field is truncated at the first NUL byte; a field without a terminator yields all
    /// `len` bytes. Bytes map one-to-one onto chars (Latin-1), so no input is rejected.
    pub fn read_string(&mut self, len: usize) -> Result<String, Error> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(raw[..end].iter().map(|&b| char::from(b)).collect())
    }

    pub fn read_string_at(&mut self, offset: usize, len: usize) -> Result<String, Error> {
        self.seek(offset)?;
        self.read_string(len)
    }

    /// Reads `N` values with `read`, e.g. `cursor.read_array::<f32, 6>(ByteCursor::read_f32)`.
    pub fn read_array<T: Copy + Default, const N: usize>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T, Error>,
    ) -> Result<[T; N], Error> {
        let mut out = [T::default(); N];
        for slot in &mut out {
            *slot = read(self)?;
        }
        Ok(out)
    }

    /// Reads `count` values with `read`, each taking at least `record_size` bytes.
    pub fn read_vec<T>(
        &mut self,
        count: usize,
        record_size: usize,
        mut read: impl FnMut(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        // Counts come from the file; reserve no more records than the buffer could hold.
        let mut out = Vec::with_capacity(count.min(self.remaining() / record_size.max(1)));
        for _ in 0..count {
            out.push(read(self)?);
        }
        Ok(out)
    }

    pub fn read_i16_array<const N: usize>(&mut self) -> Result<[i16; N], Error> {
        self.read_array(Self::read_i16)
    }

    pub fn read_i32_array<const N: usize>(&mut self) -> Result<[i32; N], Error> {
        self.read_array(Self::read_i32)
    }

    pub fn read_u32_array<const N: usize>(&mut self) -> Result<[u32; N], Error> {
        self.read_array(Self::read_u32)
    }

    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N], Error> {
        self.read_array(Self::read_f32)
    }

    pub fn read_vec3_array<const N: usize>(&mut self) -> Result<[Vec3; N], Error> {
        self.read_array(Self::read_vec3)
    }

    pub fn read_i16_vec(&mut self, count: usize) -> Result<Vec<i16>, Error> {
        self.read_vec(count, 2, Self::read_i16)
    }
}
