//! Access to the guest's linear memory
//!
//! Every guest supplied span is bounds checked against the current size of the
//! linear memory before a single byte is read or written.  Composite values are
//! moved as their raw little-endian encoding, see `marshal::Pod`.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use crate::{
    error::{BridgeError, BridgeResult},
    marshal::Pod,
};
use byteorder::{ByteOrder, LittleEndian};
use std::{convert::TryFrom, mem::size_of, ops::Range, vec::Vec};

/// A scatter/gather buffer descriptor as laid out by WASI: a 32-bit offset into
/// linear memory followed by a 32-bit length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoVec {
    pub offset: i32,
    pub length: i32,
}

impl Pod for IoVec {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        IoVec {
            offset: LittleEndian::read_i32(&bytes[0..4]),
            length: LittleEndian::read_i32(&bytes[4..8]),
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_i32(&mut bytes[0..4], self.offset);
        LittleEndian::write_i32(&mut bytes[4..8], self.length);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Memory handler.
////////////////////////////////////////////////////////////////////////////////

/// Reading and writing guest memory.  Addresses are guest offsets; negative
/// 32-bit guest values reach here reinterpreted as large unsigned offsets and
/// therefore fail the bounds check.
pub trait MemoryHandler {
    /// Write the `buffer` to `address`.
    fn write_buffer(&mut self, address: u64, buffer: &[u8]) -> BridgeResult<()>;
    /// Read `length` bytes from `address`.
    fn read_buffer(&self, address: u64, length: u64) -> BridgeResult<Vec<u8>>;
    /// Fails unless `[address, address + length)` lies inside the memory.
    fn check_span(&self, address: u64, length: u64) -> BridgeResult<()>;

    /// Reads a value of type `T` at `address`.
    fn read<T: Pod>(&self, address: u64) -> BridgeResult<T> {
        let bytes = self.read_buffer(address, T::SIZE as u64)?;
        Ok(T::decode(&bytes))
    }

    /// Writes `value` at `address`, byte for byte.
    fn write<T: Pod>(&mut self, address: u64, value: &T) -> BridgeResult<()> {
        let mut bytes = vec![0u8; T::SIZE];
        value.encode(&mut bytes);
        self.write_buffer(address, &bytes)
    }

    /// The default implementation for writing a u32 to `address`.
    fn write_u32(&mut self, address: u64, number: u32) -> BridgeResult<()> {
        self.write_buffer(address, &u32::to_le_bytes(number))
    }

    /// The default implementation for writing a u64 to `address`.
    fn write_u64(&mut self, address: u64, number: u64) -> BridgeResult<()> {
        self.write_buffer(address, &u64::to_le_bytes(number))
    }

    /// Reads `count` consecutive values of type `T` starting at `address`.
    fn unpack_array<T: Pod>(&self, address: u64, count: u64) -> BridgeResult<Vec<T>> {
        let length = count
            .checked_mul(T::SIZE as u64)
            .ok_or(BridgeError::OutOfBounds { address, length: u64::MAX })?;
        let all_bytes = self.read_buffer(address, length)?;
        Ok(all_bytes.chunks(T::SIZE).map(T::decode).collect())
    }

    /// Performs a scattered read from several locations, as specified by a list
    /// of `IoVec` structures, `scatters`.  Nothing is returned unless every
    /// buffer is readable.
    fn read_iovec_scattered(&self, scatters: &[IoVec]) -> BridgeResult<Vec<Vec<u8>>> {
        scatters
            .iter()
            .map(|iovec| {
                self.read_buffer(iovec.offset as u32 as u64, iovec.length as u32 as u64)
            })
            .collect()
    }

    /// Write the content to the buf_address and the starting address to buf_pointers.
    /// For example:
    /// buf_address:
    /// --------------------------------------------------------------------
    ///  content[0] content[1] ......
    /// --------------------------------------------------------------------
    ///    ^           ^
    ///   0x10        0x64
    /// buf_pointers: [0x10, 0x64, ...]
    ///
    fn write_string_list(
        &mut self,
        content: &[Vec<u8>],
        mut buf_address: u64,
        mut buf_pointers: u64,
    ) -> BridgeResult<()> {
        for to_write in content {
            let pointer = u32::try_from(buf_address).map_err(|_| BridgeError::OutOfBounds {
                address: buf_address,
                length: to_write.len() as u64,
            })?;
            self.write_buffer(buf_address, to_write)?;
            self.write_u32(buf_pointers, pointer)?;
            buf_address += to_write.len() as u64;
            buf_pointers += size_of::<u32>() as u64;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Guest memory.
////////////////////////////////////////////////////////////////////////////////

/// A borrowed view of an instance's linear memory for the duration of one host
/// call.
pub struct GuestMemory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> GuestMemory<'a> {
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Current size of the memory in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn span(&self, address: u64, length: u64) -> BridgeResult<Range<usize>> {
        match address.checked_add(length) {
            Some(end) if end <= self.bytes.len() as u64 => Ok(address as usize..end as usize),
            _ => Err(BridgeError::OutOfBounds { address, length }),
        }
    }
}

impl MemoryHandler for GuestMemory<'_> {
    fn write_buffer(&mut self, address: u64, buffer: &[u8]) -> BridgeResult<()> {
        let span = self.span(address, buffer.len() as u64)?;
        self.bytes[span].copy_from_slice(buffer);
        Ok(())
    }

    fn read_buffer(&self, address: u64, length: u64) -> BridgeResult<Vec<u8>> {
        let span = self.span(address, length)?;
        Ok(self.bytes[span].to_vec())
    }

    #[inline]
    fn check_span(&self, address: u64, length: u64) -> BridgeResult<()> {
        self.span(address, length).map(|_| ())
    }
}
