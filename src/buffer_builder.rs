use std::mem;

use bytemuck::Pod;

use crate::{BvhError, Result};

const INITIAL_SIZE: usize = 16;

/// Packs Pod records back to back into one upload region.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    buffer: Vec<u8>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        BufferBuilder {
            buffer: Vec::with_capacity(INITIAL_SIZE),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BufferBuilder {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Empties the builder but keeps its allocation for the next pack.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn align_to_16(&mut self) {
        let remainder = self.buffer.len() % 16;
        if remainder != 0 {
            let pad_size = 16 - remainder;
            self.pad(pad_size);
        }
    }

    pub fn get_offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn pad(&mut self, amt: usize) {
        self.buffer.resize(self.buffer.len() + amt, 0);
    }

    pub fn append<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytemuck::bytes_of(value));
    }

    pub fn append_slice<T: Pod>(&mut self, values: &[T]) {
        self.buffer.extend_from_slice(bytemuck::cast_slice(values));
    }

    /// Current offset counted in records of `T`.
    pub fn get_relative_offset<T>(&self) -> Result<usize> {
        let type_size = mem::size_of::<T>();
        if self.buffer.is_empty() {
            return Ok(0);
        }
        if type_size == 0 || self.buffer.len() % type_size != 0 {
            return Err(BvhError::Misaligned {
                offset: self.buffer.len(),
                stride: type_size,
            });
        }
        Ok(self.buffer.len() / type_size)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Copies the packed bytes to the front of `output` (e.g. mapped memory).
    pub fn write(&self, output: &mut [u8]) -> Result<()> {
        let needed = self.buffer.len();
        if output.len() < needed {
            return Err(BvhError::BufferTooSmall {
                needed,
                available: output.len(),
            });
        }
        output[..needed].copy_from_slice(&self.buffer);
        Ok(())
    }
}
