use std::fmt;

use thiserror::Error;

use crate::shm::ZeroInit;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{len} bytes do not fit in {capacity}")]
pub(crate) struct CapacityError {
    pub(crate) len: usize,
    pub(crate) capacity: usize,
}

/// UTF-8 text stored inline with a fixed byte capacity.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct FixedText<const N: usize> {
    len: u32,
    bytes: [u8; N],
}

unsafe impl<const N: usize> ZeroInit for FixedText<N> {}

impl<const N: usize> FixedText<N> {
    pub(crate) const EMPTY: Self = Self { len: 0, bytes: [0; N] };

    #[cfg(test)]
    pub(crate) fn new(value: &str) -> Result<Self, CapacityError> {
        let mut text = Self::EMPTY;
        text.set(value)?;
        Ok(text)
    }

    pub(crate) fn set(&mut self, value: &str) -> Result<(), CapacityError> {
        if value.len() > N {
            return Err(CapacityError { len: value.len(), capacity: N });
        }

        self.bytes[..value.len()].copy_from_slice(value.as_bytes());
        self.bytes[value.len()..].fill(0);
        self.len = value.len() as u32;
        Ok(())
    }

    pub(crate) fn as_str(&self) -> &str {
        let len = (self.len as usize).min(N);
        std::str::from_utf8(&self.bytes[..len]).unwrap_or_default()
    }
}

impl<const N: usize> Default for FixedText<N> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<const N: usize> fmt::Debug for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
