//! Byte-order helpers.

/// Byte order of a serialized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The byte order of the running process.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn as_flag(self) -> u8 {
        match self {
            Endian::Little => 1,
            Endian::Big => 0,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(Endian::Little),
            0 => Some(Endian::Big),
            _ => None,
        }
    }
}

/// Reverse the byte order of every `width`-byte sample in place.
pub fn swap_samples(buf: &mut [u8], width: usize) {
    if width > 1 {
        for chunk in buf.chunks_exact_mut(width) {
            chunk.reverse();
        }
    }
}
