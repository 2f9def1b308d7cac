//! Wire encoding and decoding.
//!
//! Every multi-byte integer is little-endian. ICN packets use the ndnSIM
//! layout (see [`icn`]); 3N PDUs start with a 4-byte type discriminator (see
//! [`nnn`]). [`header`] peeks at those discriminators without decoding.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes};

pub mod header;
pub mod icn;
pub mod nnn;

pub use header::{classify_icn, classify_nnn, IcnHeader};

/// A type with a binary wire representation.
pub trait WireFormat: Sized {
    /// Encodes `self` into a fresh buffer. Fails when a length does not fit
    /// its field.
    fn to_wire(&self) -> Result<Bytes, Error>;

    /// Decodes a value from `bytes`.
    fn from_wire(bytes: &[u8]) -> Result<Self, Error>;

    /// Number of bytes [`WireFormat::to_wire`] produces.
    fn serialized_size(&self) -> usize;
}

/* ---------------------------------------------------------------- *
 * Encoding helpers
 * ---------------------------------------------------------------- */

fn oversize(what: &str, len: usize, max: usize) -> Error {
    Error::Wire(format!("{} of {} exceeds the field maximum {}", what, len, max))
}

pub(crate) fn put_len_u8(buf: &mut impl BufMut, len: usize, what: &str) -> Result<(), Error> {
    let len8 = u8::try_from(len).map_err(|_| oversize(what, len, u8::MAX as usize))?;
    buf.put_u8(len8);
    Ok(())
}

pub(crate) fn put_len_u16(buf: &mut impl BufMut, len: usize, what: &str) -> Result<(), Error> {
    let len16 = u16::try_from(len).map_err(|_| oversize(what, len, u16::MAX as usize))?;
    buf.put_u16_le(len16);
    Ok(())
}

pub(crate) fn put_len_u32(buf: &mut impl BufMut, len: usize, what: &str) -> Result<(), Error> {
    let len32 = u32::try_from(len).map_err(|_| oversize(what, len, u32::MAX as usize))?;
    buf.put_u32_le(len32);
    Ok(())
}

/* ---------------------------------------------------------------- *
 * Decoding helpers
 * ---------------------------------------------------------------- */

fn underflow(what: &str) -> Error {
    Error::Wire(format!("Buffer underflow when decoding {}", what))
}

pub(crate) fn get_u8(buf: &mut impl Buf, what: &str) -> Result<u8, Error> {
    if buf.remaining() < 1 {
        return Err(underflow(what));
    }
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut impl Buf, what: &str) -> Result<u16, Error> {
    if buf.remaining() < 2 {
        return Err(underflow(what));
    }
    Ok(buf.get_u16_le())
}

pub(crate) fn get_u32(buf: &mut impl Buf, what: &str) -> Result<u32, Error> {
    if buf.remaining() < 4 {
        return Err(underflow(what));
    }
    Ok(buf.get_u32_le())
}

pub(crate) fn get_u64(buf: &mut impl Buf, what: &str) -> Result<u64, Error> {
    if buf.remaining() < 8 {
        return Err(underflow(what));
    }
    Ok(buf.get_u64_le())
}

pub(crate) fn get_bytes(buf: &mut impl Buf, len: usize, what: &str) -> Result<Bytes, Error> {
    if buf.remaining() < len {
        return Err(underflow(what));
    }
    Ok(buf.copy_to_bytes(len))
}

/// Renders bytes as lowercase hex, for logs and the CLI.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parses a hex string, ignoring whitespace.
pub fn from_hex(text: &str) -> Result<Vec<u8>, Error> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(Error::Wire("odd number of hex digits".into()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s: String = pair.iter().collect();
            u8::from_str_radix(&s, 16).map_err(|_| Error::Wire(format!("invalid hex byte '{}'", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underflow_is_an_error() {
        let mut buf: &[u8] = &[1];
        assert!(get_u16(&mut buf, "test").is_err());
        let mut buf: &[u8] = &[1, 0];
        assert_eq!(get_u16(&mut buf, "test").unwrap(), 1);
    }

    #[test]
    fn oversize_lengths_are_refused() {
        let mut buf = Vec::new();
        assert!(put_len_u16(&mut buf, u16::MAX as usize, "test").is_ok());
        assert_eq!(buf, vec![0xff, 0xff]);
        assert!(matches!(put_len_u16(&mut buf, 70_000, "test"), Err(Error::Wire(_))));
        assert!(matches!(put_len_u8(&mut buf, 256, "test"), Err(Error::Wire(_))));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(to_hex(&[0x80, 0x00]), "8000");
        assert_eq!(from_hex("80 01").unwrap(), vec![0x80, 0x01]);
        assert!(from_hex("800").is_err());
        assert!(from_hex("zz").is_err());
    }
}
