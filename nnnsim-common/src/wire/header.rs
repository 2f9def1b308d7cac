//! Packet classification by leading discriminator bytes.

use crate::error::Error;
use crate::pdu::PduKind;

/// Recognised ICN header formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcnHeader {
    InterestCcnb,
    ContentObjectCcnb,
    InterestNdnsim,
    ContentObjectNdnsim,
}

impl IcnHeader {
    pub const INTEREST_CCNB: [u8; 2] = [0x01, 0xD2];
    pub const CONTENT_OBJECT_CCNB: [u8; 2] = [0x04, 0x82];
    pub const INTEREST_NDNSIM: [u8; 2] = [0x80, 0x00];
    pub const CONTENT_OBJECT_NDNSIM: [u8; 2] = [0x80, 0x01];

    pub fn is_interest(&self) -> bool {
        matches!(self, IcnHeader::InterestCcnb | IcnHeader::InterestNdnsim)
    }
}

/// Identifies an ICN packet from its first two bytes.
pub fn classify_icn(bytes: &[u8]) -> Result<IcnHeader, Error> {
    let head: [u8; 2] = match bytes.get(..2) {
        Some(head) => [head[0], head[1]],
        None => return Err(Error::UnknownHeader),
    };

    match head {
        IcnHeader::INTEREST_CCNB => Ok(IcnHeader::InterestCcnb),
        IcnHeader::CONTENT_OBJECT_CCNB => Ok(IcnHeader::ContentObjectCcnb),
        IcnHeader::INTEREST_NDNSIM => Ok(IcnHeader::InterestNdnsim),
        IcnHeader::CONTENT_OBJECT_NDNSIM => Ok(IcnHeader::ContentObjectNdnsim),
        _ => Err(Error::UnknownHeader),
    }
}

/// Identifies a 3N PDU from its first four bytes.
pub fn classify_nnn(bytes: &[u8]) -> Result<PduKind, Error> {
    let head = bytes.get(..4).ok_or(Error::UnknownHeader)?;
    let code = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    PduKind::from_u32(code).ok_or(Error::UnknownHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icn_discriminators() {
        assert_eq!(classify_icn(&[0x01, 0xD2, 9]).unwrap(), IcnHeader::InterestCcnb);
        assert_eq!(classify_icn(&[0x04, 0x82]).unwrap(), IcnHeader::ContentObjectCcnb);
        assert_eq!(classify_icn(&[0x80, 0x00]).unwrap(), IcnHeader::InterestNdnsim);
        assert_eq!(classify_icn(&[0x80, 0x01]).unwrap(), IcnHeader::ContentObjectNdnsim);
        assert!(matches!(classify_icn(&[0x80, 0x02]), Err(Error::UnknownHeader)));
        assert!(matches!(classify_icn(&[0x80]), Err(Error::UnknownHeader)));
    }

    #[test]
    fn nnn_discriminators() {
        assert_eq!(classify_nnn(&[0, 0, 0, 0]).unwrap(), PduKind::Nullp);
        assert_eq!(classify_nnn(&[3, 0, 0, 0, 0xff]).unwrap(), PduKind::Du);
        assert_eq!(classify_nnn(&[9, 0, 0, 0]).unwrap(), PduKind::Inf);
        assert!(matches!(classify_nnn(&[10, 0, 0, 0]), Err(Error::UnknownHeader)));
        assert!(matches!(classify_nnn(&[0, 0, 0, 1]), Err(Error::UnknownHeader)));
        assert!(matches!(classify_nnn(&[0, 0]), Err(Error::UnknownHeader)));
    }
}
