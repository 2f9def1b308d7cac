//! ndnSIM wire layout for Interest and Data.
//!
//! Interest:
//! ```text
//! 0x80 0x00 | u16 length | u32 nonce | u8 scope | u8 nack | u16 lifetime(s)
//! name | u16 selectors length [0x01 exclude] | u16 options length (0)
//! ```
//! Data:
//! ```text
//! 0x80 0x01 | u16 length | signature | name
//! u16 12 | u16 10 | u32 timestamp(s) | u16 freshness(s) | u16 reserved
//! u16 options length [key locator name] | payload...
//! ```
//! The `length` field counts the header bytes after the first four; the Data
//! payload follows the header.

use super::{get_bytes, get_u16, get_u32, get_u8, put_len_u16, WireFormat};
use crate::error::Error;
use crate::exclude::Exclude;
use crate::icn::{Data, IcnPacket, Interest, NackType, PacketTags};
use crate::name::{Name, NameComponent};
use crate::wire::header::{classify_icn, IcnHeader};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::Duration;

const EXCLUDE_NAME_TYPE: u8 = 0x01;
const EXCLUDE_ANY_TYPE: u8 = 0x02;
const SELECTOR_EXCLUDE: u8 = 0x01;
const SIGNATURE_CUSTOM: u16 = 0xFF00;
const SCOPE_UNLIMITED: u8 = 0xFF;

/* ---------------------------------------------------------------- *
 * Names and exclude filters
 * ---------------------------------------------------------------- */

pub fn serialized_size_name(name: &Name) -> usize {
    2 + name.components().iter().map(|c| 2 + c.len()).sum::<usize>()
}

pub fn serialize_name(name: &Name, buf: &mut BytesMut) -> Result<(), Error> {
    put_len_u16(buf, serialized_size_name(name) - 2, "name length")?;
    for comp in name.components() {
        put_len_u16(buf, comp.len(), "name component length")?;
        buf.put_slice(comp.as_bytes());
    }
    Ok(())
}

pub fn deserialize_name(buf: &mut impl Buf) -> Result<Name, Error> {
    let mut remaining = get_u16(buf, "name length")? as usize;
    let mut name = Name::new();
    while remaining > 0 {
        let len = get_u16(buf, "name component length")? as usize;
        remaining = remaining
            .checked_sub(2 + len)
            .ok_or_else(|| Error::Wire("name component overruns name length".into()))?;
        name.push(NameComponent::new(get_bytes(buf, len, "name component")?));
    }
    Ok(name)
}

pub fn serialized_size_exclude(exclude: &Exclude) -> usize {
    2 + exclude
        .iter()
        .map(|(comp, any)| {
            let name_part = if comp.is_empty() { 0 } else { 1 + 2 + comp.len() };
            name_part + usize::from(any)
        })
        .sum::<usize>()
}

pub fn serialize_exclude(exclude: &Exclude, buf: &mut BytesMut) -> Result<(), Error> {
    put_len_u16(buf, serialized_size_exclude(exclude) - 2, "exclude length")?;
    for (comp, any) in exclude.iter() {
        if !comp.is_empty() {
            buf.put_u8(EXCLUDE_NAME_TYPE);
            put_len_u16(buf, comp.len(), "exclude component length")?;
            buf.put_slice(comp.as_bytes());
        }
        if any {
            buf.put_u8(EXCLUDE_ANY_TYPE);
        }
    }
    Ok(())
}

pub fn deserialize_exclude(buf: &mut impl Buf) -> Result<Exclude, Error> {
    let mut remaining = get_u16(buf, "exclude length")? as usize;
    let mut exclude = Exclude::new();
    while remaining > 0 {
        let kind = get_u8(buf, "exclude entry type")?;
        remaining -= 1;
        match kind {
            EXCLUDE_ANY_TYPE => exclude.append_exclude(NameComponent::new(Bytes::new()), true),
            EXCLUDE_NAME_TYPE => {
                let len = get_u16(buf, "exclude component length")? as usize;
                remaining = remaining
                    .checked_sub(2 + len)
                    .ok_or_else(|| Error::Wire("exclude component overruns filter".into()))?;
                let comp = NameComponent::new(get_bytes(buf, len, "exclude component")?);
                let any = remaining > 0 && buf.chunk().first() == Some(&EXCLUDE_ANY_TYPE);
                if any {
                    buf.advance(1);
                    remaining -= 1;
                }
                exclude.append_exclude(comp, any);
            }
            other => {
                return Err(Error::Wire(format!("Incorrect format of Exclude filter (type {})", other)));
            }
        }
    }
    Ok(exclude)
}

fn whole_seconds(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

/* ---------------------------------------------------------------- *
 * Interest
 * ---------------------------------------------------------------- */

fn interest_selectors_size(interest: &Interest) -> usize {
    match &interest.exclude {
        Some(exclude) => 1 + serialized_size_exclude(exclude),
        None => 0,
    }
}

impl WireFormat for Interest {
    fn to_wire(&self) -> Result<Bytes, Error> {
        let size = self.serialized_size();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_slice(&IcnHeader::INTEREST_NDNSIM);
        put_len_u16(&mut buf, size - 4, "Interest length")?;
        buf.put_u32_le(self.nonce);
        buf.put_u8(self.scope.unwrap_or(SCOPE_UNLIMITED));
        buf.put_u8(self.nack as u8);
        buf.put_u16_le(whole_seconds(self.lifetime).min(u16::MAX as u64) as u16);
        serialize_name(&self.name, &mut buf)?;
        put_len_u16(&mut buf, interest_selectors_size(self), "selectors length")?;
        if let Some(exclude) = &self.exclude {
            buf.put_u8(SELECTOR_EXCLUDE);
            serialize_exclude(exclude, &mut buf)?;
        }
        buf.put_u16_le(0);
        Ok(buf.freeze())
    }

    fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        if classify_icn(bytes)? != IcnHeader::InterestNdnsim {
            return Err(Error::Wire("not an ndnSIM Interest".into()));
        }
        let mut buf = &bytes[2..];
        let length = get_u16(&mut buf, "interest length")? as usize;
        if buf.remaining() < length {
            return Err(Error::Wire("truncated Interest".into()));
        }

        let nonce = get_u32(&mut buf, "nonce")?;
        let scope = match get_u8(&mut buf, "scope")? {
            SCOPE_UNLIMITED => None,
            s => Some(s),
        };
        let nack_code = get_u8(&mut buf, "nack type")?;
        let nack = NackType::from_u8(nack_code)
            .ok_or_else(|| Error::Wire(format!("unknown NACK type {}", nack_code)))?;
        let lifetime = Duration::from_secs(get_u16(&mut buf, "lifetime")? as u64);
        let name = deserialize_name(&mut buf)?;

        let selectors = get_u16(&mut buf, "selectors length")? as usize;
        let exclude = if selectors > 0 {
            match get_u8(&mut buf, "selector type")? {
                SELECTOR_EXCLUDE => Some(deserialize_exclude(&mut buf)?),
                other => return Err(Error::Wire(format!("unknown selector type {}", other))),
            }
        } else {
            None
        };

        let options = get_u16(&mut buf, "options length")? as usize;
        get_bytes(&mut buf, options, "options")?;

        Ok(Interest {
            name,
            nonce,
            scope,
            nack,
            lifetime,
            exclude,
            tags: PacketTags::default(),
        })
    }

    fn serialized_size(&self) -> usize {
        4 + 4 + 1 + 1 + 2 + serialized_size_name(&self.name) + 2 + interest_selectors_size(self) + 2
    }
}

/* ---------------------------------------------------------------- *
 * Data
 * ---------------------------------------------------------------- */

fn data_signature_size(data: &Data) -> usize {
    if data.signature == 0 {
        4
    } else {
        8
    }
}

fn data_options_size(data: &Data) -> usize {
    data.key_locator.as_ref().map(serialized_size_name).unwrap_or(0)
}

fn data_header_size(data: &Data) -> usize {
    4 + data_signature_size(data)
        + serialized_size_name(&data.name)
        + 2 + 2 + 4 + 2 + 2
        + 2 + data_options_size(data)
}

impl WireFormat for Data {
    fn to_wire(&self) -> Result<Bytes, Error> {
        let header = data_header_size(self);
        let mut buf = BytesMut::with_capacity(header + self.payload.len());
        buf.put_slice(&IcnHeader::CONTENT_OBJECT_NDNSIM);
        put_len_u16(&mut buf, header - 4, "Data header length")?;

        if self.signature == 0 {
            buf.put_u16_le(2);
            buf.put_u16_le(0);
        } else {
            buf.put_u16_le(6);
            buf.put_u16_le(SIGNATURE_CUSTOM);
            buf.put_u32_le(self.signature);
        }

        serialize_name(&self.name, &mut buf)?;

        buf.put_u16_le(12);
        buf.put_u16_le(10);
        buf.put_u32_le(self.timestamp.as_secs() as u32);
        buf.put_u16_le(whole_seconds(self.freshness).min(u16::MAX as u64) as u16);
        buf.put_u16_le(0);
        put_len_u16(&mut buf, data_options_size(self), "options length")?;
        if let Some(key) = &self.key_locator {
            serialize_name(key, &mut buf)?;
        }

        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        if classify_icn(bytes)? != IcnHeader::ContentObjectNdnsim {
            return Err(Error::Wire("not an ndnSIM Data".into()));
        }
        let mut buf = &bytes[2..];
        let length = get_u16(&mut buf, "data length")? as usize;
        if buf.remaining() < length {
            return Err(Error::Wire("truncated Data".into()));
        }

        let signature = match get_u16(&mut buf, "signature length")? {
            2 => {
                get_u16(&mut buf, "signature type")?;
                0
            }
            6 => {
                if get_u16(&mut buf, "signature type")? != SIGNATURE_CUSTOM {
                    return Err(Error::Wire("unsupported signature type".into()));
                }
                get_u32(&mut buf, "signature")?
            }
            other => return Err(Error::Wire(format!("unsupported signature length {}", other))),
        };

        let name = deserialize_name(&mut buf)?;

        if get_u16(&mut buf, "content info length")? != 12 || get_u16(&mut buf, "signed info length")? != 10 {
            return Err(Error::Wire("malformed content info".into()));
        }
        let timestamp = Duration::from_secs(get_u32(&mut buf, "timestamp")? as u64);
        let freshness = Duration::from_secs(get_u16(&mut buf, "freshness")? as u64);
        get_u16(&mut buf, "reserved")?;
        let options = get_u16(&mut buf, "options length")? as usize;
        let key_locator = if options > 0 {
            let mut opt = get_bytes(&mut buf, options, "options")?;
            Some(deserialize_name(&mut opt)?)
        } else {
            None
        };

        let payload = Bytes::copy_from_slice(buf);

        Ok(Data {
            name,
            payload,
            freshness,
            timestamp,
            signature,
            key_locator,
            tags: PacketTags::default(),
        })
    }

    fn serialized_size(&self) -> usize {
        data_header_size(self) + self.payload.len()
    }
}

impl WireFormat for IcnPacket {
    fn to_wire(&self) -> Result<Bytes, Error> {
        match self {
            IcnPacket::Interest(interest) => interest.to_wire(),
            IcnPacket::Data(data) => data.to_wire(),
        }
    }

    fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        match classify_icn(bytes)? {
            IcnHeader::InterestNdnsim => Ok(IcnPacket::Interest(Interest::from_wire(bytes)?)),
            IcnHeader::ContentObjectNdnsim => Ok(IcnPacket::Data(Data::from_wire(bytes)?)),
            ccnb => Err(Error::Wire(format!("{:?} packets are recognised but not supported", ccnb))),
        }
    }

    fn serialized_size(&self) -> usize {
        match self {
            IcnPacket::Interest(interest) => interest.serialized_size(),
            IcnPacket::Data(data) => data.serialized_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_uri(s).unwrap()
    }

    #[test]
    fn interest_layout() {
        let interest = Interest::new(name("/a"))
            .with_nonce(0x01020304)
            .with_lifetime(Duration::from_secs(2));
        let wire = interest.to_wire().unwrap();

        assert_eq!(wire.len(), interest.serialized_size());
        assert_eq!(&wire[..2], &[0x80, 0x00]);
        assert_eq!(u16::from_le_bytes([wire[2], wire[3]]) as usize, wire.len() - 4);
        assert_eq!(&wire[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(wire[8], SCOPE_UNLIMITED);
        assert_eq!(wire[9], 0);
        assert_eq!(&wire[10..12], &[2, 0]);

        let back = Interest::from_wire(&wire).unwrap();
        assert_eq!(back, interest);
    }

    #[test]
    fn interest_with_exclude() {
        let mut exclude = Exclude::new();
        exclude.exclude_one(NameComponent::from("x"));
        exclude.exclude_after(NameComponent::from("zz"));
        let interest = Interest::new(name("/a/b")).with_exclude(exclude.clone()).with_scope(2);

        let back = Interest::from_wire(&interest.to_wire().unwrap()).unwrap();
        assert_eq!(back.exclude, Some(exclude));
        assert_eq!(back.scope, Some(2));
    }

    #[test]
    fn sub_second_lifetime_rounds_up() {
        let interest = Interest::new(name("/a")).with_lifetime(Duration::from_millis(1500));
        let back = Interest::from_wire(&interest.to_wire().unwrap()).unwrap();
        assert_eq!(back.lifetime, Duration::from_secs(2));
    }

    #[test]
    fn data_with_payload_and_signature() {
        let data = Data::new(name("/waseda/satolab").append_seq_num(7), Bytes::from(vec![7u8; 32]))
            .with_freshness(Duration::from_secs(5))
            .with_signature(0xdeadbeef)
            .with_key_locator(name("/keys/producer"));
        let wire = data.to_wire().unwrap();
        assert_eq!(wire.len(), data.serialized_size());
        assert_eq!(&wire[..2], &[0x80, 0x01]);

        let back = Data::from_wire(&wire).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn ccnb_is_recognised_but_rejected() {
        let err = IcnPacket::from_wire(&[0x01, 0xD2, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::Wire(_)));
        assert!(matches!(IcnPacket::from_wire(&[0xAA, 0xBB]), Err(Error::UnknownHeader)));
    }

    #[test]
    fn truncated_packets_fail_cleanly() {
        let wire = Interest::new(name("/a/b/c")).to_wire().unwrap();
        for cut in 0..wire.len() {
            assert!(Interest::from_wire(&wire[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn oversize_name_component_is_refused() {
        let mut long = name("/a");
        long.push(NameComponent::new(vec![0u8; 70_000]));
        let err = Interest::new(long.clone()).to_wire().unwrap_err();
        assert!(matches!(err, Error::Wire(_)));
        assert!(Data::new(long, Bytes::new()).to_wire().is_err());

        let mut filler = name("/a");
        for _ in 0..40 {
            filler.push(NameComponent::new(vec![1u8; 2_000]));
        }
        assert!(Interest::new(filler).to_wire().is_err(), "total name length overflows");
    }
}
