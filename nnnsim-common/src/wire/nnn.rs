//! 3N PDU wire layout.
//!
//! ```text
//! u32 type (0..=9) | u16 version | u32 lifetime(ms) | type-specific fields
//! ```
//! Field encodings:
//! * 3N name: `u8` label count, then one `u64` per label
//! * PoA list: `u16` count, then per PoA `u16` length + bytes
//! * lease / remaining lease: `u64` milliseconds
//! * payload: `u16` payload type, `u32` length, bytes

use super::{get_bytes, get_u16, get_u32, get_u64, get_u8, put_len_u16, put_len_u32, put_len_u8, WireFormat};
use crate::address::NnnAddress;
use crate::error::Error;
use crate::pdu::*;
use crate::types::{Poa, MAX_NNN_ADDRESS_COMPONENTS};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::Duration;

const COMMON_HEADER_SIZE: usize = 4 + 2 + 4;

fn name_size(name: &NnnAddress) -> usize {
    1 + 8 * name.len()
}

fn put_name(name: &NnnAddress, buf: &mut BytesMut) -> Result<(), Error> {
    put_len_u8(buf, name.len(), "3N name length")?;
    for label in name.labels() {
        buf.put_u64_le(*label);
    }
    Ok(())
}

fn get_name(buf: &mut impl Buf) -> Result<NnnAddress, Error> {
    let count = get_u8(buf, "3N name length")? as usize;
    if count > MAX_NNN_ADDRESS_COMPONENTS {
        return Err(Error::Wire(format!("3N name with {} labels", count)));
    }
    let labels = (0..count)
        .map(|_| get_u64(buf, "3N name label"))
        .collect::<Result<Vec<_>, _>>()?;
    NnnAddress::from_labels(labels)
}

fn poas_size(poas: &[Poa]) -> usize {
    2 + poas.iter().map(|p| 2 + p.as_bytes().len()).sum::<usize>()
}

fn put_poas(poas: &[Poa], buf: &mut BytesMut) -> Result<(), Error> {
    put_len_u16(buf, poas.len(), "PoA count")?;
    for poa in poas {
        put_len_u16(buf, poa.as_bytes().len(), "PoA length")?;
        buf.put_slice(poa.as_bytes());
    }
    Ok(())
}

fn get_poas(buf: &mut impl Buf) -> Result<Vec<Poa>, Error> {
    let count = get_u16(buf, "PoA count")? as usize;
    (0..count)
        .map(|_| {
            let len = get_u16(buf, "PoA length")? as usize;
            Ok(Poa(get_bytes(buf, len, "PoA")?))
        })
        .collect()
}

fn put_millis(d: Duration, buf: &mut BytesMut) {
    buf.put_u64_le(d.as_millis().min(u64::MAX as u128) as u64);
}

fn get_millis(buf: &mut impl Buf, what: &str) -> Result<Duration, Error> {
    Ok(Duration::from_millis(get_u64(buf, what)?))
}

fn payload_size(payload: &PduPayload) -> usize {
    2 + 4 + payload.bytes.len()
}

fn put_payload(payload: &PduPayload, buf: &mut BytesMut) -> Result<(), Error> {
    buf.put_u16_le(payload.payload_type as u16);
    put_len_u32(buf, payload.bytes.len(), "payload length")?;
    buf.put_slice(&payload.bytes);
    Ok(())
}

fn get_payload(buf: &mut impl Buf) -> Result<PduPayload, Error> {
    let code = get_u16(buf, "payload type")?;
    let payload_type =
        PayloadType::from_u16(code).ok_or_else(|| Error::Wire(format!("unknown payload type {}", code)))?;
    let len = get_u32(buf, "payload length")? as usize;
    Ok(PduPayload {
        payload_type,
        bytes: get_bytes(buf, len, "payload")?,
    })
}

impl WireFormat for Pdu {
    fn to_wire(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        let header = self.header();
        buf.put_u32_le(self.kind() as u32);
        buf.put_u16_le(header.version);
        buf.put_u32_le(header.lifetime.as_millis().min(u32::MAX as u128) as u32);

        match self {
            Pdu::Nullp(p) => put_payload(&p.payload, &mut buf)?,
            Pdu::So(p) => {
                put_name(&p.src, &mut buf)?;
                put_payload(&p.payload, &mut buf)?;
            }
            Pdu::Do(p) => {
                put_name(&p.dst, &mut buf)?;
                put_payload(&p.payload, &mut buf)?;
            }
            Pdu::Du(p) => {
                put_name(&p.src, &mut buf)?;
                put_name(&p.dst, &mut buf)?;
                put_payload(&p.payload, &mut buf)?;
            }
            Pdu::En(p) => put_poas(&p.poas, &mut buf)?,
            Pdu::Aen(p) => {
                put_name(&p.name, &mut buf)?;
                put_millis(p.lease, &mut buf);
            }
            Pdu::Oen(p) => {
                put_poas(&p.poas, &mut buf)?;
                put_name(&p.name, &mut buf)?;
                put_millis(p.lease, &mut buf);
                put_name(&p.src, &mut buf)?;
                put_poas(&p.personal_poas, &mut buf)?;
            }
            Pdu::Ren(p) => {
                put_poas(&p.poas, &mut buf)?;
                put_name(&p.name, &mut buf)?;
                put_millis(p.remaining_lease, &mut buf);
            }
            Pdu::Den(p) => {
                put_poas(&p.poas, &mut buf)?;
                put_name(&p.name, &mut buf)?;
            }
            Pdu::Inf(p) => {
                put_name(&p.old_name, &mut buf)?;
                put_name(&p.new_name, &mut buf)?;
                put_millis(p.remaining_lease, &mut buf);
            }
        }

        Ok(buf.freeze())
    }

    fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let kind = super::classify_nnn(bytes)?;
        let mut buf = &bytes[4..];
        let header = PduHeader {
            version: get_u16(&mut buf, "PDU version")?,
            lifetime: Duration::from_millis(get_u32(&mut buf, "PDU lifetime")? as u64),
        };

        let pdu = match kind {
            PduKind::Nullp => Pdu::Nullp(NullpPdu {
                header,
                payload: get_payload(&mut buf)?,
            }),
            PduKind::So => Pdu::So(SoPdu {
                header,
                src: get_name(&mut buf)?,
                payload: get_payload(&mut buf)?,
            }),
            PduKind::Do => Pdu::Do(DoPdu {
                header,
                dst: get_name(&mut buf)?,
                payload: get_payload(&mut buf)?,
            }),
            PduKind::Du => Pdu::Du(DuPdu {
                header,
                src: get_name(&mut buf)?,
                dst: get_name(&mut buf)?,
                payload: get_payload(&mut buf)?,
            }),
            PduKind::En => Pdu::En(EnPdu {
                header,
                poas: get_poas(&mut buf)?,
            }),
            PduKind::Aen => Pdu::Aen(AenPdu {
                header,
                name: get_name(&mut buf)?,
                lease: get_millis(&mut buf, "lease")?,
            }),
            PduKind::Oen => Pdu::Oen(OenPdu {
                header,
                poas: get_poas(&mut buf)?,
                name: get_name(&mut buf)?,
                lease: get_millis(&mut buf, "lease")?,
                src: get_name(&mut buf)?,
                personal_poas: get_poas(&mut buf)?,
            }),
            PduKind::Ren => Pdu::Ren(RenPdu {
                header,
                poas: get_poas(&mut buf)?,
                name: get_name(&mut buf)?,
                remaining_lease: get_millis(&mut buf, "remaining lease")?,
            }),
            PduKind::Den => Pdu::Den(DenPdu {
                header,
                poas: get_poas(&mut buf)?,
                name: get_name(&mut buf)?,
            }),
            PduKind::Inf => Pdu::Inf(InfPdu {
                header,
                old_name: get_name(&mut buf)?,
                new_name: get_name(&mut buf)?,
                remaining_lease: get_millis(&mut buf, "remaining lease")?,
            }),
        };

        if buf.has_remaining() {
            return Err(Error::Wire(format!(
                "{} trailing bytes after {} PDU",
                buf.remaining(),
                kind
            )));
        }

        Ok(pdu)
    }

    fn serialized_size(&self) -> usize {
        COMMON_HEADER_SIZE
            + match self {
                Pdu::Nullp(p) => payload_size(&p.payload),
                Pdu::So(p) => name_size(&p.src) + payload_size(&p.payload),
                Pdu::Do(p) => name_size(&p.dst) + payload_size(&p.payload),
                Pdu::Du(p) => name_size(&p.src) + name_size(&p.dst) + payload_size(&p.payload),
                Pdu::En(p) => poas_size(&p.poas),
                Pdu::Aen(p) => name_size(&p.name) + 8,
                Pdu::Oen(p) => {
                    poas_size(&p.poas) + name_size(&p.name) + 8 + name_size(&p.src) + poas_size(&p.personal_poas)
                }
                Pdu::Ren(p) => poas_size(&p.poas) + name_size(&p.name) + 8,
                Pdu::Den(p) => poas_size(&p.poas) + name_size(&p.name),
                Pdu::Inf(p) => name_size(&p.old_name) + name_size(&p.new_name) + 8,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NnnAddress {
        s.parse().unwrap()
    }

    fn payload() -> PduPayload {
        PduPayload::icn(Bytes::from_static(b"\x80\x00icn"))
    }

    #[test]
    fn type_tag_is_little_endian_u32() {
        let wire = Pdu::du(addr("1.2"), addr("3.4"), payload()).to_wire().unwrap();
        assert_eq!(&wire[..4], &[3, 0, 0, 0]);
        let wire = Pdu::nullp(payload()).to_wire().unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn every_kind_decodes_back() {
        let poas = vec![Poa::from_u64(1), Poa::from_u64(2)];
        let header = PduHeader::default();
        let pdus = vec![
            Pdu::nullp(payload()),
            Pdu::so(addr("1"), payload()),
            Pdu::do_(addr("1.2.3"), payload()),
            Pdu::du(addr("1"), addr("2"), payload()),
            Pdu::En(EnPdu { header, poas: poas.clone() }),
            Pdu::Aen(AenPdu { header, name: addr("1.5"), lease: Duration::from_secs(300) }),
            Pdu::Oen(OenPdu {
                header,
                poas: poas.clone(),
                name: addr("2.1"),
                lease: Duration::from_secs(30),
                src: addr("2"),
                personal_poas: vec![Poa::from_u64(9)],
            }),
            Pdu::Ren(RenPdu { header, poas: poas.clone(), name: addr("1.5"), remaining_lease: Duration::from_millis(1500) }),
            Pdu::Den(DenPdu { header, poas, name: addr("1.5") }),
            Pdu::Inf(InfPdu { header, old_name: addr("1.5"), new_name: addr("2.7"), remaining_lease: Duration::from_secs(9) }),
        ];

        for pdu in pdus {
            let wire = pdu.to_wire().unwrap();
            assert_eq!(wire.len(), pdu.serialized_size(), "{}", pdu.kind());
            assert_eq!(Pdu::from_wire(&wire).unwrap(), pdu);
        }
    }

    #[test]
    fn rejects_unknown_type_and_trailing_bytes() {
        assert!(matches!(Pdu::from_wire(&[42, 0, 0, 0, 1, 0]), Err(Error::UnknownHeader)));

        let mut wire = Pdu::nullp(payload()).to_wire().unwrap().to_vec();
        wire.push(0);
        assert!(matches!(Pdu::from_wire(&wire), Err(Error::Wire(_))));
    }

    #[test]
    fn rejects_bad_payload_type() {
        let mut wire = Pdu::nullp(payload()).to_wire().unwrap().to_vec();
        wire[10] = 7;
        assert!(Pdu::from_wire(&wire).is_err());
    }

    #[test]
    fn oversize_poa_fields_are_refused() {
        let header = PduHeader::default();
        let long = Pdu::En(EnPdu { header, poas: vec![Poa::new(vec![0u8; 70_000])] });
        assert!(matches!(long.to_wire(), Err(Error::Wire(_))));

        let many = Pdu::Den(DenPdu { header, poas: vec![Poa::from_u64(1); 65_536], name: addr("1") });
        assert!(matches!(many.to_wire(), Err(Error::Wire(_))));

        let most = Pdu::En(EnPdu { header, poas: vec![Poa::from_u64(1); 65_535] });
        assert_eq!(most.to_wire().unwrap().len(), most.serialized_size());
    }
}
