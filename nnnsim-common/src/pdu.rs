//! 3N protocol data units.
//!
//! Data PDUs (NULLp, SO, DO, DU) carry an opaque payload, usually an encoded
//! ICN packet. Mechanism PDUs (EN, AEN, OEN, REN, DEN, INF) drive name
//! enrollment, renewal and handoff.

use crate::address::NnnAddress;
use crate::types::{Poa, Time, NNN_PDU_VERSION};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Default lifetime of a freshly built PDU.
pub const DEFAULT_PDU_LIFETIME: Duration = Duration::from_secs(2);

/// PDU type discriminator, as written in the first four bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PduKind {
    Nullp = 0,
    So = 1,
    Do = 2,
    Du = 3,
    En = 4,
    Oen = 5,
    Aen = 6,
    Ren = 7,
    Den = 8,
    Inf = 9,
}

impl PduKind {
    pub const ALL: [PduKind; 10] = [
        PduKind::Nullp,
        PduKind::So,
        PduKind::Do,
        PduKind::Du,
        PduKind::En,
        PduKind::Oen,
        PduKind::Aen,
        PduKind::Ren,
        PduKind::Den,
        PduKind::Inf,
    ];

    pub fn from_u32(v: u32) -> Option<Self> {
        PduKind::ALL.get(v as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PduKind::Nullp => "NULLp",
            PduKind::So => "SO",
            PduKind::Do => "DO",
            PduKind::Du => "DU",
            PduKind::En => "EN",
            PduKind::Oen => "OEN",
            PduKind::Aen => "AEN",
            PduKind::Ren => "REN",
            PduKind::Den => "DEN",
            PduKind::Inf => "INF",
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, PduKind::Nullp | PduKind::So | PduKind::Do | PduKind::Du)
    }
}

impl fmt::Display for PduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a data PDU carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PayloadType {
    Icn = 1,
    Nnn = 2,
}

impl PayloadType {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(PayloadType::Icn),
            2 => Some(PayloadType::Nnn),
            _ => None,
        }
    }
}

/// Fields common to every PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub version: u16,
    /// Remaining lifetime (TTL).
    pub lifetime: Duration,
}

impl Default for PduHeader {
    fn default() -> Self {
        Self {
            version: NNN_PDU_VERSION,
            lifetime: DEFAULT_PDU_LIFETIME,
        }
    }
}

/// Payload of a data PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduPayload {
    pub payload_type: PayloadType,
    pub bytes: Bytes,
}

impl PduPayload {
    pub fn icn(bytes: Bytes) -> Self {
        Self {
            payload_type: PayloadType::Icn,
            bytes,
        }
    }
}

/// NULLp: payload with no 3N addressing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullpPdu {
    pub header: PduHeader,
    pub payload: PduPayload,
}

/// SO: payload stamped with its source 3N name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoPdu {
    pub header: PduHeader,
    pub src: NnnAddress,
    pub payload: PduPayload,
}

/// DO: payload addressed to a destination 3N name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoPdu {
    pub header: PduHeader,
    pub dst: NnnAddress,
    pub payload: PduPayload,
}

/// DU: payload with both source and destination 3N names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuPdu {
    pub header: PduHeader,
    pub src: NnnAddress,
    pub dst: NnnAddress,
    pub payload: PduPayload,
}

/// EN: enroll request carrying the sender's points of attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnPdu {
    pub header: PduHeader,
    pub poas: Vec<Poa>,
}

/// AEN: name assignment with an absolute lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AenPdu {
    pub header: PduHeader,
    pub name: NnnAddress,
    pub lease: Time,
}

/// OEN: enroll of a node that already holds a name elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OenPdu {
    pub header: PduHeader,
    pub poas: Vec<Poa>,
    pub name: NnnAddress,
    pub lease: Time,
    pub src: NnnAddress,
    pub personal_poas: Vec<Poa>,
}

/// REN: lease renewal for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenPdu {
    pub header: PduHeader,
    pub poas: Vec<Poa>,
    pub name: NnnAddress,
    pub remaining_lease: Duration,
}

/// DEN: disenroll of a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenPdu {
    pub header: PduHeader,
    pub poas: Vec<Poa>,
    pub name: NnnAddress,
}

/// INF: announces that `old_name` is now reachable as `new_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfPdu {
    pub header: PduHeader,
    pub old_name: NnnAddress,
    pub new_name: NnnAddress,
    pub remaining_lease: Duration,
}

/// Any 3N PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Nullp(NullpPdu),
    So(SoPdu),
    Do(DoPdu),
    Du(DuPdu),
    En(EnPdu),
    Oen(OenPdu),
    Aen(AenPdu),
    Ren(RenPdu),
    Den(DenPdu),
    Inf(InfPdu),
}

impl Pdu {
    pub fn nullp(payload: PduPayload) -> Self {
        Pdu::Nullp(NullpPdu {
            header: PduHeader::default(),
            payload,
        })
    }

    pub fn so(src: NnnAddress, payload: PduPayload) -> Self {
        Pdu::So(SoPdu {
            header: PduHeader::default(),
            src,
            payload,
        })
    }

    pub fn do_(dst: NnnAddress, payload: PduPayload) -> Self {
        Pdu::Do(DoPdu {
            header: PduHeader::default(),
            dst,
            payload,
        })
    }

    pub fn du(src: NnnAddress, dst: NnnAddress, payload: PduPayload) -> Self {
        Pdu::Du(DuPdu {
            header: PduHeader::default(),
            src,
            dst,
            payload,
        })
    }

    pub fn kind(&self) -> PduKind {
        match self {
            Pdu::Nullp(_) => PduKind::Nullp,
            Pdu::So(_) => PduKind::So,
            Pdu::Do(_) => PduKind::Do,
            Pdu::Du(_) => PduKind::Du,
            Pdu::En(_) => PduKind::En,
            Pdu::Oen(_) => PduKind::Oen,
            Pdu::Aen(_) => PduKind::Aen,
            Pdu::Ren(_) => PduKind::Ren,
            Pdu::Den(_) => PduKind::Den,
            Pdu::Inf(_) => PduKind::Inf,
        }
    }

    pub fn header(&self) -> &PduHeader {
        match self {
            Pdu::Nullp(p) => &p.header,
            Pdu::So(p) => &p.header,
            Pdu::Do(p) => &p.header,
            Pdu::Du(p) => &p.header,
            Pdu::En(p) => &p.header,
            Pdu::Oen(p) => &p.header,
            Pdu::Aen(p) => &p.header,
            Pdu::Ren(p) => &p.header,
            Pdu::Den(p) => &p.header,
            Pdu::Inf(p) => &p.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut PduHeader {
        match self {
            Pdu::Nullp(p) => &mut p.header,
            Pdu::So(p) => &mut p.header,
            Pdu::Do(p) => &mut p.header,
            Pdu::Du(p) => &mut p.header,
            Pdu::En(p) => &mut p.header,
            Pdu::Oen(p) => &mut p.header,
            Pdu::Aen(p) => &mut p.header,
            Pdu::Ren(p) => &mut p.header,
            Pdu::Den(p) => &mut p.header,
            Pdu::Inf(p) => &mut p.header,
        }
    }

    /// The carried payload, for data PDUs.
    pub fn payload(&self) -> Option<&PduPayload> {
        match self {
            Pdu::Nullp(p) => Some(&p.payload),
            Pdu::So(p) => Some(&p.payload),
            Pdu::Do(p) => Some(&p.payload),
            Pdu::Du(p) => Some(&p.payload),
            _ => None,
        }
    }

    /// Source 3N name, for SO and DU.
    pub fn src(&self) -> Option<&NnnAddress> {
        match self {
            Pdu::So(p) => Some(&p.src),
            Pdu::Du(p) => Some(&p.src),
            _ => None,
        }
    }

    /// Destination 3N name, for DO and DU.
    pub fn dst(&self) -> Option<&NnnAddress> {
        match self {
            Pdu::Do(p) => Some(&p.dst),
            Pdu::Du(p) => Some(&p.dst),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_match_wire_values() {
        for (i, kind) in PduKind::ALL.iter().enumerate() {
            assert_eq!(*kind as u32, i as u32);
            assert_eq!(PduKind::from_u32(i as u32), Some(*kind));
        }
        assert_eq!(PduKind::from_u32(10), None);
    }

    #[test]
    fn accessors_follow_the_variant() {
        let src: NnnAddress = "1.2".parse().unwrap();
        let dst: NnnAddress = "3".parse().unwrap();
        let pdu = Pdu::du(src.clone(), dst.clone(), PduPayload::icn(Bytes::from_static(b"p")));
        assert_eq!(pdu.kind(), PduKind::Du);
        assert_eq!(pdu.src(), Some(&src));
        assert_eq!(pdu.dst(), Some(&dst));
        assert!(pdu.kind().is_data());

        let so = Pdu::so(src.clone(), PduPayload::icn(Bytes::new()));
        assert_eq!(so.dst(), None);
        assert_eq!(so.kind().to_string(), "SO");
    }
}
