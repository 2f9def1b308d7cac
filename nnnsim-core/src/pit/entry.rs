use nnnsim_common::{FaceId, Name, NnnAddress, Time};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

/// A face an Interest arrived on, with the 3N addresses that asked through
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFace {
    pub face: FaceId,
    pub arrival: Time,
    pub addrs: BTreeSet<NnnAddress>,
}

impl IncomingFace {
    pub fn new(face: FaceId, arrival: Time) -> Self {
        Self {
            face,
            arrival,
            addrs: BTreeSet::new(),
        }
    }

    pub fn has_addresses(&self) -> bool {
        !self.addrs.is_empty()
    }
}

/// A face the Interest was forwarded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFace {
    pub face: FaceId,
    pub send_time: Time,
    pub retx_count: u32,
    /// A NACK already came back on this face.
    pub waiting_in_vain: bool,
}

impl OutgoingFace {
    pub fn new(face: FaceId, now: Time) -> Self {
        Self {
            face,
            send_time: now,
            retx_count: 0,
            waiting_in_vain: false,
        }
    }

    pub fn update_on_retransmit(&mut self, now: Time) {
        self.send_time = now;
        self.retx_count += 1;
        self.waiting_in_vain = false;
    }
}

/// Pending Interest state for one name.
#[derive(Debug, Clone, PartialEq)]
pub struct PitEntry {
    name: Name,
    created: Time,
    pub(crate) expire: Time,
    incoming: Vec<IncomingFace>,
    outgoing: Vec<OutgoingFace>,
    fib_prefix: Name,
    seen_nonces: HashSet<u32>,
    max_retx: u32,
    pub(crate) erased: bool,
    pub(crate) size: usize,
}

impl PitEntry {
    pub fn new(name: Name, fib_prefix: Name, now: Time, lifetime: Duration) -> Self {
        Self {
            name,
            created: now,
            expire: now + lifetime,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            fib_prefix,
            seen_nonces: HashSet::new(),
            max_retx: 0,
            erased: false,
            size: 1,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn created(&self) -> Time {
        self.created
    }

    pub fn expire_time(&self) -> Time {
        self.expire
    }

    /// Prefix of the FIB entry the Interest was routed by.
    pub fn fib_prefix(&self) -> &Name {
        &self.fib_prefix
    }

    /// Already satisfied, waiting out the pruning delay.
    pub fn is_erased(&self) -> bool {
        self.erased
    }

    /* ---- incoming ---- */

    pub fn incoming(&self) -> &[IncomingFace] {
        &self.incoming
    }

    /// Records `face` as a requester. An existing record keeps its arrival
    /// time and gains `addr`.
    pub fn add_incoming(&mut self, face: FaceId, addr: Option<&NnnAddress>, now: Time) -> bool {
        let (record, added) = match self.incoming.iter().position(|i| i.face == face) {
            Some(pos) => (&mut self.incoming[pos], false),
            None => {
                self.incoming.push(IncomingFace::new(face, now));
                let last = self.incoming.len() - 1;
                (&mut self.incoming[last], true)
            }
        };
        let new_addr = match addr {
            Some(a) => record.addrs.insert(a.clone()),
            None => false,
        };
        added || new_addr
    }

    pub fn has_incoming(&self, face: FaceId) -> bool {
        self.incoming.iter().any(|i| i.face == face)
    }

    pub fn remove_incoming(&mut self, face: FaceId) {
        self.incoming.retain(|i| i.face != face);
    }

    /// Removes one requesting address; the face record goes away with its
    /// last address.
    pub fn remove_incoming_address(&mut self, face: FaceId, addr: &NnnAddress) {
        if let Some(record) = self.incoming.iter_mut().find(|i| i.face == face) {
            record.addrs.remove(addr);
            if record.addrs.is_empty() {
                self.remove_incoming(face);
            }
        }
    }

    pub fn clear_incoming(&mut self) {
        self.incoming.clear();
    }

    /* ---- outgoing ---- */

    pub fn outgoing(&self) -> &[OutgoingFace] {
        &self.outgoing
    }

    pub fn outgoing_face(&self, face: FaceId) -> Option<&OutgoingFace> {
        self.outgoing.iter().find(|o| o.face == face)
    }

    /// Records a transmission on `face`. Sending again on a known face
    /// counts as a retransmission.
    pub fn add_outgoing(&mut self, face: FaceId, now: Time) {
        match self.outgoing.iter_mut().find(|o| o.face == face) {
            Some(out) => out.update_on_retransmit(now),
            None => self.outgoing.push(OutgoingFace::new(face, now)),
        }
    }

    pub fn update_on_retransmit(&mut self, face: FaceId, now: Time) {
        if let Some(out) = self.outgoing.iter_mut().find(|o| o.face == face) {
            out.update_on_retransmit(now);
        }
    }

    pub fn set_waiting_in_vain(&mut self, face: FaceId) {
        if let Some(out) = self.outgoing.iter_mut().find(|o| o.face == face) {
            out.waiting_in_vain = true;
        }
    }

    pub fn are_all_outgoing_in_vain(&self) -> bool {
        self.outgoing.iter().all(|o| o.waiting_in_vain)
    }

    pub fn are_there_promising_outgoing_faces_except(&self, face: FaceId) -> bool {
        self.outgoing
            .iter()
            .any(|o| o.face != face && !o.waiting_in_vain)
    }

    pub fn remove_outgoing(&mut self, face: FaceId) {
        self.outgoing.retain(|o| o.face != face);
    }

    pub fn clear_outgoing(&mut self) {
        self.outgoing.clear();
    }

    /* ---- nonces and retransmissions ---- */

    pub fn add_seen_nonce(&mut self, nonce: u32) -> bool {
        self.seen_nonces.insert(nonce)
    }

    pub fn is_nonce_seen(&self, nonce: u32) -> bool {
        self.seen_nonces.contains(&nonce)
    }

    pub fn increase_allowed_retx_count(&mut self) {
        self.max_retx += 1;
    }

    pub fn max_retx_count(&self) -> u32 {
        self.max_retx
    }

    /// Extends the lifetime to `now + min(offset, max)`; never shortens it.
    /// `max` of zero means no cap.
    pub fn update_lifetime(&mut self, now: Time, offset: Duration, max: Duration) -> bool {
        let offset = if max.is_zero() { offset } else { offset.min(max) };
        let expire = now + offset;
        if expire > self.expire {
            self.expire = expire;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for PitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} expire={:?} in=[", self.name, self.expire)?;
        for (i, inc) in self.incoming.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", inc.face)?;
        }
        f.write_str("] out=[")?;
        for (i, out) in self.outgoing.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}x{}", out.face, out.retx_count)?;
        }
        f.write_str("]")
    }
}
