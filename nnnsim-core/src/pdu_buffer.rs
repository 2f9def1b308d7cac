//! Holding area for DO/DU PDUs whose destination has no route yet.
//!
//! PDUs are kept encoded, per destination, in arrival order. Each queued PDU
//! remembers when it should be retried.

use crate::trie::Trie;
use bytes::Bytes;
use log::{trace, warn};
use nnnsim_common::pdu::{DoPdu, DuPdu, SoPdu};
use nnnsim_common::{NnnAddress, Pdu, Time, WireFormat};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_BUFFER_RETX: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct PduQueue {
    retx: Duration,
    buffer: VecDeque<(Time, Bytes)>,
}

impl PduQueue {
    pub fn new(retx: Duration) -> Self {
        Self {
            retx,
            buffer: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn retx(&self) -> Duration {
        self.retx
    }

    pub fn push(&mut self, wire: Bytes, now: Time) {
        self.buffer.push_back((now + self.retx, wire));
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.buffer.pop_front().map(|(_, wire)| wire)
    }

    pub fn front_deadline(&self) -> Option<Time> {
        self.buffer.front().map(|(t, _)| *t)
    }
}

#[derive(Debug, Clone)]
pub struct PduBuffer {
    queues: Trie<u64, PduQueue>,
    default_retx: Duration,
}

impl Default for PduBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_RETX)
    }
}

impl PduBuffer {
    pub fn new(default_retx: Duration) -> Self {
        Self {
            queues: Trie::new(),
            default_retx,
        }
    }

    pub fn add_destination(&mut self, dst: &NnnAddress) {
        let retx = self.default_retx;
        self.queues.insert(dst.labels(), PduQueue::new(retx));
    }

    pub fn remove_destination(&mut self, dst: &NnnAddress) -> Option<PduQueue> {
        let id = self.queues.find(dst.labels())?;
        self.queues.erase(id)
    }

    pub fn destination_exists(&self, dst: &NnnAddress) -> bool {
        self.queues.find(dst.labels()).is_some()
    }

    fn queue_mut(&mut self, dst: &NnnAddress) -> Option<&mut PduQueue> {
        if !self.destination_exists(dst) {
            self.add_destination(dst);
        }
        let id = self.queues.find(dst.labels())?;
        self.queues.get_mut(id)
    }

    /// Queues the encoded `pdu` for `dst`, creating the queue on demand.
    pub fn push(&mut self, dst: &NnnAddress, pdu: &Pdu, now: Time) {
        let wire = match pdu.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Not buffering {} for {}: {}", pdu.kind(), dst, e);
                return;
            }
        };
        trace!("Buffering {} ({} bytes) for {}", pdu.kind(), wire.len(), dst);
        if let Some(q) = self.queue_mut(dst) {
            q.push(wire, now);
        }
    }

    pub fn push_so(&mut self, dst: &NnnAddress, so: &SoPdu, now: Time) {
        self.push(dst, &Pdu::So(so.clone()), now);
    }

    pub fn push_do(&mut self, dst: &NnnAddress, do_pdu: &DoPdu, now: Time) {
        self.push(dst, &Pdu::Do(do_pdu.clone()), now);
    }

    pub fn push_du(&mut self, dst: &NnnAddress, du: &DuPdu, now: Time) {
        self.push(dst, &Pdu::Du(du.clone()), now);
    }

    /// Drains the queue of `dst`, oldest first.
    pub fn pop_queue(&mut self, dst: &NnnAddress) -> Vec<Bytes> {
        let Some(id) = self.queues.find(dst.labels()) else {
            return Vec::new();
        };
        match self.queues.get_mut(id) {
            Some(q) => std::iter::from_fn(|| q.pop()).collect(),
            None => Vec::new(),
        }
    }

    pub fn queue_size(&self, dst: &NnnAddress) -> usize {
        self.queues
            .find(dst.labels())
            .and_then(|id| self.queues.get(id))
            .map_or(0, PduQueue::len)
    }

    pub fn set_retx(&mut self, dst: &NnnAddress, retx: Duration) {
        if let Some(q) = self.queue_mut(dst) {
            q.retx = retx;
        }
    }

    /// Destinations with PDUs waiting.
    pub fn destinations(&self) -> Vec<NnnAddress> {
        self.queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .filter_map(|(id, _)| NnnAddress::from_labels(self.queues.key(id)).ok())
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.queues.iter().filter_map(|(_, q)| q.front_deadline()).min()
    }

    pub fn total(&self) -> usize {
        self.queues.iter().map(|(_, q)| q.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnnsim_common::pdu::PduPayload;

    fn addr(s: &str) -> NnnAddress {
        s.parse().unwrap()
    }

    #[test]
    fn queues_per_destination_in_order() {
        let mut buf = PduBuffer::default();
        let dst = addr("1.2");
        let first = Pdu::do_(dst.clone(), PduPayload::icn(Bytes::from_static(b"a")));
        let second = Pdu::do_(dst.clone(), PduPayload::icn(Bytes::from_static(b"b")));
        buf.push(&dst, &first, Duration::ZERO);
        buf.push(&dst, &second, Duration::from_millis(10));
        if let Pdu::Du(du) = Pdu::du(addr("3"), addr("4"), PduPayload::icn(Bytes::new())) {
            buf.push_du(&addr("4"), &du, Duration::ZERO);
        }

        assert!(buf.destination_exists(&dst));
        assert_eq!(buf.queue_size(&dst), 2);
        assert_eq!(buf.total(), 3);
        assert_eq!(buf.next_deadline(), Some(DEFAULT_BUFFER_RETX));
        assert_eq!(buf.destinations(), vec![addr("1.2"), addr("4")]);

        let drained = buf.pop_queue(&dst);
        assert_eq!(Pdu::from_wire(&drained[0]).unwrap(), first);
        assert_eq!(Pdu::from_wire(&drained[1]).unwrap(), second);
        assert_eq!(buf.queue_size(&dst), 0);
        assert!(buf.remove_destination(&dst).is_some());
        assert!(!buf.destination_exists(&dst));
    }

    #[test]
    fn unencodable_pdus_are_not_buffered() {
        let mut buf = PduBuffer::default();
        let dst = addr("1.2");
        let huge = Pdu::En(nnnsim_common::pdu::EnPdu {
            header: Default::default(),
            poas: vec![nnnsim_common::Poa::new(vec![0u8; 70_000])],
        });
        buf.push(&dst, &huge, Duration::ZERO);
        assert_eq!(buf.total(), 0);
        assert!(!buf.destination_exists(&dst));
    }

    #[test]
    fn retx_is_per_queue() {
        let mut buf = PduBuffer::default();
        let dst = addr("9");
        buf.set_retx(&dst, Duration::from_secs(1));
        if let Pdu::So(so) = Pdu::so(addr("1"), PduPayload::icn(Bytes::new())) {
            buf.push_so(&dst, &so, Duration::from_secs(2));
        }
        assert_eq!(buf.next_deadline(), Some(Duration::from_secs(3)));
    }
}
