//! Forwarding strategies: which faces a new Interest leaves on.

use crate::config::StrategyKind;
use crate::fib::FibEntry;
use crate::pit::PitEntry;
use nnnsim_common::FaceId;
use std::fmt;

pub trait ForwardingStrategy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Faces to forward on, best first. Never returns `incoming`.
    fn select_faces(&self, fib: &FibEntry, pit: &PitEntry, incoming: FaceId) -> Vec<FaceId>;
}

/// Sends to the best-ranked face other than the one the Interest came from.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestRoute;

impl ForwardingStrategy for BestRoute {
    fn name(&self) -> &'static str {
        "BestRoute"
    }

    fn select_faces(&self, fib: &FibEntry, pit: &PitEntry, incoming: FaceId) -> Vec<FaceId> {
        let candidates = move || fib.faces().iter().map(|m| m.face).filter(move |f| *f != incoming);
        // a face already tried and NACKed goes last
        candidates()
            .find(|f| pit.outgoing_face(*f).map_or(true, |o| !o.waiting_in_vain))
            .or_else(|| candidates().next())
            .into_iter()
            .collect()
    }
}

/// Sends to every face of the FIB entry except the incoming one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flooding;

impl ForwardingStrategy for Flooding {
    fn name(&self) -> &'static str {
        "Flooding"
    }

    fn select_faces(&self, fib: &FibEntry, _pit: &PitEntry, incoming: FaceId) -> Vec<FaceId> {
        fib.faces()
            .iter()
            .map(|m| m.face)
            .filter(|f| *f != incoming)
            .collect()
    }
}

pub fn create_strategy(kind: StrategyKind) -> Box<dyn ForwardingStrategy> {
    match kind {
        StrategyKind::BestRoute => Box::new(BestRoute),
        StrategyKind::Flooding => Box::new(Flooding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::FaceStatus;
    use nnnsim_common::Name;
    use std::time::Duration;

    fn setup() -> (FibEntry, PitEntry) {
        let prefix = Name::from_uri("/a").unwrap();
        let mut fib = FibEntry::new(prefix.clone());
        fib.add_or_update_routing_metric(FaceId(1), 1);
        fib.add_or_update_routing_metric(FaceId(2), 5);
        fib.add_or_update_routing_metric(FaceId(3), 3);
        fib.update_status(FaceId(2), FaceStatus::Green);
        let pit = PitEntry::new(prefix.clone(), prefix, Duration::ZERO, Duration::from_secs(1));
        (fib, pit)
    }

    #[test]
    fn best_route_skips_the_incoming_face() {
        let (fib, mut pit) = setup();
        assert_eq!(BestRoute.select_faces(&fib, &pit, FaceId(9)), vec![FaceId(2)]);
        assert_eq!(BestRoute.select_faces(&fib, &pit, FaceId(2)), vec![FaceId(1)]);

        pit.add_outgoing(FaceId(2), Duration::ZERO);
        pit.set_waiting_in_vain(FaceId(2));
        assert_eq!(BestRoute.select_faces(&fib, &pit, FaceId(9)), vec![FaceId(1)]);
    }

    #[test]
    fn flooding_uses_every_other_face() {
        let (fib, pit) = setup();
        assert_eq!(
            create_strategy(StrategyKind::Flooding).select_faces(&fib, &pit, FaceId(3)),
            vec![FaceId(2), FaceId(1)]
        );
    }
}
