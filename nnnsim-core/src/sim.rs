//! Discrete-event simulator wiring nodes together with point-to-point links.

use crate::app::{App, AppId, ConsumerCbr, Producer};
use crate::config::{AppKind, NodeConfig, ScenarioConfig};
use crate::face::FaceKind;
use crate::node::{Node, NodeReport};
use crate::policy::PolicyRegistry;
use crate::scheduler::{EventKind, EventQueue};
use crate::trace::Tracer;
use log::{debug, info};
use nnnsim_common::{Error, FaceId, Name, NodeId, Poa, Result, Time};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct LinkEnd {
    peer: NodeId,
    peer_face: FaceId,
    delay: Duration,
}

#[derive(Debug)]
pub struct Simulator {
    queue: EventQueue,
    nodes: BTreeMap<NodeId, Node>,
    links: HashMap<(NodeId, FaceId), LinkEnd>,
    /// Network faces of each node in the order their links were added
    link_faces: BTreeMap<NodeId, Vec<FaceId>>,
    labels: BTreeMap<String, NodeId>,
    registry: PolicyRegistry,
    tracer: Tracer,
    next_node: u32,
    next_app: u32,
    next_poa: u64,
    started: bool,
    stop_time: Option<Time>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_registry(PolicyRegistry::new())
    }

    /// A simulator whose nodes build their tables from `registry`.
    pub fn with_registry(registry: PolicyRegistry) -> Self {
        Self {
            queue: EventQueue::new(),
            nodes: BTreeMap::new(),
            links: HashMap::new(),
            link_faces: BTreeMap::new(),
            labels: BTreeMap::new(),
            registry,
            tracer: Tracer::new(NodeId(0)),
            next_node: 0,
            next_app: 0,
            next_poa: 1,
            started: false,
            stop_time: None,
        }
    }

    /// Builds the topology, routes and apps of a scenario.
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self> {
        scenario.validate()?;
        let mut sim = Self::new();
        sim.stop_time = scenario.stop_time;

        for entry in &scenario.nodes {
            let id = sim.add_node(entry.config.clone())?;
            sim.labels.insert(entry.id.clone(), id);
        }
        for link in &scenario.links {
            let a = sim.node_id(&link.a)?;
            let b = sim.node_id(&link.b)?;
            sim.connect(a, b, link.delay)?;
        }
        for route in &scenario.routes {
            let node = sim.node_id(&route.node)?;
            let face = sim
                .link_faces
                .get(&node)
                .and_then(|faces| faces.get(route.link))
                .copied()
                .ok_or_else(|| {
                    Error::Config(format!("node '{}' has no link #{}", route.node, route.link))
                })?;
            sim.add_route(node, &route.prefix, face, route.cost)?;
        }
        for app in &scenario.apps {
            let node = sim.node_id(&app.node)?;
            let boxed: Box<dyn App> = match &app.kind {
                AppKind::Consumer(c) => Box::new(ConsumerCbr::new(c.clone())),
                AppKind::Producer(p) => Box::new(Producer::new(p.clone())),
            };
            sim.install_app(node, boxed, app.start.unwrap_or(Duration::ZERO), app.stop)?;
        }
        info!(
            "Scenario loaded: {} nodes, {} links, {} apps",
            scenario.nodes.len(),
            scenario.links.len(),
            scenario.apps.len()
        );
        Ok(sim)
    }

    /* ---- topology ---- */

    pub fn add_node(&mut self, config: NodeConfig) -> Result<NodeId> {
        let id = NodeId(self.next_node);
        let node = Node::new(id, config, &self.registry, self.tracer.for_node(id))?;
        self.next_node += 1;
        self.nodes.insert(id, node);
        self.link_faces.insert(id, Vec::new());
        Ok(id)
    }

    /// Joins two nodes with a symmetric link. Each end gets a fresh PoA.
    pub fn connect(&mut self, a: NodeId, b: NodeId, delay: Duration) -> Result<(FaceId, FaceId)> {
        let poa_a = Poa::from_u64(self.next_poa);
        let poa_b = Poa::from_u64(self.next_poa + 1);
        let fa = self.node_mut(a)?.add_face(FaceKind::NetDevice, poa_a);
        let fb = self.node_mut(b)?.add_face(FaceKind::NetDevice, poa_b);
        self.next_poa += 2;

        self.links.insert((a, fa), LinkEnd { peer: b, peer_face: fb, delay });
        self.links.insert((b, fb), LinkEnd { peer: a, peer_face: fa, delay });
        self.link_faces.entry(a).or_default().push(fa);
        self.link_faces.entry(b).or_default().push(fb);
        debug!("Linked {}:{} <-> {}:{} ({:?})", a, fa, b, fb, delay);
        Ok((fa, fb))
    }

    pub fn add_route(&mut self, node: NodeId, prefix: &Name, face: FaceId, cost: u16) -> Result<()> {
        self.node_mut(node)?.add_route(prefix, face, cost);
        Ok(())
    }

    /// Installs `app` on `node`; it starts at `start` and, if given, stops at
    /// `stop`.
    pub fn install_app(
        &mut self,
        node: NodeId,
        app: Box<dyn App>,
        start: Time,
        stop: Option<Time>,
    ) -> Result<AppId> {
        let id = AppId(self.next_app);
        self.node_mut(node)?.install_app(id, app);
        self.next_app += 1;
        self.queue.schedule_at(node, start, EventKind::AppStart(id));
        if let Some(stop) = stop {
            self.queue.schedule_at(node, stop, EventKind::AppStop(id));
        }
        Ok(id)
    }

    /* ---- accessors ---- */

    pub fn now(&self) -> Time {
        self.queue.now()
    }

    pub fn stop_time(&self) -> Option<Time> {
        self.stop_time
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::Config(format!("unknown node {}", id)))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Id of a node declared by a scenario.
    pub fn node_id(&self, label: &str) -> Result<NodeId> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown node '{}'", label)))
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, n)| **n == id)
            .map(|(label, _)| label.as_str())
    }

    pub fn reports(&self) -> Vec<NodeReport> {
        self.nodes.values().map(Node::report).collect()
    }

    /* ---- running ---- */

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                let mut sched = self.queue.for_node(id);
                node.start(&mut sched);
                flush(node, &self.links, &mut self.queue);
            }
        }
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&mut self) -> Option<Time> {
        self.start();
        self.queue.peek_time()
    }

    /// Fires the next event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> bool {
        self.start();
        let Some(event) = self.queue.pop() else {
            return false;
        };
        match self.nodes.get_mut(&event.node) {
            Some(node) => {
                let mut sched = self.queue.for_node(event.node);
                node.handle_event(event.kind, &mut sched);
                flush(node, &self.links, &mut self.queue);
            }
            None => debug!("Event for unknown node {}", event.node),
        }
        true
    }

    /// Runs every event up to and including `until`. Returns the number of
    /// events fired.
    pub fn run_until(&mut self, until: Time) -> usize {
        self.start();
        let mut fired = 0;
        while self.queue.peek_time().map_or(false, |t| t <= until) {
            if !self.step() {
                break;
            }
            fired += 1;
        }
        self.queue.advance_to(until);
        info!("Simulation reached {:?} after {} events", until, fired);
        fired
    }

    /// Runs until the queue drains or the scenario stop time is reached.
    pub fn run(&mut self) -> usize {
        match self.stop_time {
            Some(stop) => self.run_until(stop),
            None => {
                let mut fired = 0;
                while self.step() {
                    fired += 1;
                }
                fired
            }
        }
    }
}

/// Puts whatever `node` transmitted on the wire towards the peer face.
fn flush(node: &mut Node, links: &HashMap<(NodeId, FaceId), LinkEnd>, queue: &mut EventQueue) {
    let id = node.id();
    for (face, bytes) in node.take_transmissions() {
        match links.get(&(id, face)) {
            Some(link) => {
                queue.schedule(
                    link.peer,
                    link.delay,
                    EventKind::Deliver {
                        face: link.peer_face,
                        bytes,
                    },
                );
            }
            None => debug!("[Node {}] {} is not linked, dropping {} bytes", id.0, face, bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsumerConfig, ProducerConfig};

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn consumer_fetches_from_producer_over_a_link() {
        let mut sim = Simulator::new();
        let c = sim.add_node(NodeConfig::default()).unwrap();
        let p = sim.add_node(NodeConfig::default()).unwrap();
        let (fc, _) = sim.connect(c, p, Duration::from_millis(10)).unwrap();
        sim.add_route(c, &name("/waseda/satolab"), fc, 1).unwrap();

        let consumer = ConsumerConfig {
            prefix: name("/waseda/satolab"),
            frequency: 10.0,
            max_seq: Some(3),
            ..Default::default()
        };
        let producer = ProducerConfig {
            prefix: name("/waseda/satolab"),
            ..Default::default()
        };
        sim.install_app(p, Box::new(Producer::new(producer)), Duration::ZERO, None)
            .unwrap();
        let app = sim
            .install_app(c, Box::new(ConsumerCbr::new(consumer)), Duration::ZERO, None)
            .unwrap();

        sim.run_until(Duration::from_secs(2));

        let counters = sim.node(c).unwrap().app(app).unwrap().counters();
        assert_eq!(counters["DataReceived"], 3);
        assert_eq!(sim.node(p).unwrap().metrics().data_sent.value(), 3);
        assert_eq!(sim.now(), Duration::from_secs(2));
    }

    #[test]
    fn routes_refer_to_declared_links() {
        let scenario: ScenarioConfig = serde_json::from_str(
            r#"{
                "Nodes": [{"Id": "a"}, {"Id": "b"}],
                "Links": [{"A": "a", "B": "b"}],
                "Routes": [{"Node": "a", "Prefix": "/x", "Link": 3}]
            }"#,
        )
        .unwrap();
        assert!(matches!(Simulator::from_scenario(&scenario), Err(Error::Config(_))));
    }
}
