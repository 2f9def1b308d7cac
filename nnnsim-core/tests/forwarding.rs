use nnnsim_core::config::{ConsumerConfig, ContentStoreConfig, ProducerConfig, StrategyKind};
use nnnsim_core::{AppId, ConsumerCbr, NodeConfig, Producer, ScenarioConfig, Simulator};
use nnnsim_common::{Name, NodeId};
use std::time::Duration;

const PREFIX: &str = "/waseda/satolab";

fn prefix() -> Name {
    PREFIX.parse().unwrap()
}

fn consumer(max_seq: u64, seed: u64) -> Box<ConsumerCbr> {
    Box::new(ConsumerCbr::new(ConsumerConfig {
        prefix: prefix(),
        frequency: 10.0,
        max_seq: Some(max_seq),
        seed,
        ..Default::default()
    }))
}

fn producer(freshness: Duration) -> Box<Producer> {
    Box::new(Producer::new(ProducerConfig {
        prefix: prefix(),
        payload_size: 100,
        freshness,
        ..Default::default()
    }))
}

fn app_counter(sim: &Simulator, node: NodeId, app: AppId, key: &str) -> u64 {
    sim.node(node).unwrap().app(app).unwrap().counters()[key]
}

/// Consumers hang off `router`, which reaches a single producer.
struct Star {
    sim: Simulator,
    router: NodeId,
    producer: NodeId,
    leaves: Vec<NodeId>,
}

fn star(leaves: usize, router: NodeConfig) -> Star {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = Simulator::new();
    let r = sim.add_node(router).unwrap();
    let p = sim.add_node(NodeConfig::default()).unwrap();
    let (up, _) = sim.connect(r, p, Duration::from_millis(10)).unwrap();
    sim.add_route(r, &prefix(), up, 1).unwrap();

    let mut out = Vec::new();
    for _ in 0..leaves {
        let c = sim.add_node(NodeConfig::default()).unwrap();
        let (fc, _) = sim.connect(c, r, Duration::from_millis(10)).unwrap();
        sim.add_route(c, &prefix(), fc, 1).unwrap();
        out.push(c);
    }
    Star {
        sim,
        router: r,
        producer: p,
        leaves: out,
    }
}

#[test]
fn every_sequence_number_is_fetched_through_a_router() {
    let Star { mut sim, router, producer: p, leaves } = star(1, NodeConfig::default());
    sim.install_app(p, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
    let app = sim.install_app(leaves[0], consumer(5, 1), Duration::ZERO, None).unwrap();

    sim.run_until(Duration::from_secs(3));

    assert_eq!(app_counter(&sim, leaves[0], app, "DataReceived"), 5);
    assert_eq!(app_counter(&sim, leaves[0], app, "Timeouts"), 0);
    let r = sim.node(router).unwrap();
    assert_eq!(r.metrics().interests_forwarded.value(), 5);
    assert_eq!(r.cs().len(), 5);
    assert!(r.pit().iter().all(|(_, e)| e.is_erased()) || r.pit().is_empty());
}

#[test]
fn later_consumers_are_served_from_the_router_cache() {
    let Star { mut sim, router, producer: p, leaves } = star(2, NodeConfig::default());
    sim.install_app(p, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
    sim.install_app(leaves[0], consumer(3, 1), Duration::ZERO, None).unwrap();
    let late = sim
        .install_app(leaves[1], consumer(3, 2), Duration::from_secs(2), None)
        .unwrap();

    sim.run_until(Duration::from_secs(4));

    assert_eq!(app_counter(&sim, leaves[1], late, "DataReceived"), 3);
    assert_eq!(sim.node(p).unwrap().metrics().data_sent.value(), 3);
    assert_eq!(sim.node(router).unwrap().metrics().cs_hits.value(), 3);
}

#[test]
fn simultaneous_requests_are_aggregated() {
    let Star { mut sim, router, producer: p, leaves } = star(2, NodeConfig::default());
    sim.install_app(p, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
    let a = sim.install_app(leaves[0], consumer(3, 1), Duration::ZERO, None).unwrap();
    let b = sim.install_app(leaves[1], consumer(3, 2), Duration::ZERO, None).unwrap();

    sim.run_until(Duration::from_secs(2));

    assert_eq!(app_counter(&sim, leaves[0], a, "DataReceived"), 3);
    assert_eq!(app_counter(&sim, leaves[1], b, "DataReceived"), 3);
    assert_eq!(sim.node(router).unwrap().metrics().interests_aggregated.value(), 3);
    assert_eq!(sim.node(p).unwrap().metrics().data_sent.value(), 3);
}

#[test]
fn stale_content_is_fetched_again() {
    let router = NodeConfig {
        content_store: ContentStoreConfig {
            freshness: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let Star { mut sim, router, producer: p, leaves } = star(2, router);
    sim.install_app(p, producer(Duration::from_secs(1)), Duration::ZERO, None).unwrap();
    sim.install_app(leaves[0], consumer(3, 1), Duration::ZERO, None).unwrap();
    let late = sim
        .install_app(leaves[1], consumer(3, 2), Duration::from_secs(3), None)
        .unwrap();

    sim.run_until(Duration::from_secs(5));

    assert_eq!(app_counter(&sim, leaves[1], late, "DataReceived"), 3);
    assert_eq!(sim.node(p).unwrap().metrics().data_sent.value(), 6);
    assert_eq!(sim.node(router).unwrap().metrics().cs_hits.value(), 0);
}

#[test]
fn lru_store_keeps_only_the_newest_items() {
    let router = NodeConfig {
        content_store: ContentStoreConfig {
            policy: "Lru".into(),
            max_size: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let Star { mut sim, router, producer: p, leaves } = star(1, router);
    sim.install_app(p, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
    sim.install_app(leaves[0], consumer(5, 1), Duration::ZERO, None).unwrap();

    sim.run_until(Duration::from_secs(2));

    let r = sim.node(router).unwrap();
    assert_eq!(r.cs().len(), 2);
    assert_eq!(r.metrics().cs_evictions.value(), 3);
    let names: Vec<String> = r.cs().entries().iter().map(|e| e.name().to_string()).collect();
    assert!(names.contains(&format!("{}/%seq=4", PREFIX)));
    assert!(names.contains(&format!("{}/%seq=3", PREFIX)));
}

#[test]
fn cheapest_route_wins_and_flooding_uses_all() {
    for (strategy, expected_second) in [(StrategyKind::BestRoute, 0), (StrategyKind::Flooding, 3)] {
        let mut sim = Simulator::new();
        let c = sim.add_node(NodeConfig::default()).unwrap();
        let r = sim
            .add_node(NodeConfig {
                strategy,
                ..Default::default()
            })
            .unwrap();
        let p1 = sim.add_node(NodeConfig::default()).unwrap();
        let p2 = sim.add_node(NodeConfig::default()).unwrap();
        let (fc, _) = sim.connect(c, r, Duration::from_millis(10)).unwrap();
        let (f1, _) = sim.connect(r, p1, Duration::from_millis(10)).unwrap();
        let (f2, _) = sim.connect(r, p2, Duration::from_millis(10)).unwrap();
        sim.add_route(c, &prefix(), fc, 1).unwrap();
        sim.add_route(r, &prefix(), f2, 5).unwrap();
        sim.add_route(r, &prefix(), f1, 1).unwrap();

        sim.install_app(p1, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
        sim.install_app(p2, producer(Duration::ZERO), Duration::ZERO, None).unwrap();
        let app = sim.install_app(c, consumer(3, 1), Duration::ZERO, None).unwrap();

        sim.run_until(Duration::from_secs(2));

        assert_eq!(app_counter(&sim, c, app, "DataReceived"), 3, "{:?}", strategy);
        assert_eq!(sim.node(p1).unwrap().metrics().data_sent.value(), 3, "{:?}", strategy);
        assert_eq!(
            sim.node(p2).unwrap().metrics().data_sent.value(),
            expected_second,
            "{:?}",
            strategy
        );
    }
}

#[test]
fn missing_route_is_reported_back_as_a_nack() {
    let mut sim = Simulator::new();
    let c = sim.add_node(NodeConfig::default()).unwrap();
    let app = sim.install_app(c, consumer(1, 1), Duration::ZERO, None).unwrap();

    sim.run_until(Duration::from_millis(50));

    assert!(app_counter(&sim, c, app, "NacksReceived") >= 1);
    assert_eq!(app_counter(&sim, c, app, "DataReceived"), 0);
    let metrics = sim.node(c).unwrap().metrics();
    assert!(metrics.fib_misses.value() >= 1);
    assert!(metrics.nacks_sent.value() >= 1);
}

#[test]
fn scenario_file_drives_a_full_run() {
    let scenario: ScenarioConfig = serde_json::from_str(
        r#"{
            "Nodes": [{"Id": "consumer"}, {"Id": "router"}, {"Id": "producer"}],
            "Links": [
                {"A": "consumer", "B": "router", "Delay": "5ms"},
                {"A": "router", "B": "producer", "Delay": "5ms"}
            ],
            "Routes": [
                {"Node": "consumer", "Prefix": "/waseda/satolab", "Link": 0},
                {"Node": "router", "Prefix": "/waseda/satolab", "Link": 1}
            ],
            "Apps": [
                {"Node": "producer", "Kind": "Producer", "Prefix": "/waseda/satolab"},
                {"Node": "consumer", "Kind": "Consumer", "Prefix": "/waseda/satolab",
                 "Frequency": 20.0, "MaxSeq": 4, "Start": "100ms"}
            ],
            "StopTime": "2s"
        }"#,
    )
    .unwrap();

    let mut sim = Simulator::from_scenario(&scenario).unwrap();
    sim.run();

    assert_eq!(sim.now(), Duration::from_secs(2));
    let consumer = sim.node_id("consumer").unwrap();
    let reports = sim.reports();
    let report = reports.iter().find(|r| r.node == consumer.0).unwrap();
    assert_eq!(report.apps.values().next().unwrap()["DataReceived"], 4);
    assert_eq!(report.metrics["data_received"], 4);
}
