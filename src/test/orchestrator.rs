use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use ipnetwork::Ipv4Network;

use super::fixtures::{handover_5_to_9, nodes_with_stations, sat_at};
use crate::error::TopoError;
use crate::geo::StaticMobility;
use crate::isl::IslOutageConfig;
use crate::net::{
    AddressingPolicy, AttachInterval, EventRecorder, InterfaceId, LinkId, LoopbackTransport,
    NetEvent, NodeId, NodeTable, ShadowUpdate, WorkerId, WorkerTransport,
};
use crate::partition::PartitionStrategy;
use crate::sim::{RandomOutageSpec, ScenarioSpec, ShellKind, ShellSpec, SimTime, Simulator};
use crate::topo::{Constellation, OrchestratorBuilder, OrchestratorOptions, TopologyOrchestrator};

const GS: NodeId = NodeId(10);
const IF0: InterfaceId = InterfaceId(0);

fn handover_builder(duration: SimTime) -> OrchestratorBuilder {
    let (nodes, _) = nodes_with_stations(10, 1);
    OrchestratorBuilder::new(nodes, Vec::new(), Box::new(handover_5_to_9())).duration(duration)
}

#[test]
fn handover_detaches_before_attaching_and_moves_the_address() {
    let recorder = Arc::new(Mutex::new(EventRecorder::default()));
    let mut orch = handover_builder(SimTime::from_secs(2))
        .observer(Box::new(recorder.clone()))
        .build()
        .unwrap();
    let mut sim = Simulator::default();
    orch.start(&mut sim);
    sim.run(&mut orch);

    assert!(orch.failure().is_none());
    assert_eq!(orch.ticks(), 3);
    assert_eq!(
        orch.change_log(),
        [
            "0,10,5,gsl_attach",
            "1000,10,5,gsl_detach",
            "1000,10,9,gsl_attach"
        ]
    );
    assert_eq!(orch.contact_log(), ["0,10,5", "1000,10,9"]);

    // 卫星 9 的地址块为 10.0.0.144/28
    let rec = orch.registry().interface(IF0).unwrap();
    assert_eq!(rec.attached_satellite(), Some(NodeId(9)));
    assert_eq!(rec.address(), Some(Ipv4Addr::new(10, 0, 0, 146)));
    assert_eq!(orch.addresses().bound_count(), 1);
    assert_eq!(
        orch.registry().neighbor_address(GS, NodeId(9)),
        Some(Ipv4Addr::new(10, 0, 0, 145))
    );
    assert_eq!(
        orch.registry().neighbor_address(NodeId(9), GS),
        Some(Ipv4Addr::new(10, 0, 0, 146))
    );
    assert_eq!(orch.registry().neighbor_address(GS, NodeId(5)), None);

    assert_eq!(
        rec.history(),
        [
            AttachInterval {
                satellite: NodeId(5),
                connect_ns: 0,
                disconnect_ns: Some(1_000_000_000),
            },
            AttachInterval {
                satellite: NodeId(9),
                connect_ns: 1_000_000_000,
                disconnect_ns: None,
            },
        ]
    );

    let recorder = recorder.lock().unwrap();
    let t1 = SimTime::from_secs(1);
    assert_eq!(
        recorder.events,
        vec![
            (
                SimTime::ZERO,
                NetEvent::InterfaceUp {
                    node: GS,
                    iface: IF0,
                    peer: NodeId(5)
                }
            ),
            (
                SimTime::ZERO,
                NetEvent::AddressChanged {
                    iface: IF0,
                    address: Some(Ipv4Addr::new(10, 0, 0, 82))
                }
            ),
            (
                t1,
                NetEvent::InterfaceDown {
                    node: GS,
                    iface: IF0,
                    peer: NodeId(5)
                }
            ),
            (
                t1,
                NetEvent::AddressChanged {
                    iface: IF0,
                    address: None
                }
            ),
            (
                t1,
                NetEvent::InterfaceUp {
                    node: GS,
                    iface: IF0,
                    peer: NodeId(9)
                }
            ),
            (
                t1,
                NetEvent::AddressChanged {
                    iface: IF0,
                    address: Some(Ipv4Addr::new(10, 0, 0, 146))
                }
            ),
        ]
    );
    assert_eq!(recorder.snapshots, 3);

    let snap = orch.last_snapshot().unwrap();
    assert_eq!(snap.time, SimTime::from_secs(2));
    assert_eq!(snap.attached(IF0), Some(NodeId(9)));
    assert_eq!(snap.neighbors(GS), [NodeId(9)]);

    let report = orch.finish(&sim).unwrap();
    assert_eq!(report.ticks, 3);
    assert_eq!(report.gsl.len(), 1);
    assert!(report.failure.is_none());
}

#[test]
fn address_exhaustion_halts_the_run() {
    let (nodes, _) = nodes_with_stations(10, 2);
    let policy = AddressingPolicy::SharedGroundSegment {
        satellite_pool: Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 8).unwrap(),
        ground_pool: Ipv4Network::new(Ipv4Addr::new(100, 64, 0, 0), 31).unwrap(),
    };
    let mut orch = OrchestratorBuilder::new(nodes, Vec::new(), Box::new(handover_5_to_9()))
        .duration(SimTime::from_secs(5))
        .addressing(policy)
        .build()
        .unwrap();
    let mut sim = Simulator::default();
    orch.start(&mut sim);
    sim.run(&mut orch);

    assert!(sim.is_halted());
    assert_eq!(sim.pending(), 0);
    assert_eq!(orch.ticks(), 0);
    assert!(matches!(orch.failure(), Some(TopoError::AddressExhausted(_))));

    let report = orch.finish(&sim).unwrap();
    assert!(report.failure.is_some());
    assert!(matches!(
        orch.take_failure(),
        Some(TopoError::AddressExhausted(_))
    ));
    assert!(orch.failure().is_none());
}

#[test]
fn builder_rejects_mismatched_mobility_and_bad_worker() {
    let (nodes, _) = nodes_with_stations(8, 1);
    let err = OrchestratorBuilder::new(nodes, Vec::new(), Box::new(handover_5_to_9()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TopoError::Config(_)));

    let err = handover_builder(SimTime::ZERO)
        .partition(PartitionStrategy::EvenInOrder, 2)
        .local_worker(WorkerId(2))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TopoError::Config(_)));

    let err = handover_builder(SimTime::ZERO)
        .tick(SimTime::ZERO)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TopoError::Config(_)));
}

#[test]
fn builder_rejects_reversed_random_outage_range() {
    let err = handover_builder(SimTime::from_secs(1))
        .random_outages(RandomOutageSpec {
            seed: 1,
            min_interval_ms: 500,
            max_interval_ms: 100,
            min_duration_ms: 100,
            max_duration_ms: 200,
        })
        .build()
        .err()
        .unwrap();
    match err {
        TopoError::Config(msg) => assert!(msg.contains("interval range"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = handover_builder(SimTime::from_secs(1))
        .partition(PartitionStrategy::EvenInOrder, 2)
        .local_worker(WorkerId(1))
        .random_outages(RandomOutageSpec {
            seed: 1,
            min_interval_ms: 100,
            max_interval_ms: 100,
            min_duration_ms: 300,
            max_duration_ms: 200,
        })
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TopoError::Config(_)));
}

const WALKER: &str = r#"
{
    "schema_version": 1,
    "tick_ms": 1000,
    "duration_ms": 3000,
    "shells": [ { "orbits": 4, "sats_per_orbit": 4, "phase_offset": 1, "inclination_deg": 53, "altitude_km": 550 } ],
    "isl": {
        "random_outage": { "seed": 7, "min_interval_ms": 500, "max_interval_ms": 500, "min_duration_ms": 500, "max_duration_ms": 500 }
    }
}
"#;

#[test]
fn walker_scenario_creates_grid_links_and_random_outages_recover() {
    let spec: ScenarioSpec = serde_json::from_str(WALKER).unwrap();
    let mut orch = TopologyOrchestrator::from_scenario(&spec, &OrchestratorOptions::default()).unwrap();
    let mut sim = Simulator::default();
    orch.start(&mut sim);
    sim.run(&mut orch);

    assert!(orch.failure().is_none());
    assert_eq!(orch.ticks(), 4);
    assert_eq!(orch.registry().isl_count(), 32);

    let log = orch.change_log();
    let created = log
        .iter()
        .filter(|l| l.starts_with("0,") && l.ends_with(",isl_new"))
        .count();
    assert_eq!(created, 32);
    assert!(log.iter().any(|l| l.ends_with(",isl_down:random")));
    assert!(log.iter().any(|l| l.ends_with(",isl_up")));

    let report = orch.finish(&sim).unwrap();
    assert!(report.random_outages_injected >= 1);
    assert_eq!(report.isl.len(), 32);
    assert!(report.isl.iter().all(|l| l.present));
    assert!(report.isl.iter().any(|l| !l.outages.is_empty()));
    assert_eq!(report.partition.as_ref().map(|p| p.workers), Some(1));
}

fn distributed_pair() -> (TopologyOrchestrator, TopologyOrchestrator, Arc<Mutex<LoopbackTransport>>) {
    let transport = Arc::new(Mutex::new(LoopbackTransport::default()));
    let coalition = PartitionStrategy::Explicit(vec![vec![0, 1, 2, 3, 4, 10], vec![5, 6, 7, 8, 9]]);
    let build = |w: usize| {
        handover_builder(SimTime::from_secs(1))
            .partition(coalition.clone(), 2)
            .local_worker(WorkerId(w))
            .transport(Box::new(transport.clone()))
            .build()
            .unwrap()
    };
    (build(0), build(1), transport.clone())
}

#[test]
fn distributed_workers_share_remote_attachments_as_shadow() {
    let (mut w0, mut w1, transport) = distributed_pair();
    let (mut s0, mut s1) = (Simulator::default(), Simulator::default());
    w0.start(&mut s0);
    w1.start(&mut s1);

    s0.run_until(SimTime::ZERO, &mut w0);
    s1.run_until(SimTime::ZERO, &mut w1);

    // 地面站在 worker 0，卫星 5 在 worker 1
    assert_eq!(w0.registry().interface(IF0).unwrap().attached_satellite(), Some(NodeId(5)));
    assert_eq!(w1.registry().interface(IF0).unwrap().attached_satellite(), None);
    assert_eq!(w1.shadow().get(&IF0), Some(&NodeId(5)));
    assert_eq!(w1.last_snapshot().unwrap().attached(IF0), Some(NodeId(5)));
    assert_eq!(w0.change_log(), ["0,10,5,gsl_attach"]);
    assert!(w1.change_log().is_empty());

    // 单条 550 km 的 GSL：约 1.83 ms
    let la = w0.last_lookahead().unwrap();
    assert!((1_834_000..1_835_500).contains(&la.0), "{la:?}");
    // worker 1 没有活动链路，退回 tick 周期
    assert_eq!(w1.last_lookahead(), Some(SimTime::from_secs(1)));

    s0.run_until(SimTime::from_secs(1), &mut w0);
    s1.run_until(SimTime::from_secs(1), &mut w1);
    assert_eq!(w1.shadow().get(&IF0), Some(&NodeId(9)));
    assert_eq!(transport.lock().unwrap().sent(), 3);

    assert!(w0.failure().is_none() && w1.failure().is_none());
    assert_eq!(w0.ownership().owner(GS), Some(WorkerId(0)));
    assert!(!w1.ownership().is_local(GS));
}

fn polar_pair() -> OrchestratorBuilder {
    let shell = ShellSpec {
        name: None,
        orbits: 1,
        sats_per_orbit: 2,
        phase_offset: 0,
        kind: ShellKind::Delta,
        inclination_deg: 90.0,
        altitude_km: 550.0,
        adjacency_file: None,
    };
    let shells = vec![Constellation::new(0, NodeId(0), &shell)];
    let mut mobility = StaticMobility::new(vec![sat_at(85.0, 0.0), sat_at(80.0, 0.0)]);
    mobility.push_frame(SimTime::from_secs(1), vec![sat_at(10.0, 0.0), sat_at(15.0, 0.0)]);
    OrchestratorBuilder::new(NodeTable::with_satellites(2), shells, Box::new(mobility)).isl_outages(
        IslOutageConfig {
            polar_cutoff_deg: Some(75.0),
            sun_outage_deg: None,
        },
    )
}

#[test]
fn link_revealed_inside_polar_cutoff_stays_down_without_a_channel() {
    let recorder = Arc::new(Mutex::new(EventRecorder::default()));
    let mut orch = polar_pair()
        .duration(SimTime::ZERO)
        .observer(Box::new(recorder.clone()))
        .build()
        .unwrap();
    let mut sim = Simulator::default();
    orch.start(&mut sim);
    sim.run(&mut orch);

    assert!(orch.failure().is_none());
    assert_eq!(orch.registry().isl_count(), 1);
    assert!(orch.change_log().is_empty(), "{:?}", orch.change_log());

    let link = orch.registry().isl(LinkId(0)).unwrap();
    assert!(link.causes().polar);
    assert!(!link.is_up());
    assert!(link.channel().is_none());
    assert!(link.outages.intervals.is_empty());

    let recorder = recorder.lock().unwrap();
    assert!(
        !recorder
            .events
            .iter()
            .any(|(_, ev)| matches!(ev, NetEvent::IslUp { .. } | NetEvent::IslDown { .. }))
    );
}

#[test]
fn polar_link_is_created_once_it_leaves_the_cutoff() {
    let mut orch = polar_pair().duration(SimTime::from_secs(1)).build().unwrap();
    let mut sim = Simulator::default();
    orch.start(&mut sim);
    sim.run(&mut orch);

    assert!(orch.failure().is_none());
    assert_eq!(orch.change_log(), ["1000,0,1,isl_new"]);
    let link = orch.registry().isl(LinkId(0)).unwrap();
    assert!(link.is_up());
    assert!(link.outages.intervals.is_empty());
}

fn poison(transport: &Arc<Mutex<LoopbackTransport>>) {
    let shared = transport.clone();
    let _ = std::thread::spawn(move || {
        let _guard = shared.lock().unwrap();
        panic!("worker thread died holding the transport");
    })
    .join();
    assert!(transport.is_poisoned());
}

#[test]
fn poisoned_shared_transport_reports_lost_updates() {
    let transport = Arc::new(Mutex::new(LoopbackTransport::default()));
    poison(&transport);

    let mut shared = transport.clone();
    let msg = ShadowUpdate {
        time: SimTime::ZERO,
        from: WorkerId(0),
        iface: IF0,
        station: GS,
        satellite: NodeId(5),
        attached: true,
    };
    assert!(matches!(
        shared.send(WorkerId(1), msg),
        Err(TopoError::InvariantViolation(_))
    ));
    assert!(matches!(
        shared.drain(WorkerId(1)),
        Err(TopoError::InvariantViolation(_))
    ));
}

#[test]
fn poisoned_transport_halts_the_sending_worker() {
    let (mut w0, _w1, transport) = distributed_pair();
    poison(&transport);

    let mut sim = Simulator::default();
    w0.start(&mut sim);
    sim.run(&mut w0);

    // 地面站挂到 worker 1 的卫星 5，影子更新发送失败
    assert!(sim.is_halted());
    assert_eq!(w0.ticks(), 0);
    assert!(matches!(
        w0.failure(),
        Some(TopoError::InvariantViolation(msg)) if msg.contains("poisoned")
    ));
}
