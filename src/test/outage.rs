use crate::error::TopoError;
use crate::geo::{SatState, Vec3};
use crate::isl::{IslOutageConfig, IslOutageEngine, PredictableCause, UnpredictableScheduler};
use crate::net::{LinkRegistry, LinkTransition, NodeId, NodeTable, OutageCause, Ownership};
use crate::partition::PartitionAssignment;
use crate::sim::{EventId, RandomOutageSpec, SimTime};

use super::fixtures::sat_at;

fn registry(sats: usize) -> (NodeTable, LinkRegistry) {
    let nodes = NodeTable::with_satellites(sats);
    let registry = LinkRegistry::new(&nodes, Some(1_000_000));
    (nodes, registry)
}

fn pair(a: usize, b: usize) -> (NodeId, NodeId) {
    (NodeId(a), NodeId(b))
}

fn single_owner(n: usize) -> Ownership {
    Ownership::new(PartitionAssignment::single(n), None)
}

#[test]
fn first_appearance_creates_channel_and_goes_up() {
    let (_, mut reg) = registry(4);
    let t = reg.sync_presence(0, &[pair(0, 1)], SimTime::ZERO).unwrap();
    assert_eq!(t.len(), 1);
    assert_eq!(t[0].1, LinkTransition::WentUp { created: true });

    let link = reg.isl(t[0].0).unwrap();
    assert!(link.is_up());
    assert_eq!(link.channel().unwrap().data_rate_bps, Some(1_000_000));
    assert!(link.outages.intervals.is_empty());
}

#[test]
fn repeated_and_overlapping_causes_give_one_outage_interval() {
    let (_, mut reg) = registry(4);
    let engine = IslOutageEngine::new(IslOutageConfig::default(), None);
    let t0 = SimTime::from_secs(1);
    let id = reg.sync_presence(0, &[pair(0, 1)], SimTime::ZERO).unwrap()[0].0;

    let polar = PredictableCause::Polar;
    let sun = PredictableCause::Sun;
    assert_eq!(
        engine.set_predictable(&mut reg, id, polar, true, t0).unwrap(),
        LinkTransition::WentDown
    );
    // 重复置位与叠加原因都不产生迁移
    assert_eq!(
        engine.set_predictable(&mut reg, id, polar, true, t0).unwrap(),
        LinkTransition::None
    );
    assert_eq!(
        engine.set_predictable(&mut reg, id, sun, true, t0).unwrap(),
        LinkTransition::None
    );
    assert_eq!(
        engine.set_unpredictable(&mut reg, id, true, t0).unwrap(),
        LinkTransition::None
    );

    let t1 = SimTime::from_secs(2);
    assert_eq!(
        engine.set_predictable(&mut reg, id, polar, false, t1).unwrap(),
        LinkTransition::None
    );
    assert_eq!(
        engine.set_unpredictable(&mut reg, id, false, t1).unwrap(),
        LinkTransition::None
    );
    let t2 = SimTime::from_secs(3);
    assert_eq!(
        engine.set_predictable(&mut reg, id, sun, false, t2).unwrap(),
        LinkTransition::WentUp { created: false }
    );
    // 清除从未置位的标志是 no-op
    assert_eq!(
        engine.set_predictable(&mut reg, id, sun, false, t2).unwrap(),
        LinkTransition::None
    );

    let link = reg.isl(id).unwrap();
    assert!(link.is_up());
    assert_eq!(link.outages.intervals.len(), 1);
    assert_eq!(link.outages.intervals[0].start_ns, t0.0);
    assert_eq!(link.outages.intervals[0].stop_ns, Some(t2.0));
}

#[test]
fn link_revealed_while_flagged_gets_channel_when_flag_clears() {
    let (_, mut reg) = registry(4);
    let (id, created) = reg.ensure_isl(NodeId(2), NodeId(3), 0).unwrap();
    assert!(created);
    reg.set_isl_cause(id, OutageCause::Polar, true, SimTime::ZERO).unwrap();

    let t = reg.sync_presence(0, &[pair(3, 2)], SimTime::ZERO).unwrap();
    assert!(t.is_empty());
    assert!(reg.isl(id).unwrap().channel().is_none());

    let up = reg
        .set_isl_cause(id, OutageCause::Polar, false, SimTime::from_secs(1))
        .unwrap();
    assert_eq!(up, LinkTransition::WentUp { created: true });
    let link = reg.isl(id).unwrap();
    assert!(link.is_up());
    assert_eq!(link.channel().unwrap().created_at, SimTime::from_secs(1));
}

#[test]
fn absent_link_keeps_its_record_and_channel() {
    let (_, mut reg) = registry(4);
    let id = reg.sync_presence(0, &[pair(0, 1)], SimTime::ZERO).unwrap()[0].0;
    let channel = reg.isl(id).unwrap().channel().unwrap().id;

    let t = reg.sync_presence(0, &[], SimTime::from_secs(1)).unwrap();
    assert_eq!(t, vec![(id, LinkTransition::WentDown)]);
    let link = reg.isl(id).unwrap();
    assert!(!link.is_present());
    assert!(link.causes().is_clear());
    assert_eq!(link.causes().to_string(), "removed");
    assert_eq!(reg.isl_count(), 1);

    let t = reg.sync_presence(0, &[pair(1, 0)], SimTime::from_secs(2)).unwrap();
    assert_eq!(t, vec![(id, LinkTransition::WentUp { created: false })]);
    assert_eq!(reg.isl(id).unwrap().channel().unwrap().id, channel);
}

#[test]
fn self_loop_is_rejected() {
    let (_, mut reg) = registry(2);
    assert!(reg.ensure_isl(NodeId(1), NodeId(1), 0).is_err());
}

#[test]
fn polar_cutoff_flags_high_latitude_links() {
    let (_, mut reg) = registry(4);
    reg.sync_presence(0, &[pair(0, 1), pair(2, 3)], SimTime::ZERO).unwrap();
    let states = vec![sat_at(80.0, 0.0), sat_at(72.0, 0.0), sat_at(0.0, 0.0), sat_at(5.0, 0.0)];
    let engine = IslOutageEngine::new(
        IslOutageConfig {
            polar_cutoff_deg: Some(75.0),
            sun_outage_deg: None,
        },
        None,
    );
    let changes = engine
        .refresh_predictable(
            &mut reg,
            &states,
            &Vec3::new(1.0, 0.0, 0.0),
            &single_owner(4),
            SimTime::from_secs(1),
        )
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!((changes[0].a, changes[0].b), pair(0, 1));
    assert_eq!(changes[0].transition, LinkTransition::WentDown);
    assert!(changes[0].causes.polar && !changes[0].causes.sun);
    assert_eq!(changes[0].causes.to_string(), "polar");

    // 同样的几何再刷新一次：没有新的迁移
    let again = engine
        .refresh_predictable(
            &mut reg,
            &states,
            &Vec3::new(1.0, 0.0, 0.0),
            &single_owner(4),
            SimTime::from_secs(2),
        )
        .unwrap();
    assert!(again.is_empty());
}

#[test]
fn newly_present_polar_link_settles_once_without_channel() {
    let (_, mut reg) = registry(4);
    reg.mark_presence(0, &[pair(0, 1), pair(2, 3)]).unwrap();
    let states = vec![sat_at(85.0, 0.0), sat_at(80.0, 0.0), sat_at(0.0, 0.0), sat_at(5.0, 0.0)];
    let engine = IslOutageEngine::new(
        IslOutageConfig {
            polar_cutoff_deg: Some(75.0),
            sun_outage_deg: None,
        },
        None,
    );
    let changes = engine
        .refresh_predictable(
            &mut reg,
            &states,
            &Vec3::new(1.0, 0.0, 0.0),
            &single_owner(4),
            SimTime::ZERO,
        )
        .unwrap();

    // 只有低纬链路被创建
    assert_eq!(changes.len(), 1);
    assert_eq!((changes[0].a, changes[0].b), pair(2, 3));
    assert_eq!(changes[0].transition, LinkTransition::WentUp { created: true });

    let polar = reg.isl_links().iter().find(|l| l.endpoints() == pair(0, 1)).unwrap();
    assert!(polar.is_present());
    assert!(polar.causes().polar);
    assert!(polar.channel().is_none());
    assert!(polar.outages.intervals.is_empty());
}

#[test]
fn sun_behind_neighbor_blinds_the_link() {
    let (_, mut reg) = registry(2);
    reg.sync_presence(0, &[pair(0, 1)], SimTime::ZERO).unwrap();
    let states = vec![
        SatState::at_rest(Vec3::new(7_000.0, 0.0, 0.0)),
        SatState::at_rest(Vec3::new(7_000.0, 100.0, 0.0)),
    ];
    let engine = IslOutageEngine::new(
        IslOutageConfig {
            polar_cutoff_deg: None,
            sun_outage_deg: Some(5.0),
        },
        None,
    );
    let sun = Vec3::new(0.0, 1.0, 0.0);
    let changes = engine
        .refresh_predictable(&mut reg, &states, &sun, &single_owner(2), SimTime::ZERO)
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].causes.sun);
    assert_eq!(changes[0].causes.to_string(), "sun");

    // 太阳转到侧面后恢复
    let side = Vec3::new(0.0, 0.0, 1.0);
    let changes = engine
        .refresh_predictable(&mut reg, &states, &side, &single_owner(2), SimTime::from_secs(1))
        .unwrap();
    assert_eq!(changes[0].transition, LinkTransition::WentUp { created: false });
}

fn random_spec() -> RandomOutageSpec {
    RandomOutageSpec {
        seed: 7,
        min_interval_ms: 100,
        max_interval_ms: 100,
        min_duration_ms: 250,
        max_duration_ms: 250,
    }
}

#[test]
fn scheduler_picks_only_up_links_without_pending_recovery() {
    let (_, mut reg) = registry(4);
    reg.sync_presence(0, &[pair(0, 1), pair(1, 2)], SimTime::ZERO).unwrap();
    let own = single_owner(4);
    let mut sched = UnpredictableScheduler::new(random_spec()).unwrap();
    assert_eq!(sched.next_interval(), SimTime::from_millis(100));

    let now = SimTime::from_secs(1);
    let (first, plan) = sched.pick(&reg, &own, now).unwrap();
    assert_eq!(plan.recover_at, SimTime::from_millis(1_250));
    reg.set_isl_cause(first, OutageCause::Random, true, now).unwrap();

    let (second, _) = sched.pick(&reg, &own, now).unwrap();
    assert_ne!(first, second);
    assert!(sched.pick(&reg, &own, now).is_none());
    assert_eq!(sched.pending_count(), 2);
    assert_eq!(sched.injected(), 2);
}

#[test]
fn stale_recovery_ticket_is_ignored_after_cancel() {
    let (_, mut reg) = registry(2);
    reg.sync_presence(0, &[pair(0, 1)], SimTime::ZERO).unwrap();
    let own = single_owner(2);
    let mut sched = UnpredictableScheduler::new(random_spec()).unwrap();

    let (link, plan) = sched.pick(&reg, &own, SimTime::ZERO).unwrap();
    sched.bind_event(link, plan.ticket, EventId(9));
    assert_eq!(sched.pending(link).unwrap().event, Some(EventId(9)));

    let cancelled = sched.cancel(link).unwrap();
    assert_eq!(cancelled.event, Some(EventId(9)));
    assert!(!sched.complete(link, plan.ticket));

    let (again, replan) = sched.pick(&reg, &own, SimTime::from_secs(1)).unwrap();
    assert_eq!(again, link);
    assert_ne!(replan.ticket, plan.ticket);
    assert!(!sched.complete(link, plan.ticket));
    assert!(sched.complete(link, replan.ticket));
}

#[test]
fn workers_draw_different_random_streams() {
    let spec = RandomOutageSpec {
        min_interval_ms: 1,
        max_interval_ms: 1_000_000,
        ..random_spec()
    };
    let mut a = UnpredictableScheduler::for_worker(spec.clone(), 0).unwrap();
    let mut b = UnpredictableScheduler::for_worker(spec.clone(), 1).unwrap();
    let mut c = UnpredictableScheduler::for_worker(spec, 0).unwrap();
    let xs: Vec<_> = (0..8).map(|_| a.next_interval()).collect();
    let ys: Vec<_> = (0..8).map(|_| b.next_interval()).collect();
    let zs: Vec<_> = (0..8).map(|_| c.next_interval()).collect();
    assert_ne!(xs, ys);
    assert_eq!(xs, zs);
}

#[test]
fn scheduler_rejects_empty_ranges() {
    let reversed = RandomOutageSpec {
        min_interval_ms: 500,
        max_interval_ms: 100,
        ..random_spec()
    };
    assert!(matches!(
        UnpredictableScheduler::new(reversed.clone()),
        Err(TopoError::Config(_))
    ));
    assert!(matches!(
        UnpredictableScheduler::for_worker(reversed, 1),
        Err(TopoError::Config(_))
    ));

    let instant = RandomOutageSpec {
        min_duration_ms: 0,
        max_duration_ms: 0,
        ..random_spec()
    };
    assert!(matches!(
        UnpredictableScheduler::new(instant),
        Err(TopoError::Config(_))
    ));
}
