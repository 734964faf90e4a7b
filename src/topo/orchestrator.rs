//! 拓扑编排器
//!
//! 唯一允许修改链路注册表、中断引擎与切换引擎状态的组件。每个 tick：
//! 同步 ISL 邻接 → 刷新可预测中断 → 计算 GSL 挂接并执行差分 → 校验不变量
//! → 分发通知并发布快照。下一个 tick 只在当前 tick 完全结束后才被调度。
//!
//! 任何错误都会终止仿真，错误保存在 [`TopologyOrchestrator::failure`] 中。

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use super::change_log::{ChangeReason, LineSink, change_line, write_lookahead};
use super::constellation::Constellation;
use super::io::ContactEntry;
use super::report::{PartitionReport, RunReport, link_reports};
use crate::error::{Result, TopoError};
use crate::geo::{MobilityModel, SatState, WalkerMobility, propagation_delay_s, sun_direction_ecef};
use crate::gsl::{ApplyContext, GslAction, GslHandoverEngine, SwitchStrategy, apply_actions};
use crate::isl::{IslOutageConfig, IslOutageEngine, IslTransition, UnpredictableScheduler, transition_of};
use crate::net::{
    AddressLifecycleManager, AddressingPolicy, InterfaceId, LinkId, LinkRegistry, LinkTransition,
    LoopbackTransport, NetEvent, NodeId, NodeTable, Ownership, ShadowUpdate, TopologyObserver,
    TopologySnapshot, WorkerId, WorkerTransport,
};
use crate::partition::{PartitionStrategy, TopologyHint, assign, plan_from_spec};
use crate::sim::{AddressingSpec, Event, RandomOutageSpec, ScenarioSpec, SimTime, Simulator, World};

pub const CHANGE_LOG_FILE: &str = "change_log.csv";
pub const CONTACT_LOG_FILE: &str = "contact_log.csv";
pub const LOOKAHEAD_FILE: &str = "lookahead.txt";
pub const REPORT_FILE: &str = "report.json";

/// 命令行层面的覆盖项
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    pub out_dir: Option<PathBuf>,
    /// 覆盖场景中的 distributed.worker
    pub worker: Option<usize>,
    pub contact_log: Option<PathBuf>,
    pub coalition: Option<PathBuf>,
}

pub struct OrchestratorBuilder {
    nodes: NodeTable,
    shells: Vec<Constellation>,
    mobility: Box<dyn MobilityModel>,
    name: Option<String>,
    tick: SimTime,
    end: SimTime,
    epoch_jd: f64,
    partition: PartitionStrategy,
    hint: TopologyHint,
    workers: usize,
    local: Option<WorkerId>,
    switch: SwitchStrategy,
    min_elevation_deg: f64,
    feeder_capacity: usize,
    addressing: AddressingPolicy,
    isl: IslOutageConfig,
    random: Option<RandomOutageSpec>,
    isl_data_rate_bps: Option<u64>,
    transport: Option<Box<dyn WorkerTransport>>,
    observers: Vec<Box<dyn TopologyObserver>>,
    out_dir: Option<PathBuf>,
}

impl OrchestratorBuilder {
    pub fn new(nodes: NodeTable, shells: Vec<Constellation>, mobility: Box<dyn MobilityModel>) -> Self {
        let hint = TopologyHint {
            satellites: nodes.satellite_count(),
            shells: shells.iter().map(Constellation::grid).collect(),
            ..Default::default()
        };
        Self {
            nodes,
            shells,
            mobility,
            name: None,
            tick: SimTime::from_secs(1),
            end: SimTime::ZERO,
            epoch_jd: 2_451_545.0,
            partition: PartitionStrategy::EvenInOrder,
            hint,
            workers: 1,
            local: None,
            switch: SwitchStrategy::NearestDistance,
            min_elevation_deg: 25.0,
            feeder_capacity: 4,
            addressing: AddressingPolicy::from(&AddressingSpec::default()),
            isl: IslOutageConfig::default(),
            random: None,
            isl_data_rate_bps: None,
            transport: None,
            observers: Vec::new(),
            out_dir: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tick(mut self, tick: SimTime) -> Self {
        self.tick = tick;
        self
    }

    /// 最后一个 tick 的时间上限（含）
    pub fn duration(mut self, end: SimTime) -> Self {
        self.end = end;
        self
    }

    pub fn epoch_jd(mut self, jd: f64) -> Self {
        self.epoch_jd = jd;
        self
    }

    pub fn partition(mut self, strategy: PartitionStrategy, workers: usize) -> Self {
        self.partition = strategy;
        self.workers = workers;
        self
    }

    /// 附带接触日志等提示的分区计划
    pub fn partition_plan(mut self, strategy: PartitionStrategy, hint: TopologyHint, workers: usize) -> Self {
        self.partition = strategy;
        self.hint = hint;
        self.workers = workers;
        self
    }

    pub fn local_worker(mut self, worker: WorkerId) -> Self {
        self.local = Some(worker);
        self
    }

    pub fn switch_strategy(mut self, strategy: SwitchStrategy) -> Self {
        self.switch = strategy;
        self
    }

    pub fn min_elevation_deg(mut self, deg: f64) -> Self {
        self.min_elevation_deg = deg;
        self
    }

    pub fn feeder_capacity(mut self, capacity: usize) -> Self {
        self.feeder_capacity = capacity;
        self
    }

    pub fn addressing(mut self, policy: AddressingPolicy) -> Self {
        self.addressing = policy;
        self
    }

    pub fn isl_outages(mut self, config: IslOutageConfig) -> Self {
        self.isl = config;
        self
    }

    pub fn random_outages(mut self, spec: RandomOutageSpec) -> Self {
        self.random = Some(spec);
        self
    }

    pub fn isl_data_rate(mut self, bps: Option<u64>) -> Self {
        self.isl_data_rate_bps = bps;
        self
    }

    pub fn transport(mut self, transport: Box<dyn WorkerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn observer(mut self, observer: Box<dyn TopologyObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    /// 计算分区（整个运行只此一次）并组装编排器
    pub fn build(self) -> Result<TopologyOrchestrator> {
        let OrchestratorBuilder {
            mut nodes,
            shells,
            mobility,
            name,
            tick,
            end,
            epoch_jd,
            partition,
            hint,
            workers,
            local,
            switch,
            min_elevation_deg,
            feeder_capacity,
            addressing,
            isl,
            random,
            isl_data_rate_bps,
            transport,
            observers,
            out_dir,
        } = self;

        if tick == SimTime::ZERO {
            return Err(TopoError::Config("tick period must be > 0".into()));
        }
        if feeder_capacity == 0 {
            return Err(TopoError::Config("feeder capacity must be > 0".into()));
        }
        if mobility.satellite_count() != nodes.satellite_count() {
            return Err(TopoError::Config(format!(
                "mobility model covers {} satellites, node table has {}",
                mobility.satellite_count(),
                nodes.satellite_count()
            )));
        }
        if let Some(w) = local {
            if w.0 >= workers {
                return Err(TopoError::Config(format!(
                    "local worker {w} out of range, only {workers} workers configured"
                )));
            }
        }

        let assignment = assign(&partition, nodes.len(), workers, &hint)?;
        nodes.apply_partition(&assignment)?;
        let ownership = Ownership::new(assignment, local);

        let scheduler = random
            .map(|spec| match local {
                Some(w) => UnpredictableScheduler::for_worker(spec, w.0),
                None => UnpredictableScheduler::new(spec),
            })
            .transpose()?;
        let transport = match (transport, local) {
            (Some(t), _) => Some(t),
            (None, Some(_)) => Some(Box::new(LoopbackTransport::default()) as Box<dyn WorkerTransport>),
            (None, None) => None,
        };

        let (change_log, contact_log, lookahead_path) = match &out_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| TopoError::Io {
                    path: dir.clone(),
                    source,
                })?;
                (
                    LineSink::create(&dir.join(CHANGE_LOG_FILE))?,
                    LineSink::create(&dir.join(CONTACT_LOG_FILE))?,
                    local.map(|_| dir.join(LOOKAHEAD_FILE)),
                )
            }
            None => (LineSink::in_memory(), LineSink::in_memory(), None),
        };

        let registry = LinkRegistry::new(&nodes, isl_data_rate_bps);
        let gsl = GslHandoverEngine::new(
            switch,
            min_elevation_deg,
            feeder_capacity,
            nodes.interfaces().len(),
        );
        info!(
            satellites = nodes.satellite_count(),
            ground_stations = nodes.ground_station_count(),
            interfaces = nodes.interfaces().len(),
            workers,
            local = ?local,
            strategy = partition.name(),
            "🌐 拓扑编排器已创建"
        );

        Ok(TopologyOrchestrator {
            name,
            tick,
            end,
            epoch_jd,
            tick_index: 0,
            partition_strategy: partition.name(),
            nodes,
            shells,
            mobility,
            registry,
            addresses: AddressLifecycleManager::new(addressing),
            isl: IslOutageEngine::new(isl, scheduler),
            gsl,
            ownership,
            transport,
            shadow: BTreeMap::new(),
            observers,
            outbox: Vec::new(),
            change_log,
            contact_log,
            lookahead_path,
            last_lookahead: None,
            last_snapshot: None,
            out_dir,
            failure: None,
        })
    }
}

pub struct TopologyOrchestrator {
    name: Option<String>,
    tick: SimTime,
    end: SimTime,
    epoch_jd: f64,
    tick_index: u64,
    partition_strategy: &'static str,
    nodes: NodeTable,
    shells: Vec<Constellation>,
    mobility: Box<dyn MobilityModel>,
    registry: LinkRegistry,
    addresses: AddressLifecycleManager,
    isl: IslOutageEngine,
    gsl: GslHandoverEngine,
    ownership: Ownership,
    transport: Option<Box<dyn WorkerTransport>>,
    /// 其他 worker 上的接口的挂接（只读影子）
    shadow: BTreeMap<InterfaceId, NodeId>,
    observers: Vec<Box<dyn TopologyObserver>>,
    outbox: Vec<NetEvent>,
    change_log: LineSink,
    contact_log: LineSink,
    lookahead_path: Option<PathBuf>,
    last_lookahead: Option<SimTime>,
    last_snapshot: Option<TopologySnapshot>,
    out_dir: Option<PathBuf>,
    failure: Option<TopoError>,
}

impl World for TopologyOrchestrator {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TopologyOrchestrator {
    /// 按场景组装：Walker 轨道、+Grid（或邻接文件）ISL、配置的各项策略
    pub fn from_scenario(spec: &ScenarioSpec, opts: &OrchestratorOptions) -> Result<Self> {
        spec.validate()?;
        let nodes = NodeTable::from_scenario(spec);
        let shells = Constellation::from_specs(&spec.shells);
        let mobility = WalkerMobility::new(&spec.shells, spec.epoch_jd);
        let (strategy, hint) = plan_from_spec(
            &spec.partition,
            nodes.satellite_count(),
            shells.iter().map(Constellation::grid).collect(),
            opts.contact_log.as_deref(),
            opts.coalition.as_deref(),
        )?;
        let switch = SwitchStrategy::from_spec(&spec.gsl.strategy, &nodes, &shells);

        let mut builder = OrchestratorBuilder::new(nodes, shells, Box::new(mobility))
            .tick(SimTime::from_millis(spec.tick_ms))
            .duration(SimTime::from_millis(spec.duration_ms))
            .epoch_jd(spec.epoch_jd)
            .partition_plan(strategy, hint, spec.partition.workers())
            .switch_strategy(switch)
            .min_elevation_deg(spec.gsl.min_elevation_deg)
            .feeder_capacity(spec.gsl.feeder_capacity)
            .addressing(AddressingPolicy::from(&spec.addressing))
            .isl_outages(IslOutageConfig::from(&spec.isl))
            .isl_data_rate(spec.isl.data_rate_bps);
        if let Some(name) = spec.meta.as_ref().and_then(|m| m.name.clone()) {
            builder = builder.name(name);
        }
        if let Some(random) = &spec.isl.random_outage {
            builder = builder.random_outages(random.clone());
        }
        if let Some(w) = opts.worker.or(spec.distributed.as_ref().map(|d| d.worker)) {
            builder = builder.local_worker(WorkerId(w));
        }
        if let Some(dir) = &opts.out_dir {
            builder = builder.out_dir(dir.clone());
        }
        builder.build()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn shells(&self) -> &[Constellation] {
        &self.shells
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn addresses(&self) -> &AddressLifecycleManager {
        &self.addresses
    }

    pub fn outage_engine(&self) -> &IslOutageEngine {
        &self.isl
    }

    pub fn handover(&self) -> &GslHandoverEngine {
        &self.gsl
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn tick_period(&self) -> SimTime {
        self.tick
    }

    pub fn end_time(&self) -> SimTime {
        self.end
    }

    /// 已完成的 tick 数
    pub fn ticks(&self) -> u64 {
        self.tick_index
    }

    pub fn change_log(&self) -> &[String] {
        self.change_log.lines()
    }

    pub fn contact_log(&self) -> &[String] {
        self.contact_log.lines()
    }

    pub fn shadow(&self) -> &BTreeMap<InterfaceId, NodeId> {
        &self.shadow
    }

    pub fn last_lookahead(&self) -> Option<SimTime> {
        self.last_lookahead
    }

    pub fn last_snapshot(&self) -> Option<&TopologySnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn failure(&self) -> Option<&TopoError> {
        self.failure.as_ref()
    }

    pub fn take_failure(&mut self) -> Option<TopoError> {
        self.failure.take()
    }

    pub fn add_observer(&mut self, observer: Box<dyn TopologyObserver>) {
        self.observers.push(observer);
    }

    /// 调度 tick 0 与第一次随机中断注入
    pub fn start(&mut self, sim: &mut Simulator) {
        let now = sim.now();
        sim.schedule(now, TopologyTick);
        if let Some(sched) = self.isl.scheduler_mut() {
            let at = now.saturating_add(sched.next_interval());
            if at <= self.end {
                sim.schedule(at, InjectIslOutage);
            }
        }
        info!(tick = ?self.tick, end = ?self.end, "🚀 拓扑编排器启动");
    }

    fn fail(&mut self, sim: &mut Simulator, err: TopoError) {
        error!(now = ?sim.now(), error = %err, "❌ 拓扑引擎错误，终止仿真");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        sim.halt();
    }

    fn julian_date(&self, now: SimTime) -> f64 {
        self.epoch_jd + now.as_secs_f64() / 86_400.0
    }

    fn sample_states(&self, now: SimTime) -> Vec<SatState> {
        (0..self.nodes.satellite_count())
            .map(|i| self.mobility.satellite_state(NodeId(i), now))
            .collect()
    }

    /// 执行一个完整的 tick
    #[tracing::instrument(skip(self, sim), fields(tick = self.tick_index, now = ?sim.now()))]
    fn run_tick(&mut self, sim: &mut Simulator) -> Result<()> {
        let now = sim.now();
        let states = self.sample_states(now);
        let sun = sun_direction_ecef(self.julian_date(now));

        // ISL 存在性：先只标记，待可预测原因刷新后统一推导迁移
        for shell in &self.shells {
            let pairs: Vec<(NodeId, NodeId)> = shell
                .adjacency_at(self.tick_index, self.ownership.local_worker())?
                .into_iter()
                .filter(|&(a, b)| self.ownership.owns_link(a, b))
                .collect();
            self.registry.mark_presence(shell.index, &pairs)?;
        }
        self.drop_stale_recoveries(sim, now)?;
        self.refresh_isl_delays(&states)?;

        // 可预测中断 + 聚合迁移
        let changes: Vec<IslTransition> = self.isl.refresh_predictable(
            &mut self.registry,
            &states,
            &sun,
            &self.ownership,
            now,
        )?;
        for change in &changes {
            self.record_isl(now, change)?;
        }

        // GSL 切换
        let desired = self.gsl.recompute(&self.nodes, &states);
        let actions = self.gsl.plan(&self.nodes, desired)?;
        let mut ctx = ApplyContext {
            nodes: &self.nodes,
            registry: &mut self.registry,
            addresses: &mut self.addresses,
            ownership: &self.ownership,
            states: &states,
            events: &mut self.outbox,
            now,
        };
        let applied = apply_actions(&actions, &mut ctx)?;
        for action in &applied {
            self.record_gsl(now, action)?;
        }
        self.refresh_gsl_delays(&states)?;
        self.exchange_shadow(now, &applied)?;

        self.check_invariants()?;
        self.dispatch(now);
        self.publish_snapshot(now);
        self.write_lookahead()?;
        self.change_log.flush()?;
        self.contact_log.flush()?;

        debug!(
            isl_changes = changes.len(),
            gsl_actions = applied.len(),
            "tick 完成"
        );
        self.tick_index += 1;
        let next = now.saturating_add(self.tick);
        if next <= self.end && next > now {
            sim.schedule(next, TopologyTick);
        }
        Ok(())
    }

    /// 链路离开拓扑时撤销其恢复计划，并清除随机原因
    fn drop_stale_recoveries(&mut self, sim: &mut Simulator, now: SimTime) -> Result<()> {
        let Some(sched) = self.isl.scheduler() else {
            return Ok(());
        };
        let stale: Vec<LinkId> = self
            .registry
            .isl_links()
            .iter()
            .filter(|l| !l.is_present() && sched.pending(l.id).is_some())
            .map(|l| l.id)
            .collect();
        for link in stale {
            if let Some(plan) = self.isl.scheduler_mut().and_then(|s| s.cancel(link)) {
                if let Some(ev) = plan.event {
                    sim.cancel(ev);
                }
                debug!(link = ?link, "链路已离开拓扑，撤销恢复计划");
            }
            self.isl.set_unpredictable(&mut self.registry, link, false, now)?;
        }
        Ok(())
    }

    fn refresh_isl_delays(&mut self, states: &[SatState]) -> Result<()> {
        let updates: Vec<(LinkId, SimTime)> = self
            .registry
            .isl_links()
            .iter()
            .filter(|l| l.is_present())
            .filter_map(|l| {
                let (sa, sb) = (states.get(l.a.0)?, states.get(l.b.0)?);
                let delay = propagation_delay_s(&sa.position, &sb.position);
                Some((l.id, SimTime::from_secs_f64(delay)))
            })
            .collect();
        for (id, delay) in updates {
            self.registry.set_isl_delay(id, delay)?;
        }
        Ok(())
    }

    fn refresh_gsl_delays(&mut self, states: &[SatState]) -> Result<()> {
        let updates: Vec<(InterfaceId, SimTime)> = self
            .registry
            .interfaces()
            .iter()
            .filter_map(|r| {
                let ch = r.channel()?;
                let gs = self.nodes.ground_position(r.station)?;
                let sat = states.get(ch.satellite.0)?;
                let delay = propagation_delay_s(&gs, &sat.position);
                Some((r.iface, SimTime::from_secs_f64(delay)))
            })
            .collect();
        for (iface, delay) in updates {
            self.registry.set_gsl_delay(iface, delay)?;
        }
        Ok(())
    }

    fn record_isl(&mut self, now: SimTime, change: &IslTransition) -> Result<()> {
        let (reason, event) = match change.transition {
            LinkTransition::None => return Ok(()),
            LinkTransition::WentUp { created } => (
                if created {
                    ChangeReason::IslNew
                } else {
                    ChangeReason::IslUp
                },
                NetEvent::IslUp {
                    link: change.link,
                    a: change.a,
                    b: change.b,
                },
            ),
            LinkTransition::WentDown => (
                ChangeReason::IslDown(change.causes),
                NetEvent::IslDown {
                    link: change.link,
                    a: change.a,
                    b: change.b,
                },
            ),
        };
        self.change_log
            .push(change_line(now, change.a, change.b, Some(reason)))?;
        self.outbox.push(event);
        Ok(())
    }

    fn record_gsl(&mut self, now: SimTime, action: &GslAction) -> Result<()> {
        match *action {
            GslAction::Detach {
                station, satellite, ..
            } => self.change_log.push(change_line(
                now,
                station,
                satellite,
                Some(ChangeReason::GslDetach),
            )),
            GslAction::Attach {
                station, satellite, ..
            } => {
                self.change_log.push(change_line(
                    now,
                    station,
                    satellite,
                    Some(ChangeReason::GslAttach),
                ))?;
                let contact = ContactEntry {
                    time_ms: now.as_millis(),
                    station,
                    satellite,
                };
                self.contact_log.push(contact.to_line())
            }
        }
    }

    /// 挂接到其他 worker 卫星的变化发给卫星所属 worker，并收取发给本地的影子更新
    fn exchange_shadow(&mut self, now: SimTime, applied: &[GslAction]) -> Result<()> {
        let (Some(me), Some(transport)) = (self.ownership.local_worker(), self.transport.as_mut())
        else {
            return Ok(());
        };
        for action in applied {
            let satellite = action.satellite();
            let Some(owner) = self.ownership.owner(satellite) else {
                continue;
            };
            if owner == me {
                continue;
            }
            let (iface, station, attached) = match *action {
                GslAction::Detach { iface, station, .. } => (iface, station, false),
                GslAction::Attach { iface, station, .. } => (iface, station, true),
            };
            transport.send(
                owner,
                ShadowUpdate {
                    time: now,
                    from: me,
                    iface,
                    station,
                    satellite,
                    attached,
                },
            )?;
        }
        for msg in transport.drain(me)? {
            if msg.attached {
                self.shadow.insert(msg.iface, msg.satellite);
            } else if self.shadow.get(&msg.iface) == Some(&msg.satellite) {
                self.shadow.remove(&msg.iface);
            }
        }
        Ok(())
    }

    /// tick 末尾的一致性校验：地址表自洽，本地接口的信道、地址与切换决策一致
    fn check_invariants(&self) -> Result<()> {
        self.addresses.check_invariants()?;
        let decided = self.gsl.previous();
        for rec in self.registry.interfaces() {
            if !self.ownership.is_local(rec.station) {
                continue;
            }
            let want = decided.get(rec.iface.0).copied().flatten();
            if rec.attached_satellite() != want {
                return Err(TopoError::invariant(format!(
                    "{} attached to {:?}, handover decided {:?}",
                    rec.iface,
                    rec.attached_satellite(),
                    want
                )));
            }
            if rec.address() != self.addresses.address_of(rec.iface)
                || rec.address().is_some() != want.is_some()
            {
                return Err(TopoError::invariant(format!(
                    "{} address {:?} inconsistent with attachment {:?}",
                    rec.iface,
                    rec.address(),
                    want
                )));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, now: SimTime) {
        if self.outbox.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.outbox);
        for observer in self.observers.iter_mut() {
            for ev in &events {
                observer.on_event(now, ev);
            }
        }
        debug!(events = events.len(), observers = self.observers.len(), "通知已分发");
    }

    /// 当前拓扑的只读视图：本地接口取注册表，远端接口取影子副本
    pub fn snapshot(&self, now: SimTime) -> TopologySnapshot {
        let gsl_attachments = self
            .registry
            .interfaces()
            .iter()
            .map(|r| {
                let sat = if self.ownership.is_local(r.station) {
                    r.attached_satellite()
                } else {
                    self.shadow.get(&r.iface).copied()
                };
                (r.iface, sat)
            })
            .collect();
        TopologySnapshot {
            time: now,
            adjacency: self.registry.adjacency(),
            gsl_attachments,
        }
    }

    fn publish_snapshot(&mut self, now: SimTime) {
        let snapshot = self.snapshot(now);
        for observer in self.observers.iter_mut() {
            observer.on_snapshot(&snapshot);
        }
        self.last_snapshot = Some(snapshot);
    }

    fn write_lookahead(&mut self) -> Result<()> {
        if !self.ownership.is_distributed() {
            return Ok(());
        }
        let delay = self.registry.min_live_delay().unwrap_or(self.tick);
        self.last_lookahead = Some(delay);
        if let Some(path) = &self.lookahead_path {
            write_lookahead(path, delay)?;
        }
        Ok(())
    }

    fn inject_outage(&mut self, sim: &mut Simulator) -> Result<()> {
        let now = sim.now();
        let Some(sched) = self.isl.scheduler_mut() else {
            return Ok(());
        };
        let picked = sched.pick(&self.registry, &self.ownership, now);
        let next = now.saturating_add(sched.next_interval());

        if let Some((link, plan)) = picked {
            let t = self.isl.set_unpredictable(&mut self.registry, link, true, now)?;
            let ev = sim.schedule(
                plan.recover_at,
                RecoverIslLink {
                    link,
                    ticket: plan.ticket,
                },
            );
            if let Some(sched) = self.isl.scheduler_mut() {
                sched.bind_event(link, plan.ticket, ev);
            }
            self.record_link_change(now, link, t)?;
        }
        if next <= self.end && next > now {
            sim.schedule(next, InjectIslOutage);
        }
        Ok(())
    }

    fn recover_outage(&mut self, sim: &mut Simulator, link: LinkId, ticket: u64) -> Result<()> {
        let now = sim.now();
        let Some(sched) = self.isl.scheduler_mut() else {
            return Ok(());
        };
        if !sched.complete(link, ticket) {
            warn!(link = ?link, ticket, "过期的恢复事件，忽略");
            return Ok(());
        }
        let t = self.isl.set_unpredictable(&mut self.registry, link, false, now)?;
        self.record_link_change(now, link, t)
    }

    /// tick 之间的单条链路迁移：立即记录并分发
    fn record_link_change(&mut self, now: SimTime, link: LinkId, t: LinkTransition) -> Result<()> {
        let Some(l) = self.registry.isl(link) else {
            return Err(TopoError::invariant(format!("unknown ISL {link:?}")));
        };
        let (a, b) = l.endpoints();
        let change = transition_of(&self.registry, link, a, b, t);
        self.record_isl(now, &change)?;
        self.change_log.flush()?;
        self.dispatch(now);
        Ok(())
    }

    /// 刷新输出并生成报告；给出 out_dir 时同时写入 report.json
    pub fn finish(&mut self, sim: &Simulator) -> Result<RunReport> {
        self.change_log.flush()?;
        self.contact_log.flush()?;
        let (isl, gsl) = link_reports(&self.registry);
        let assignment = self.ownership.assignment();
        let report = RunReport {
            scenario: self.name.clone(),
            worker: self.ownership.local_worker().map(|w| w.0),
            ticks: self.tick_index,
            final_time_ms: sim.now().as_millis(),
            partition: Some(PartitionReport {
                strategy: self.partition_strategy.to_string(),
                workers: assignment.worker_count(),
                sizes: assignment.sizes(),
                owner: assignment.as_slice().to_vec(),
            }),
            random_outages_injected: self.isl.scheduler().map(|s| s.injected()).unwrap_or(0),
            isl,
            gsl,
            failure: self.failure.as_ref().map(|e| e.to_string()),
        };
        if let Some(dir) = &self.out_dir {
            report.write_json(&dir.join(REPORT_FILE))?;
        }
        info!(
            ticks = report.ticks,
            isl = report.isl.len(),
            gsl = report.gsl.len(),
            failed = report.failure.is_some(),
            "📄 运行报告已生成"
        );
        Ok(report)
    }
}

fn orchestrator(world: &mut dyn World) -> Option<&mut TopologyOrchestrator> {
    let orch = world.as_any_mut().downcast_mut::<TopologyOrchestrator>();
    if orch.is_none() {
        error!("world is not a TopologyOrchestrator");
    }
    orch
}

/// 事件：执行一个拓扑 tick
#[derive(Debug)]
pub struct TopologyTick;

impl Event for TopologyTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Some(orch) = orchestrator(world) else {
            return;
        };
        if let Err(e) = orch.run_tick(sim) {
            orch.fail(sim, e);
        }
    }
}

/// 事件：注入一次随机中断，并调度下一次
#[derive(Debug)]
pub struct InjectIslOutage;

impl Event for InjectIslOutage {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Some(orch) = orchestrator(world) else {
            return;
        };
        if let Err(e) = orch.inject_outage(sim) {
            orch.fail(sim, e);
        }
    }
}

/// 事件：随机中断到期恢复；票据不匹配时是 no-op
#[derive(Debug)]
pub struct RecoverIslLink {
    pub link: LinkId,
    pub ticket: u64,
}

impl Event for RecoverIslLink {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let RecoverIslLink { link, ticket } = *self;
        let Some(orch) = orchestrator(world) else {
            return;
        };
        if let Err(e) = orch.recover_outage(sim, link, ticket) {
            orch.fail(sim, e);
        }
    }
}
