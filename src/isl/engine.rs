//! 中断原因状态机
//!
//! 引擎只改变原因标志；聚合迁移（含新链路首次 up 时的信道创建、中断区间
//! 的开闭）由链路记录在标志变化后立即推导。

use super::geometry::{polar_cutoff, sun_blinded};
use super::random::UnpredictableScheduler;
use crate::error::Result;
use crate::geo::{SatState, Vec3};
use crate::net::{LinkId, LinkRegistry, LinkTransition, NodeId, OutageCause, OutageCauses, Ownership};
use crate::sim::{IslSpec, SimTime};
use tracing::{debug, trace};

/// 可预测类中断的子原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictableCause {
    Polar,
    Sun,
}

impl From<PredictableCause> for OutageCause {
    fn from(c: PredictableCause) -> Self {
        match c {
            PredictableCause::Polar => OutageCause::Polar,
            PredictableCause::Sun => OutageCause::Sun,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IslOutageConfig {
    pub polar_cutoff_deg: Option<f64>,
    pub sun_outage_deg: Option<f64>,
}

impl From<&IslSpec> for IslOutageConfig {
    fn from(spec: &IslSpec) -> Self {
        Self {
            polar_cutoff_deg: spec.polar_cutoff_deg,
            sun_outage_deg: spec.sun_outage_deg,
        }
    }
}

/// 一次聚合迁移，附带迁移后的原因集合（用于日志原因字段）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslTransition {
    pub link: LinkId,
    pub a: NodeId,
    pub b: NodeId,
    pub transition: LinkTransition,
    pub causes: OutageCauses,
}

#[derive(Debug)]
pub struct IslOutageEngine {
    config: IslOutageConfig,
    scheduler: Option<UnpredictableScheduler>,
}

impl IslOutageEngine {
    pub fn new(config: IslOutageConfig, scheduler: Option<UnpredictableScheduler>) -> Self {
        Self { config, scheduler }
    }

    pub fn config(&self) -> &IslOutageConfig {
        &self.config
    }

    pub fn scheduler(&self) -> Option<&UnpredictableScheduler> {
        self.scheduler.as_ref()
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut UnpredictableScheduler> {
        self.scheduler.as_mut()
    }

    /// 置位/清除一个可预测子原因。重复置位或清除未置位的标志都是 no-op。
    pub fn set_predictable(
        &self,
        registry: &mut LinkRegistry,
        link: LinkId,
        cause: PredictableCause,
        on: bool,
        now: SimTime,
    ) -> Result<LinkTransition> {
        registry.set_isl_cause(link, cause.into(), on, now)
    }

    /// 置位/清除不可预测原因
    pub fn set_unpredictable(
        &self,
        registry: &mut LinkRegistry,
        link: LinkId,
        on: bool,
        now: SimTime,
    ) -> Result<LinkTransition> {
        registry.set_isl_cause(link, OutageCause::Random, on, now)
    }

    /// 按本 tick 的几何重新计算所有在邻接中的链路的可预测原因，
    /// 然后对全部 ISL 统一推导一次聚合迁移。
    ///
    /// 调用前应已用 [`LinkRegistry::mark_presence`] 标记本 tick 的存在性：
    /// 新出现且处于极区/日凌中的链路不会先 up 再 down，也不会创建信道。
    /// `states` 以卫星 id 为下标；`sun_dir` 为地固系太阳单位向量。
    #[tracing::instrument(skip_all, fields(now = ?now))]
    pub fn refresh_predictable(
        &self,
        registry: &mut LinkRegistry,
        states: &[SatState],
        sun_dir: &Vec3,
        ownership: &Ownership,
        now: SimTime,
    ) -> Result<Vec<IslTransition>> {
        let targets: Vec<(LinkId, NodeId, NodeId)> = registry
            .isl_links()
            .iter()
            .filter(|l| l.is_present() && ownership.owns_link(l.a, l.b))
            .map(|l| (l.id, l.a, l.b))
            .collect();

        let mut polar_count = 0usize;
        let mut sun_count = 0usize;
        for (id, a, b) in targets {
            let (Some(sa), Some(sb)) = (states.get(a.0), states.get(b.0)) else {
                continue;
            };
            let polar = self
                .config
                .polar_cutoff_deg
                .is_some_and(|cut| polar_cutoff(&sa.position, &sb.position, cut));
            let sun = self
                .config
                .sun_outage_deg
                .is_some_and(|th| sun_blinded(&sa.position, &sb.position, sun_dir, th));
            polar_count += usize::from(polar);
            sun_count += usize::from(sun);

            for (cause, on) in [(PredictableCause::Polar, polar), (PredictableCause::Sun, sun)] {
                if registry.set_isl_cause_flag(id, cause.into(), on)? {
                    trace!(link = ?id, cause = ?cause, on, "可预测原因变化");
                }
            }
        }

        let out: Vec<IslTransition> = registry
            .settle_isl(now)
            .into_iter()
            .filter_map(|(id, t)| {
                let (a, b) = registry.isl(id)?.endpoints();
                Some(transition_of(registry, id, a, b, t))
            })
            .collect();
        debug!(
            polar = polar_count,
            sun = sun_count,
            transitions = out.len(),
            "可预测中断刷新完成"
        );
        Ok(out)
    }
}

pub(crate) fn transition_of(
    registry: &LinkRegistry,
    link: LinkId,
    a: NodeId,
    b: NodeId,
    transition: LinkTransition,
) -> IslTransition {
    IslTransition {
        link,
        a,
        b,
        transition,
        causes: registry.isl(link).map(|l| l.causes()).unwrap_or_default(),
    }
}
