//! 不可预测中断调度
//!
//! 以随机间隔挑选一条当前 up、且没有待恢复计划的链路，置位不可预测原因，
//! 并在随机时长后清除。同一链路同时至多有一个恢复计划。

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::Result;
use crate::net::{LinkId, LinkRegistry, Ownership};
use crate::sim::{EventId, RandomOutageSpec, SimTime};

/// 一个待执行的恢复计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRecovery {
    pub event: Option<EventId>,
    pub ticket: u64,
    pub recover_at: SimTime,
}

#[derive(Debug)]
pub struct UnpredictableScheduler {
    spec: RandomOutageSpec,
    rng: ChaCha8Rng,
    pending: HashMap<LinkId, PendingRecovery>,
    next_ticket: u64,
    injected: u64,
}

impl UnpredictableScheduler {
    /// 间隔或持续时间区间为空时返回 `Config`。
    pub fn new(spec: RandomOutageSpec) -> Result<Self> {
        spec.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(spec.seed);
        Ok(Self {
            spec,
            rng,
            pending: HashMap::new(),
            next_ticket: 0,
            injected: 0,
        })
    }

    /// 分布式模式下各 worker 使用不同的随机流
    pub fn for_worker(mut spec: RandomOutageSpec, worker: usize) -> Result<Self> {
        spec.seed = spec.seed.wrapping_add((worker as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Self::new(spec)
    }

    pub fn injected(&self) -> u64 {
        self.injected
    }

    pub fn pending(&self, link: LinkId) -> Option<&PendingRecovery> {
        self.pending.get(&link)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 下一次注入前的等待时间
    pub fn next_interval(&mut self) -> SimTime {
        let ms = self
            .rng
            .random_range(self.spec.min_interval_ms..=self.spec.max_interval_ms);
        SimTime::from_millis(ms)
    }

    fn next_duration(&mut self) -> SimTime {
        let ms = self
            .rng
            .random_range(self.spec.min_duration_ms..=self.spec.max_duration_ms);
        SimTime::from_millis(ms)
    }

    /// 选择受害链路并登记恢复计划（事件句柄稍后由 `bind_event` 填入）。
    ///
    /// 候选：本 worker 拥有、当前 up、没有待恢复计划的链路，按 id 排序后均匀抽取。
    pub fn pick(
        &mut self,
        registry: &LinkRegistry,
        ownership: &Ownership,
        now: SimTime,
    ) -> Option<(LinkId, PendingRecovery)> {
        let candidates: Vec<LinkId> = registry
            .isl_links()
            .iter()
            .filter(|l| l.is_up() && !self.pending.contains_key(&l.id))
            .filter(|l| ownership.owns_link(l.a, l.b))
            .map(|l| l.id)
            .collect();
        if candidates.is_empty() {
            debug!("没有可注入随机中断的链路");
            return None;
        }
        let victim = candidates[self.rng.random_range(0..candidates.len())];
        let plan = PendingRecovery {
            event: None,
            ticket: self.next_ticket,
            recover_at: now.saturating_add(self.next_duration()),
        };
        self.next_ticket += 1;
        self.injected += 1;
        self.pending.insert(victim, plan);
        info!(link = ?victim, recover_at = ?plan.recover_at, "⚡ 注入随机中断");
        Some((victim, plan))
    }

    pub fn bind_event(&mut self, link: LinkId, ticket: u64, event: EventId) {
        if let Some(p) = self.pending.get_mut(&link) {
            if p.ticket == ticket {
                p.event = Some(event);
            }
        }
    }

    /// 恢复事件到期：票据匹配才生效，过期票据返回 false
    pub fn complete(&mut self, link: LinkId, ticket: u64) -> bool {
        match self.pending.get(&link) {
            Some(p) if p.ticket == ticket => {
                self.pending.remove(&link);
                true
            }
            _ => false,
        }
    }

    /// 撤销链路上的恢复计划，返回需取消的事件
    pub fn cancel(&mut self, link: LinkId) -> Option<PendingRecovery> {
        self.pending.remove(&link)
    }
}
