//! 链路类型
//!
//! ISL 记录由若干相互独立的中断原因标志组成；链路“up”当且仅当信道已存在、
//! 链路仍在当前邻接中且没有任何原因标志被置位。ISL 记录一旦创建便不再销毁，
//! 只会被切换状态。

use super::id::{LinkId, NodeId};
use crate::sim::SimTime;
use serde::Serialize;
use std::fmt;

/// 中断原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageCause {
    /// 极区截断（可预测）
    Polar,
    /// 日凌（可预测）
    Sun,
    /// 随机注入（不可预测）
    Random,
}

impl OutageCause {
    pub fn is_predictable(self) -> bool {
        !matches!(self, OutageCause::Random)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutageCause::Polar => "polar",
            OutageCause::Sun => "sun",
            OutageCause::Random => "random",
        }
    }
}

/// 独立的原因标志集合。可预测类的两个子原因（极区/日凌）分开记录，
/// 对外的 `predictable()` 为二者之或。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutageCauses {
    pub polar: bool,
    pub sun: bool,
    pub random: bool,
}

impl OutageCauses {
    pub fn predictable(&self) -> bool {
        self.polar || self.sun
    }

    pub fn unpredictable(&self) -> bool {
        self.random
    }

    pub fn is_clear(&self) -> bool {
        !self.predictable() && !self.unpredictable()
    }

    pub fn get(&self, cause: OutageCause) -> bool {
        match cause {
            OutageCause::Polar => self.polar,
            OutageCause::Sun => self.sun,
            OutageCause::Random => self.random,
        }
    }

    /// 设置一个标志；返回是否真的发生变化（重复置位/清除是 no-op）
    pub fn set(&mut self, cause: OutageCause, on: bool) -> bool {
        let slot = match cause {
            OutageCause::Polar => &mut self.polar,
            OutageCause::Sun => &mut self.sun,
            OutageCause::Random => &mut self.random,
        };
        let changed = *slot != on;
        *slot = on;
        changed
    }
}

impl fmt::Display for OutageCauses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.polar {
            parts.push("polar");
        }
        if self.sun {
            parts.push("sun");
        }
        if self.random {
            parts.push("random");
        }
        if parts.is_empty() {
            parts.push("removed");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// 链路中断历史：只追加的 `[start, stop)` 区间，仅用于报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutageRecord {
    pub intervals: Vec<OutageInterval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutageInterval {
    pub start_ns: u64,
    /// None 表示中断持续到仿真结束
    pub stop_ns: Option<u64>,
}

impl OutageRecord {
    pub fn open(&mut self, now: SimTime) {
        self.intervals.push(OutageInterval {
            start_ns: now.0,
            stop_ns: None,
        });
    }

    pub fn close(&mut self, now: SimTime) {
        if let Some(last) = self.intervals.last_mut() {
            if last.stop_ns.is_none() {
                last.stop_ns = Some(now.0);
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.intervals.last().is_some_and(|i| i.stop_ns.is_none())
    }
}

/// ISL 信道对象：由链路持有，只创建不销毁
#[derive(Debug, Clone, PartialEq)]
pub struct IslChannel {
    pub id: u64,
    pub created_at: SimTime,
    pub data_rate_bps: Option<u64>,
}

/// 聚合状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTransition {
    None,
    /// 由 down 变 up；`created` 表示本次迁移新建了信道
    WentUp { created: bool },
    WentDown,
}

/// 星间链路记录（端点有序：a < b）
#[derive(Debug, Clone)]
pub struct IslLink {
    pub id: LinkId,
    pub a: NodeId,
    pub b: NodeId,
    pub shell: usize,
    /// 当前传播时延
    pub delay: SimTime,
    causes: OutageCauses,
    /// 是否出现在当前 tick 的邻接中
    present: bool,
    channel: Option<IslChannel>,
    /// 上一次 settle 时的聚合状态
    was_up: bool,
    pub outages: OutageRecord,
}

impl IslLink {
    pub(crate) fn new(id: LinkId, a: NodeId, b: NodeId, shell: usize) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            id,
            a,
            b,
            shell,
            delay: SimTime::ZERO,
            causes: OutageCauses::default(),
            present: false,
            channel: None,
            was_up: false,
            outages: OutageRecord::default(),
        }
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    pub fn other(&self, n: NodeId) -> Option<NodeId> {
        if n == self.a {
            Some(self.b)
        } else if n == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn causes(&self) -> OutageCauses {
        self.causes
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn channel(&self) -> Option<&IslChannel> {
        self.channel.as_ref()
    }

    /// 链路是否 up：信道存在、在邻接中且无中断原因
    pub fn is_up(&self) -> bool {
        self.channel.is_some() && self.present && self.causes.is_clear()
    }

    pub(crate) fn set_cause(&mut self, cause: OutageCause, on: bool) -> bool {
        self.causes.set(cause, on)
    }

    pub(crate) fn set_present(&mut self, on: bool) -> bool {
        let changed = self.present != on;
        self.present = on;
        changed
    }

    /// 根据当前标志推导聚合状态：down→up 时必要时先创建信道，
    /// 并只在聚合迁移时追加/关闭中断区间。
    pub(crate) fn settle(
        &mut self,
        now: SimTime,
        next_channel_id: &mut u64,
        data_rate_bps: Option<u64>,
    ) -> LinkTransition {
        let desired_up = self.present && self.causes.is_clear();
        match (self.was_up, desired_up) {
            (false, true) => {
                let created = self.channel.is_none();
                if created {
                    self.channel = Some(IslChannel {
                        id: *next_channel_id,
                        created_at: now,
                        data_rate_bps,
                    });
                    *next_channel_id += 1;
                }
                self.outages.close(now);
                self.was_up = true;
                LinkTransition::WentUp { created }
            }
            (true, false) => {
                self.outages.open(now);
                self.was_up = false;
                LinkTransition::WentDown
            }
            _ => LinkTransition::None,
        }
    }
}

/// GSL 信道：地面接口与卫星之间，随切换真正拆除与重建
#[derive(Debug, Clone, PartialEq)]
pub struct GslChannel {
    pub id: u64,
    pub satellite: NodeId,
    pub delay: SimTime,
    pub attached_at: SimTime,
}
