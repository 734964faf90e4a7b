//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::event::{Event, EventId};
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace, warn};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
    /// 已取消但尚未出队的事件序列号
    cancelled: HashSet<u64>,
    halted: bool,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 仿真是否已被 `halt` 终止
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// 队列中仍待执行（未取消）的事件数
    pub fn pending(&self) -> usize {
        self.q.len().saturating_sub(self.cancelled.len())
    }

    /// 调度事件在指定时间执行，返回可用于取消的句柄。
    ///
    /// 仿真已终止时事件被直接丢弃。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) -> EventId {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        if self.halted {
            trace!(seq, "仿真已终止，丢弃事件");
            return EventId(seq);
        }
        trace!(now = ?self.now, seq, "调度事件");

        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });

        debug!(queue_size = self.q.len(), "事件已加入队列");
        EventId(seq)
    }

    /// 取消一个尚未执行的事件；对已执行或未知的句柄是 no-op。
    pub fn cancel(&mut self, id: EventId) -> bool {
        if id.0 >= self.next_seq {
            return false;
        }
        let present = self.q.iter().any(|e| e.seq == id.0);
        if present {
            trace!(seq = id.0, "取消事件");
            self.cancelled.insert(id.0)
        } else {
            false
        }
    }

    /// 立即终止仿真：丢弃所有待执行事件，之后的调度也被忽略。
    pub fn halt(&mut self) {
        warn!(now = ?self.now, dropped = self.q.len(), "⛔ 仿真终止");
        self.halted = true;
        self.q.clear();
        self.cancelled.clear();
    }

    /// 取出下一个未被取消的事件
    fn pop_live(&mut self, until: Option<SimTime>) -> Option<ScheduledEvent> {
        loop {
            let top = self.q.peek()?;
            if until.is_some_and(|u| top.at > u) {
                return None;
            }
            let item = self.q.pop()?;
            if self.cancelled.remove(&item.seq) {
                trace!(seq = item.seq, "跳过已取消事件");
                continue;
            }
            return Some(item);
        }
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(item) = self.pop_live(Some(until)) {
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        if !self.halted {
            self.now = self.now.max(until);
        }
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count = 0;
        while let Some(item) = self.pop_live(None) {
            event_count += 1;
            self.now = item.at;

            debug!(
                event_num = event_count,
                now = ?self.now,
                seq = item.seq,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
            world.on_tick(self);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            halted = self.halted,
            "✅ 仿真完成"
        );
    }
}
