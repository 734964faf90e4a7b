//! 链路注册表
//!
//! 持有全部 ISL 记录与 GSL 接口记录。节点与链路用整数 id 互相引用，
//! 邻居解析缓存以 `(NodeId, NodeId)` 为键，生命周期随注册表本身。

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use super::id::{InterfaceId, LinkId, NodeId};
use super::link::{GslChannel, IslLink, LinkTransition, OutageCause};
use super::node::NodeTable;
use super::record::GslInterfaceRecord;
use crate::error::{Result, TopoError};
use crate::sim::SimTime;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct LinkRegistry {
    isl: Vec<IslLink>,
    by_pair: HashMap<(NodeId, NodeId), LinkId>,
    gsl: Vec<GslInterfaceRecord>,
    /// (本端, 对端) -> 对端地址
    neighbor_cache: HashMap<(NodeId, NodeId), Ipv4Addr>,
    next_channel_id: u64,
    isl_data_rate_bps: Option<u64>,
}

fn ordered(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl LinkRegistry {
    pub fn new(nodes: &NodeTable, isl_data_rate_bps: Option<u64>) -> Self {
        let gsl = nodes
            .interfaces()
            .iter()
            .map(|i| GslInterfaceRecord::new(i.id, i.station))
            .collect();
        Self {
            gsl,
            isl_data_rate_bps,
            ..Default::default()
        }
    }

    // ---------------------------------------------------------------- ISL

    /// 查找或惰性创建 ISL 记录；返回 (id, 是否新建)
    pub fn ensure_isl(&mut self, a: NodeId, b: NodeId, shell: usize) -> Result<(LinkId, bool)> {
        if a == b {
            return Err(TopoError::invariant(format!("self-loop ISL on node {a}")));
        }
        let key = ordered(a, b);
        if let Some(&id) = self.by_pair.get(&key) {
            return Ok((id, false));
        }
        let id = LinkId(self.isl.len());
        self.isl.push(IslLink::new(id, key.0, key.1, shell));
        self.by_pair.insert(key, id);
        debug!(link = ?id, a = %key.0, b = %key.1, shell, "🔗 新建 ISL 记录");
        Ok((id, true))
    }

    pub fn find_isl(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.by_pair.get(&ordered(a, b)).copied()
    }

    pub fn isl(&self, id: LinkId) -> Option<&IslLink> {
        self.isl.get(id.0)
    }

    pub fn isl_links(&self) -> &[IslLink] {
        &self.isl
    }

    pub fn isl_count(&self) -> usize {
        self.isl.len()
    }

    fn isl_mut(&mut self, id: LinkId) -> Result<&mut IslLink> {
        self.isl
            .get_mut(id.0)
            .ok_or_else(|| TopoError::invariant(format!("unknown ISL {id:?}")))
    }

    /// 置位/清除一个中断原因并立即推导聚合迁移
    pub fn set_isl_cause(
        &mut self,
        id: LinkId,
        cause: OutageCause,
        on: bool,
        now: SimTime,
    ) -> Result<LinkTransition> {
        let rate = self.isl_data_rate_bps;
        let mut next = self.next_channel_id;
        let link = self.isl_mut(id)?;
        if !link.set_cause(cause, on) {
            return Ok(LinkTransition::None);
        }
        trace!(link = ?id, cause = cause.as_str(), on, "原因标志变化");
        let t = link.settle(now, &mut next, rate);
        self.next_channel_id = next;
        Ok(t)
    }

    /// 只改变原因标志、不推导迁移；调用方随后必须 [`settle_isl`](Self::settle_isl)
    pub(crate) fn set_isl_cause_flag(&mut self, id: LinkId, cause: OutageCause, on: bool) -> Result<bool> {
        Ok(self.isl_mut(id)?.set_cause(cause, on))
    }

    /// 按本 tick 的邻接标记某个壳层的链路存在性，不推导迁移。
    ///
    /// 新出现的端点对会创建记录；不再出现的链路保留记录、仅标记缺席。
    pub fn mark_presence(&mut self, shell: usize, pairs: &[(NodeId, NodeId)]) -> Result<()> {
        let mut seen = vec![false; self.isl.len()];
        for &(a, b) in pairs {
            let (id, created) = self.ensure_isl(a, b, shell)?;
            if created {
                seen.push(false);
            }
            seen[id.0] = true;
        }
        for link in self.isl.iter_mut().filter(|l| l.shell == shell) {
            link.set_present(seen[link.id.0]);
        }
        Ok(())
    }

    /// 按当前存在性与原因标志推导所有 ISL 的聚合迁移。每条链路每次调用至多一次迁移。
    pub fn settle_isl(&mut self, now: SimTime) -> Vec<(LinkId, LinkTransition)> {
        let rate = self.isl_data_rate_bps;
        let mut next = self.next_channel_id;
        let mut transitions = Vec::new();
        for link in self.isl.iter_mut() {
            let t = link.settle(now, &mut next, rate);
            if t != LinkTransition::None {
                transitions.push((link.id, t));
            }
        }
        self.next_channel_id = next;
        transitions
    }

    /// 标记存在性并立即推导迁移（无可预测原因参与时使用）
    pub fn sync_presence(
        &mut self,
        shell: usize,
        pairs: &[(NodeId, NodeId)],
        now: SimTime,
    ) -> Result<Vec<(LinkId, LinkTransition)>> {
        self.mark_presence(shell, pairs)?;
        Ok(self.settle_isl(now))
    }

    pub fn set_isl_delay(&mut self, id: LinkId, delay: SimTime) -> Result<()> {
        self.isl_mut(id)?.delay = delay;
        Ok(())
    }

    // ---------------------------------------------------------------- GSL

    pub fn interface(&self, iface: InterfaceId) -> Option<&GslInterfaceRecord> {
        self.gsl.get(iface.0)
    }

    pub fn interfaces(&self) -> &[GslInterfaceRecord] {
        &self.gsl
    }

    fn interface_mut(&mut self, iface: InterfaceId) -> Result<&mut GslInterfaceRecord> {
        self.gsl
            .get_mut(iface.0)
            .ok_or_else(|| TopoError::invariant(format!("unknown ground interface {iface}")))
    }

    /// 当前各接口挂接的卫星
    pub fn attachments(&self) -> Vec<Option<NodeId>> {
        self.gsl.iter().map(|r| r.attached_satellite()).collect()
    }

    /// 在接口与卫星之间挂接信道；接口已挂接时视为逻辑错误
    pub fn attach_channel(
        &mut self,
        iface: InterfaceId,
        satellite: NodeId,
        delay: SimTime,
        now: SimTime,
    ) -> Result<()> {
        let id = self.next_channel_id;
        let rec = self.interface_mut(iface)?;
        if let Some(current) = rec.attached_satellite() {
            return Err(TopoError::invariant(format!(
                "{iface} already attached to satellite {current}, refusing attach to {satellite}"
            )));
        }
        rec.channel = Some(GslChannel {
            id,
            satellite,
            delay,
            attached_at: now,
        });
        self.next_channel_id += 1;
        Ok(())
    }

    /// 拆除接口上的信道
    pub fn detach_channel(&mut self, iface: InterfaceId, satellite: NodeId) -> Result<GslChannel> {
        let rec = self.interface_mut(iface)?;
        match rec.channel.take() {
            Some(ch) if ch.satellite == satellite => Ok(ch),
            Some(ch) => {
                let found = ch.satellite;
                rec.channel = Some(ch);
                Err(TopoError::invariant(format!(
                    "{iface} is attached to {found}, not {satellite}"
                )))
            }
            None => Err(TopoError::invariant(format!(
                "{iface} has no channel to detach from {satellite}"
            ))),
        }
    }

    pub fn set_gsl_delay(&mut self, iface: InterfaceId, delay: SimTime) -> Result<()> {
        if let Some(ch) = self.interface_mut(iface)?.channel.as_mut() {
            ch.delay = delay;
        }
        Ok(())
    }

    pub(crate) fn bind_address(&mut self, iface: InterfaceId, addr: Option<Ipv4Addr>) -> Result<()> {
        self.interface_mut(iface)?.address = addr;
        Ok(())
    }

    pub(crate) fn open_interval(&mut self, iface: InterfaceId, sat: NodeId, now: SimTime) -> Result<()> {
        self.interface_mut(iface)?.open_interval(sat, now);
        Ok(())
    }

    pub(crate) fn close_interval(&mut self, iface: InterfaceId, now: SimTime) -> Result<Option<NodeId>> {
        Ok(self.interface_mut(iface)?.close_interval(now))
    }

    // ------------------------------------------------------- 邻居解析缓存

    /// 在两端各加一条邻居缓存项
    pub fn add_neighbor_pair(
        &mut self,
        a: NodeId,
        a_addr: Ipv4Addr,
        b: NodeId,
        b_addr: Ipv4Addr,
    ) -> Result<()> {
        if self.neighbor_cache.contains_key(&(a, b)) || self.neighbor_cache.contains_key(&(b, a)) {
            return Err(TopoError::invariant(format!(
                "neighbor entry between {a} and {b} already present"
            )));
        }
        self.neighbor_cache.insert((a, b), b_addr);
        self.neighbor_cache.insert((b, a), a_addr);
        Ok(())
    }

    pub fn remove_neighbor_pair(&mut self, a: NodeId, b: NodeId) {
        self.neighbor_cache.remove(&(a, b));
        self.neighbor_cache.remove(&(b, a));
    }

    /// `node` 所知的邻居 `peer` 的地址
    pub fn neighbor_address(&self, node: NodeId, peer: NodeId) -> Option<Ipv4Addr> {
        self.neighbor_cache.get(&(node, peer)).copied()
    }

    // ---------------------------------------------------------- 快照视图

    /// 当前活动拓扑的邻接表（up 的 ISL 与已挂接的 GSL，双向）
    pub fn adjacency(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut adj: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut push = |x: NodeId, y: NodeId| {
            adj.entry(x).or_default().push(y);
            adj.entry(y).or_default().push(x);
        };
        for link in self.isl.iter().filter(|l| l.is_up()) {
            push(link.a, link.b);
        }
        for rec in &self.gsl {
            if let Some(sat) = rec.attached_satellite() {
                push(rec.station, sat);
            }
        }
        for nbrs in adj.values_mut() {
            nbrs.sort();
            nbrs.dedup();
        }
        adj
    }

    /// 所有活动链路中的最小传播时延
    pub fn min_live_delay(&self) -> Option<SimTime> {
        let isl = self.isl.iter().filter(|l| l.is_up()).map(|l| l.delay);
        let gsl = self.gsl.iter().filter_map(|r| r.channel().map(|c| c.delay));
        isl.chain(gsl).min()
    }
}
