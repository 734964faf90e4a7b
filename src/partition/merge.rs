//! 地面站合并（union-find）
//!
//! 地面站继承其在接触日志中所连卫星的分区。若一组地面站/卫星经由接触记录
//! 连成一个合并组，整组（含组内所有卫星）都被拉到该组中按日志从左到右
//! 第一个出现的卫星所在分区，使地面站的切换邻域留在同一个 worker 内。

use crate::error::{Result, TopoError};
use crate::partition::TopologyHint;
use tracing::{debug, trace};

pub(crate) const UNASSIGNED: usize = usize::MAX;

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
    }
}

/// `owner[..satellites]` 已是卫星分区；填充 `owner[satellites..]`，
/// 并按合并组改写卫星分区。
pub(crate) fn merge_ground_stations(
    owner: &mut [usize],
    hint: &TopologyHint,
    workers: usize,
) -> Result<()> {
    let n = owner.len();
    let sats = hint.satellites;
    let contacts: Vec<_> = hint
        .contacts
        .iter()
        .filter(|c| c.time_ms <= hint.merge_horizon_ms)
        .collect();

    for c in &contacts {
        if c.station.0 < sats || c.station.0 >= n {
            return Err(TopoError::Config(format!(
                "contact log: {} is not a ground station id (ground ids are [{sats}, {n}))",
                c.station
            )));
        }
        if c.satellite.0 >= sats {
            return Err(TopoError::Config(format!(
                "contact log: {} is not a satellite id (satellite ids are [0, {sats}))",
                c.satellite
            )));
        }
    }

    let mut uf = UnionFind::new(n);
    for c in &contacts {
        uf.union(c.station.0, c.satellite.0);
    }

    // 每个合并组的“第一个出现的卫星”：按日志顺序扫描
    let mut leader = vec![UNASSIGNED; n];
    for c in &contacts {
        let root = uf.find(c.station.0);
        if leader[root] == UNASSIGNED {
            leader[root] = c.satellite.0;
            trace!(group = root, leader = c.satellite.0, "合并组首颗卫星");
        }
    }

    let original: Vec<usize> = owner[..sats].to_vec();
    let mut moved_sats = 0usize;
    let mut unmatched = 0usize;
    for node in 0..n {
        let root = uf.find(node);
        let lead = leader[root];
        if lead != UNASSIGNED {
            let target = original[lead];
            if node < sats && owner[node] != target {
                moved_sats += 1;
            }
            owner[node] = target;
        } else if node >= sats {
            // 没有任何接触的地面站轮转分配
            owner[node] = (node - sats) % workers;
            unmatched += 1;
        }
    }
    debug!(
        contacts = contacts.len(),
        moved_sats, unmatched, "地面站合并完成"
    );
    Ok(())
}
