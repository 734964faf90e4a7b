//! 星座壳层
//!
//! 一个壳层覆盖一段连续的卫星 id，负责给出每个 tick 的 ISL 邻接：
//! 默认是 +Grid（轨内环 + 相邻轨道同序号），也可以由逐 tick 的邻接文件给出。

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::io::read_adjacency_file;
use crate::error::{Result, TopoError};
use crate::net::{NodeId, WorkerId};
use crate::partition::ShellGrid;
use crate::sim::{ShellKind, ShellSpec};

#[derive(Debug, Clone)]
pub struct Constellation {
    pub index: usize,
    pub name: String,
    pub orbits: usize,
    pub sats_per_orbit: usize,
    pub phase_offset: u32,
    pub kind: ShellKind,
    pub inclination_deg: f64,
    pub altitude_km: f64,
    pub first: NodeId,
    adjacency_file: Option<String>,
}

impl Constellation {
    pub fn new(index: usize, first: NodeId, spec: &ShellSpec) -> Self {
        Self {
            index,
            name: spec.name.clone().unwrap_or_else(|| format!("shell{index}")),
            orbits: spec.orbits,
            sats_per_orbit: spec.sats_per_orbit,
            phase_offset: spec.phase_offset,
            kind: spec.kind,
            inclination_deg: spec.inclination_deg,
            altitude_km: spec.altitude_km,
            first,
            adjacency_file: spec.adjacency_file.clone(),
        }
    }

    /// 按顺序为所有壳层分配连续 id 段
    pub fn from_specs(specs: &[ShellSpec]) -> Vec<Constellation> {
        let mut first = 0;
        specs
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let c = Constellation::new(i, NodeId(first), s);
                first += s.satellite_count();
                c
            })
            .collect()
    }

    pub fn satellite_count(&self) -> usize {
        self.orbits * self.sats_per_orbit
    }

    pub fn contains(&self, sat: NodeId) -> bool {
        sat >= self.first && sat.0 < self.first.0 + self.satellite_count()
    }

    pub fn satellites(&self) -> impl Iterator<Item = NodeId> + '_ {
        (self.first.0..self.first.0 + self.satellite_count()).map(NodeId)
    }

    pub fn sat_id(&self, orbit: usize, slot: usize) -> NodeId {
        NodeId(self.first.0 + orbit * self.sats_per_orbit + slot)
    }

    /// 卫星在 (轨道序号, 轨内序号) 网格中的位置
    pub fn grid_position(&self, sat: NodeId) -> Option<(usize, usize)> {
        if !self.contains(sat) {
            return None;
        }
        let idx = sat.0 - self.first.0;
        Some((idx / self.sats_per_orbit, idx % self.sats_per_orbit))
    }

    pub fn grid(&self) -> ShellGrid {
        ShellGrid {
            first: self.first,
            orbits: self.orbits,
            sats_per_orbit: self.sats_per_orbit,
        }
    }

    /// +Grid 邻接。delta 壳层的接缝按相位因子错位连接；star 壳层的接缝两侧
    /// 轨道逆向运行，不建 ISL。
    pub fn grid_adjacency(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = BTreeSet::new();
        let mut add = |a: NodeId, b: NodeId| {
            if a != b {
                pairs.insert(if a < b { (a, b) } else { (b, a) });
            }
        };
        let p = self.sats_per_orbit;
        let o = self.orbits;
        for orbit in 0..o {
            for slot in 0..p {
                let me = self.sat_id(orbit, slot);
                if p > 1 {
                    add(me, self.sat_id(orbit, (slot + 1) % p));
                }
                if orbit + 1 < o {
                    add(me, self.sat_id(orbit + 1, slot));
                } else if o > 2 && self.kind == ShellKind::Delta {
                    let shifted = (slot + self.phase_offset as usize) % p;
                    add(me, self.sat_id(0, shifted));
                }
            }
        }
        pairs.into_iter().collect()
    }

    /// 第 `tick` 个 tick 的邻接
    pub fn adjacency_at(&self, tick: u64, worker: Option<WorkerId>) -> Result<Vec<(NodeId, NodeId)>> {
        let Some(template) = &self.adjacency_file else {
            return Ok(self.grid_adjacency());
        };
        let path = PathBuf::from(
            template
                .replace("{tick}", &tick.to_string())
                .replace("{worker}", &worker.map(|w| w.0).unwrap_or(0).to_string()),
        );
        let pairs = read_adjacency_file(&path)?;
        for &(a, b) in &pairs {
            if !self.contains(a) || !self.contains(b) {
                return Err(TopoError::Config(format!(
                    "{}: edge ({a}, {b}) is outside shell {} id range [{}, {})",
                    path.display(),
                    self.name,
                    self.first,
                    self.first.0 + self.satellite_count()
                )));
            }
        }
        Ok(pairs)
    }
}
