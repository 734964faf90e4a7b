//! 可见性表：每个地面站当前可见（仰角不低于门限）的卫星，按 (距离, id) 升序

use std::collections::HashMap;

use crate::geo::{SatState, elevation_deg};
use crate::net::{NodeId, NodeTable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub satellite: NodeId,
    pub range_km: f64,
    pub elevation_deg: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityTable {
    per_station: HashMap<NodeId, Vec<Candidate>>,
}

impl VisibilityTable {
    pub fn compute(nodes: &NodeTable, states: &[SatState], min_elevation_deg: f64) -> Self {
        let mut per_station = HashMap::new();
        for gs in nodes.ground_stations() {
            let Some(pos) = nodes.ground_position(gs) else {
                continue;
            };
            let mut cands: Vec<Candidate> = states
                .iter()
                .enumerate()
                .filter_map(|(i, s)| {
                    let el = elevation_deg(&pos, &s.position);
                    (el >= min_elevation_deg).then(|| Candidate {
                        satellite: NodeId(i),
                        range_km: (s.position - pos).norm(),
                        elevation_deg: el,
                    })
                })
                .collect();
            // 距离相同时取 id 较小者
            cands.sort_by(|x, y| {
                x.range_km
                    .total_cmp(&y.range_km)
                    .then(x.satellite.cmp(&y.satellite))
            });
            per_station.insert(gs, cands);
        }
        Self { per_station }
    }

    pub fn visible(&self, station: NodeId) -> &[Candidate] {
        self.per_station
            .get(&station)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_visible(&self, station: NodeId, sat: NodeId) -> bool {
        self.visible(station).iter().any(|c| c.satellite == sat)
    }
}
