//! 地理分区
//!
//! 地表按 (升/降轨, 纬度带, 经度扇区) 预先切成静态分区；每个地面站映射到
//! 自己所在位置的升轨分区与降轨分区，每个分区映射到当前正经过它的卫星。

use std::collections::{BTreeMap, HashMap};

use crate::geo::{SatState, Vec3, latitude_deg, longitude_deg};
use crate::net::{NodeId, NodeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoCell {
    pub ascending: bool,
    pub lat_band: usize,
    pub lon_sector: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPartitionMap {
    lat_bands: usize,
    lon_sectors: usize,
    /// 地面站 -> [升轨分区, 降轨分区]
    station_cells: HashMap<NodeId, [GeoCell; 2]>,
}

fn bucket(value: f64, min: f64, span: f64, buckets: usize) -> usize {
    let b = ((value - min) / span * buckets as f64).floor();
    (b.max(0.0) as usize).min(buckets - 1)
}

impl GeoPartitionMap {
    pub fn new(nodes: &NodeTable, lat_bands: usize, lon_sectors: usize) -> Self {
        let lat_bands = lat_bands.max(1);
        let lon_sectors = lon_sectors.max(1);
        let mut map = Self {
            lat_bands,
            lon_sectors,
            station_cells: HashMap::new(),
        };
        for gs in nodes.ground_stations() {
            if let Some(pos) = nodes.ground_position(gs) {
                let asc = map.cell_of(&pos, true);
                let desc = map.cell_of(&pos, false);
                map.station_cells.insert(gs, [asc, desc]);
            }
        }
        map
    }

    pub fn lat_bands(&self) -> usize {
        self.lat_bands
    }

    pub fn lon_sectors(&self) -> usize {
        self.lon_sectors
    }

    pub fn cell_of(&self, p: &Vec3, ascending: bool) -> GeoCell {
        GeoCell {
            ascending,
            lat_band: bucket(latitude_deg(p), -90.0, 180.0, self.lat_bands),
            lon_sector: bucket(longitude_deg(p), -180.0, 360.0, self.lon_sectors),
        }
    }

    pub fn station_cells(&self, station: NodeId) -> Option<[GeoCell; 2]> {
        self.station_cells.get(&station).copied()
    }

    /// 本 tick 每个分区内正在经过的卫星（按 id 升序）
    pub fn occupancy(&self, states: &[SatState]) -> BTreeMap<GeoCell, Vec<NodeId>> {
        let mut out: BTreeMap<GeoCell, Vec<NodeId>> = BTreeMap::new();
        for (i, s) in states.iter().enumerate() {
            out.entry(self.cell_of(&s.position, s.ascending()))
                .or_default()
                .push(NodeId(i));
        }
        out
    }
}
