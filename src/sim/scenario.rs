//! 场景配置（scenario.json）
//!
//! 描述星座壳层、地面站、分区策略、GSL 切换策略、编址策略与链路中断选项。

use crate::error::{Result, TopoError};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    #[serde(default)]
    pub meta: Option<ScenarioMeta>,
    /// 拓扑刷新周期（毫秒）
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    pub duration_ms: u64,
    /// 仿真起点（儒略日），决定太阳方向与地球自转角
    #[serde(default = "default_epoch_jd")]
    pub epoch_jd: f64,
    pub shells: Vec<ShellSpec>,
    #[serde(default)]
    pub ground_stations: Vec<GroundStationSpec>,
    #[serde(default)]
    pub partition: PartitionSpec,
    #[serde(default)]
    pub gsl: GslSpec,
    #[serde(default)]
    pub addressing: AddressingSpec,
    #[serde(default)]
    pub isl: IslSpec,
    #[serde(default)]
    pub distributed: Option<DistributedSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 轨道壳层类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShellKind {
    /// Walker delta：升交点在 360° 上均布
    #[default]
    Delta,
    /// Walker star：升交点在 180° 上均布，首尾轨道逆向运行（接缝处无 ISL）
    Star,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub orbits: usize,
    pub sats_per_orbit: usize,
    /// Walker 相位因子 F
    #[serde(default)]
    pub phase_offset: u32,
    #[serde(default)]
    pub kind: ShellKind,
    pub inclination_deg: f64,
    pub altitude_km: f64,
    /// 可选的逐 tick 邻接文件路径模板，支持 `{tick}` 与 `{worker}` 占位符。
    /// 未给出时使用 +Grid 邻接。
    #[serde(default)]
    pub adjacency_file: Option<String>,
}

impl ShellSpec {
    pub fn satellite_count(&self) -> usize {
        self.orbits.saturating_mul(self.sats_per_orbit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundStationSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default = "default_interfaces")]
    pub interfaces: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionSpec {
    EvenInOrder {
        workers: usize,
        #[serde(default)]
        contact_log: Option<PathBuf>,
        #[serde(default)]
        merge_horizon_ms: u64,
    },
    GridAware {
        workers: usize,
        #[serde(default)]
        contact_log: Option<PathBuf>,
        #[serde(default)]
        merge_horizon_ms: u64,
    },
    HandoverDecoupled {
        workers: usize,
    },
    Explicit {
        workers: usize,
        coalition: PathBuf,
    },
}

impl Default for PartitionSpec {
    fn default() -> Self {
        PartitionSpec::EvenInOrder {
            workers: 1,
            contact_log: None,
            merge_horizon_ms: 0,
        }
    }
}

impl PartitionSpec {
    pub fn workers(&self) -> usize {
        match self {
            PartitionSpec::EvenInOrder { workers, .. }
            | PartitionSpec::GridAware { workers, .. }
            | PartitionSpec::HandoverDecoupled { workers }
            | PartitionSpec::Explicit { workers, .. } => *workers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchStrategySpec {
    NearestDistance,
    InvisibilityTriggered,
    GeographicPartition {
        /// 纬度带数量；缺省取每轨卫星数的一半
        #[serde(default)]
        lat_bands: Option<usize>,
        /// 经度扇区数量；缺省取轨道数
        #[serde(default)]
        lon_sectors: Option<usize>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GslSpec {
    #[serde(default = "default_switch_strategy")]
    pub strategy: SwitchStrategySpec,
    #[serde(default = "default_min_elevation_deg")]
    pub min_elevation_deg: f64,
    /// 单颗卫星可同时服务的地面接口数（feeder-link capacity）
    #[serde(default = "default_feeder_capacity")]
    pub feeder_capacity: usize,
}

impl Default for GslSpec {
    fn default() -> Self {
        Self {
            strategy: default_switch_strategy(),
            min_elevation_deg: default_min_elevation_deg(),
            feeder_capacity: default_feeder_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressingSpec {
    /// 每颗卫星的对地接口拥有固定地址块
    PerSatelliteFixedSegment {
        #[serde(default = "default_satellite_pool")]
        pool: Ipv4Network,
        #[serde(default = "default_block_prefix")]
        block_prefix: u8,
    },
    /// 每个地面接口在所有切换中保持同一地址
    SharedGroundSegment {
        #[serde(default = "default_satellite_pool")]
        satellite_pool: Ipv4Network,
        #[serde(default = "default_ground_pool")]
        ground_pool: Ipv4Network,
    },
}

impl Default for AddressingSpec {
    fn default() -> Self {
        AddressingSpec::PerSatelliteFixedSegment {
            pool: default_satellite_pool(),
            block_prefix: default_block_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IslSpec {
    /// 纬度绝对值超过该阈值时链路被极区截断；None 表示关闭
    #[serde(default)]
    pub polar_cutoff_deg: Option<f64>,
    /// 日凌判定阈值（度）；None 表示关闭
    #[serde(default)]
    pub sun_outage_deg: Option<f64>,
    #[serde(default)]
    pub random_outage: Option<RandomOutageSpec>,
    /// ISL 数据率（仅透传给信道对象）
    #[serde(default)]
    pub data_rate_bps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomOutageSpec {
    #[serde(default)]
    pub seed: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl RandomOutageSpec {
    /// 间隔与持续时间都必须是非空且为正的闭区间。
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_ms == 0 || self.min_interval_ms > self.max_interval_ms {
            return Err(TopoError::Config(format!(
                "isl.random_outage interval range [{}, {}] ms is invalid",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        if self.min_duration_ms == 0 || self.min_duration_ms > self.max_duration_ms {
            return Err(TopoError::Config(format!(
                "isl.random_outage duration range [{}, {}] ms is invalid",
                self.min_duration_ms, self.max_duration_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedSpec {
    /// 本进程负责的 worker id
    pub worker: usize,
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_epoch_jd() -> f64 {
    // 2000-01-01 12:00 TT
    2_451_545.0
}

fn default_interfaces() -> usize {
    1
}

fn default_switch_strategy() -> SwitchStrategySpec {
    SwitchStrategySpec::NearestDistance
}

fn default_min_elevation_deg() -> f64 {
    25.0
}

fn default_feeder_capacity() -> usize {
    4
}

fn default_satellite_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 8)
        .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::new(10, 0, 0, 0)))
}

fn default_ground_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(100, 64, 0, 0), 10)
        .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::new(100, 64, 0, 0)))
}

fn default_block_prefix() -> u8 {
    28
}

impl ScenarioSpec {
    /// 从 JSON 文件加载并校验场景
    pub fn load(path: &Path) -> Result<ScenarioSpec> {
        let raw = fs::read_to_string(path).map_err(|e| TopoError::from_read(path, e))?;
        let spec: ScenarioSpec = serde_json::from_str(&raw)
            .map_err(|e| TopoError::Config(format!("{}: {e}", path.display())))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn satellite_count(&self) -> usize {
        self.shells.iter().map(ShellSpec::satellite_count).sum()
    }

    pub fn ground_station_count(&self) -> usize {
        self.ground_stations.len()
    }

    pub fn node_count(&self) -> usize {
        self.satellite_count() + self.ground_station_count()
    }

    /// 校验配置的基本约束，违反时返回 `Config` 错误并指明约束。
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(TopoError::Config(format!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.tick_ms == 0 {
            return Err(TopoError::Config("tick_ms must be > 0".into()));
        }
        if self.shells.is_empty() {
            return Err(TopoError::Config("at least one shell is required".into()));
        }
        for (i, shell) in self.shells.iter().enumerate() {
            if shell.orbits == 0 || shell.sats_per_orbit == 0 {
                return Err(TopoError::Config(format!(
                    "shell {i}: orbits and sats_per_orbit must be > 0"
                )));
            }
            if shell.altitude_km <= 0.0 {
                return Err(TopoError::Config(format!(
                    "shell {i}: altitude_km must be > 0"
                )));
            }
        }
        for (i, gs) in self.ground_stations.iter().enumerate() {
            if gs.interfaces == 0 {
                return Err(TopoError::Config(format!(
                    "ground station {i}: interfaces must be > 0"
                )));
            }
            if !(-90.0..=90.0).contains(&gs.latitude_deg) {
                return Err(TopoError::Config(format!(
                    "ground station {i}: latitude_deg out of range"
                )));
            }
        }
        if self.partition.workers() == 0 {
            return Err(TopoError::Config("partition.workers must be > 0".into()));
        }
        if self.gsl.feeder_capacity == 0 {
            return Err(TopoError::Config("gsl.feeder_capacity must be > 0".into()));
        }
        if !(0.0..90.0).contains(&self.gsl.min_elevation_deg) {
            return Err(TopoError::Config(
                "gsl.min_elevation_deg must be in [0, 90)".into(),
            ));
        }
        if let AddressingSpec::PerSatelliteFixedSegment { pool, block_prefix } = &self.addressing {
            // 至少需要：网络号、卫星地址、一个地面地址、广播地址
            if *block_prefix > 30 || *block_prefix < pool.prefix() {
                return Err(TopoError::Config(format!(
                    "addressing.block_prefix {block_prefix} must be within [{}, 30]",
                    pool.prefix()
                )));
            }
        }
        if let Some(r) = &self.isl.random_outage {
            r.validate()?;
        }
        if let Some(d) = &self.distributed {
            if d.worker >= self.partition.workers() {
                return Err(TopoError::Config(format!(
                    "distributed.worker {} must be < partition.workers {}",
                    d.worker,
                    self.partition.workers()
                )));
            }
        }
        Ok(())
    }
}
