//! 卫星运动模型
//!
//! 拓扑引擎只消费“某 tick 时刻卫星的位置与速度”。
//! `WalkerMobility` 提供圆轨道 Walker 星座的实现；`StaticMobility`
//! 按关键帧回放预先给定的位置，用于脚本化场景与测试。

use super::sun::rotate_z;
use super::{EARTH_MU, EARTH_RADIUS_KM, Vec3, gmst_rad};
use crate::net::NodeId;
use crate::sim::{ShellKind, ShellSpec, SimTime};

/// 卫星瞬时状态（ECEF, km 与 km/s）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatState {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl SatState {
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
        }
    }

    /// 是否处于升轨段（向北运动）
    pub fn ascending(&self) -> bool {
        self.velocity.z >= 0.0
    }
}

/// 外部轨道协作者接口
pub trait MobilityModel: Send {
    fn satellite_count(&self) -> usize;
    fn satellite_state(&self, sat: NodeId, t: SimTime) -> SatState;
}

#[derive(Debug, Clone)]
struct WalkerShell {
    first: usize,
    orbits: usize,
    per_orbit: usize,
    phase_offset: u32,
    kind: ShellKind,
    inclination: f64,
    radius_km: f64,
    mean_motion: f64,
}

/// 圆轨道 Walker delta/star 星座
#[derive(Debug, Clone)]
pub struct WalkerMobility {
    shells: Vec<WalkerShell>,
    epoch_jd: f64,
    total: usize,
}

impl WalkerMobility {
    pub fn new(shells: &[ShellSpec], epoch_jd: f64) -> Self {
        let mut first = 0;
        let mut out = Vec::with_capacity(shells.len());
        for s in shells {
            let radius_km = EARTH_RADIUS_KM + s.altitude_km;
            out.push(WalkerShell {
                first,
                orbits: s.orbits,
                per_orbit: s.sats_per_orbit,
                phase_offset: s.phase_offset,
                kind: s.kind,
                inclination: s.inclination_deg.to_radians(),
                radius_km,
                mean_motion: (EARTH_MU / radius_km.powi(3)).sqrt(),
            });
            first += s.satellite_count();
        }
        Self {
            shells: out,
            epoch_jd,
            total: first,
        }
    }

    fn eci_position(shell: &WalkerShell, idx: usize, t_s: f64) -> Vec3 {
        let orbit = idx / shell.per_orbit;
        let slot = idx % shell.per_orbit;
        let raan_span = match shell.kind {
            ShellKind::Delta => std::f64::consts::TAU,
            ShellKind::Star => std::f64::consts::PI,
        };
        let raan = raan_span * orbit as f64 / shell.orbits as f64;
        let total = (shell.orbits * shell.per_orbit) as f64;
        let phase = std::f64::consts::TAU
            * (slot as f64 / shell.per_orbit as f64
                + shell.phase_offset as f64 * orbit as f64 / total);
        let u = phase + shell.mean_motion * t_s;

        let (su, cu) = u.sin_cos();
        let (so, co) = raan.sin_cos();
        let (si, ci) = shell.inclination.sin_cos();
        shell.radius_km * Vec3::new(co * cu - so * su * ci, so * cu + co * su * ci, su * si)
    }

    fn ecef_position(&self, sat: usize, t_s: f64) -> Vec3 {
        let Some(shell) = self.shells.iter().rev().find(|s| s.first <= sat) else {
            return Vec3::zeros();
        };
        let eci = Self::eci_position(shell, sat - shell.first, t_s);
        rotate_z(&eci, -gmst_rad(self.epoch_jd + t_s / 86_400.0))
    }
}

impl MobilityModel for WalkerMobility {
    fn satellite_count(&self) -> usize {
        self.total
    }

    fn satellite_state(&self, sat: NodeId, t: SimTime) -> SatState {
        let t_s = t.as_secs_f64();
        let position = self.ecef_position(sat.0, t_s);
        // 1 秒差分已足够区分升降轨与估计多普勒量级
        let ahead = self.ecef_position(sat.0, t_s + 1.0);
        SatState {
            position,
            velocity: ahead - position,
        }
    }
}

/// 关键帧回放：`state(t)` 取不晚于 `t` 的最后一帧
#[derive(Debug, Clone, Default)]
pub struct StaticMobility {
    frames: Vec<(SimTime, Vec<SatState>)>,
}

impl StaticMobility {
    pub fn new(initial: Vec<SatState>) -> Self {
        Self {
            frames: vec![(SimTime::ZERO, initial)],
        }
    }

    /// 追加一帧；帧按时间有序插入
    pub fn push_frame(&mut self, at: SimTime, states: Vec<SatState>) {
        let idx = self.frames.partition_point(|(t, _)| *t <= at);
        self.frames.insert(idx, (at, states));
    }

    fn frame(&self, t: SimTime) -> Option<&[SatState]> {
        let idx = self.frames.partition_point(|(ft, _)| *ft <= t);
        let idx = idx.checked_sub(1)?;
        Some(self.frames[idx].1.as_slice())
    }
}

impl MobilityModel for StaticMobility {
    fn satellite_count(&self) -> usize {
        self.frames.first().map(|(_, s)| s.len()).unwrap_or(0)
    }

    fn satellite_state(&self, sat: NodeId, t: SimTime) -> SatState {
        self.frame(t)
            .and_then(|f| f.get(sat.0).copied())
            .unwrap_or_else(|| SatState::at_rest(Vec3::zeros()))
    }
}
