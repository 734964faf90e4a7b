//! 网格感知分区
//!
//! 把卫星排成 `轨道序号 × 轨内序号` 的二维网格，切成约
//! `⌈√(K/A)⌉ × ⌈A·√(K/A)⌉` 个矩形（A = 轨道数 / 每轨卫星数），每个完整矩形
//! 对应一个 worker。
//!
//! ⌈√(K/A)⌉·⌈A·√(K/A)⌉ ≥ K，所以合法的矩形网格恰好用满 K 个 worker；
//! 网格不能整除时落在矩形之外的余数卫星没有空闲 worker 可分，按配置错误拒绝。

use crate::error::{Result, TopoError};
use crate::partition::TopologyHint;
use tracing::debug;

/// 矩形网格尺寸：(轨内方向切分数, 轨道方向切分数)
pub(crate) fn rectangle_grid(orbits: usize, per_orbit: usize, workers: usize) -> Result<(usize, usize)> {
    let aspect = orbits as f64 / per_orbit as f64;
    let k = workers as f64;
    let along = (k / aspect).sqrt().ceil() as usize;
    if along == 0 {
        return Err(TopoError::Config("grid_aware needs at least one worker".into()));
    }
    let across = (aspect * (k / aspect).sqrt()).ceil() as usize;
    if along * across > workers {
        return Err(TopoError::Config(format!(
            "grid_aware: {across}x{along} rectangles need {} workers, only {workers} available",
            along * across
        )));
    }
    if along > per_orbit || across > orbits {
        return Err(TopoError::Config(format!(
            "grid_aware: {across}x{along} rectangles do not fit a {orbits}x{per_orbit} satellite grid"
        )));
    }
    Ok((along, across))
}

pub(crate) fn grid_partition(hint: &TopologyHint, workers: usize) -> Result<Vec<usize>> {
    let [shell] = hint.shells.as_slice() else {
        return Err(TopoError::Config(format!(
            "grid_aware partitioning needs exactly one shell, got {}",
            hint.shells.len()
        )));
    };
    if shell.first.0 != 0 || shell.orbits * shell.sats_per_orbit != hint.satellites {
        return Err(TopoError::Config(
            "grid_aware: the shell must cover every satellite id".into(),
        ));
    }
    if hint.satellites < workers {
        return Err(TopoError::Config(format!(
            "{} satellites cannot give each of {workers} workers at least one",
            hint.satellites
        )));
    }

    let (along, across) = rectangle_grid(shell.orbits, shell.sats_per_orbit, workers)?;
    let rect_orbits = shell.orbits / across;
    let rect_slots = shell.sats_per_orbit / along;

    let mut owner = vec![usize::MAX; hint.satellites];
    let mut remainder = 0usize;
    for (sat, slot_owner) in owner.iter_mut().enumerate() {
        let orbit = sat / shell.sats_per_orbit;
        let slot = sat % shell.sats_per_orbit;
        let (i, j) = (orbit / rect_orbits, slot / rect_slots);
        if i < across && j < along {
            *slot_owner = i * along + j;
        } else {
            remainder += 1;
        }
    }

    debug!(
        along,
        across,
        rect_orbits,
        rect_slots,
        remainder,
        "网格矩形划分"
    );
    if remainder > 0 {
        return Err(TopoError::Config(format!(
            "grid_aware: {remainder} remainder satellites outside the {across}x{along} rectangles, no unused worker to split them over"
        )));
    }
    Ok(owner)
}
