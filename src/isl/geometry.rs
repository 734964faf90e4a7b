//! 可预测中断的几何判定

use crate::geo::{AU_KM, Vec3, angular_separation_deg, latitude_deg};

/// 任一端点纬度绝对值超过阈值即截断
pub fn polar_cutoff(a: &Vec3, b: &Vec3, cutoff_deg: f64) -> bool {
    latitude_deg(a).abs() > cutoff_deg || latitude_deg(b).abs() > cutoff_deg
}

/// 从 `sat` 看向太阳与看向邻居 `neighbor` 的方向夹角低于阈值
fn blinded_from(sat: &Vec3, neighbor: &Vec3, sun_dir: &Vec3, threshold_deg: f64) -> bool {
    let to_sun = sun_dir * AU_KM - sat;
    let to_neighbor = neighbor - sat;
    angular_separation_deg(&to_sun, &to_neighbor) < threshold_deg
}

/// 任一端点的终端被太阳致盲即判定日凌
pub fn sun_blinded(a: &Vec3, b: &Vec3, sun_dir: &Vec3, threshold_deg: f64) -> bool {
    blinded_from(a, b, sun_dir, threshold_deg) || blinded_from(b, a, sun_dir, threshold_deg)
}
