//! 几何工具
//!
//! 所有位置均为地固系（ECEF）坐标，单位 km，使用 `nalgebra::Vector3<f64>`。
//! 轨道动力学本身不在拓扑引擎范围内，通过 [`MobilityModel`] 接入。

mod mobility;
mod sun;

pub use mobility::{MobilityModel, SatState, StaticMobility, WalkerMobility};
pub use sun::{gmst_rad, sun_direction_ecef};

use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

/// 球形地球半径（km）
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// 地心引力常数（km^3/s^2）
pub const EARTH_MU: f64 = 398_600.441_8;
/// 地球自转角速度（rad/s）
pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115_9e-5;
/// 真空光速（km/s）
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
/// 天文单位（km）
pub const AU_KM: f64 = 149_597_870.7;

/// 大地坐标（球形地球近似）转 ECEF
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_km: f64) -> Vec3 {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let r = EARTH_RADIUS_KM + alt_km;
    Vec3::new(r * lat.cos() * lon.cos(), r * lat.cos() * lon.sin(), r * lat.sin())
}

/// 星下点纬度（度）
pub fn latitude_deg(p: &Vec3) -> f64 {
    let r = p.norm();
    if r == 0.0 {
        return 0.0;
    }
    (p.z / r).clamp(-1.0, 1.0).asin().to_degrees()
}

/// 星下点经度（度，(-180, 180]）
pub fn longitude_deg(p: &Vec3) -> f64 {
    p.y.atan2(p.x).to_degrees()
}

/// 从地面点 `ground` 看目标 `target` 的仰角（度）
pub fn elevation_deg(ground: &Vec3, target: &Vec3) -> f64 {
    let d = target - ground;
    let range = d.norm();
    let up = ground.norm();
    if range == 0.0 || up == 0.0 {
        return 90.0;
    }
    (d.dot(ground) / (range * up)).clamp(-1.0, 1.0).asin().to_degrees()
}

/// 两个观测方向之间的夹角（度）
pub fn angular_separation_deg(a: &Vec3, b: &Vec3) -> f64 {
    let na = a.norm();
    let nb = b.norm();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// 两点之间的光速传播时延（秒）
pub fn propagation_delay_s(a: &Vec3, b: &Vec3) -> f64 {
    (a - b).norm() / SPEED_OF_LIGHT_KM_S
}
