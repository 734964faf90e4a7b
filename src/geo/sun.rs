//! 低精度太阳方向
//!
//! 日凌判定只需要度量级精度，采用天文年历的简化公式。

use super::Vec3;

const J2000: f64 = 2_451_545.0;

/// 格林尼治平恒星时（弧度）
pub fn gmst_rad(jd: f64) -> f64 {
    let d = jd - J2000;
    (280.460_618_37 + 360.985_647_366_29 * d)
        .rem_euclid(360.0)
        .to_radians()
}

/// 地固系下指向太阳的单位向量
pub fn sun_direction_ecef(jd: f64) -> Vec3 {
    let n = jd - J2000;
    let mean_lon = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let g = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    let ecl_lon = (mean_lon + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
    let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

    let eci = Vec3::new(
        ecl_lon.cos(),
        obliquity.cos() * ecl_lon.sin(),
        obliquity.sin() * ecl_lon.sin(),
    );
    rotate_z(&eci, -gmst_rad(jd))
}

/// 绕 z 轴旋转
pub(crate) fn rotate_z(v: &Vec3, angle: f64) -> Vec3 {
    let (s, c) = angle.sin_cos();
    Vec3::new(c * v.x - s * v.y, s * v.x + c * v.y, v.z)
}
