//! 连续区间均分

use crate::error::{Result, TopoError};

/// 把 `count` 个元素按顺序切成 `workers` 段，每段 `⌊count/workers⌋` 个，
/// 最后一段吸收余数。返回每个元素所属的 worker。
pub fn split_in_order(count: usize, workers: usize) -> Result<Vec<usize>> {
    if workers == 0 {
        return Err(TopoError::Config("worker count must be > 0".into()));
    }
    if count < workers {
        return Err(TopoError::Config(format!(
            "{count} satellites cannot give each of {workers} workers at least one"
        )));
    }
    let base = count / workers;
    Ok((0..count).map(|i| (i / base).min(workers - 1)).collect())
}
