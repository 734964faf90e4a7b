//! 显式联盟列表

use crate::error::{Result, TopoError};

/// 由 `worker_id -> [node_id, ...]` 直接得到分区；每个节点必须恰好出现一次。
pub(crate) fn from_coalition(
    coalition: &[Vec<usize>],
    node_count: usize,
    workers: usize,
) -> Result<Vec<usize>> {
    if coalition.len() > workers {
        return Err(TopoError::Config(format!(
            "coalition lists {} workers, only {workers} configured",
            coalition.len()
        )));
    }
    let mut owner = vec![None; node_count];
    for (w, members) in coalition.iter().enumerate() {
        for &node in members {
            let Some(slot) = owner.get_mut(node) else {
                return Err(TopoError::Config(format!(
                    "coalition worker {w}: node id {node} out of range [0, {node_count})"
                )));
            };
            if let Some(prev) = slot.replace(w) {
                return Err(TopoError::Config(format!(
                    "coalition: node {node} listed for worker {prev} and worker {w}"
                )));
            }
        }
    }
    owner
        .into_iter()
        .enumerate()
        .map(|(node, w)| {
            w.ok_or_else(|| TopoError::Config(format!("coalition: node {node} not listed")))
        })
        .collect()
}
