//! 运行结束后的 JSON 报告：GSL 接口挂接历史与 ISL 中断历史

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, TopoError};
use crate::net::{AttachInterval, LinkRegistry, NodeId, OutageCauses, OutageInterval};

#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub strategy: String,
    pub workers: usize,
    pub sizes: Vec<usize>,
    pub owner: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IslReport {
    pub link: usize,
    pub a: NodeId,
    pub b: NodeId,
    pub shell: usize,
    pub up: bool,
    pub present: bool,
    pub causes: OutageCauses,
    pub outages: Vec<OutageInterval>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GslReport {
    pub iface: usize,
    pub station: NodeId,
    pub attached: Option<NodeId>,
    pub address: Option<Ipv4Addr>,
    pub history: Vec<AttachInterval>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: Option<String>,
    pub worker: Option<usize>,
    pub ticks: u64,
    pub final_time_ms: u64,
    pub partition: Option<PartitionReport>,
    pub random_outages_injected: u64,
    pub isl: Vec<IslReport>,
    pub gsl: Vec<GslReport>,
    pub failure: Option<String>,
}

/// 从注册表收集 ISL 与 GSL 的历史
pub fn link_reports(registry: &LinkRegistry) -> (Vec<IslReport>, Vec<GslReport>) {
    let isl = registry
        .isl_links()
        .iter()
        .map(|l| IslReport {
            link: l.id.0,
            a: l.a,
            b: l.b,
            shell: l.shell,
            up: l.is_up(),
            present: l.is_present(),
            causes: l.causes(),
            outages: l.outages.intervals.clone(),
        })
        .collect();
    let gsl = registry
        .interfaces()
        .iter()
        .map(|r| GslReport {
            iface: r.iface.0,
            station: r.station,
            attached: r.attached_satellite(),
            address: r.address(),
            history: r.history().to_vec(),
        })
        .collect();
    (isl, gsl)
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| TopoError::Config(format!("cannot serialize run report: {e}")))?;
        fs::write(path, raw).map_err(|source| TopoError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
