//! 文件边界：邻接文件、接触日志与联盟文件的读取
//!
//! 格式逐字节固定，下游工具依赖这些格式。

use std::fs;
use std::path::Path;

use crate::error::{Result, TopoError};
use crate::net::NodeId;
use serde::{Deserialize, Serialize};

/// 接触/切换日志中的一行：`<time_ms>,<groundStationId>,<satelliteId>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub time_ms: u64,
    pub station: NodeId,
    pub satellite: NodeId,
}

impl ContactEntry {
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.time_ms, self.station.0, self.satellite.0)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| TopoError::from_read(path, e))
}

fn bad_line(origin: &str, lineno: usize, line: &str, what: &str) -> TopoError {
    TopoError::Config(format!("{origin}:{}: {what}: {line:?}", lineno + 1))
}

/// 解析邻接文件内容：每行 `"<satId0> <satId1>"`
pub fn parse_adjacency(origin: &str, raw: &str) -> Result<Vec<(NodeId, NodeId)>> {
    let mut out = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut it = line.split_whitespace();
        let (Some(a), Some(b), None) = (it.next(), it.next(), it.next()) else {
            return Err(bad_line(origin, lineno, line, "expected two satellite ids"));
        };
        let a: usize = a
            .parse()
            .map_err(|_| bad_line(origin, lineno, line, "bad satellite id"))?;
        let b: usize = b
            .parse()
            .map_err(|_| bad_line(origin, lineno, line, "bad satellite id"))?;
        out.push((NodeId(a), NodeId(b)));
    }
    Ok(out)
}

pub fn read_adjacency_file(path: &Path) -> Result<Vec<(NodeId, NodeId)>> {
    let raw = read(path)?;
    parse_adjacency(&path.display().to_string(), &raw)
}

/// 解析接触日志内容：每行 `"<time_ms>,<gs>,<sat>"`
pub fn parse_contact_log(origin: &str, raw: &str) -> Result<Vec<ContactEntry>> {
    let mut out = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [t, gs, sat] = fields.as_slice() else {
            return Err(bad_line(origin, lineno, line, "expected time_ms,gs,sat"));
        };
        let parse = |s: &str| -> Result<u64> {
            s.parse::<u64>()
                .map_err(|_| bad_line(origin, lineno, line, "bad integer"))
        };
        out.push(ContactEntry {
            time_ms: parse(t)?,
            station: NodeId(parse(gs)? as usize),
            satellite: NodeId(parse(sat)? as usize),
        });
    }
    Ok(out)
}

pub fn read_contact_log(path: &Path) -> Result<Vec<ContactEntry>> {
    let raw = read(path)?;
    parse_contact_log(&path.display().to_string(), &raw)
}

/// 联盟文件：JSON 数组的数组，外层下标为 worker id，内层为节点 id
pub fn read_coalition_file(path: &Path) -> Result<Vec<Vec<usize>>> {
    let raw = read(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| TopoError::Config(format!("{}: invalid coalition file: {e}", path.display())))
}
