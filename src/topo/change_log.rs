//! 输出文件：拓扑变更日志、接触日志与 lookahead 文件
//!
//! 拓扑变更日志是下游轨迹/切换可视化工具的唯一数据源，按发生顺序逐行追加，
//! 不重排也不去重。

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TopoError};
use crate::net::{NodeId, OutageCauses};
use crate::sim::SimTime;

/// 变更原因字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    GslAttach,
    GslDetach,
    /// 新发现的链路首次 up（信道刚创建）
    IslNew,
    IslUp,
    IslDown(OutageCauses),
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::GslAttach => write!(f, "gsl_attach"),
            ChangeReason::GslDetach => write!(f, "gsl_detach"),
            ChangeReason::IslNew => write!(f, "isl_new"),
            ChangeReason::IslUp => write!(f, "isl_up"),
            ChangeReason::IslDown(causes) => write!(f, "isl_down:{causes}"),
        }
    }
}

/// `"<time_ms>,<nodeA>,<nodeB>[,reason]"`
pub fn change_line(time: SimTime, a: NodeId, b: NodeId, reason: Option<ChangeReason>) -> String {
    match reason {
        Some(r) => format!("{},{},{},{r}", time.as_millis(), a.0, b.0),
        None => format!("{},{},{}", time.as_millis(), a.0, b.0),
    }
}

/// 只追加的行输出：始终保留内存副本，可选同时写文件
#[derive(Debug, Default)]
pub struct LineSink {
    lines: Vec<String>,
    file: Option<(PathBuf, BufWriter<File>)>,
}

impl LineSink {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| TopoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            lines: Vec::new(),
            file: Some((path.to_path_buf(), BufWriter::new(file))),
        })
    }

    pub fn push(&mut self, line: String) -> Result<()> {
        if let Some((path, w)) = self.file.as_mut() {
            writeln!(w, "{line}").map_err(|source| TopoError::Io {
                path: path.clone(),
                source,
            })?;
        }
        self.lines.push(line);
        Ok(())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some((path, w)) = self.file.as_mut() {
            w.flush().map_err(|source| TopoError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// 覆盖写 lookahead 文件：单个整数（纳秒）
pub fn write_lookahead(path: &Path, delay: SimTime) -> Result<()> {
    fs::write(path, format!("{}\n", delay.0)).map_err(|source| TopoError::Io {
        path: path.to_path_buf(),
        source,
    })
}
