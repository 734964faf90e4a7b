//! 错误类型
//!
//! 拓扑引擎中的所有错误都是致命的：编排器遇到错误即终止仿真，不做自动重试。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopoError {
    /// 配置或分区数学不成立（例如 worker 数为 0、余数无法均分）
    #[error("configuration error: {0}")]
    Config(String),
    #[error("required file not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 逻辑错误：拓扑状态已被破坏
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("address block exhausted: {0}")]
    AddressExhausted(String),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TopoError>;

impl TopoError {
    /// 将读取文件时的 I/O 错误归类为 MissingFile / UnreadableFile
    pub fn from_read(path: impl Into<PathBuf>, e: std::io::Error) -> TopoError {
        let path = path.into();
        match e.kind() {
            std::io::ErrorKind::NotFound => TopoError::MissingFile { path },
            _ => TopoError::UnreadableFile { path, source: e },
        }
    }

    pub fn invariant(msg: impl Into<String>) -> TopoError {
        TopoError::InvariantViolation(msg.into())
    }
}
