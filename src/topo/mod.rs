//! 拓扑编排模块
//!
//! 星座壳层与 ISL 邻接、文件边界（邻接/接触/联盟文件与输出日志）、
//! 以及驱动逐 tick 刷新的编排器。

mod change_log;
mod constellation;
mod io;
mod orchestrator;
mod report;

pub use change_log::{ChangeReason, LineSink, change_line, write_lookahead};
pub use constellation::Constellation;
pub use io::{
    ContactEntry, parse_adjacency, parse_contact_log, read_adjacency_file, read_coalition_file,
    read_contact_log,
};
pub use orchestrator::{
    CHANGE_LOG_FILE, CONTACT_LOG_FILE, InjectIslOutage, LOOKAHEAD_FILE, OrchestratorBuilder,
    OrchestratorOptions, REPORT_FILE, RecoverIslLink, TopologyOrchestrator, TopologyTick,
};
pub use report::{GslReport, IslReport, PartitionReport, RunReport, link_reports};
