//! 星间链路中断引擎
//!
//! 每条 ISL 有三个相互独立的中断原因：极区截断、日凌（二者同属可预测类）
//! 与随机注入（不可预测类）。聚合状态 `is_up = !predictable && !unpredictable`。

mod engine;
mod geometry;
mod random;

pub(crate) use engine::transition_of;
pub use engine::{IslOutageConfig, IslOutageEngine, IslTransition, PredictableCause};
pub use geometry::{polar_cutoff, sun_blinded};
pub use random::{PendingRecovery, UnpredictableScheduler};
