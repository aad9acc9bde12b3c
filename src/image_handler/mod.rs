//! # 图片处理模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“粘贴拦截 → 解码 → 询问参数 → 缩放编码 → 生成路径 → 写盘与插入链接”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：粘贴事件入口（`PasteService`），并发驱动每个条目
//! - `handler`：编排单个条目的处理流水线
//! - `pipeline`：负责解码、像素限制、重采样与重新编码
//! - `prompt`：每次粘贴时的参数询问
//! - `naming`：文件名与目录生成
//! - `placement`：落盘、撞名处理、链接插入
//! - `config/error/source`：参数、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! PasteEvent
//!    ↓
//! service.rs（编辑器上下文检查 + 条目筛选 + join_all）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ pipeline.rs（解码，spawn_blocking）
//!    ├─ prompt.rs（可选询问 + 持久化）
//!    ├─ pipeline.rs（缩放编码，spawn_blocking）
//!    └─ placement.rs（naming.rs 生成路径 → 写盘 → 链接或提示）
//!    ↓
//! PasteReport
//! ```
//!
//! ## 分层职责建议
//!
//! - 缩放与格式策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 文件命名规则变更优先改 `naming.rs`

mod config;
mod error;
mod handler;
pub mod naming;
mod pipeline;
mod placement;
pub mod prompt;
mod service;
mod source;

pub use config::{
    DEFAULT_QUALITY, OutputFormat, RESIZE_DISABLED_FLOOR, TranscodeLimits, TranscodeParams,
    compute_target_dimensions, resize_enabled,
};
pub use error::ImageError;
pub use handler::ImageHandler;
pub use naming::{SynthesizedPath, synthesize_path};
pub use placement::{MAX_COLLISION_PROBES, embed_link};
pub use prompt::{DisabledPrompt, OverrideForm, OverridePrompt, StdinPrompt, UserOverrideChoice};
pub use service::{ItemErrorView, ItemOutcome, ItemReport, PasteReport, PasteService};
pub use source::{EncodedArtifact, PasteContext, TranscodeOutcome};
