//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线中间结果”解耦：
//! - `RawImageData` 表示剪贴板条目中尚未解码的字节
//! - `DecodedImage` 表示单次流水线独占的解码位图
//! - `EncodedArtifact` 表示重新编码后的产物，写盘一次后即丢弃
//! - `PasteContext` 是贯穿各阶段的单次调用上下文

use std::time::Instant;

use bytes::Bytes;
use image::DynamicImage;

use super::OutputFormat;
use crate::settings::PasteSettings;

/// 剪贴板条目中的原始图片字节。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Bytes,
    /// 声明的 MIME 类型（用于日志与诊断）。
    pub(crate) declared_mime: String,
}

/// 解码阶段输出：内存中的位图。
pub(crate) struct DecodedImage {
    pub(crate) image: DynamicImage,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// 编码阶段输出。
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    /// 编码后的字节。
    pub bytes: Vec<u8>,
    /// 实际使用的输出格式。
    pub format: OutputFormat,
    /// 输出宽度（像素）。
    pub width: u32,
    /// 输出高度（像素）。
    pub height: u32,
    /// 源图宽度（像素）。
    pub source_width: u32,
    /// 源图高度（像素）。
    pub source_height: u32,
}

/// 转码结果：产物或用户取消。
#[derive(Debug)]
pub enum TranscodeOutcome {
    Encoded(EncodedArtifact),
    Cancelled,
}

/// 单次流水线调用的上下文。
///
/// 在各阶段之间按值传递，阶段之间不共享可变闭包状态。
#[derive(Debug, Clone)]
pub struct PasteContext {
    /// 条目在粘贴事件中的序号。
    pub item_index: usize,
    /// 流水线开始时读取的配置快照。
    pub settings: PasteSettings,
    pub(crate) started_at: Instant,
}

impl PasteContext {
    pub fn new(item_index: usize, settings: PasteSettings) -> Self {
        Self {
            item_index,
            settings,
            started_at: Instant::now(),
        }
    }
}
