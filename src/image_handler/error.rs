//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载粘贴转码链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 所有错误都只作用于当前剪贴板条目：同一次粘贴中的其他条目继续处理。
//! “没有聚焦的编辑器”不是错误，由 `ItemOutcome::SavedWithoutLink` 表达。

/// 图片转码统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`，在报告中以 `code/stage/message` 形式输出。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("无效图片：{0}")]
    InvalidImage(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("参数询问失败：{0}")]
    OverrideFailure(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

impl ImageError {
    /// 稳定错误码，供 `--json` 报告与日志检索使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_DECODE",
            Self::InvalidImage(_) => "E_INVALID_IMAGE",
            Self::Encode(_) => "E_ENCODE",
            Self::OverrideFailure(_) => "E_OVERRIDE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
        }
    }

    /// 出错所在的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Decode(_) | Self::InvalidImage(_) | Self::ResourceLimit(_) => "decode",
            Self::OverrideFailure(_) => "override",
            Self::Encode(_) | Self::InvalidFormat(_) => "encode",
            Self::FileSystem(_) => "place",
        }
    }
}
