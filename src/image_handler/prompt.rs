//! # 参数询问模块
//!
//! ## 设计思路
//!
//! 开启“每次询问”后，流水线在解码完成后挂起，向用户请求本次使用的
//! 输出格式、尺寸阈值与压缩质量。询问是一次阻塞式的请求-响应：
//! 每个条目恰好得到一个 `UserOverrideChoice`，没有超时。
//!
//! ## 实现思路
//!
//! - `OverridePrompt` 是宿主提供的异步能力；失败统一映射为 `OverrideFailure`。
//! - 对话框里的输入都是文本，`OverrideForm::parse` 负责把文本校验为类型化结果。
//! - 命令行宿主提供 `StdinPrompt`，非交互环境使用 `DisabledPrompt`。

use std::io::{BufRead, Write};

use async_trait::async_trait;

use super::{ImageError, OutputFormat, TranscodeParams};
use crate::settings::{parse_max_dimension, parse_quality};

/// 用户在询问中给出的结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserOverrideChoice {
    pub format: OutputFormat,
    pub max_dimension: u32,
    pub compression_quality: f32,
    pub cancelled: bool,
}

impl UserOverrideChoice {
    /// 直接确认默认值。
    pub fn accept(defaults: TranscodeParams) -> Self {
        Self {
            format: defaults.format,
            max_dimension: defaults.max_dimension,
            compression_quality: defaults.quality,
            cancelled: false,
        }
    }

    /// 取消本次转换。
    pub fn cancel(defaults: TranscodeParams) -> Self {
        Self {
            cancelled: true,
            ..Self::accept(defaults)
        }
    }

    pub fn params(&self) -> TranscodeParams {
        TranscodeParams {
            format: self.format,
            max_dimension: self.max_dimension,
            quality: self.compression_quality,
        }
    }
}

/// 对话框中的文本字段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideForm {
    pub format: String,
    pub max_dimension: String,
    pub compression: String,
}

impl OverrideForm {
    /// 以当前默认值预填表单。
    pub fn prefilled(defaults: &TranscodeParams) -> Self {
        Self {
            format: defaults.format.mime().to_string(),
            max_dimension: defaults.max_dimension.to_string(),
            compression: defaults.quality.to_string(),
        }
    }

    /// 把文本字段校验为确认结果。
    pub fn parse(&self) -> Result<UserOverrideChoice, ImageError> {
        let format = OutputFormat::parse_loose(&self.format)
            .map_err(|e| ImageError::OverrideFailure(e.to_string()))?;

        let max_dimension = parse_max_dimension(&serde_json::Value::String(self.max_dimension.clone()))
            .ok_or_else(|| {
                ImageError::OverrideFailure(format!("尺寸阈值必须是非负整数：{}", self.max_dimension))
            })?;

        let compression_quality = parse_quality(&serde_json::Value::String(self.compression.clone()))
            .ok_or_else(|| {
                ImageError::OverrideFailure(format!("压缩质量必须在 (0,1] 之间：{}", self.compression))
            })?;

        Ok(UserOverrideChoice {
            format,
            max_dimension,
            compression_quality,
            cancelled: false,
        })
    }
}

/// 参数询问能力。
#[async_trait]
pub trait OverridePrompt: Send + Sync {
    /// 展示默认值并等待用户确认或取消。
    async fn request(&self, defaults: TranscodeParams) -> Result<UserOverrideChoice, ImageError>;
}

/// 无法交互时使用：任何询问都直接失败。
pub struct DisabledPrompt;

#[async_trait]
impl OverridePrompt for DisabledPrompt {
    async fn request(&self, _defaults: TranscodeParams) -> Result<UserOverrideChoice, ImageError> {
        Err(ImageError::OverrideFailure(
            "当前环境无法弹出询问（使用 --interactive 启用终端询问）".to_string(),
        ))
    }
}

/// 终端询问：逐项读取标准输入，直接回车保留默认值，输入 `c` 取消。
pub struct StdinPrompt;

const CANCEL_WORDS: [&str; 3] = ["c", "cancel", "q"];

fn ask_field(
    input: &mut impl BufRead,
    output: &mut impl Write,
    label: &str,
    current: &str,
) -> std::io::Result<Option<String>> {
    write!(output, "{} [{}]: ", label, current)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let answer = line.trim();
    if CANCEL_WORDS.contains(&answer.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    if answer.is_empty() {
        Ok(Some(current.to_string()))
    } else {
        Ok(Some(answer.to_string()))
    }
}

/// 在给定的输入输出上执行一次问答；返回 `None` 表示取消。
pub fn run_form_dialog(
    input: &mut impl BufRead,
    output: &mut impl Write,
    defaults: &TranscodeParams,
) -> std::io::Result<Option<OverrideForm>> {
    let form = OverrideForm::prefilled(defaults);
    writeln!(output, "转换参数（回车保留默认值，输入 c 取消）")?;

    let Some(max_dimension) = ask_field(input, output, "超过此尺寸时缩放", &form.max_dimension)? else {
        return Ok(None);
    };
    let choices = OutputFormat::ALL
        .iter()
        .map(|format| format.mime())
        .collect::<Vec<_>>()
        .join(" | ");
    let Some(format) = ask_field(input, output, &format!("输出格式 ({})", choices), &form.format)? else {
        return Ok(None);
    };
    let Some(compression) = ask_field(input, output, "压缩质量（仅 JPEG）", &form.compression)? else {
        return Ok(None);
    };

    Ok(Some(OverrideForm {
        format,
        max_dimension,
        compression,
    }))
}

#[async_trait]
impl OverridePrompt for StdinPrompt {
    async fn request(&self, defaults: TranscodeParams) -> Result<UserOverrideChoice, ImageError> {
        let answered = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stderr();
            run_form_dialog(&mut input, &mut output, &defaults)
        })
        .await
        .map_err(|e| ImageError::OverrideFailure(format!("询问任务异常：{}", e)))?
        .map_err(|e| ImageError::OverrideFailure(format!("读取终端输入失败：{}", e)))?;

        match answered {
            Some(form) => form.parse(),
            None => Ok(UserOverrideChoice::cancel(defaults)),
        }
    }
}
