//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageHandler` 只负责流程编排，不直接依赖任何编辑器或剪贴板实现。
//! 单个条目的处理链路固定为：
//! 1. 解码（`spawn_blocking`）
//! 2. 按需询问本次参数（可选持久化）
//! 3. 缩放并重新编码（`spawn_blocking`）
//! 4. 生成路径、写盘、插入链接（见 `placement.rs`）
//!
//! ## 实现思路
//!
//! - 配置在服务层读取一次快照，放入 `PasteContext` 贯穿各阶段。
//! - 询问得到的值只覆盖本次运行；开启持久化时再写回 `SettingsStore`。
//! - 记录 `decode/override/encode/place/total` 阶段耗时，便于性能诊断。

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use super::prompt::OverridePrompt;
use super::source::{DecodedImage, EncodedArtifact, RawImageData};
use super::{ImageError, PasteContext, TranscodeLimits, TranscodeOutcome, TranscodeParams};
use crate::settings::SettingsStore;
use crate::storage::VaultFs;
use crate::workspace::{EditorHost, Notifier};

/// 图片处理器。
///
/// 持有配置存储与宿主能力，并编排各子模块实现完整流程。
pub struct ImageHandler {
    pub(super) settings: Arc<SettingsStore>,
    pub(super) limits: TranscodeLimits,
    pub(super) vault: Arc<dyn VaultFs>,
    pub(super) host: Arc<dyn EditorHost>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) prompt: Arc<dyn OverridePrompt>,
}

/// 参数解析结果：生效参数或用户取消。
enum EffectiveParams {
    Apply(TranscodeParams),
    Cancelled,
}

impl ImageHandler {
    /// 使用默认资源上限创建处理器。
    pub fn new(
        settings: Arc<SettingsStore>,
        vault: Arc<dyn VaultFs>,
        host: Arc<dyn EditorHost>,
        notifier: Arc<dyn Notifier>,
        prompt: Arc<dyn OverridePrompt>,
    ) -> Self {
        Self {
            settings,
            limits: TranscodeLimits::default(),
            vault,
            host,
            notifier,
            prompt,
        }
    }

    /// 替换资源上限，主要用于测试。
    pub fn with_limits(mut self, limits: TranscodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub(super) fn host(&self) -> &dyn EditorHost {
        self.host.as_ref()
    }

    /// 对一段原始图片字节执行解码、询问、编码。
    ///
    /// 用户在询问中取消时返回 `TranscodeOutcome::Cancelled`，不产生任何副作用。
    pub async fn transcode(
        &self,
        ctx: &PasteContext,
        bytes: Bytes,
        declared_mime: &str,
    ) -> Result<TranscodeOutcome, ImageError> {
        let raw = RawImageData {
            bytes,
            declared_mime: declared_mime.to_string(),
        };

        let decode_start = Instant::now();
        let decoded = self.decode_blocking(raw).await?;
        let decode_elapsed = decode_start.elapsed();

        let override_start = Instant::now();
        let params = match self.resolve_params(ctx).await? {
            EffectiveParams::Apply(params) => params,
            EffectiveParams::Cancelled => {
                log::info!("🚫 条目 #{} 已被用户取消", ctx.item_index);
                return Ok(TranscodeOutcome::Cancelled);
            }
        };
        let override_elapsed = override_start.elapsed();

        let encode_start = Instant::now();
        let artifact = self.encode_blocking(decoded, params).await?;
        let encode_elapsed = encode_start.elapsed();

        log::debug!(
            "⏱️ 条目 #{} 转码阶段耗时 - decode={}ms override={}ms encode={}ms",
            ctx.item_index,
            decode_elapsed.as_millis(),
            override_elapsed.as_millis(),
            encode_elapsed.as_millis()
        );

        Ok(TranscodeOutcome::Encoded(artifact))
    }

    async fn decode_blocking(&self, raw: RawImageData) -> Result<DecodedImage, ImageError> {
        let limits = self.limits;
        tokio::task::spawn_blocking(move || Self::decode_raw(raw, limits))
            .await
            .map_err(|e| ImageError::Decode(format!("解码任务异常：{}", e)))?
    }

    async fn encode_blocking(
        &self,
        decoded: DecodedImage,
        params: TranscodeParams,
    ) -> Result<EncodedArtifact, ImageError> {
        let limits = self.limits;
        tokio::task::spawn_blocking(move || Self::render_and_encode(decoded, params, limits))
            .await
            .map_err(|e| ImageError::Encode(format!("编码任务异常：{}", e)))?
    }

    /// 计算本次运行的生效参数。
    async fn resolve_params(&self, ctx: &PasteContext) -> Result<EffectiveParams, ImageError> {
        let defaults = ctx.settings.transcode_params();
        if !ctx.settings.prompt_per_paste {
            return Ok(EffectiveParams::Apply(defaults));
        }

        let choice = self.prompt.request(defaults).await?;
        if choice.cancelled {
            return Ok(EffectiveParams::Cancelled);
        }

        let chosen = choice.params();
        if ctx.settings.persist_prompted_values {
            let persisted = self.settings.update(|settings| {
                settings.output_format = chosen.format;
                settings.max_dimension = chosen.max_dimension;
                settings.compression_quality = chosen.quality;
                Ok(())
            });
            match persisted {
                Ok(_) => log::info!(
                    "💾 已保存询问结果 - 格式: {} 尺寸阈值: {} 质量: {}",
                    chosen.format.label(),
                    chosen.max_dimension,
                    chosen.quality
                ),
                Err(e) => log::warn!("⚠️ 保存询问结果失败，本次仍按所选参数转换：{}", e),
            }
        }

        Ok(EffectiveParams::Apply(chosen))
    }
}
