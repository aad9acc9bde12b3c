//! # 服务层（粘贴拦截）
//!
//! ## 设计思路
//!
//! `PasteService` 是命令行宿主与流水线之间的唯一入口：
//! 一次粘贴事件进来，决定是否接管默认粘贴，再为每个合格条目跑一条独立流水线。
//!
//! ## 实现思路
//!
//! - 开启“仅在编辑器内转换”且没有聚焦编辑器时，不接管、不运行任何流水线。
//! - 合格条目：`File` 类型、`image/*`、非 SVG；其余条目留给默认粘贴处理。
//! - 所有条目在同一任务上用 `join_all` 并发轮询，条目之间无顺序与原子性保证。
//! - 单个条目失败只影响自身：记录日志、弹出提示、写入 `ItemReport`。

use futures::future::join_all;
use serde::Serialize;

use super::{ImageError, ImageHandler, PasteContext, TranscodeOutcome};
use crate::clipboard::{ClipboardItem, PasteEvent};
use crate::error::AppError;
use crate::workspace::Notice;

/// 序列化给调用方的错误视图。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemErrorView {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<&ImageError> for ItemErrorView {
    fn from(error: &ImageError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// 单个条目的最终结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// 已写盘并在编辑器中插入链接。
    Linked { path: String, link: String },
    /// 已写盘，但没有可插入链接的编辑器。
    SavedWithoutLink { path: String },
    /// 用户在询问中取消。
    Cancelled,
    Failed(ItemErrorView),
}

impl ItemOutcome {
    /// 写入仓库的路径（如有）。
    pub fn written_path(&self) -> Option<&str> {
        match self {
            Self::Linked { path, .. } | Self::SavedWithoutLink { path } => Some(path),
            Self::Cancelled | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    /// 条目在粘贴事件中的序号。
    pub index: usize,
    pub mime: String,
    pub outcome: ItemOutcome,
    pub elapsed_ms: u64,
}

/// 一次粘贴事件的处理报告。
#[derive(Debug, Clone, Serialize)]
pub struct PasteReport {
    /// 是否接管了默认粘贴。
    pub suppressed: bool,
    pub items: Vec<ItemReport>,
}

impl PasteReport {
    fn passthrough() -> Self {
        Self {
            suppressed: false,
            items: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Failed(_)))
            .count()
    }
}

/// 粘贴拦截服务。
pub struct PasteService {
    handler: ImageHandler,
}

impl PasteService {
    pub fn new(handler: ImageHandler) -> Self {
        Self { handler }
    }

    /// 处理一次粘贴事件。
    ///
    /// 只有读取配置失败会返回错误；条目级失败都记录在报告里。
    pub async fn handle_paste(&self, event: &PasteEvent) -> Result<PasteReport, AppError> {
        let settings = self.handler.settings().snapshot()?;

        if settings.restrict_to_editor_context && !self.handler.host().is_editor_focused() {
            log::debug!("⏭️ 未聚焦编辑器，交由默认粘贴处理");
            return Ok(PasteReport::passthrough());
        }

        let qualifying: Vec<(usize, &ClipboardItem)> = event
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_convertible_image())
            .collect();

        if qualifying.is_empty() {
            log::debug!("⏭️ 粘贴内容中没有可转换的图片（共 {} 项）", event.items.len());
            return Ok(PasteReport::passthrough());
        }

        log::info!(
            "📋 接管粘贴：{} 张图片（共 {} 项）",
            qualifying.len(),
            event.items.len()
        );

        let runs = qualifying.into_iter().map(|(index, item)| {
            let ctx = PasteContext::new(index, settings.clone());
            self.process_item(ctx, item)
        });
        let items = join_all(runs).await;

        Ok(PasteReport {
            suppressed: true,
            items,
        })
    }

    /// 对单个条目执行完整流水线。
    async fn process_item(&self, ctx: PasteContext, item: &ClipboardItem) -> ItemReport {
        let outcome = match self.run_pipeline(&ctx, item).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!(
                    "❌ 条目 #{} 处理失败 [{}:{}]：{}",
                    ctx.item_index,
                    error.stage(),
                    error.code(),
                    error
                );
                self.handler
                    .notifier
                    .notify(Notice::new(format!("图片转换失败：{}", error)));
                ItemOutcome::Failed(ItemErrorView::from(&error))
            }
        };

        let elapsed = ctx.started_at.elapsed();
        log::info!(
            "✅ 条目 #{} 处理结束 - total={}ms",
            ctx.item_index,
            elapsed.as_millis()
        );

        ItemReport {
            index: ctx.item_index,
            mime: item.mime.clone(),
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    async fn run_pipeline(
        &self,
        ctx: &PasteContext,
        item: &ClipboardItem,
    ) -> Result<ItemOutcome, ImageError> {
        let artifact = match self
            .handler
            .transcode(ctx, item.data.clone(), &item.mime)
            .await?
        {
            TranscodeOutcome::Encoded(artifact) => artifact,
            TranscodeOutcome::Cancelled => return Ok(ItemOutcome::Cancelled),
        };

        self.handler.place(ctx, artifact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let linked = ItemOutcome::Linked {
            path: "a/b.jpeg".to_string(),
            link: "![[b.jpeg]]".to_string(),
        };
        let value = serde_json::to_value(&linked).unwrap();
        assert_eq!(value["status"], "linked");
        assert_eq!(value["path"], "a/b.jpeg");

        let failed = ItemOutcome::Failed(ItemErrorView::from(&ImageError::Decode("bad".into())));
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["code"], "E_DECODE");
        assert_eq!(value["stage"], "decode");
    }

    #[test]
    fn written_path_only_for_saved_outcomes() {
        assert_eq!(
            ItemOutcome::SavedWithoutLink {
                path: "x.webp".to_string()
            }
            .written_path(),
            Some("x.webp")
        );
        assert_eq!(ItemOutcome::Cancelled.written_path(), None);
    }
}
