//! # 落盘与链接插入模块
//!
//! ## 设计思路
//!
//! 编码产物只写一次：先确定一个仓库内不存在的路径，再写入字节，
//! 最后尝试在聚焦编辑器里插入 `![[文件名]]`。
//! 没有编辑器不算失败，改为给出包含完整路径的长提示。
//!
//! ## 实现思路
//!
//! - 随机后缀仍可能撞名：以 `write_new` 独占创建文件，目标已存在则在扩展名前追加 `-1`、`-2`……
//!   同一事件里并发的兄弟条目也因此不会互相覆盖。
//! - 尝试次数有上限，超过后按写盘失败处理。

use chrono::Local;

use super::naming::{SynthesizedPath, synthesize_path};
use super::source::EncodedArtifact;
use super::{ImageError, ImageHandler, ItemOutcome, PasteContext};
use crate::workspace::Notice;

/// 撞名时追加序号的最大尝试次数。
pub const MAX_COLLISION_PROBES: u32 = 1000;

/// 生成嵌入链接。
pub fn embed_link(base_name: &str) -> String {
    format!("![[{}]]", base_name)
}

impl ImageHandler {
    /// 目标目录不存在时创建。
    pub async fn ensure_directory(&self, directory: &str) -> Result<(), ImageError> {
        if directory.is_empty() {
            return Ok(());
        }
        if !self.vault.exists(directory).await? {
            self.vault.create_dir_all(directory).await?;
        }
        Ok(())
    }

    /// 写入到第一个尚不存在的路径，返回实际使用的路径。
    async fn write_to_free_path(
        &self,
        path: SynthesizedPath,
        bytes: &[u8],
    ) -> Result<SynthesizedPath, ImageError> {
        if self.vault.write_new(&path.full_path, bytes).await? {
            return Ok(path);
        }

        for counter in 1..=MAX_COLLISION_PROBES {
            let candidate = path.with_counter(counter);
            if self.vault.write_new(&candidate.full_path, bytes).await? {
                log::debug!("🔁 路径已存在，改用：{}", candidate.full_path);
                return Ok(candidate);
            }
        }

        Err(ImageError::FileSystem(format!(
            "无法为 '{}' 找到可用文件名（已尝试 {} 次）",
            path.full_path, MAX_COLLISION_PROBES
        )))
    }

    /// 写入产物并插入链接。
    pub async fn place(
        &self,
        ctx: &PasteContext,
        artifact: EncodedArtifact,
    ) -> Result<ItemOutcome, ImageError> {
        let synthesized = {
            let now = Local::now().naive_local();
            let document = self.host().active_document();
            let mut rng = rand::thread_rng();
            synthesize_path(artifact.format, &now, document.as_ref(), &ctx.settings, &mut rng)
        };

        self.ensure_directory(&synthesized.directory).await?;
        let target = self
            .write_to_free_path(synthesized, &artifact.bytes)
            .await?;
        log::info!(
            "💾 已写入 {}（{} bytes，{}x{}）",
            target.full_path,
            artifact.bytes.len(),
            artifact.width,
            artifact.height
        );

        let link = embed_link(&target.base_name);
        if self.host().replace_selection(&link)? {
            return Ok(ItemOutcome::Linked {
                path: target.full_path,
                link,
            });
        }

        log::info!("📎 没有聚焦的编辑器，未插入链接: {}", target.full_path);
        self.notifier.notify(Notice::long(format!(
            "图片已保存，但未插入链接（没有打开的编辑器）：{}",
            target.full_path
        )));
        Ok(ItemOutcome::SavedWithoutLink {
            path: target.full_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_link_wraps_base_name() {
        assert_eq!(embed_link("Note-20240105-0930-7.jpeg"), "![[Note-20240105-0930-7.jpeg]]");
    }
}
