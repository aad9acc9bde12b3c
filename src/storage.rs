//! 仓库存储模块
//!
//! # 设计思路
//!
//! 转码产物一律以“仓库内相对路径”（`/` 分隔）寻址，由 `VaultFs` 提供
//! `exists / create_dir_all / write_new / read_bytes` 四个能力，流水线不关心底层介质。
//!
//! # 实现思路
//!
//! - `LocalVault` 把相对路径映射到本地目录，使用 `tokio::fs` 异步读写，
//!   写盘即流水线的一个挂起点。
//! - 路径先经 `normalize_vault_path` 规范化，`..` 无法越出仓库根目录。
//! - `write_new` 以 `create_new` 打开文件：目标已存在时返回 `false`，从不覆盖已有文件。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::image_handler::ImageError;
use crate::image_handler::naming::normalize_vault_path;

/// 仓库文件系统能力。
#[async_trait]
pub trait VaultFs: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, ImageError>;

    /// 递归创建目录；目录已存在时直接返回成功。
    async fn create_dir_all(&self, path: &str) -> Result<(), ImageError>;

    /// 仅当目标不存在时写入；目标已存在返回 `Ok(false)`，不改动原文件。
    async fn write_new(&self, path: &str, bytes: &[u8]) -> Result<bool, ImageError>;

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, ImageError>;
}

/// 本地目录仓库。
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    /// 打开仓库根目录，不存在时自动创建。
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                AppError::Storage(format!("创建仓库目录 '{}' 失败: {}", root.display(), e))
            })?;
        }
        if !root.is_dir() {
            return Err(AppError::Storage(format!(
                "仓库路径不是目录: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将仓库内路径解析为本地绝对路径。
    pub fn resolve(&self, path: &str) -> PathBuf {
        let normalized = normalize_vault_path(path);
        if normalized.is_empty() {
            return self.root.clone();
        }
        normalized
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

#[async_trait]
impl VaultFs for LocalVault {
    async fn exists(&self, path: &str) -> Result<bool, ImageError> {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .map_err(|e| ImageError::FileSystem(format!("无法检查路径 '{}'：{}", path, e)))
    }

    async fn create_dir_all(&self, path: &str) -> Result<(), ImageError> {
        let target = self.resolve(path);
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| ImageError::FileSystem(format!("创建目录 '{}' 失败：{}", path, e)))?;
        log::debug!("📁 已创建目录: {}", target.display());
        Ok(())
    }

    async fn write_new(&self, path: &str, bytes: &[u8]) -> Result<bool, ImageError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ImageError::FileSystem(format!("创建目录失败：{}", e)))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(ImageError::FileSystem(format!("创建 '{}' 失败：{}", path, e)));
            }
        };

        file.write_all(bytes)
            .await
            .map_err(|e| ImageError::FileSystem(format!("写入 '{}' 失败：{}", path, e)))?;
        file.flush()
            .await
            .map_err(|e| ImageError::FileSystem(format!("写入 '{}' 失败：{}", path, e)))?;
        Ok(true)
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, ImageError> {
        tokio::fs::read(self.resolve(path))
            .await
            .map_err(|e| ImageError::FileSystem(format!("读取 '{}' 失败：{}", path, e)))
    }
}
