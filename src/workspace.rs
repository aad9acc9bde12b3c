//! 工作区宿主模块
//!
//! # 设计思路
//!
//! 转码流水线不直接依赖任何编辑器实现，只通过两个能力与宿主交互：
//! - `EditorHost`：当前文档（目录 + 基础名）、编辑器是否聚焦、替换当前选区
//! - `Notifier`：向用户展示短暂提示
//!
//! # 实现思路
//!
//! 命令行宿主把“编辑器”落在一个 Markdown 笔记文件上：光标视为文件末尾，
//! “替换选区”即在末尾追加嵌入链接；未指定笔记或声明未聚焦时视为没有编辑器。
//! 提示信息输出到标准错误，并同步写入日志。

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::image_handler::ImageError;
use crate::image_handler::naming::normalize_vault_path;

/// 普通提示的展示时长。
pub const NOTICE_DEFAULT_DURATION: Duration = Duration::from_secs(5);
/// 包含完整路径等需要用户留意的提示的展示时长。
pub const NOTICE_LONG_DURATION: Duration = Duration::from_secs(10);

/// 当前激活的文档。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    /// 文档所在目录（仓库内相对路径，根目录为空串）。
    pub directory: String,
    /// 不含扩展名的文档名。
    pub base_name: String,
}

impl ActiveDocument {
    /// 从仓库内相对路径解析，例如 `notes/daily/2024-01-05.md`。
    pub fn from_vault_path(path: &str) -> Option<Self> {
        let normalized = normalize_vault_path(path);
        let (directory, file_name) = match normalized.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name),
            None => (String::new(), normalized.as_str()),
        };
        if file_name.is_empty() {
            return None;
        }
        let base_name = match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file_name,
        };
        Some(Self {
            directory,
            base_name: base_name.to_string(),
        })
    }
}

/// 面向用户的提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub duration: Duration,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration: NOTICE_DEFAULT_DURATION,
        }
    }

    pub fn long(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration: NOTICE_LONG_DURATION,
        }
    }
}

/// 编辑器宿主能力。
pub trait EditorHost: Send + Sync {
    /// 当前激活的文档；没有时返回 `None`。
    fn active_document(&self) -> Option<ActiveDocument>;

    /// 是否有可编辑的 Markdown 编辑器处于聚焦状态。
    fn is_editor_focused(&self) -> bool;

    /// 用文本替换当前选区（无选区时在光标处插入）。
    ///
    /// 没有聚焦编辑器时返回 `Ok(false)`，不视为错误。
    fn replace_selection(&self, text: &str) -> Result<bool, ImageError>;
}

/// 用户提示能力。
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

// ============================================================================
// 命令行宿主
// ============================================================================

/// 以笔记文件充当编辑器的宿主。
pub struct NoteWorkspace {
    vault_root: PathBuf,
    note: Option<String>,
    focused: bool,
}

impl NoteWorkspace {
    /// # 参数
    /// * `vault_root` - 仓库根目录
    /// * `note` - 当前笔记（仓库内相对路径），`None` 表示没有打开的文档
    /// * `focused` - 笔记编辑器是否聚焦
    pub fn new(vault_root: impl Into<PathBuf>, note: Option<String>, focused: bool) -> Self {
        let note = note
            .map(|n| normalize_vault_path(&n))
            .filter(|n| !n.is_empty());
        Self {
            vault_root: vault_root.into(),
            note,
            focused,
        }
    }

    fn note_path(&self) -> Option<PathBuf> {
        self.note.as_ref().map(|n| self.vault_root.join(n))
    }
}

fn ends_with_newline(path: &Path) -> bool {
    match fs::read(path) {
        Ok(content) => content.is_empty() || content.ends_with(b"\n"),
        Err(_) => true,
    }
}

impl EditorHost for NoteWorkspace {
    fn active_document(&self) -> Option<ActiveDocument> {
        self.note.as_deref().and_then(ActiveDocument::from_vault_path)
    }

    fn is_editor_focused(&self) -> bool {
        self.focused && self.note.is_some()
    }

    fn replace_selection(&self, text: &str) -> Result<bool, ImageError> {
        if !self.is_editor_focused() {
            return Ok(false);
        }
        let Some(path) = self.note_path() else {
            return Ok(false);
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ImageError::FileSystem(format!("创建笔记目录失败：{}", e)))?;
        }

        let needs_break = !ends_with_newline(&path);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ImageError::FileSystem(format!("无法打开笔记：{}", e)))?;

        let mut insertion = String::new();
        if needs_break {
            insertion.push('\n');
        }
        insertion.push_str(text);
        insertion.push('\n');

        file.write_all(insertion.as_bytes())
            .map_err(|e| ImageError::FileSystem(format!("写入笔记失败：{}", e)))?;

        log::debug!("📝 已在笔记末尾插入：{}", text);
        Ok(true)
    }
}

/// 输出到标准错误的提示器。
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        log::info!("🔔 {}（{}s）", notice.message, notice.duration.as_secs());
        eprintln!("{}", notice.message);
    }
}
