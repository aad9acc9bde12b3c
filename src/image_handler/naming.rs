//! # 文件名生成模块
//!
//! ## 设计思路
//!
//! 由“格式 + 当前时间 + 当前文档 + 前缀/目录设置”生成仓库内的相对路径与基础文件名：
//!
//! ```text
//! {目录}/{前缀}{文档名或 Image}-{YYYYMMDD-HHMM}-{0..1000 随机数}.{扩展名}
//! ```
//!
//! 目录优先级：设置中的输出目录 → 当前文档所在目录 → 仓库根目录。
//!
//! ## 实现思路
//!
//! - 时间精确到分钟，随机数只是“尽力而为”的区分手段；真正写盘前由
//!   `placement` 再做一次存在性检查，命中时追加 `-1`、`-2` 后缀。
//! - 前缀里的目录部分并入目录，基础文件名永远不含路径分隔符。
//! - 文档名中会破坏嵌入链接语法的字符统一替换为 `-`。

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use super::OutputFormat;
use crate::settings::PasteSettings;
use crate::workspace::ActiveDocument;

/// 没有当前文档时使用的文档名。
pub const DEFAULT_DOCUMENT_NAME: &str = "Image";

/// 随机后缀的上界（不含）。
pub const RANDOM_SUFFIX_BOUND: u32 = 1000;

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|#^\[\]\x00-\x1f]"#).expect("static regex"));

/// 生成结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedPath {
    /// 仓库内完整相对路径。
    pub full_path: String,
    /// 所在目录（可能为空，表示仓库根目录）。
    pub directory: String,
    /// 基础文件名（不含目录）。
    pub base_name: String,
}

impl SynthesizedPath {
    pub(crate) fn from_parts(directory: String, base_name: String) -> Self {
        let full_path = join_vault_path(&directory, &base_name);
        Self {
            full_path,
            directory,
            base_name,
        }
    }

    /// 在扩展名前追加序号，用于避让已存在的文件。
    pub(crate) fn with_counter(&self, counter: u32) -> Self {
        let base_name = match self.base_name.rsplit_once('.') {
            Some((stem, ext)) => format!("{}-{}.{}", stem, counter, ext),
            None => format!("{}-{}", self.base_name, counter),
        };
        Self::from_parts(self.directory.clone(), base_name)
    }
}

/// 规范化仓库内路径：统一分隔符、去掉空段与 `.`，`..` 回退上一级但不越过根目录。
pub fn normalize_vault_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment.trim() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// 拼接仓库内目录与文件名。
pub fn join_vault_path(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", directory, name)
    }
}

/// 时间戳：精确到分钟。
pub fn format_timestamp(now: &NaiveDateTime) -> String {
    now.format("%Y%m%d-%H%M").to_string()
}

fn sanitize_component(name: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(name, "-");
    cleaned.into_owned()
}

/// 生成目标路径。
///
/// # 示例
/// ```rust
/// use chrono::NaiveDate;
/// use rand::SeedableRng;
/// use paste_image_converter::image_handler::{synthesize_path, OutputFormat};
/// use paste_image_converter::settings::PasteSettings;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(14, 7, 59).unwrap();
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let path = synthesize_path(OutputFormat::Jpeg, &now, None, &PasteSettings::default(), &mut rng);
/// assert!(path.base_name.starts_with("Image-20240309-1407-"));
/// assert!(path.base_name.ends_with(".jpeg"));
/// ```
pub fn synthesize_path<R: Rng>(
    format: OutputFormat,
    now: &NaiveDateTime,
    active_document: Option<&ActiveDocument>,
    settings: &PasteSettings,
    rng: &mut R,
) -> SynthesizedPath {
    let configured = normalize_vault_path(&settings.output_directory);
    let base_directory = if !configured.is_empty() {
        configured
    } else {
        active_document
            .map(|doc| normalize_vault_path(&doc.directory))
            .unwrap_or_default()
    };

    let (prefix_directory, prefix_name) = match settings.filename_prefix.rsplit_once(['/', '\\']) {
        Some((dir, name)) => (normalize_vault_path(dir), name),
        None => (String::new(), settings.filename_prefix.as_str()),
    };

    let directory = normalize_vault_path(&join_vault_path(&base_directory, &prefix_directory));

    let document_name = active_document
        .map(|doc| sanitize_component(doc.base_name.trim()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string());

    let random = rng.gen_range(0..RANDOM_SUFFIX_BOUND);

    let base_name = format!(
        "{}{}-{}-{}.{}",
        sanitize_component(prefix_name),
        document_name,
        format_timestamp(now),
        random,
        format.extension()
    );

    SynthesizedPath::from_parts(directory, base_name)
}
