//! 剪贴板模块
//!
//! # 设计思路
//!
//! 把一次粘贴抽象为 `PasteEvent`：有序的若干 `ClipboardItem`，
//! 每项带类型（文件 / 文本）、MIME 与原始字节。流水线只认这个模型，
//! 不关心内容来自系统剪贴板还是命令行给出的文件。
//!
//! # 实现思路
//!
//! - 系统剪贴板通过 `arboard` 读取：位图编码为 PNG 作为 `image/png` 文件条目，
//!   文本作为 `text/plain` 文本条目；看起来是 SVG 标记的文本记为 `image/svg+xml` 文件条目。
//! - 命令行文件通过 `infer` 识别文件签名，无法识别时按扩展名兜底。
//! - 监听剪贴板变化归 `listener` 子模块。

pub mod listener;

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::ImageFormat;

use crate::error::AppError;

pub const MIME_PNG: &str = "image/png";
pub const MIME_SVG: &str = "image/svg+xml";
pub const MIME_TEXT: &str = "text/plain";
const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// 剪贴板条目类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    String,
}

/// 粘贴事件中的一项。
#[derive(Debug, Clone)]
pub struct ClipboardItem {
    pub kind: ItemKind,
    pub mime: String,
    pub data: Bytes,
}

impl ClipboardItem {
    pub fn file(mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            kind: ItemKind::File,
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn string(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            kind: ItemKind::String,
            mime: MIME_TEXT.to_string(),
            data: Bytes::from(text),
        }
    }

    /// 是否为可转换的位图：文件条目、`image/*`、非 SVG。
    pub fn is_convertible_image(&self) -> bool {
        if self.kind != ItemKind::File {
            return false;
        }
        let essence = self
            .mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        essence.starts_with("image/") && !essence.starts_with("image/svg")
    }
}

/// 一次粘贴事件。
#[derive(Debug, Clone, Default)]
pub struct PasteEvent {
    pub items: Vec<ClipboardItem>,
}

impl PasteEvent {
    pub fn new(items: Vec<ClipboardItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn looks_like_svg(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.contains("<svg") && trimmed.contains("</svg>"))
        || (trimmed.starts_with("<?xml") && trimmed.contains("<svg"))
}

/// 读取系统剪贴板当前内容。
pub fn capture_system_clipboard() -> Result<PasteEvent, AppError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;

    let mut items = Vec::new();

    if let Ok(image_data) = clipboard.get_image() {
        let width = image_data.width as u32;
        let height = image_data.height as u32;
        let image = image::RgbaImage::from_raw(width, height, image_data.bytes.into_owned())
            .ok_or_else(|| AppError::Clipboard("创建图像缓冲区失败".to_string()))?;

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| AppError::Clipboard(format!("剪贴板位图编码失败: {}", e)))?;

        log::debug!("📋 剪贴板位图 {}x{}", width, height);
        items.push(ClipboardItem::file(MIME_PNG, png.into_inner()));
    }

    if let Ok(text) = clipboard.get_text() {
        if looks_like_svg(&text) {
            items.push(ClipboardItem::file(MIME_SVG, text.into_bytes()));
        } else if !text.is_empty() {
            items.push(ClipboardItem::string(text));
        }
    }

    Ok(PasteEvent::new(items))
}

/// 识别字节内容的 MIME 类型，无法识别时按扩展名兜底。
pub fn detect_mime(bytes: &[u8], path: &Path) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("svg") => MIME_SVG.to_string(),
        Some("txt") | Some("md") => MIME_TEXT.to_string(),
        _ => MIME_OCTET_STREAM.to_string(),
    }
}

/// 把本地文件包装为文件条目。
pub fn item_from_file(path: &Path) -> Result<ClipboardItem, AppError> {
    let bytes = std::fs::read(path)?;
    let mime = detect_mime(&bytes, path);
    log::debug!("📄 读取文件 {}（{}，{} bytes）", path.display(), mime, bytes.len());
    Ok(ClipboardItem::file(mime, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_raster_file_items_qualify() {
        assert!(ClipboardItem::file("image/png", Vec::new()).is_convertible_image());
        assert!(ClipboardItem::file("IMAGE/JPEG; q=1", Vec::new()).is_convertible_image());
        assert!(!ClipboardItem::file(MIME_SVG, Vec::new()).is_convertible_image());
        assert!(!ClipboardItem::file("text/html", Vec::new()).is_convertible_image());
        assert!(!ClipboardItem::string("image/png").is_convertible_image());

        let mut text_typed_as_image = ClipboardItem::string("x");
        text_typed_as_image.mime = "image/png".to_string();
        assert!(!text_typed_as_image.is_convertible_image());
    }

    #[test]
    fn detect_mime_prefers_signature() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(detect_mime(&png_magic, Path::new("wrong.svg")), "image/png");
        assert_eq!(detect_mime(b"<svg></svg>", Path::new("icon.SVG")), MIME_SVG);
        assert_eq!(detect_mime(b"hello", Path::new("blob")), MIME_OCTET_STREAM);
    }

    #[test]
    fn svg_markup_detection() {
        assert!(looks_like_svg("  <svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"));
        assert!(looks_like_svg("<?xml version=\"1.0\"?><svg>"));
        assert!(!looks_like_svg("plain text"));
    }

    #[test]
    fn item_from_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.svg");
        std::fs::write(&path, "<svg></svg>").unwrap();

        let item = item_from_file(&path).unwrap();
        assert_eq!(item.kind, ItemKind::File);
        assert_eq!(item.mime, MIME_SVG);
        assert_eq!(&item.data[..], b"<svg></svg>");
    }
}
