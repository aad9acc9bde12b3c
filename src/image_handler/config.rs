//! # 配置模块
//!
//! ## 设计思路
//!
//! 将转码链路里的“可调策略”集中到这里：
//! - `OutputFormat`：输出格式（JPEG / WebP）及其 MIME、扩展名
//! - `TranscodeParams`：单次运行的生效参数（格式 / 尺寸阈值 / 压缩质量）
//! - `TranscodeLimits`：解码前的资源上限，防止超大图片拖垮进程
//! - `compute_target_dimensions`：保持宽高比的尺寸策略（纯函数）
//!
//! ## 实现思路
//!
//! - 尺寸阈值 `<= RESIZE_DISABLED_FLOOR` 视为“不缩放”，0 自然落在其中。
//! - 只缩小不放大；长边等于阈值，短边由精确宽高比推导并截断为整数。
//! - 宽或高为 0 时返回 `InvalidImage`，避免除零得到 NaN / 无穷大。

use image::imageops::FilterType;

use super::ImageError;

/// 尺寸阈值不大于该值时不缩放。
pub const RESIZE_DISABLED_FLOOR: u32 = 49;

/// 默认压缩质量。
pub const DEFAULT_QUALITY: f32 = 0.95;

/// 输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Jpeg, OutputFormat::Webp];

    /// 从 MIME 字符串解析（大小写不敏感，忽略参数部分）。
    pub fn from_mime(mime: &str) -> Result<Self, ImageError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/webp" => Ok(Self::Webp),
            other => Err(ImageError::InvalidFormat(format!(
                "不支持的输出格式：{}（可选：image/jpeg / image/webp）",
                other
            ))),
        }
    }

    /// 宽松解析：既接受 MIME，也接受 `jpeg` / `webp` 这类简写。
    pub fn parse_loose(value: &str) -> Result<Self, ImageError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Self::from_mime(other),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// 扩展名取 MIME 的子类型部分。
    pub fn extension(self) -> &'static str {
        let mime = self.mime();
        match mime.split_once('/') {
            Some((_, subtype)) => subtype,
            None => mime,
        }
    }

    /// 面向用户的显示名。
    pub fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Webp => "WebP",
        }
    }

    /// 压缩质量是否对该格式生效。
    ///
    /// WebP 使用无损编码器，质量参数被忽略。
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// 单次流水线运行的生效参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeParams {
    pub format: OutputFormat,
    pub max_dimension: u32,
    pub quality: f32,
}

impl TranscodeParams {
    /// 将 (0,1] 的质量因子映射为 JPEG 编码器使用的 1~100。
    pub fn jpeg_quality(&self) -> u8 {
        let scaled = (self.quality * 100.0).round();
        if !scaled.is_finite() {
            return (DEFAULT_QUALITY * 100.0) as u8;
        }
        scaled.clamp(1.0, 100.0) as u8
    }
}

/// 解码阶段的资源上限与重采样策略。
#[derive(Debug, Clone, Copy)]
pub struct TranscodeLimits {
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 单次重采样使用的滤镜。
    pub resize_filter: FilterType,
}

impl Default for TranscodeLimits {
    fn default() -> Self {
        Self {
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: FilterType::Triangle,
        }
    }
}

/// 缩放阈值是否生效。
pub fn resize_enabled(max_dimension: u32) -> bool {
    max_dimension > RESIZE_DISABLED_FLOOR
}

/// 计算保持宽高比的目标尺寸。
///
/// # 示例
/// ```rust
/// use paste_image_converter::image_handler::compute_target_dimensions;
///
/// assert_eq!(compute_target_dimensions(4000, 2000, 1000)?, (1000, 500));
/// assert_eq!(compute_target_dimensions(300, 300, 0)?, (300, 300));
/// # Ok::<(), paste_image_converter::image_handler::ImageError>(())
/// ```
pub fn compute_target_dimensions(
    source_width: u32,
    source_height: u32,
    max_dimension: u32,
) -> Result<(u32, u32), ImageError> {
    if source_width == 0 || source_height == 0 {
        return Err(ImageError::InvalidImage(format!(
            "图片尺寸无效：{}x{}",
            source_width, source_height
        )));
    }

    if !resize_enabled(max_dimension) {
        return Ok((source_width, source_height));
    }

    if source_width <= max_dimension && source_height <= max_dimension {
        return Ok((source_width, source_height));
    }

    let aspect_ratio = source_width as f64 / source_height as f64;

    if source_width > source_height {
        let height = (max_dimension as f64 / aspect_ratio) as u32;
        Ok((max_dimension, height.max(1)))
    } else {
        let width = (max_dimension as f64 * aspect_ratio) as u32;
        Ok((width.max(1), max_dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_scaled_to_max_width() {
        assert_eq!(compute_target_dimensions(4000, 2000, 1000).unwrap(), (1000, 500));
    }

    #[test]
    fn portrait_is_scaled_to_max_height() {
        assert_eq!(compute_target_dimensions(1200, 2400, 600).unwrap(), (300, 600));
    }

    #[test]
    fn square_uses_height_branch() {
        assert_eq!(compute_target_dimensions(2000, 2000, 512).unwrap(), (512, 512));
    }

    #[test]
    fn zero_threshold_keeps_source() {
        assert_eq!(compute_target_dimensions(300, 300, 0).unwrap(), (300, 300));
    }

    #[test]
    fn threshold_below_floor_keeps_source() {
        assert_eq!(compute_target_dimensions(4000, 3000, 49).unwrap(), (4000, 3000));
        assert_eq!(compute_target_dimensions(4000, 3000, 50).unwrap(), (50, 37));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(compute_target_dimensions(640, 480, 1920).unwrap(), (640, 480));
        assert_eq!(compute_target_dimensions(640, 480, 640).unwrap(), (640, 480));
    }

    #[test]
    fn derived_side_is_truncated_not_rounded() {
        // 1000 / (3000/1999) = 666.33…
        assert_eq!(compute_target_dimensions(3000, 1999, 1000).unwrap(), (1000, 666));
    }

    #[test]
    fn extreme_aspect_ratio_keeps_at_least_one_pixel() {
        assert_eq!(compute_target_dimensions(100_000, 10, 100).unwrap(), (100, 1));
    }

    #[test]
    fn zero_sized_source_is_rejected() {
        assert!(matches!(
            compute_target_dimensions(100, 0, 50),
            Err(ImageError::InvalidImage(_))
        ));
        assert!(matches!(
            compute_target_dimensions(0, 100, 0),
            Err(ImageError::InvalidImage(_))
        ));
    }

    #[test]
    fn output_format_mime_and_extension() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
        assert_eq!(OutputFormat::from_mime("IMAGE/WEBP").unwrap(), OutputFormat::Webp);
        assert_eq!(OutputFormat::parse_loose("jpg").unwrap(), OutputFormat::Jpeg);
        assert!(matches!(
            OutputFormat::from_mime("image/png"),
            Err(ImageError::InvalidFormat(_))
        ));
    }

    #[test]
    fn jpeg_quality_maps_and_clamps() {
        let mut params = TranscodeParams {
            format: OutputFormat::Jpeg,
            max_dimension: 0,
            quality: 0.95,
        };
        assert_eq!(params.jpeg_quality(), 95);
        params.quality = 0.001;
        assert_eq!(params.jpeg_quality(), 1);
        params.quality = 1.0;
        assert_eq!(params.jpeg_quality(), 100);
    }
}
