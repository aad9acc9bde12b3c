//! # 解码与转码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 位图 → 重采样 → 重新编码”集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码
//! 4. 按目标尺寸单次重采样（`fast_image_resize`，失败回退 `resize_exact`）
//! 5. JPEG：透明像素铺白底后按质量编码；WebP：无损编码，忽略质量
//!
//! 这些函数都不持有 `&self`，以便整体移入 `spawn_blocking` 执行。

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageBuffer, Rgb, RgbImage, Rgba};
use std::io::Cursor;

use super::source::{DecodedImage, EncodedArtifact, RawImageData};
use super::{
    ImageError, ImageHandler, OutputFormat, TranscodeLimits, TranscodeParams,
    compute_target_dimensions,
};

impl ImageHandler {
    /// 将原始字节解码为位图。
    pub(crate) fn decode_raw(
        raw: RawImageData,
        limits: TranscodeLimits,
    ) -> Result<DecodedImage, ImageError> {
        let format = image::guess_format(&raw.bytes).map_err(|e| {
            ImageError::Decode(format!("无法识别图片格式（声明为 {}）：{}", raw.declared_mime, e))
        })?;

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(&limits, header_width, header_height)?;
        Self::validate_decoded_memory_limits(&limits, header_width, header_height)?;

        let image = image::load_from_memory_with_format(&raw.bytes, format)
            .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidImage(format!(
                "图片尺寸无效：{}x{}",
                width, height
            )));
        }
        Self::validate_pixel_limits(&limits, width, height)?;

        log::info!(
            "✅ 图片解码成功 - 声明类型: {} 实际格式: {:?} 尺寸: {}x{}",
            raw.declared_mime,
            format,
            width,
            height
        );

        Ok(DecodedImage {
            image,
            width,
            height,
        })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    ///
    /// 用于在完整解码前做像素限制检查。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        limits: &TranscodeLimits,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > limits.max_decoded_pixels {
            return Err(ImageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, limits.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        limits: &TranscodeLimits,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > limits.max_decoded_bytes {
            return Err(ImageError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                limits.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 按生效参数缩放并重新编码。
    pub(crate) fn render_and_encode(
        decoded: DecodedImage,
        params: TranscodeParams,
        limits: TranscodeLimits,
    ) -> Result<EncodedArtifact, ImageError> {
        let DecodedImage {
            image,
            width: source_width,
            height: source_height,
        } = decoded;

        let (target_width, target_height) =
            compute_target_dimensions(source_width, source_height, params.max_dimension)?;

        let rendered = if (target_width, target_height) == (source_width, source_height) {
            image
        } else {
            log::info!(
                "🧩 缩放：{}x{} -> {}x{}（filter={:?}）",
                source_width,
                source_height,
                target_width,
                target_height,
                limits.resize_filter
            );
            Self::resample(image, target_width, target_height, limits.resize_filter)
        };

        let bytes = Self::encode(&rendered, &params)?;
        if bytes.is_empty() {
            return Err(ImageError::Encode("编码器未产生任何输出".to_string()));
        }

        let (width, height) = rendered.dimensions();
        log::info!(
            "🎨 编码完成 - 格式: {} 尺寸: {}x{} 大小: {} bytes",
            params.format.label(),
            width,
            height,
            bytes.len()
        );

        Ok(EncodedArtifact {
            bytes,
            format: params.format,
            width,
            height,
            source_width,
            source_height,
        })
    }

    fn resample(
        image: DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> DynamicImage {
        match Self::resize_with_fast_image_resize(&image, target_width, target_height, filter) {
            Ok(resized) => resized,
            Err(err) => {
                log::warn!(
                    "⚠️ fast_image_resize 缩放失败，回退 image::resize_exact：{}",
                    err
                );
                image.resize_exact(target_width, target_height, filter)
            }
        }
    }

    fn resize_with_fast_image_resize(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> Result<DynamicImage, ImageError> {
        let src = image.to_rgba8();
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.into_raw(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| ImageError::Encode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(
            Self::to_fast_filter(filter),
        ));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| ImageError::Encode(format!("fast_image_resize 执行失败：{}", e)))?;

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            target_width,
            target_height,
            dst_image.into_vec(),
        )
        .ok_or_else(|| ImageError::Encode("fast_image_resize 输出缓冲长度异常".to_string()))?;

        Ok(DynamicImage::ImageRgba8(rgba))
    }

    fn to_fast_filter(filter: image::imageops::FilterType) -> fr::FilterType {
        match filter {
            image::imageops::FilterType::Nearest => fr::FilterType::Box,
            image::imageops::FilterType::Triangle => fr::FilterType::Bilinear,
            image::imageops::FilterType::CatmullRom => fr::FilterType::CatmullRom,
            image::imageops::FilterType::Gaussian => fr::FilterType::Mitchell,
            image::imageops::FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }

    fn encode(image: &DynamicImage, params: &TranscodeParams) -> Result<Vec<u8>, ImageError> {
        let (width, height) = image.dimensions();
        let mut buffer = Vec::new();

        if !params.format.is_lossy() {
            log::debug!("{} 使用无损编码，忽略压缩质量 {}", params.format.label(), params.quality);
        }

        match params.format {
            OutputFormat::Jpeg => {
                let rgb = Self::flatten_onto_white(image);
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, params.jpeg_quality());
                encoder
                    .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;
            }
            OutputFormat::Webp => {
                let rgba = image.to_rgba8();
                WebPEncoder::new_lossless(&mut buffer)
                    .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| ImageError::Encode(format!("WebP 编码失败：{}", e)))?;
            }
        }

        Ok(buffer)
    }

    /// JPEG 不支持透明度：按 alpha 与白色背景混合。
    fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
        if !image.color().has_alpha() {
            return image.to_rgb8();
        }

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut flattened = RgbImage::new(width, height);

        for (x, y, pixel) in rgba.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as u16;
            let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
        }

        flattened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{ImageFormat, RgbaImage};

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 60, alpha]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    fn raw(bytes: Bytes) -> RawImageData {
        RawImageData {
            bytes,
            declared_mime: "image/png".to_string(),
        }
    }

    fn params(format: OutputFormat, max_dimension: u32) -> TranscodeParams {
        TranscodeParams {
            format,
            max_dimension,
            quality: 0.8,
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = ImageHandler::decode_raw(
            raw(Bytes::from_static(b"definitely not an image")),
            TranscodeLimits::default(),
        );
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn decode_enforces_pixel_limit() {
        let limits = TranscodeLimits {
            max_decoded_pixels: 100,
            ..TranscodeLimits::default()
        };
        let result = ImageHandler::decode_raw(raw(png_bytes(20, 20, 255)), limits);
        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn jpeg_output_is_resized_and_decodable() {
        let decoded = ImageHandler::decode_raw(raw(png_bytes(400, 200, 255)), TranscodeLimits::default()).unwrap();
        let artifact = ImageHandler::render_and_encode(
            decoded,
            params(OutputFormat::Jpeg, 100),
            TranscodeLimits::default(),
        )
        .unwrap();

        assert_eq!((artifact.width, artifact.height), (100, 50));
        assert_eq!((artifact.source_width, artifact.source_height), (400, 200));
        assert_eq!(image::guess_format(&artifact.bytes).unwrap(), ImageFormat::Jpeg);
        let reloaded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!(reloaded.dimensions(), (100, 50));
    }

    #[test]
    fn webp_output_keeps_size_when_resize_disabled() {
        let decoded = ImageHandler::decode_raw(raw(png_bytes(64, 48, 128)), TranscodeLimits::default()).unwrap();
        let artifact = ImageHandler::render_and_encode(
            decoded,
            params(OutputFormat::Webp, 0),
            TranscodeLimits::default(),
        )
        .unwrap();

        assert_eq!((artifact.width, artifact.height), (64, 48));
        assert_eq!(image::guess_format(&artifact.bytes).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn webp_output_ignores_quality() {
        let encode_at = |quality: f32| {
            let decoded =
                ImageHandler::decode_raw(raw(png_bytes(32, 32, 200)), TranscodeLimits::default()).unwrap();
            ImageHandler::render_and_encode(
                decoded,
                TranscodeParams {
                    quality,
                    ..params(OutputFormat::Webp, 0)
                },
                TranscodeLimits::default(),
            )
            .unwrap()
            .bytes
        };

        assert_eq!(encode_at(0.1), encode_at(1.0));
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flattened = ImageHandler::flatten_onto_white(&transparent);
        assert_eq!(flattened.get_pixel(0, 0).0, [255, 255, 255]);

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(ImageHandler::flatten_onto_white(&opaque).get_pixel(0, 0).0, [10, 20, 30]);
    }
}
