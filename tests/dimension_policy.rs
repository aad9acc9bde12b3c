use chrono::NaiveDate;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use paste_image_converter::image_handler::{
    OutputFormat, RESIZE_DISABLED_FLOOR, compute_target_dimensions, synthesize_path,
};
use paste_image_converter::settings::PasteSettings;
use paste_image_converter::workspace::ActiveDocument;

proptest! {
    #[test]
    fn target_never_exceeds_source_or_threshold(
        width in 1u32..20_000,
        height in 1u32..20_000,
        max in 0u32..10_000,
    ) {
        let (w, h) = compute_target_dimensions(width, height, max).unwrap();

        prop_assert!(w >= 1 && h >= 1);
        prop_assert!(w <= width && h <= height);
        if max > RESIZE_DISABLED_FLOOR {
            prop_assert!(w <= max && h <= max);
        }
    }

    #[test]
    fn small_threshold_is_identity(
        width in 1u32..20_000,
        height in 1u32..20_000,
        max in 0u32..=RESIZE_DISABLED_FLOOR,
    ) {
        prop_assert_eq!(compute_target_dimensions(width, height, max).unwrap(), (width, height));
    }

    #[test]
    fn larger_side_hits_threshold_exactly(
        width in 1u32..20_000,
        height in 1u32..20_000,
        max in 50u32..5_000,
    ) {
        prop_assume!(width > max || height > max);
        let (w, h) = compute_target_dimensions(width, height, max).unwrap();
        if width > height {
            prop_assert_eq!(w, max);
        } else {
            prop_assert_eq!(h, max);
        }
    }

    #[test]
    fn derived_side_keeps_aspect_ratio_within_one_pixel(
        width in 1u32..20_000,
        height in 1u32..20_000,
        max in 50u32..5_000,
    ) {
        prop_assume!(width > max || height > max);
        let (w, h) = compute_target_dimensions(width, height, max).unwrap();

        // 派生边截断取整（至少 1 像素），与精确比例最多差 1 像素。
        let ratio = width as f64 / height as f64;
        if width > height {
            let exact = w as f64 / ratio;
            prop_assert!((h as f64 - exact).abs() < 1.0, "h={} exact={}", h, exact);
        } else {
            let exact = h as f64 * ratio;
            prop_assert!((w as f64 - exact).abs() < 1.0, "w={} exact={}", w, exact);
        }
    }

    #[test]
    fn base_name_never_contains_separator(
        prefix in "[a-z/\\\\]{0,12}",
        doc_name in "[A-Za-z0-9 /:#]{0,16}",
        directory in "[a-z/]{0,12}",
        seed in any::<u64>(),
        webp in any::<bool>(),
    ) {
        let settings = PasteSettings {
            filename_prefix: prefix,
            ..PasteSettings::default()
        };
        let document = ActiveDocument { directory, base_name: doc_name };
        let now = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let format = if webp { OutputFormat::Webp } else { OutputFormat::Jpeg };
        let mut rng = StdRng::seed_from_u64(seed);

        let path = synthesize_path(format, &now, Some(&document), &settings, &mut rng);

        prop_assert!(!path.base_name.contains('/'));
        prop_assert!(!path.base_name.contains('\\'));
        prop_assert!(path.base_name.ends_with(format.extension()));
        prop_assert!(path.base_name.contains("-20240105-0930-"));
        prop_assert!(path.full_path.ends_with(&path.base_name));
        prop_assert!(!path.full_path.starts_with('/'));
    }
}

#[test]
fn zero_sized_source_is_rejected() {
    assert!(compute_target_dimensions(0, 10, 100).is_err());
    assert!(compute_target_dimensions(10, 0, 0).is_err());
}
