//! Integration test: run synthetic images through the full pipeline and export to SVG.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use huetrace_export::{SvgMetadata, to_svg};
use huetrace_pipeline::{Color, PipelineConfig};

fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

/// `(d, fill)` for every `<path>` element in document order.
fn paths(svg: &str) -> Vec<(String, String)> {
    fn attr(tag: &str, name: &str) -> Option<String> {
        let needle = format!(" {name}=\"");
        let start = tag.find(&needle)? + needle.len();
        let end = tag[start..].find('"')?;
        Some(tag[start..start + end].to_owned())
    }

    svg.match_indices("<path")
        .map(|(i, _)| {
            let end = svg[i..].find('>').unwrap();
            let tag = &svg[i..i + end];
            (attr(tag, "d").unwrap(), attr(tag, "fill").unwrap())
        })
        .collect()
}

fn vertex_count(d: &str) -> usize {
    d.split_whitespace()
        .filter(|cmd| cmd.starts_with('M') || cmd.starts_with('L'))
        .count()
}

#[test]
fn red_blue_halves_export_two_filled_paths() {
    let img = image::RgbaImage::from_fn(100, 100, |x, _y| {
        if x < 50 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        }
    });
    let config = PipelineConfig {
        colors: 2,
        ..PipelineConfig::default()
    };
    let result = huetrace_pipeline::process(&encode_png(&img), &config)
        .expect("pipeline should succeed");

    let svg = to_svg(&result.regions, result.dimensions, &SvgMetadata::default());
    eprintln!("{svg}");

    assert!(svg.contains(r#"width="100""#));
    assert!(svg.contains(r#"height="100""#));
    assert!(svg.contains(r#"viewBox="0 0 100 100""#));

    let paths = paths(&svg);
    assert_eq!(paths.len(), 2);

    let mut fills: Vec<&str> = paths.iter().map(|(_, fill)| fill.as_str()).collect();
    fills.sort_unstable();
    assert_eq!(fills, ["#0000ff", "#ff0000"]);

    for (d, _) in &paths {
        assert!(d.starts_with('M'));
        assert!(d.to_ascii_lowercase().ends_with('z'));
        assert!(vertex_count(d) >= 3);
    }
}

#[test]
fn fully_transparent_image_exports_background_fill_only() {
    let img = image::RgbaImage::from_fn(40, 30, |_, _| image::Rgba([0, 0, 0, 0]));
    let config = PipelineConfig {
        colors: 2,
        background: Color::new(0, 255, 0),
        ..PipelineConfig::default()
    };
    let result = huetrace_pipeline::process(&encode_png(&img), &config).unwrap();
    let svg = to_svg(&result.regions, result.dimensions, &SvgMetadata::default());

    let paths = paths(&svg);
    assert!(!paths.is_empty());
    assert!(paths.iter().all(|(_, fill)| fill == "#00ff00"));
    assert!(svg.contains(r#"viewBox="0 0 40 30""#));
}

#[test]
fn metadata_carries_config_json() {
    let img = image::RgbaImage::from_fn(16, 16, |x, _| {
        if x < 8 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    });
    let config = PipelineConfig {
        colors: 2,
        area_threshold: 4,
        ..PipelineConfig::default()
    };
    let result = huetrace_pipeline::process(&encode_png(&img), &config).unwrap();
    let svg = to_svg(
        &result.regions,
        result.dimensions,
        &SvgMetadata {
            title: Some("split"),
            description: None,
            config_json: Some(r#"{"colors":2}"#),
        },
    );

    assert!(svg.contains("<title>split</title>"));
    assert!(svg.contains("<metadata>"));
    assert_eq!(paths(&svg).len(), 2);
}
