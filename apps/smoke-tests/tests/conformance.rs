use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use printfit_core::{analyze, analyze_with_telemetry, v1, DpiLevel, Orientation};
use printfit_image::{probe_path, ImageSize};
use printfit_telemetry::FileSink;

fn write_sample(path: &Path, width: u32, height: u32, format: ImageFormat) -> Result<()> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([10, 10, 10])
        }
    });
    DynamicImage::ImageRgb8(img).save_with_format(path, format)?;
    Ok(())
}

fn analyze_file(path: &Path) -> Result<v1::AnalyzeResponse> {
    let ImageSize { width, height } = probe_path(path)?;
    let analysis = analyze(i64::from(width), i64::from(height))?;
    Ok(v1::AnalyzeResponse::from(&analysis))
}

#[test]
fn probed_files_match_direct_dimension_analysis() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cases = [
        ("five_by_four.png", 3000, 2400, ImageFormat::Png),
        ("portrait.jpg", 2400, 3000, ImageFormat::Jpeg),
        ("square.png", 800, 800, ImageFormat::Png),
    ];
    for (name, width, height, format) in cases {
        let path = dir.path().join(name);
        write_sample(&path, width, height, format)?;
        let from_file = analyze_file(&path)?;
        let direct = v1::analyze_v1(&v1::AnalyzeRequest {
            width: i64::from(width),
            height: i64::from(height),
        })?;
        assert_eq!(serde_json::to_value(&from_file)?, serde_json::to_value(&direct)?);
    }
    Ok(())
}

#[test]
fn five_by_four_photo_recommends_matching_sizes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("photo.png");
    write_sample(&path, 3000, 2400, ImageFormat::Png)?;

    let response = analyze_file(&path)?;
    assert_eq!(response.orientation, Orientation::Landscape);
    assert_eq!(response.aspect_ratio, 1.25);
    let dpis: Vec<u32> = response.tiers.iter().map(|tier| tier.dpi).collect();
    assert_eq!(dpis, vec![300, 150, 100]);
    assert_eq!(response.tiers[1].sizes, vec!["20×16", "14×11", "10×8"]);
    assert_eq!(response.tiers[1].max_width_in, 20.0);
    assert_eq!(response.tiers[1].max_height_in, 16.0);
    Ok(())
}

#[test]
fn telemetry_file_records_each_analysis() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("telemetry.jsonl");
    let sink = FileSink::new(log.clone());

    let analysis = analyze_with_telemetry(800, 800, Some(&sink))?;
    assert_eq!(analysis.recommendation.labels(DpiLevel::Dpi100), vec!["8×8"]);
    assert!(analyze_with_telemetry(-1, 800, Some(&sink)).is_err());

    let events: Vec<serde_json::Value> = std::fs::read_to_string(&log)?
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["eventType"].as_str()).collect();
    assert_eq!(kinds, vec!["AnalyzeStart", "AnalyzeSuccess", "AnalyzeStart", "AnalyzeError"]);
    Ok(())
}
