use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use textoverlay::{
    overlay::{ShadowUpdate, StrokeUpdate, StyleUpdate},
    Compositor, ExportFormat, ExportFormatHandler, ImageRecord, Position, SegmentationMask,
    TextOverlay, WatermarkConfig,
};

/// Frame sizes covering a thumbnail, a phone photo and a full HD still
const SIZES: [(u32, u32); 3] = [(320, 240), (1280, 720), (1920, 1080)];

fn base(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn styled_overlays(record: &ImageRecord, count: usize) -> Vec<TextOverlay> {
    let (width, height) = record.dimensions();
    (0..count)
        .map(|i| {
            let fraction = (i + 1) as f32 / (count + 1) as f32;
            TextOverlay::at(
                record,
                format!("Overlay {}", i),
                Position::new(width as f32 * fraction, height as f32 * fraction),
            )
            .with_style(&StyleUpdate::rotation(i as f32 * 15.0))
            .with_style(&StyleUpdate::Stroke(StrokeUpdate {
                color: Some("#000000".to_string()),
                width: Some(3.0),
            }))
            .with_style(&StyleUpdate::Shadow(ShadowUpdate {
                color: Some("rgba(0, 0, 0, 0.5)".to_string()),
                blur: Some(4.0),
                offset_x: Some(2.0),
                offset_y: Some(2.0),
            }))
            .with_z_index(i as i64)
        })
        .collect()
}

fn benchmark_composite(c: &mut Criterion) {
    let compositor = Compositor::with_block_glyphs(WatermarkConfig::default());
    let mut group = c.benchmark_group("composite");
    group.sample_size(20);

    for (width, height) in SIZES {
        let record = ImageRecord::with_dimensions("bench", width, height);
        let image = base(width, height);
        let overlays = styled_overlays(&record, 5);
        let label = format!("{}x{}", width, height);

        group.bench_with_input(BenchmarkId::new("unmasked", &label), &image, |b, image| {
            b.iter(|| compositor.composite(black_box(image), black_box(&overlays), None));
        });

        // Bottom half marked as subject
        let data = (0..height)
            .flat_map(|y| std::iter::repeat(if y < height / 2 { 0 } else { 255 }).take(width as usize))
            .collect();
        let mask = SegmentationMask::new(data, (width, height)).ok();
        group.bench_with_input(BenchmarkId::new("masked", &label), &image, |b, image| {
            b.iter(|| compositor.composite(black_box(image), black_box(&overlays), mask.as_ref()));
        });
    }
    group.finish();
}

fn benchmark_overlay_count(c: &mut Criterion) {
    let compositor = Compositor::with_block_glyphs(WatermarkConfig {
        enabled: false,
        ..WatermarkConfig::default()
    });
    let record = ImageRecord::with_dimensions("bench", 1280, 720);
    let image = base(1280, 720);
    let mut group = c.benchmark_group("overlay_count");
    group.sample_size(20);

    for count in [1usize, 10, 25] {
        let overlays = styled_overlays(&record, count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &overlays, |b, overlays| {
            b.iter(|| compositor.composite(black_box(&image), black_box(overlays), None));
        });
    }
    group.finish();
}

fn benchmark_export(c: &mut Criterion) {
    let frame = base(1280, 720);
    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    group.bench_function("png", |b| {
        b.iter(|| ExportFormatHandler::encode(black_box(&frame), ExportFormat::Png, 90));
    });
    group.bench_function("jpeg", |b| {
        b.iter(|| ExportFormatHandler::encode(black_box(&frame), ExportFormat::Jpeg, 90));
    });
    group.finish();
}

criterion_group!(benches, benchmark_composite, benchmark_overlay_count, benchmark_export);
criterion_main!(benches);
