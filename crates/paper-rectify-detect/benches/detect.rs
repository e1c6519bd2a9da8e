use criterion::{black_box, criterion_group, criterion_main, Criterion};
use paper_rectify_core::RgbImage;
use paper_rectify_detect::{
    extract_largest_region, sample_for_detection, segment_foreground, DetectorParams,
    SheetDetector,
};

fn synthetic_frame(w: usize, h: usize) -> RgbImage {
    let mut img = RgbImage::new(w, h);
    img.fill_rect(0, 0, w, h, [70, 62, 55]);
    img.fill_rect(w / 4, h / 5, 3 * w / 4, 4 * h / 5, [238, 236, 232]);
    img
}

fn bench_detect(c: &mut Criterion) {
    let img = synthetic_frame(2048, 1536);
    let params = DetectorParams::default();

    c.bench_function("sheet_detect_2048x1536", |b| {
        let mut detector = SheetDetector::new(params.clone());
        b.iter(|| detector.detect(black_box(&img.view())))
    });

    let working = sample_for_detection(&img.view(), &params.sampler);
    let mask = segment_foreground(&working.image.view(), &params.segment).expect("mask");
    c.bench_function("flood_fill_640x480", |b| {
        b.iter(|| extract_largest_region(black_box(&mask), &params.region))
    });
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
