//! Criterion benchmarks for Assetline critical paths
//!
//! Benchmarks the operations that run on every rebuild:
//! - Styles: CSS prefixing and minification
//! - Sprite: icon parsing and stack packing
//! - Images: compressor chain and cache key hashing

use assetline::build::images::CompressorChain;
use assetline::build::sprite::pack_stack;
use assetline::build::styles::prefix_and_minify;
use assetline::build::svg::{parse_icon, Icon};
use assetline::build::ImageCache;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Generate a stylesheet with n rules that all need prefixes
fn make_stylesheet(rules: usize) -> String {
    (0..rules)
        .map(|i| {
            format!(
                ".item-{i} {{ display: flex; user-select: none; color: #{:02x}{:02x}{:02x}; }}\n",
                i % 256,
                (i * 3) % 256,
                (i * 7) % 256
            )
        })
        .collect()
}

/// Generate an icon with n paths, each carrying presentation attributes
fn make_icon_source(paths: usize) -> String {
    let body: String = (0..paths)
        .map(|i| format!(r##"<path fill="#fff" stroke="#000" d="M{i} 0h1v1H{i}z"/>"##))
        .collect();
    format!(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">{}</svg>"#, body)
}

fn make_icons(count: usize) -> Vec<Icon> {
    let source = make_icon_source(8);
    (0..count)
        .map(|i| parse_icon(&format!("icon-{}", i), &source).unwrap())
        .collect()
}

fn make_png(size: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(size, size, |x, y| Rgb([x as u8, y as u8, (x ^ y) as u8]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

// =============================================================================
// Styles Benchmarks
// =============================================================================

fn bench_styles(c: &mut Criterion) {
    let mut group = c.benchmark_group("styles");
    let browsers = vec!["last 10 versions".to_string()];

    for rules in [10, 100, 1000].iter() {
        let css = make_stylesheet(*rules);
        group.throughput(Throughput::Bytes(css.len() as u64));
        group.bench_with_input(BenchmarkId::new("prefix_and_minify", rules), &css, |b, css| {
            b.iter(|| prefix_and_minify(black_box(css), &browsers))
        });
    }

    group.finish();
}

// =============================================================================
// Sprite Benchmarks
// =============================================================================

fn bench_sprite(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprite");

    for paths in [1, 16, 128].iter() {
        let source = make_icon_source(*paths);
        group.bench_with_input(BenchmarkId::new("parse_icon", paths), &source, |b, source| {
            b.iter(|| parse_icon("bench", black_box(source)))
        });
    }

    for count in [10, 100].iter() {
        let icons = make_icons(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("pack_stack", count), &icons, |b, icons| {
            b.iter(|| pack_stack(black_box(icons)))
        });
    }

    group.finish();
}

// =============================================================================
// Image Benchmarks
// =============================================================================

fn bench_images(c: &mut Criterion) {
    let mut group = c.benchmark_group("images");
    let chain = CompressorChain::standard();

    for size in [32, 128].iter() {
        let png = make_png(*size);
        group.throughput(Throughput::Bytes(png.len() as u64));
        group.bench_with_input(BenchmarkId::new("compress_png", size), &png, |b, png| {
            b.iter(|| chain.compress("png", black_box(png)))
        });
    }

    let png = make_png(256);
    group.bench_function("cache_key", |b| {
        b.iter(|| ImageCache::key(chain.fingerprint(), "png", black_box(&png)))
    });

    group.finish();
}

criterion_group!(benches, bench_styles, bench_sprite, bench_images);

criterion_main!(benches);
