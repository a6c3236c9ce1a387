//! Image optimization.
//!
//! Every file under the images directory goes through a chain of
//! format-specific compressors and lands in the distribution tree. The chain
//! can sit behind an [`ImageCache`] so unchanged files are not recompressed.

use crate::build::cache::ImageCache;
use crate::build::svg::{clean_svg, SvgCleanOptions};
use crate::build::{glob_under, BuildContext, TaskError, TaskErrorKind};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed per-format compressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressorOptions {
    pub gif_interlaced: bool,
    pub jpeg_quality: u8,
    pub jpeg_progressive: bool,
    /// 0 (fastest) to 7 (smallest)
    pub png_optimization_level: u8,
    pub svg: SvgCleanOptions,
}

impl CompressorOptions {
    /// Settings used by every build.
    pub const STANDARD: CompressorOptions = CompressorOptions {
        gif_interlaced: true,
        jpeg_quality: 75,
        jpeg_progressive: true,
        png_optimization_level: 5,
        svg: SvgCleanOptions { remove_view_box: true, cleanup_ids: false },
    };

    /// Stable string identifying these settings, mixed into cache keys.
    pub fn fingerprint(&self) -> String {
        format!("{:?}", self)
    }
}

/// A format-specific compressor.
pub trait Compressor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this compressor handles files with the given lowercase extension.
    fn accepts(&self, extension: &str) -> bool;

    /// Compress one file's bytes.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError>;
}

/// GIF pass-through. Output is the input, checked to really be a GIF.
#[derive(Debug, Clone, Copy)]
pub struct GifCompressor {
    pub interlaced: bool,
}

impl Compressor for GifCompressor {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn accepts(&self, extension: &str) -> bool {
        extension == "gif"
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError> {
        if !(input.starts_with(b"GIF87a") || input.starts_with(b"GIF89a")) {
            return Err(TaskError::new(TaskErrorKind::Image, "not a GIF file"));
        }
        Ok(input.to_vec())
    }
}

/// Lossy JPEG re-encode at a fixed quality.
#[derive(Debug, Clone, Copy)]
pub struct JpegCompressor {
    pub quality: u8,
    pub progressive: bool,
}

impl Compressor for JpegCompressor {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn accepts(&self, extension: &str) -> bool {
        matches!(extension, "jpg" | "jpeg")
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError> {
        let decoded = image::load_from_memory_with_format(input, ImageFormat::Jpeg)
            .map_err(|e| TaskError::new(TaskErrorKind::Image, e.to_string()))?;
        let rgb = decoded.to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
            .map_err(|e| TaskError::new(TaskErrorKind::Image, e.to_string()))?;

        Ok(smaller(input, out))
    }
}

/// Lossless PNG recompression.
#[derive(Debug, Clone, Copy)]
pub struct PngCompressor {
    pub optimization_level: u8,
}

impl PngCompressor {
    fn compression(&self) -> CompressionType {
        match self.optimization_level {
            0 | 1 => CompressionType::Fast,
            2..=4 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Compressor for PngCompressor {
    fn name(&self) -> &'static str {
        "png"
    }

    fn accepts(&self, extension: &str) -> bool {
        extension == "png"
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError> {
        let decoded = image::load_from_memory_with_format(input, ImageFormat::Png)
            .map_err(|e| TaskError::new(TaskErrorKind::Image, e.to_string()))?;

        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, self.compression(), FilterType::Adaptive)
            .write_image(decoded.as_bytes(), decoded.width(), decoded.height(), decoded.color())
            .map_err(|e| TaskError::new(TaskErrorKind::Image, e.to_string()))?;

        Ok(smaller(input, out))
    }
}

/// Structural SVG cleanup.
#[derive(Debug, Clone, Copy)]
pub struct SvgCompressor {
    pub options: SvgCleanOptions,
}

impl Compressor for SvgCompressor {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn accepts(&self, extension: &str) -> bool {
        extension == "svg"
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError> {
        let source = std::str::from_utf8(input)
            .map_err(|e| TaskError::new(TaskErrorKind::Image, format!("SVG is not UTF-8: {}", e)))?;
        let cleaned = clean_svg(source, self.options)
            .map_err(|e| TaskError::new(TaskErrorKind::Image, e.to_string()))?;
        Ok(cleaned.into_bytes())
    }
}

fn smaller(input: &[u8], candidate: Vec<u8>) -> Vec<u8> {
    if candidate.len() < input.len() {
        candidate
    } else {
        input.to_vec()
    }
}

/// Ordered list of compressors. The first one accepting an extension wins;
/// files nobody accepts are copied as-is.
pub struct CompressorChain {
    compressors: Vec<Box<dyn Compressor>>,
    fingerprint: String,
}

impl CompressorChain {
    /// Create a chain. `fingerprint` must change whenever the output would.
    pub fn new(compressors: Vec<Box<dyn Compressor>>, fingerprint: impl Into<String>) -> Self {
        Self { compressors, fingerprint: fingerprint.into() }
    }

    /// The chain for the given options.
    pub fn from_options(options: CompressorOptions) -> Self {
        let compressors: Vec<Box<dyn Compressor>> = vec![
            Box::new(GifCompressor { interlaced: options.gif_interlaced }),
            Box::new(JpegCompressor {
                quality: options.jpeg_quality,
                progressive: options.jpeg_progressive,
            }),
            Box::new(PngCompressor { optimization_level: options.png_optimization_level }),
            Box::new(SvgCompressor { options: options.svg }),
        ];
        Self::new(compressors, options.fingerprint())
    }

    /// The chain every build uses.
    pub fn standard() -> Self {
        Self::from_options(CompressorOptions::STANDARD)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Compress bytes of a file with the given extension.
    pub fn compress(&self, extension: &str, input: &[u8]) -> Result<Vec<u8>, TaskError> {
        let extension = extension.to_ascii_lowercase();
        match self.compressors.iter().find(|c| c.accepts(&extension)) {
            Some(compressor) => {
                tracing::trace!(compressor = compressor.name(), bytes = input.len(), "compressing");
                compressor.compress(input)
            }
            None => Ok(input.to_vec()),
        }
    }
}

/// Summary of an optimizer run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Written files, sorted
    pub outputs: Vec<PathBuf>,
    /// Files served from the cache
    pub cache_hits: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Runs the compressor chain over a directory, optionally behind a cache.
pub struct ImageOptimizer {
    chain: CompressorChain,
    cache: Option<ImageCache>,
}

impl ImageOptimizer {
    pub fn new(chain: CompressorChain) -> Self {
        Self { chain, cache: None }
    }

    pub fn with_cache(mut self, cache: ImageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Standard chain, cached when the project enables it.
    pub fn from_context(ctx: &BuildContext) -> Self {
        let optimizer = Self::new(CompressorChain::standard());
        match ctx.image_cache_dir() {
            Some(dir) => optimizer.with_cache(ImageCache::new(dir)),
            None => optimizer,
        }
    }

    pub fn cache(&self) -> Option<&ImageCache> {
        self.cache.as_ref()
    }

    /// Optimize one file's bytes. Returns the output and whether it was a cache hit.
    pub fn optimize_bytes(&self, extension: &str, input: &[u8]) -> Result<(Vec<u8>, bool), TaskError> {
        let Some(cache) = &self.cache else {
            return Ok((self.chain.compress(extension, input)?, false));
        };

        let key = ImageCache::key(self.chain.fingerprint(), extension, input);
        if let Some(hit) = cache.get(&key) {
            return Ok((hit, true));
        }

        let output = self.chain.compress(extension, input)?;
        if let Err(e) = cache.put(&key, &output) {
            tracing::warn!(dir = %cache.dir().display(), error = %e, "failed to store cache entry");
        }
        Ok((output, false))
    }

    /// Optimize every file under `src_dir` into `out_dir`, keeping relative paths.
    pub fn optimize_dir(&self, src_dir: &Path, out_dir: &Path) -> Result<OptimizeReport, TaskError> {
        let files = discover_images(src_dir)?;
        let hits = AtomicUsize::new(0);

        let mut written = files
            .par_iter()
            .map(|path| -> Result<(PathBuf, u64, u64), TaskError> {
                let relative = path.strip_prefix(src_dir).unwrap_or(path);
                let target = out_dir.join(relative);
                let input = fs::read(path).map_err(|e| TaskError::io(path, e))?;
                let extension =
                    path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();

                let (output, cached) = self.optimize_bytes(&extension, &input).map_err(|e| {
                    TaskError::new(e.kind, format!("{}: {}", path.display(), e.message))
                })?;
                if cached {
                    hits.fetch_add(1, Ordering::Relaxed);
                }

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
                }
                fs::write(&target, &output).map_err(|e| TaskError::io(&target, e))?;
                Ok((target, input.len() as u64, output.len() as u64))
            })
            .collect::<Result<Vec<_>, TaskError>>()?;

        written.sort();
        let report = OptimizeReport {
            bytes_in: written.iter().map(|(_, i, _)| i).sum(),
            bytes_out: written.iter().map(|(_, _, o)| o).sum(),
            outputs: written.into_iter().map(|(p, _, _)| p).collect(),
            cache_hits: hits.into_inner(),
        };
        Ok(report)
    }
}

/// Every file with an extension under `dir`, recursively. A missing directory is empty.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, TaskError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let entries = glob::glob(&glob_under(dir, "**/*.*"))
        .map_err(|e| TaskError::new(TaskErrorKind::Config, e.to_string()))?;
    let mut files: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// Optimize the project's images into the distribution tree.
pub fn build_images(ctx: &BuildContext, optimizer: &ImageOptimizer) -> Result<OptimizeReport, TaskError> {
    let report = optimizer.optimize_dir(&ctx.images_dir(), &ctx.images_out_dir())?;
    tracing::info!(
        files = report.outputs.len(),
        cached = report.cache_hits,
        saved = report.bytes_in.saturating_sub(report.bytes_out),
        "images optimized"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Compressor for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn accepts(&self, _extension: &str) -> bool {
            true
        }

        fn compress(&self, input: &[u8]) -> Result<Vec<u8>, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.iter().rev().copied().collect())
        }
    }

    fn counting_chain() -> (CompressorChain, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = CompressorChain::new(vec![Box::new(Counting { calls: calls.clone() })], "test");
        (chain, calls)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 2 * 255) as u8, (y % 2 * 255) as u8, 0, 255])
        });
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), width, height, image::ColorType::Rgba8)
            .unwrap();
        out
    }

    #[test]
    fn test_standard_options() {
        let options = CompressorOptions::STANDARD;
        assert!(options.gif_interlaced);
        assert_eq!(options.jpeg_quality, 75);
        assert!(options.jpeg_progressive);
        assert_eq!(options.png_optimization_level, 5);
        assert!(options.svg.remove_view_box);
        assert!(!options.svg.cleanup_ids);
    }

    #[test]
    fn test_chain_passes_unknown_extensions_through() {
        let chain = CompressorChain::standard();
        assert_eq!(chain.compress("webp", b"raw bytes").unwrap(), b"raw bytes".to_vec());
    }

    #[test]
    fn test_gif_rejects_non_gif() {
        let chain = CompressorChain::standard();
        let err = chain.compress("gif", b"PNG").unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Image);
        assert_eq!(chain.compress("GIF", b"GIF89a...").unwrap(), b"GIF89a...".to_vec());
    }

    #[test]
    fn test_png_output_decodes_and_never_grows() {
        let input = png_bytes(32, 32);
        let output = CompressorChain::standard().compress("png", &input).unwrap();
        assert!(output.len() <= input.len());

        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_jpeg_round_trip_dimensions() {
        let img = image::RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 10]));
        let mut input = Vec::new();
        JpegEncoder::new_with_quality(&mut input, 100)
            .encode(img.as_raw(), 16, 8, image::ColorType::Rgb8)
            .unwrap();

        let output = CompressorChain::standard().compress("jpeg", &input).unwrap();
        assert!(output.len() <= input.len());
        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_corrupt_png_is_image_error() {
        let err = CompressorChain::standard().compress("png", b"\x89PNG garbage").unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Image);
    }

    #[test]
    fn test_cache_skips_unchanged_input() {
        let temp = TempDir::new().unwrap();
        let (chain, calls) = counting_chain();
        let optimizer = ImageOptimizer::new(chain).with_cache(ImageCache::new(temp.path()));

        let (first, hit) = optimizer.optimize_bytes("png", b"abc").unwrap();
        assert!(!hit);
        let (second, hit) = optimizer.optimize_bytes("png", b"abc").unwrap();
        assert!(hit);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        optimizer.optimize_bytes("png", b"abd").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_without_cache_always_compresses() {
        let (chain, calls) = counting_chain();
        let optimizer = ImageOptimizer::new(chain);

        optimizer.optimize_bytes("png", b"abc").unwrap();
        optimizer.optimize_bytes("png", b"abc").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_optimize_dir_mirrors_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("images");
        fs::create_dir_all(src.join("icons")).unwrap();
        fs::write(src.join("photo.bin"), b"1234").unwrap();
        fs::write(src.join("icons/a.svg"), "<svg><!-- c --><path d=\"M0 0\"/></svg>").unwrap();
        fs::write(src.join("README"), b"no extension, not an image").unwrap();

        let out = temp.path().join("dist/images");
        let report = ImageOptimizer::new(CompressorChain::standard()).optimize_dir(&src, &out).unwrap();

        assert_eq!(report.outputs, vec![out.join("icons/a.svg"), out.join("photo.bin")]);
        assert_eq!(fs::read(out.join("photo.bin")).unwrap(), b"1234");
        assert_eq!(fs::read_to_string(out.join("icons/a.svg")).unwrap(), "<svg><path d=\"M0 0\"/></svg>");
        assert!(!out.join("README").exists());
    }

    #[test]
    fn test_optimize_dir_missing_source_is_empty() {
        let temp = TempDir::new().unwrap();
        let report = ImageOptimizer::new(CompressorChain::standard())
            .optimize_dir(&temp.path().join("images"), &temp.path().join("out"))
            .unwrap();
        assert!(report.outputs.is_empty());
    }
}
