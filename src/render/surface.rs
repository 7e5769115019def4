//! Drawing surface abstraction and the raster implementation

use super::transform::Affine;
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Axis-aligned region as (left, top, right, bottom)
pub type Bounds = (f32, f32, f32, f32);

/// Anti-aliased alpha coverage in a local coordinate space
///
/// Bitmap pixel `(px, py)` covers the local square starting at
/// `(origin.0 + px, origin.1 + py)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub image: GrayImage,
    pub origin: (f32, f32),
}

impl Coverage {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            image: GrayImage::new(0, 0),
            origin: (0.0, 0.0),
        }
    }

    /// Fully covered rectangle of the given local size
    #[must_use]
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_rects(&[(x, y, width, height)])
    }

    /// Union of axis-aligned rectangles given as (x, y, width, height)
    #[must_use]
    pub fn from_rects(rects: &[(f32, f32, f32, f32)]) -> Self {
        Self::from_rects_within(rects, None)
    }

    /// Like [`Coverage::from_rects`], producing pixels only inside `clip`
    #[must_use]
    pub fn from_rects_within(rects: &[(f32, f32, f32, f32)], clip: Option<Bounds>) -> Self {
        let visible: Vec<_> = rects
            .iter()
            .filter(|r| r.2 > 0.0 && r.3 > 0.0)
            .filter(|r| clip.map_or(true, |c| overlaps(c, (r.0, r.1, r.0 + r.2, r.1 + r.3))))
            .collect();
        if visible.is_empty() {
            return Self::empty();
        }
        let union = (
            visible.iter().map(|r| r.0).fold(f32::INFINITY, f32::min),
            visible.iter().map(|r| r.1).fold(f32::INFINITY, f32::min),
            visible.iter().map(|r| r.0 + r.2).fold(f32::NEG_INFINITY, f32::max),
            visible.iter().map(|r| r.1 + r.3).fold(f32::NEG_INFINITY, f32::max),
        );
        let Some((left, top, right, bottom)) = pixel_region(union, clip) else {
            return Self::empty();
        };

        let mut image = GrayImage::new((right - left) as u32, (bottom - top) as u32);
        for (px, py, pixel) in image.enumerate_pixels_mut() {
            let cell_x = left + px as f32;
            let cell_y = top + py as f32;
            let covered = visible
                .iter()
                .map(|r| span_overlap(cell_x, r.0, r.0 + r.2) * span_overlap(cell_y, r.1, r.1 + r.3))
                .fold(0.0f32, |sum, area| sum + area)
                .min(1.0);
            *pixel = Luma([(covered * 255.0).round() as u8]);
        }
        Self {
            image,
            origin: (left, top),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Copy with `margin` transparent pixels on every side
    #[must_use]
    pub fn padded(&self, margin: u32) -> Self {
        let mut image = GrayImage::new(
            self.image.width() + margin * 2,
            self.image.height() + margin * 2,
        );
        image::imageops::replace(&mut image, &self.image, i64::from(margin), i64::from(margin));
        Self {
            image,
            origin: (self.origin.0 - margin as f32, self.origin.1 - margin as f32),
        }
    }

    /// Grow the covered area by `radius` pixels
    ///
    /// Pixels at least half covered seed an exact Euclidean distance
    /// transform, so the cost is linear in the padded bitmap whatever the
    /// radius.
    #[must_use]
    pub fn dilated(&self, radius: f32) -> Self {
        if !(radius > 0.0 && radius.is_finite()) || self.is_empty() {
            return self.clone();
        }
        let source = self.padded(radius.ceil() as u32 + 1);
        let distances = squared_distances(&source.image);
        let mut image = GrayImage::new(source.image.width(), source.image.height());
        let sources = source.image.pixels().zip(&distances);
        for (pixel, (original, squared)) in image.pixels_mut().zip(sources) {
            let ring = (radius + 1.0 - squared.sqrt()).clamp(0.0, 1.0) * 255.0;
            pixel[0] = ring.round().max(f32::from(original[0])) as u8;
        }
        Self {
            image,
            origin: source.origin,
        }
    }

    /// Gaussian blur with the given sigma
    #[must_use]
    pub fn blurred(&self, sigma: f32) -> Self {
        if sigma <= 0.0 || self.is_empty() {
            return self.clone();
        }
        let source = self.padded((sigma * 3.0).ceil() as u32 + 1);
        Self {
            image: image::imageops::blur(&source.image, sigma),
            origin: source.origin,
        }
    }

    /// Pixel value or zero outside the bitmap
    fn value_at(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height())
        {
            return 0.0;
        }
        f32::from(self.image.get_pixel(x as u32, y as u32)[0])
    }

    /// Bilinear sample at a local point, 0.0-1.0
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let u = x - self.origin.0 - 0.5;
        let v = y - self.origin.1 - 0.5;
        let x0 = u.floor();
        let y0 = v.floor();
        let tx = u - x0;
        let ty = v - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.value_at(x0, y0) * (1.0 - tx) + self.value_at(x0 + 1, y0) * tx;
        let bottom = self.value_at(x0, y0 + 1) * (1.0 - tx) + self.value_at(x0 + 1, y0 + 1) * tx;
        (top * (1.0 - ty) + bottom * ty) / 255.0
    }

    /// Local-space bounding box
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        (
            self.origin.0,
            self.origin.1,
            self.origin.0 + self.image.width() as f32,
            self.origin.1 + self.image.height() as f32,
        )
    }
}

/// Whole-pixel region covering `bounds`, intersected with `clip`
fn pixel_region(bounds: Bounds, clip: Option<Bounds>) -> Option<Bounds> {
    let (mut left, mut top, mut right, mut bottom) = bounds;
    if let Some(clip) = clip {
        left = left.max(clip.0);
        top = top.max(clip.1);
        right = right.min(clip.2);
        bottom = bottom.min(clip.3);
    }
    let region = (left.floor(), top.floor(), right.ceil(), bottom.ceil());
    (region.0 < region.2 && region.1 < region.3).then_some(region)
}

fn overlaps(a: Bounds, b: Bounds) -> bool {
    a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3
}

/// Cost assigned to pixels with no seed
const UNSEEDED: f32 = 1e20;

/// Squared distance from every pixel to the nearest pixel at least half covered
fn squared_distances(image: &GrayImage) -> Vec<f32> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut grid: Vec<f32> = image
        .pixels()
        .map(|p| if p[0] >= 128 { 0.0 } else { UNSEEDED })
        .collect();

    let longest = width.max(height);
    let mut line = vec![0.0f32; longest];
    let mut envelope = LowerEnvelope::with_capacity(longest);
    for x in 0..width {
        for y in 0..height {
            line[y] = grid[y * width + x];
        }
        envelope.transform(&mut line[..height]);
        for y in 0..height {
            grid[y * width + x] = line[y];
        }
    }
    for row in grid.chunks_mut(width) {
        envelope.transform(row);
    }
    grid
}

/// Scratch space for the one-dimensional squared distance transform
///
/// Computes the lower envelope of the parabolas `(q - p)^2 + f(p)`
/// (Felzenszwalb and Huttenlocher), linear in the line length.
struct LowerEnvelope {
    vertices: Vec<usize>,
    breaks: Vec<f64>,
    output: Vec<f32>,
}

impl LowerEnvelope {
    fn with_capacity(len: usize) -> Self {
        Self {
            vertices: vec![0; len],
            breaks: vec![0.0; len + 1],
            output: vec![0.0; len],
        }
    }

    /// Replace sampled costs with their squared distance transform
    fn transform(&mut self, costs: &mut [f32]) {
        let n = costs.len();
        if n == 0 {
            return;
        }
        let parabola = |q: usize| f64::from(costs[q]) + (q * q) as f64;
        let meet = |q: usize, p: usize| (parabola(q) - parabola(p)) / (2.0 * (q as f64 - p as f64));

        let mut k = 0usize;
        self.vertices[0] = 0;
        self.breaks[0] = f64::NEG_INFINITY;
        self.breaks[1] = f64::INFINITY;
        for q in 1..n {
            let mut s = meet(q, self.vertices[k]);
            while s <= self.breaks[k] {
                k -= 1;
                s = meet(q, self.vertices[k]);
            }
            k += 1;
            self.vertices[k] = q;
            self.breaks[k] = s;
            self.breaks[k + 1] = f64::INFINITY;
        }

        k = 0;
        for q in 0..n {
            while self.breaks[k + 1] < q as f64 {
                k += 1;
            }
            let p = self.vertices[k];
            let offset = q as f64 - p as f64;
            self.output[q] = (offset * offset + f64::from(costs[p])) as f32;
        }
        costs.copy_from_slice(&self.output[..n]);
    }
}

fn span_overlap(cell: f32, start: f32, end: f32) -> f32 {
    (end.min(cell + 1.0) - start.max(cell)).clamp(0.0, 1.0)
}

/// Solid paint with a global alpha multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Rgba<u8>,
    /// 0.0-1.0, multiplied with the color's own alpha
    pub alpha: f32,
}

impl Paint {
    #[must_use]
    pub fn new(color: Rgba<u8>, alpha: f32) -> Self {
        Self {
            color,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    fn effective_alpha(&self) -> f32 {
        f32::from(self.color[3]) / 255.0 * self.alpha
    }
}

/// Target the compositor draws into
///
/// Coordinates are in surface pixels. Text arrives pre-shaped as coverage in
/// its own local space together with the local-to-surface transform.
pub trait DrawingSurface {
    /// Surface size as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Source-over an image with its top-left corner at `(x, y)`
    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64);

    /// Source-over coverage painted with `paint` through `transform`
    fn fill_text(&mut self, glyphs: &Coverage, paint: Paint, transform: &Affine);

    /// Alpha of one pixel, zero outside the surface
    fn pixel_alpha(&self, x: u32, y: u32) -> u8;

    /// Overwrite the alpha of one pixel
    fn set_pixel_alpha(&mut self, x: u32, y: u32, alpha: u8);
}

/// `DrawingSurface` backed by an in-memory RGBA buffer
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Fully transparent surface
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

impl DrawingSurface for RasterSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        let (width, height) = self.pixels.dimensions();
        for (sx, sy, source) in image.enumerate_pixels() {
            let tx = x + i64::from(sx);
            let ty = y + i64::from(sy);
            if tx < 0 || ty < 0 || tx >= i64::from(width) || ty >= i64::from(height) {
                continue;
            }
            let alpha = f32::from(source[3]) / 255.0;
            blend(
                self.pixels.get_pixel_mut(tx as u32, ty as u32),
                [source[0], source[1], source[2]],
                alpha,
            );
        }
    }

    fn fill_text(&mut self, glyphs: &Coverage, paint: Paint, transform: &Affine) {
        let paint_alpha = paint.effective_alpha();
        if glyphs.is_empty() || paint_alpha <= 0.0 {
            return;
        }
        let Some(inverse) = transform.inverse() else {
            return;
        };

        let (left, top, right, bottom) = glyphs.bounds();
        let corners = [
            transform.apply(left, top),
            transform.apply(right, top),
            transform.apply(left, bottom),
            transform.apply(right, bottom),
        ];
        let (width, height) = self.pixels.dimensions();
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_x = corners
            .iter()
            .map(|c| c.0)
            .fold(f32::NEG_INFINITY, f32::max)
            .ceil()
            .min(width as f32);
        let max_y = corners
            .iter()
            .map(|c| c.1)
            .fold(f32::NEG_INFINITY, f32::max)
            .ceil()
            .min(height as f32);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let rgb = [paint.color[0], paint.color[1], paint.color[2]];
        for py in (min_y as u32)..(max_y as u32) {
            for px in (min_x as u32)..(max_x as u32) {
                let (lx, ly) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
                let coverage = glyphs.sample(lx, ly);
                if coverage <= 0.0 {
                    continue;
                }
                blend(self.pixels.get_pixel_mut(px, py), rgb, coverage * paint_alpha);
            }
        }
    }

    fn pixel_alpha(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel_checked(x, y).map_or(0, |p| p[3])
    }

    fn set_pixel_alpha(&mut self, x: u32, y: u32, alpha: u8) {
        if let Some(pixel) = self.pixels.get_pixel_mut_checked(x, y) {
            pixel[3] = alpha;
        }
    }
}

/// Straight-alpha source-over of one color onto a pixel
fn blend(target: &mut Rgba<u8>, rgb: [u8; 3], alpha: f32) {
    let source_alpha = alpha.clamp(0.0, 1.0);
    if source_alpha <= 0.0 {
        return;
    }
    if source_alpha >= 1.0 {
        *target = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        return;
    }

    let target_alpha = f32::from(target[3]) / 255.0;
    let out_alpha = source_alpha + target_alpha * (1.0 - source_alpha);
    for channel in 0..3 {
        let source = f32::from(rgb[channel]);
        let existing = f32::from(target[channel]);
        let mixed =
            (source * source_alpha + existing * target_alpha * (1.0 - source_alpha)) / out_alpha;
        target[channel] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    target[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
