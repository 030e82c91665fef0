//! Frame rendering: renderer contract and a raster PNG implementation.
//!
//! A frame is built with a fixed sequence of calls: [`Renderer::set_view`],
//! [`Renderer::clear`], any number of draw calls, then [`Renderer::save`].
//! The raster renderer keeps a colour layer (heatmaps) and a line overlay
//! (interface contour, domain box); the overlay is always composited on top,
//! so the order of draw calls does not matter.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{FieldId, QuadGrid};

const BACKGROUND: [u8; 3] = [255, 255, 255];
const LINE: [u8; 3] = [0, 0, 0];

/// Camera placement and image size.
///
/// The window is centred at `origin + size * (0.5 + tx, 0.5 + ty)` and spans
/// `size / zoom` horizontally; the vertical span follows the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewParams {
    /// Horizontal offset of the window centre, in domain lengths
    pub tx: f64,
    /// Vertical offset of the window centre, in domain lengths
    pub ty: f64,
    /// Magnification (1 = whole domain width)
    pub zoom: f64,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            zoom: 1.0,
            width: 800,
            height: 800,
        }
    }
}

/// Colour mapping of a scalar heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapOptions {
    /// Reconstruct linearly inside cells instead of painting flat squares.
    pub linear: bool,
    /// Colour range is `mean +- spread * stddev`; zero or negative uses min/max.
    pub spread: f64,
}

/// Rendering failures. The driver treats all of them as non-fatal.
#[derive(Debug, Error)]
pub enum RenderError {
    /// File creation or write failure.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoder failure.
    #[error("PNG encoding error: {0}")]
    Encoding(#[from] png::EncodingError),

    /// A draw call named a field that is not registered on the grid.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Drawing primitives used by the frame snapshot event.
pub trait Renderer {
    /// Set camera and image size for the next frame.
    fn set_view(&mut self, view: ViewParams);

    /// Reset the image to the background.
    fn clear(&mut self);

    /// Draw the 0.5 contour of a volume-fraction field.
    fn draw_interface(&mut self, grid: &QuadGrid, field: &str) -> Result<(), RenderError>;

    /// Paint a colour map of a scalar field.
    fn draw_scalar_heatmap(
        &mut self,
        grid: &QuadGrid,
        field: &str,
        options: HeatmapOptions,
    ) -> Result<(), RenderError>;

    /// Outline the domain.
    fn draw_box(&mut self, grid: &QuadGrid);

    /// Write the current image to `path`.
    fn save(&mut self, path: &Path) -> Result<(), RenderError>;
}

/// Software rasteriser writing 8-bit RGB PNG files.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    view: ViewParams,
    colors: Vec<[u8; 3]>,
    overlay: Vec<bool>,
}

impl RasterRenderer {
    /// Create a renderer with the given initial view.
    pub fn new(view: ViewParams) -> Self {
        let mut renderer = Self {
            view,
            colors: Vec::new(),
            overlay: Vec::new(),
        };
        renderer.clear();
        renderer
    }

    /// Current view.
    pub fn view(&self) -> ViewParams {
        self.view
    }

    /// Composited RGB bytes, row-major from the top-left pixel.
    pub fn rgb_bytes(&self) -> Vec<u8> {
        self.colors
            .iter()
            .zip(&self.overlay)
            .flat_map(|(&c, &line)| if line { LINE } else { c })
            .collect()
    }

    fn pixel_count(&self) -> usize {
        self.view.width as usize * self.view.height as usize
    }

    /// World coordinates of the centre of pixel `(px, py)`; row 0 is the top.
    fn pixel_to_world(&self, grid: &QuadGrid, px: u32, py: u32) -> [f64; 2] {
        let size = grid.size();
        let origin = grid.origin();
        let cx = origin[0] + size * (0.5 + self.view.tx);
        let cy = origin[1] + size * (0.5 + self.view.ty);
        let half_w = 0.5 * size / self.view.zoom;
        let half_h = half_w * self.view.height as f64 / self.view.width as f64;
        [
            cx - half_w + (px as f64 + 0.5) / self.view.width as f64 * 2.0 * half_w,
            cy + half_h - (py as f64 + 0.5) / self.view.height as f64 * 2.0 * half_h,
        ]
    }

    fn pixel_size(&self, grid: &QuadGrid) -> f64 {
        grid.size() / self.view.zoom / self.view.width as f64
    }

    fn field(grid: &QuadGrid, name: &str) -> Result<FieldId, RenderError> {
        grid.field_id(name)
            .ok_or_else(|| RenderError::UnknownField(name.to_string()))
    }
}

impl Renderer for RasterRenderer {
    fn set_view(&mut self, view: ViewParams) {
        self.view = view;
        self.clear();
    }

    fn clear(&mut self) {
        let n = self.pixel_count();
        self.colors.clear();
        self.colors.resize(n, BACKGROUND);
        self.overlay.clear();
        self.overlay.resize(n, false);
    }

    fn draw_interface(&mut self, grid: &QuadGrid, field: &str) -> Result<(), RenderError> {
        let id = Self::field(grid, field)?;
        let (w, h) = (self.view.width, self.view.height);

        // Phase of every pixel: None outside the domain.
        let mut phase = Vec::with_capacity(self.pixel_count());
        for py in 0..h {
            for px in 0..w {
                let p = self.pixel_to_world(grid, px, py);
                phase.push(grid.locate(p).map(|idx| grid.values(id)[idx] >= 0.5));
            }
        }

        let at = |px: u32, py: u32| (py as usize) * (w as usize) + px as usize;
        for py in 0..h {
            for px in 0..w {
                let Some(here) = phase[at(px, py)] else {
                    continue;
                };
                let right = (px + 1 < w).then(|| phase[at(px + 1, py)]).flatten();
                let below = (py + 1 < h).then(|| phase[at(px, py + 1)]).flatten();
                if right.is_some_and(|r| r != here) || below.is_some_and(|b| b != here) {
                    self.overlay[at(px, py)] = true;
                }
            }
        }
        Ok(())
    }

    fn draw_scalar_heatmap(
        &mut self,
        grid: &QuadGrid,
        field: &str,
        options: HeatmapOptions,
    ) -> Result<(), RenderError> {
        let id = Self::field(grid, field)?;
        let (lo, hi) = color_range(grid, id, options.spread);

        let w = self.view.width;
        for py in 0..self.view.height {
            for px in 0..w {
                let p = self.pixel_to_world(grid, px, py);
                if !grid.contains(p) {
                    continue;
                }
                let value = if options.linear {
                    grid.sample_linear(id, p)
                } else {
                    grid.sample(id, p)
                };
                let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
                self.colors[(py as usize) * (w as usize) + px as usize] = jet(t);
            }
        }
        Ok(())
    }

    fn draw_box(&mut self, grid: &QuadGrid) {
        let o = grid.origin();
        let l = grid.size();
        let tol = self.pixel_size(grid);
        let w = self.view.width;
        for py in 0..self.view.height {
            for px in 0..w {
                let [x, y] = self.pixel_to_world(grid, px, py);
                let within_x = x >= o[0] - tol && x <= o[0] + l + tol;
                let within_y = y >= o[1] - tol && y <= o[1] + l + tol;
                let on_vertical = (x - o[0]).abs() < tol || (x - o[0] - l).abs() < tol;
                let on_horizontal = (y - o[1]).abs() < tol || (y - o[1] - l).abs() < tol;
                if (on_vertical && within_y) || (on_horizontal && within_x) {
                    self.overlay[(py as usize) * (w as usize) + px as usize] = true;
                }
            }
        }
    }

    fn save(&mut self, path: &Path) -> Result<(), RenderError> {
        let file = File::create(path)?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), self.view.width, self.view.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.rgb_bytes())?;
        writer.finish()?;
        Ok(())
    }
}

/// Colour range of a heatmap: area-weighted `mean +- spread * stddev`, or
/// min/max when `spread <= 0`.
pub fn color_range(grid: &QuadGrid, id: FieldId, spread: f64) -> (f64, f64) {
    let values = grid.values(id);
    if spread > 0.0 {
        let mut area = 0.0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for (key, &v) in grid.leaves().iter().zip(values) {
            let h = grid.cell_size(key.level);
            let a = h * h;
            area += a;
            sum += a * v;
            sum_sq += a * v * v;
        }
        let mean = sum / area;
        let stddev = (sum_sq / area - mean * mean).max(0.0).sqrt();
        (mean - spread * stddev, mean + spread * stddev)
    } else {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lo, hi)
    }
}

/// Jet colour map for `t` in [0, 1] (values outside are clamped).
pub fn jet(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let channel = |centre: f64| {
        let v = (1.5 - (4.0 * t - centre).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}
