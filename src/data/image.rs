//! Row-major 8-bit images with an optional `f32` depth plane.

use crate::mesh_error::MeshCompositeError;

/// Row-major RGB or RGBA image; `depth` holds one value per pixel when present.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    rows: usize,
    cols: usize,
    channels: usize,
    color: Vec<u8>,
    depth: Option<Vec<f32>>,
}

impl Image {
    /// Black image without depth.
    pub fn new(rows: usize, cols: usize, channels: usize) -> Result<Self, MeshCompositeError> {
        Self::from_parts(rows, cols, channels, vec![0; rows * cols * channels], None)
    }

    /// Image filled with `background`, with a depth plane at `+inf` when `depth` is set.
    pub fn filled(
        rows: usize,
        cols: usize,
        background: &[u8],
        depth: bool,
    ) -> Result<Self, MeshCompositeError> {
        let channels = background.len();
        let color = background
            .iter()
            .copied()
            .cycle()
            .take(rows * cols * channels)
            .collect();
        let depth = depth.then(|| vec![f32::INFINITY; rows * cols]);
        Self::from_parts(rows, cols, channels, color, depth)
    }

    pub fn from_parts(
        rows: usize,
        cols: usize,
        channels: usize,
        color: Vec<u8>,
        depth: Option<Vec<f32>>,
    ) -> Result<Self, MeshCompositeError> {
        if channels != 3 && channels != 4 {
            return Err(MeshCompositeError::ImageLayout {
                expected: "3 or 4 channels".into(),
                found: format!("{channels} channels"),
            });
        }
        if color.len() != rows * cols * channels {
            return Err(MeshCompositeError::ImageLayout {
                expected: format!("{} color bytes", rows * cols * channels),
                found: format!("{} color bytes", color.len()),
            });
        }
        if let Some(d) = &depth {
            if d.len() != rows * cols {
                return Err(MeshCompositeError::ImageLayout {
                    expected: format!("{} depth values", rows * cols),
                    found: format!("{} depth values", d.len()),
                });
            }
        }
        Ok(Self {
            rows,
            cols,
            channels,
            color,
            depth,
        })
    }

    /// Adds a depth plane at `+inf`.
    pub fn with_depth(mut self) -> Self {
        if self.depth.is_none() {
            self.depth = Some(vec![f32::INFINITY; self.rows * self.cols]);
        }
        self
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub fn color(&self) -> &[u8] {
        &self.color
    }

    pub fn depth(&self) -> Option<&[f32]> {
        self.depth.as_deref()
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[u8] {
        let i = (row * self.cols + col) * self.channels;
        &self.color[i..i + self.channels]
    }

    #[inline]
    pub fn set_pixel(&mut self, row: usize, col: usize, rgba: &[u8]) {
        let i = (row * self.cols + col) * self.channels;
        self.color[i..i + self.channels].copy_from_slice(&rgba[..self.channels]);
    }

    #[inline]
    pub fn depth_at(&self, row: usize, col: usize) -> Option<f32> {
        self.depth.as_ref().map(|d| d[row * self.cols + col])
    }

    #[inline]
    pub fn set_depth(&mut self, row: usize, col: usize, z: f32) {
        let cols = self.cols;
        if let Some(d) = self.depth.as_mut() {
            d[row * cols + col] = z;
        }
    }

    /// Short layout description used in mismatch errors.
    pub fn layout(&self) -> String {
        let base = if self.channels == 4 { "RGBA" } else { "RGB" };
        if self.has_depth() {
            format!("{base}+depth")
        } else {
            base.to_string()
        }
    }
}

/// An image placed at an offset within a larger output image.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialImage {
    pub row_offset: usize,
    pub col_offset: usize,
    pub image: Image,
}

impl PartialImage {
    pub fn new(image: Image, row_offset: usize, col_offset: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            image,
        }
    }
}
