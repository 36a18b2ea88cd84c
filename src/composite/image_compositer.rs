//! Parallel compositing of partial images into one output image.
//!
//! Every rank contributes zero or more [`PartialImage`]s placed at offsets in
//! a shared `rows × cols` output. `execute` ships the encoded regions to the
//! root rank(s), sorts them into a canonical order and writes them out:
//!
//! - without depth, every pixel may be written at most once;
//! - with depth, the smallest depth wins and equal depths fall back to the
//!   smaller colour bytes, so the result does not depend on arrival order.

use crate::algs::communicator::Communicator;
use crate::algs::context::ParallelContext;
use crate::algs::wire::{KIND_IMAGE, WireCount, WireImageHdr, WireReader, WireWriter};
use crate::data::image::{Image, PartialImage};
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which ranks receive the composited image.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompositeRoot {
    Rank(usize),
    All,
}

impl Default for CompositeRoot {
    fn default() -> Self {
        CompositeRoot::Rank(0)
    }
}

impl CompositeRoot {
    /// `-1` (or any negative rank) means every rank.
    pub fn from_i32(root: i32) -> Self {
        usize::try_from(root).map_or(CompositeRoot::All, CompositeRoot::Rank)
    }

    pub fn includes(self, rank: usize) -> bool {
        match self {
            CompositeRoot::Rank(r) => r == rank,
            CompositeRoot::All => true,
        }
    }
}

/// Output appearance for a compositing pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// RGBA background; RGB outputs use the first three bytes.
    pub background: [u8; 4],
    /// Inputs carry a depth plane and are resolved by depth.
    pub depth: bool,
    pub root: CompositeRoot,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 0],
            depth: false,
            root: CompositeRoot::default(),
        }
    }
}

/// Collects partial images on every rank and merges them on the root(s).
#[derive(Debug)]
pub struct ImageCompositer {
    rows: usize,
    cols: usize,
    channels: usize,
    config: CompositeConfig,
    inputs: Vec<PartialImage>,
}

impl ImageCompositer {
    pub fn new(rows: usize, cols: usize, channels: usize) -> Result<Self, MeshCompositeError> {
        Self::with_config(rows, cols, channels, CompositeConfig::default())
    }

    pub fn with_config(
        rows: usize,
        cols: usize,
        channels: usize,
        config: CompositeConfig,
    ) -> Result<Self, MeshCompositeError> {
        if channels != 3 && channels != 4 {
            return Err(MeshCompositeError::ImageLayout {
                expected: "3 or 4 channels".into(),
                found: format!("{channels} channels"),
            });
        }
        Ok(Self {
            rows,
            cols,
            channels,
            config,
            inputs: Vec::new(),
        })
    }

    /// Resolve overlaps by depth; inputs must then carry a depth plane.
    pub fn with_depth(mut self, depth: bool) -> Self {
        self.config.depth = depth;
        self
    }

    pub fn set_background(&mut self, background: [u8; 4]) {
        self.config.background = background;
    }

    pub fn set_root(&mut self, root: CompositeRoot) {
        self.config.root = root;
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Number of inputs waiting for the next pass.
    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    fn layout(&self) -> String {
        let base = if self.channels == 4 { "RGBA" } else { "RGB" };
        if self.config.depth {
            format!("{base}+depth")
        } else {
            base.to_string()
        }
    }

    fn check_input(
        &self,
        image: &Image,
        row_offset: usize,
        col_offset: usize,
    ) -> Result<(), MeshCompositeError> {
        if image.channels() != self.channels || image.has_depth() != self.config.depth {
            return Err(MeshCompositeError::ImageLayout {
                expected: self.layout(),
                found: image.layout(),
            });
        }
        let fits = row_offset
            .checked_add(image.rows())
            .is_some_and(|r| r <= self.rows)
            && col_offset
                .checked_add(image.cols())
                .is_some_and(|c| c <= self.cols);
        if !fits {
            return Err(MeshCompositeError::ImageOutOfBounds {
                row: row_offset,
                col: col_offset,
                rows: image.rows(),
                cols: image.cols(),
                out_rows: self.rows,
                out_cols: self.cols,
            });
        }
        Ok(())
    }

    /// Queues `image` placed with its top-left pixel at `(row_offset, col_offset)`.
    pub fn add_image_input(
        &mut self,
        image: Image,
        row_offset: usize,
        col_offset: usize,
    ) -> Result<(), MeshCompositeError> {
        self.check_input(&image, row_offset, col_offset)?;
        self.inputs
            .push(PartialImage::new(image, row_offset, col_offset));
        Ok(())
    }

    /// Collective. Returns the composited image on root ranks, `None` elsewhere.
    ///
    /// The queued inputs are consumed whether or not the pass succeeds.
    pub fn execute<C: Communicator>(
        &mut self,
        ctx: &ParallelContext<'_, C>,
    ) -> Result<Option<Image>, MeshCompositeError> {
        let inputs = std::mem::take(&mut self.inputs);
        let local = encode_inputs(&inputs);
        let gathered = match self.config.root {
            CompositeRoot::All => Some(ctx.all_gather_bytes(&local)?),
            CompositeRoot::Rank(root) => ctx.gather_bytes(root, &local)?,
        };
        let Some(buffers) = gathered else {
            return Ok(None);
        };
        let mut parts = Vec::new();
        for buf in &buffers {
            for part in decode_inputs(buf)? {
                self.check_input(&part.image, part.row_offset, part.col_offset)?;
                parts.push(part);
            }
        }
        parts.sort_by(canonical_order);
        log::debug!(
            "compositing {} partial images into {}x{} {}",
            parts.len(),
            self.rows,
            self.cols,
            self.layout()
        );
        self.composite(&parts).map(Some)
    }

    fn composite(&self, parts: &[PartialImage]) -> Result<Image, MeshCompositeError> {
        let bg = &self.config.background[..self.channels];
        let mut out = Image::filled(self.rows, self.cols, bg, self.config.depth)?;
        let mut written = vec![false; self.rows * self.cols];
        for part in parts {
            let img = &part.image;
            for r in 0..img.rows() {
                for c in 0..img.cols() {
                    let (row, col) = (part.row_offset + r, part.col_offset + c);
                    let slot = row * self.cols + col;
                    let color = img.pixel(r, c);
                    match img.depth_at(r, c) {
                        None => {
                            if written[slot] {
                                return Err(MeshCompositeError::OverlappingRegions { row, col });
                            }
                        }
                        Some(z) => {
                            if written[slot] {
                                let cur = out.depth_at(row, col).unwrap_or(f32::INFINITY);
                                let wins = match z.total_cmp(&cur) {
                                    Ordering::Less => true,
                                    Ordering::Greater => false,
                                    Ordering::Equal => color < out.pixel(row, col),
                                };
                                if !wins {
                                    continue;
                                }
                            }
                            out.set_depth(row, col, z);
                        }
                    }
                    out.set_pixel(row, col, color);
                    written[slot] = true;
                }
            }
        }
        Ok(out)
    }
}

fn canonical_order(a: &PartialImage, b: &PartialImage) -> Ordering {
    let key = |p: &PartialImage| (p.row_offset, p.col_offset, p.image.rows(), p.image.cols());
    key(a)
        .cmp(&key(b))
        .then_with(|| a.image.color().cmp(b.image.color()))
        .then_with(|| {
            let da = a.image.depth().unwrap_or(&[]).iter().map(|z| z.to_bits());
            let db = b.image.depth().unwrap_or(&[]).iter().map(|z| z.to_bits());
            da.cmp(db)
        })
}

fn encode_inputs(inputs: &[PartialImage]) -> Vec<u8> {
    let mut w = WireWriter::with_header(KIND_IMAGE);
    w.put(&WireCount::new(inputs.len()));
    for p in inputs {
        let img = &p.image;
        w.put(&WireImageHdr::new(
            p.row_offset,
            p.col_offset,
            img.rows(),
            img.cols(),
            img.channels(),
            img.has_depth(),
        ));
        w.put_bytes(img.color());
        for z in img.depth().unwrap_or(&[]) {
            w.put_f32(*z);
        }
    }
    w.finish()
}

fn decode_inputs(buf: &[u8]) -> Result<Vec<PartialImage>, MeshCompositeError> {
    let mut r = WireReader::expect_header(buf, KIND_IMAGE)?;
    let n = r.get::<WireCount>()?.get();
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let h: WireImageHdr = r.get()?;
        let (rows, cols, channels) = (h.rows(), h.cols(), h.channels());
        let color = r.bytes(rows * cols * channels)?.to_vec();
        let depth = if h.has_depth() {
            Some((0..rows * cols).map(|_| r.get_f32()).collect::<Result<Vec<_>, _>>()?)
        } else {
            None
        };
        let image = Image::from_parts(rows, cols, channels, color, depth)?;
        out.push(PartialImage::new(image, h.row_offset(), h.col_offset()));
    }
    r.finish()?;
    Ok(out)
}
