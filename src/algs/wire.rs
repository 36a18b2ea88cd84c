//! Fixed, versioned, little-endian wire types for collective payloads.

use crate::mesh_error::MeshCompositeError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), MeshCompositeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(MeshCompositeError::Wire(format!(
            "expected {expected} bytes, got {actual}"
        )))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Payload kinds carried in [`WireHdr::kind`].
pub const KIND_IMAGE: u16 = 1;
pub const KIND_RAYS: u16 = 2;
pub const KIND_FACES: u16 = 3;
pub const KIND_VALUES: u16 = 4;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

// ===== Common records ======================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }

    /// Checks version and kind.
    pub fn expect(&self, kind: u16) -> Result<(), MeshCompositeError> {
        if self.version() != WIRE_VERSION || self.kind() != kind {
            return Err(MeshCompositeError::Wire(format!(
                "header v{} kind {} (want v{WIRE_VERSION} kind {kind})",
                self.version(),
                self.kind()
            )));
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

// ===== Compositing records =================================================

/// Placement and layout of one partial image; followed by the color bytes
/// and, when `has_depth`, `rows * cols` little-endian `f32` depths.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireImageHdr {
    pub row_offset_le: u32,
    pub col_offset_le: u32,
    pub rows_le: u32,
    pub cols_le: u32,
    pub channels_le: u16,
    pub has_depth_le: u16,
}

impl WireImageHdr {
    pub fn new(
        row_offset: usize,
        col_offset: usize,
        rows: usize,
        cols: usize,
        channels: usize,
        has_depth: bool,
    ) -> Self {
        Self {
            row_offset_le: (row_offset as u32).to_le(),
            col_offset_le: (col_offset as u32).to_le(),
            rows_le: (rows as u32).to_le(),
            cols_le: (cols as u32).to_le(),
            channels_le: (channels as u16).to_le(),
            has_depth_le: u16::from(has_depth).to_le(),
        }
    }
    pub fn row_offset(&self) -> usize {
        u32::from_le(self.row_offset_le) as usize
    }
    pub fn col_offset(&self) -> usize {
        u32::from_le(self.col_offset_le) as usize
    }
    pub fn rows(&self) -> usize {
        u32::from_le(self.rows_le) as usize
    }
    pub fn cols(&self) -> usize {
        u32::from_le(self.cols_le) as usize
    }
    pub fn channels(&self) -> usize {
        u16::from_le(self.channels_le) as usize
    }
    pub fn has_depth(&self) -> bool {
        u16::from_le(self.has_depth_le) != 0
    }
}

/// One ray of a sample buffer; followed by `n_samples` [`WireSampleHdr`]s.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireRayHdr {
    pub col_le: u32,
    pub row_le: u32,
    pub n_samples_le: u32,
}

impl WireRayHdr {
    pub fn new(col: usize, row: usize, n_samples: usize) -> Self {
        Self {
            col_le: (col as u32).to_le(),
            row_le: (row as u32).to_le(),
            n_samples_le: (n_samples as u32).to_le(),
        }
    }
    pub fn col(&self) -> usize {
        u32::from_le(self.col_le) as usize
    }
    pub fn row(&self) -> usize {
        u32::from_le(self.row_le) as usize
    }
    pub fn n_samples(&self) -> usize {
        u32::from_le(self.n_samples_le) as usize
    }
}

/// One sample accumulator; followed by `n_vars` `f64` weighted sums.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireSampleHdr {
    pub slab_le: u32,
    pub reserved_le: u32,
    pub weight_bits_le: u64,
}

impl WireSampleHdr {
    pub fn new(slab: u32, weight: f64) -> Self {
        Self {
            slab_le: slab.to_le(),
            reserved_le: 0,
            weight_bits_le: weight.to_bits().to_le(),
        }
    }
    pub fn slab(&self) -> u32 {
        u32::from_le(self.slab_le)
    }
    pub fn weight(&self) -> f64 {
        f64::from_bits(u64::from_le(self.weight_bits_le))
    }
}

/// A boundary-face signature: three corner points as raw `f64` bits.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFaceEntry {
    pub signature_le: [u64; 9],
    pub domain_le: u64,
    pub face_le: u32,
    pub rank_le: u32,
}

impl WireFaceEntry {
    pub fn new(signature: [u64; 9], domain: usize, face: u8, rank: usize) -> Self {
        Self {
            signature_le: signature.map(u64::to_le),
            domain_le: (domain as u64).to_le(),
            face_le: u32::from(face).to_le(),
            rank_le: (rank as u32).to_le(),
        }
    }
    pub fn signature(&self) -> [u64; 9] {
        self.signature_le.map(u64::from_le)
    }
    pub fn domain(&self) -> usize {
        u64::from_le(self.domain_le) as usize
    }
    pub fn face(&self) -> u8 {
        u32::from_le(self.face_le) as u8
    }
    pub fn rank(&self) -> usize {
        u32::from_le(self.rank_le) as usize
    }
}

// ===== Layout checks ======================================================

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireImageHdr>(), 20);
const_assert_eq!(size_of::<WireRayHdr>(), 12);
const_assert_eq!(size_of::<WireSampleHdr>(), 16);
const_assert_eq!(size_of::<WireFaceEntry>(), 88);

// ===== Byte streams =======================================================

/// Append-only encoder.
#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(kind: u16) -> Self {
        let mut w = Self::new();
        w.put(&WireHdr::new(kind));
        w
    }

    pub fn put<T: Pod>(&mut self, v: &T) {
        self.buf.extend_from_slice(bytemuck::bytes_of(v));
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-based decoder; every read is bounds-checked.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads and validates a [`WireHdr`].
    pub fn expect_header(buf: &'a [u8], kind: u16) -> Result<Self, MeshCompositeError> {
        let mut r = Self::new(buf);
        r.get::<WireHdr>()?.expect(kind)?;
        Ok(r)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], MeshCompositeError> {
        let end = self.pos.checked_add(n).filter(|e| *e <= self.buf.len());
        let Some(end) = end else {
            return Err(MeshCompositeError::Wire(format!(
                "truncated message: need {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len()
            )));
        };
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn get<T: Pod>(&mut self) -> Result<T, MeshCompositeError> {
        let raw = self.bytes(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    pub fn get_u64(&mut self) -> Result<u64, MeshCompositeError> {
        let raw = self.bytes(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(raw);
        Ok(u64::from_le_bytes(a))
    }

    pub fn get_f64(&mut self) -> Result<f64, MeshCompositeError> {
        self.get_u64().map(f64::from_bits)
    }

    pub fn get_f32(&mut self) -> Result<f32, MeshCompositeError> {
        let raw = self.bytes(4)?;
        let mut a = [0u8; 4];
        a.copy_from_slice(raw);
        Ok(f32::from_bits(u32::from_le_bytes(a)))
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Errors if unread bytes remain.
    pub fn finish(self) -> Result<(), MeshCompositeError> {
        if !self.is_empty() {
            return Err(MeshCompositeError::Wire(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_kind_checked() {
        let mut w = WireWriter::with_header(KIND_RAYS);
        w.put(&WireCount::new(3));
        let bytes = w.finish();
        assert!(WireReader::expect_header(&bytes, KIND_IMAGE).is_err());
        let mut r = WireReader::expect_header(&bytes, KIND_RAYS).unwrap();
        assert_eq!(r.get::<WireCount>().unwrap().get(), 3);
        r.finish().unwrap();
    }

    #[test]
    fn truncated_reads_fail() {
        let mut r = WireReader::new(&[1, 2, 3]);
        assert!(matches!(r.get_f64(), Err(MeshCompositeError::Wire(_))));
    }

    #[test]
    fn face_entry_preserves_bits() {
        let sig = [(-0.0f64).to_bits(); 9];
        let e = WireFaceEntry::new(sig, 12, 5, 3);
        let mut w = WireWriter::new();
        w.put(&e);
        let bytes = w.finish();
        let back: WireFaceEntry = WireReader::new(&bytes).get().unwrap();
        assert_eq!(back.signature(), sig);
        assert_eq!((back.domain(), back.face(), back.rank()), (12, 5, 3));
    }
}
