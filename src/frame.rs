// src/frame.rs

use crate::config::ChromaFormat;
use crate::metrics::Pixel;
use std::marker::PhantomData;

/// Color plane index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Y = 0,
    U = 1,
    V = 2,
}

impl Channel {
    /// Planes in storage order.
    pub const ALL: [Channel; 3] = [Channel::Y, Channel::U, Channel::V];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One raw planar frame: luma then both chroma planes in a single allocation.
///
/// Geometry is fixed at construction; the buffer is overwritten in place for
/// every frame read.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    widths: [usize; 3],
    heights: [usize; 3],
    bit_depth: u8,
    sample_bytes: usize,
    plane_sizes: [usize; 3],
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Bytes one frame of this geometry occupies, or `None` if that does not
    /// fit in `usize`.
    pub fn checked_frame_size(
        width: usize,
        height: usize,
        bit_depth: u8,
        chroma_format: ChromaFormat,
    ) -> Option<usize> {
        let (chroma_width, chroma_height) = chroma_format.chroma_dimensions(width, height);
        let sample_bytes = sample_bytes_for(bit_depth);
        let luma = width.checked_mul(height)?.checked_mul(sample_bytes)?;
        let chroma = chroma_width
            .checked_mul(chroma_height)?
            .checked_mul(sample_bytes)?;
        luma.checked_add(chroma.checked_mul(2)?)
    }

    /// Geometry must pass [`FrameBuffer::checked_frame_size`].
    pub fn new(width: usize, height: usize, bit_depth: u8, chroma_format: ChromaFormat) -> Self {
        let (chroma_width, chroma_height) = chroma_format.chroma_dimensions(width, height);
        let sample_bytes = sample_bytes_for(bit_depth);
        let luma_size = width * height * sample_bytes;
        let chroma_size = chroma_width * chroma_height * sample_bytes;

        FrameBuffer {
            widths: [width, chroma_width, chroma_width],
            heights: [height, chroma_height, chroma_height],
            bit_depth,
            sample_bytes,
            plane_sizes: [luma_size, chroma_size, chroma_size],
            data: vec![0; luma_size + 2 * chroma_size],
        }
    }

    pub fn width(&self, channel: Channel) -> usize {
        self.widths[channel.index()]
    }

    pub fn height(&self, channel: Channel) -> usize {
        self.heights[channel.index()]
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// 1 for 8-bit, 2 otherwise.
    pub fn sample_bytes(&self) -> usize {
        self.sample_bytes
    }

    /// Bytes per plane.
    pub fn plane_size(&self, channel: Channel) -> usize {
        self.plane_sizes[channel.index()]
    }

    /// Bytes per frame, all three planes.
    pub fn frame_size(&self) -> usize {
        self.data.len()
    }

    fn plane_range(&self, channel: Channel) -> std::ops::Range<usize> {
        let start: usize = self.plane_sizes[..channel.index()].iter().sum();
        start..start + self.plane_size(channel)
    }

    pub fn plane_bytes(&self, channel: Channel) -> &[u8] {
        &self.data[self.plane_range(channel)]
    }

    pub fn plane_bytes_mut(&mut self, channel: Channel) -> &mut [u8] {
        let range = self.plane_range(channel);
        &mut self.data[range]
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[cfg(test)]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Typed view of one plane. `T::BYTES` must equal `sample_bytes()`.
    pub fn plane<T: Pixel>(&self, channel: Channel) -> PlaneView<'_, T> {
        debug_assert_eq!(T::BYTES, self.sample_bytes());
        PlaneView::new(
            self.plane_bytes(channel),
            self.width(channel),
            self.height(channel),
        )
    }
}

fn sample_bytes_for(bit_depth: u8) -> usize {
    if bit_depth == 8 { 1 } else { 2 }
}

/// Read-only, row-major sample view over a plane's bytes.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a, T> {
    data: &'a [u8],
    width: usize,
    height: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pixel> PlaneView<'a, T> {
    pub fn new(data: &'a [u8], width: usize, height: usize) -> Self {
        assert!(
            data.len() >= width * height * T::BYTES,
            "plane of {}x{} needs {} bytes, got {}",
            width,
            height,
            width * height * T::BYTES,
            data.len()
        );
        PlaneView {
            data,
            width,
            height,
            _marker: PhantomData,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    pub fn sample(&self, x: usize, y: usize) -> T {
        let offset = (y * self.width + x) * T::BYTES;
        T::read_le(&self.data[offset..offset + T::BYTES])
    }

    /// Samples of row `y`, left to right.
    pub fn row(self, y: usize) -> impl Iterator<Item = T> + 'a {
        let row_bytes = self.width * T::BYTES;
        self.data[y * row_bytes..(y + 1) * row_bytes]
            .chunks_exact(T::BYTES)
            .map(T::read_le)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv420_8bit_geometry() {
        let frame = FrameBuffer::new(16, 16, 8, ChromaFormat::Yuv420);
        assert_eq!(frame.width(Channel::U), 8);
        assert_eq!(frame.height(Channel::V), 8);
        assert_eq!(frame.plane_size(Channel::Y), 256);
        assert_eq!(frame.plane_size(Channel::U), 64);
        assert_eq!(frame.plane_size(Channel::V), 64);
        assert_eq!(frame.frame_size(), 384);
    }

    #[test]
    fn wide_samples_double_plane_sizes() {
        let frame = FrameBuffer::new(16, 8, 10, ChromaFormat::Yuv422);
        assert_eq!(frame.sample_bytes(), 2);
        assert_eq!(frame.width(Channel::U), 8);
        assert_eq!(frame.height(Channel::U), 8);
        assert_eq!(frame.plane_size(Channel::Y), 256);
        assert_eq!(frame.plane_size(Channel::U), 128);
        assert_eq!(frame.frame_size(), 512);
    }

    #[test]
    fn checked_frame_size_matches_allocation() {
        for (w, h, depth, chroma) in [
            (16, 16, 8, ChromaFormat::Yuv420),
            (17, 9, 10, ChromaFormat::Yuv422),
            (64, 64, 8, ChromaFormat::Yuv400),
        ] {
            let frame = FrameBuffer::new(w, h, depth, chroma);
            assert_eq!(
                FrameBuffer::checked_frame_size(w, h, depth, chroma),
                Some(frame.frame_size())
            );
        }
    }

    #[test]
    fn oversized_geometry_has_no_frame_size() {
        let side = u32::MAX as usize;
        assert_eq!(
            FrameBuffer::checked_frame_size(side, side, 16, ChromaFormat::Yuv444),
            None
        );
        assert_eq!(
            FrameBuffer::checked_frame_size(usize::MAX, 2, 8, ChromaFormat::Yuv400),
            None
        );
    }

    #[test]
    fn monochrome_has_empty_chroma() {
        let frame = FrameBuffer::new(64, 64, 8, ChromaFormat::Yuv400);
        assert_eq!(frame.plane_size(Channel::U), 0);
        assert_eq!(frame.frame_size(), 64 * 64);
        assert!(frame.plane_bytes(Channel::V).is_empty());
    }

    #[test]
    fn planes_are_contiguous_luma_first() {
        let mut frame = FrameBuffer::new(4, 4, 8, ChromaFormat::Yuv444);
        frame.plane_bytes_mut(Channel::Y).fill(1);
        frame.plane_bytes_mut(Channel::U).fill(2);
        frame.plane_bytes_mut(Channel::V).fill(3);
        let bytes = frame.as_bytes();
        assert!(bytes[..16].iter().all(|&b| b == 1));
        assert!(bytes[16..32].iter().all(|&b| b == 2));
        assert!(bytes[32..].iter().all(|&b| b == 3));
    }

    #[test]
    fn plane_view_reads_samples() {
        let mut frame = FrameBuffer::new(2, 2, 10, ChromaFormat::Yuv400);
        frame
            .plane_bytes_mut(Channel::Y)
            .copy_from_slice(&[1, 0, 2, 0, 0xff, 0x03, 4, 1]);
        let view = frame.plane::<u16>(Channel::Y);
        assert_eq!(view.sample(0, 0), 1);
        assert_eq!(view.sample(0, 1), 1023);
        assert_eq!(view.row(1).collect::<Vec<_>>(), vec![1023, 260]);
    }
}
