// src/source.rs

use crate::error::{Result, YuvqError};
use crate::frame::{Channel, FrameBuffer};
use log::debug;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Outcome of a positioned frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Complete,
    /// Fewer bytes than a whole frame remained; the stream is exhausted.
    ShortRead,
}

/// Randomly addressable reader over a raw planar file.
///
/// Each concurrent reader owns its own handle; the file position is never
/// shared.
#[derive(Debug)]
pub struct FrameSource {
    path: PathBuf,
    file: File,
    frame_size: u64,
}

impl FrameSource {
    pub fn open(path: &Path, frame_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| YuvqError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened {} (frame size {} bytes)", path.display(), frame_size);
        Ok(FrameSource {
            path: path.to_path_buf(),
            file,
            frame_size: frame_size as u64,
        })
    }

    /// Opens another independent handle on the same file.
    pub fn reopen(&self) -> Result<Self> {
        FrameSource::open(&self.path, self.frame_size as usize)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole frames the file currently holds.
    pub fn frame_count(&self) -> Result<u64> {
        let len = self.file.metadata()?.len();
        Ok(if self.frame_size == 0 { 0 } else { len / self.frame_size })
    }

    /// Reads frame `index` into `frame`, luma first, then both chroma planes.
    pub fn read_at(&mut self, frame: &mut FrameBuffer, index: u64) -> Result<ReadStatus> {
        debug_assert_eq!(frame.frame_size() as u64, self.frame_size);
        self.file.seek(SeekFrom::Start(0))?;
        let offset = index
            .checked_mul(self.frame_size)
            .ok_or_else(|| YuvqError::Input(format!("frame index {} out of range", index)))?;
        self.file.seek(SeekFrom::Start(offset))?;

        for channel in Channel::ALL {
            match self.file.read_exact(frame.plane_bytes_mut(channel)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(ReadStatus::ShortRead);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReadStatus::Complete)
    }
}
