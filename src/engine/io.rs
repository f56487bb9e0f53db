// src/engine/io.rs
//
// Source bytes (memory, mmap, lazily read path) and ICC profile extraction.

use crate::error::{IiifError, Result};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, Bytes, ImageICC};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a source image's bytes come from.
#[derive(Clone, Debug)]
pub enum Source {
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file, read without copying.
    Mapped(Arc<Mmap>),
    /// Read on first use.
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(bytes.into()))
    }

    /// Maps `path` into memory.
    pub fn map(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| IiifError::source_read_failed(path.display().to_string(), e))?;
        // SAFETY: the mapping is read-only; a source file truncated by
        // another process while mapped is outside what this crate guards.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| IiifError::source_read_failed(path.display().to_string(), e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Borrowed bytes for in-memory and mapped sources, owned for paths.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Source::Memory(data) => Ok(Cow::Borrowed(data.as_slice())),
            Source::Mapped(mmap) => Ok(Cow::Borrowed(mmap.as_ref())),
            Source::Path(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| IiifError::source_read_failed(path.display().to_string(), e)),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::Mapped(_) => None,
        }
    }
}

/// ICC profile embedded in a JPEG (APP2), PNG (iCCP) or WebP (ICCP)
/// container. Profiles with a malformed header are ignored.
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 12 {
        return None;
    }
    let bytes = Bytes::copy_from_slice(data);
    let icc = if data.starts_with(&[0xFF, 0xD8]) {
        jpeg_icc_profile(&Jpeg::from_bytes(bytes).ok()?)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Png::from_bytes(bytes).ok()?.icc_profile()
    } else if &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        WebP::from_bytes(bytes).ok()?.icc_profile()
    } else {
        None
    }?;
    let icc = icc.to_vec();
    validate_icc_profile(&icc).then_some(icc)
}

/// Reassembles the APP2 `ICC_PROFILE` chunks of a JPEG in sequence order.
/// Chunks that disagree on the total count invalidate the profile.
fn jpeg_icc_profile(jpeg: &Jpeg) -> Option<Bytes> {
    const APP2: u8 = 0xE2;
    const TAG: &[u8] = b"ICC_PROFILE\0";

    let mut chunks: Vec<(u8, u8, Bytes)> = jpeg
        .segments()
        .iter()
        .filter(|s| s.marker() == APP2 && s.contents().starts_with(TAG))
        .filter_map(|s| {
            let contents = s.contents();
            let seq = *contents.get(TAG.len())?;
            let count = *contents.get(TAG.len() + 1)?;
            Some((seq, count, contents.slice(TAG.len() + 2..)))
        })
        .collect();
    if chunks.is_empty() {
        return None;
    }
    let count = chunks[0].1;
    if chunks.len() != count as usize || chunks.iter().any(|c| c.1 != count) {
        return None;
    }
    chunks.sort_by_key(|c| c.0);
    if chunks.iter().enumerate().any(|(i, c)| c.0 as usize != i + 1) {
        return None;
    }
    let mut profile = Vec::with_capacity(chunks.iter().map(|c| c.2.len()).sum());
    for (_, _, data) in chunks {
        profile.extend_from_slice(&data);
    }
    Some(Bytes::from(profile))
}

/// Checks the fixed 128-byte ICC header: declared size, printable
/// signatures and a sane major version.
pub(crate) fn validate_icc_profile(icc: &[u8]) -> bool {
    if icc.len() < 128 {
        return false;
    }
    let declared = u32::from_be_bytes([icc[0], icc[1], icc[2], icc[3]]) as usize;
    if declared != icc.len() {
        return false;
    }
    if icc[8] > 10 {
        return false;
    }
    let printable = |range: std::ops::Range<usize>| {
        icc[range]
            .iter()
            .all(|&b| (32..=126).contains(&b) || b == 0)
    };
    // CMM type, device class, color space, PCS
    printable(4..8) && printable(12..16) && printable(16..20) && printable(20..24)
}

/// Device class signature at bytes 12..16 (`mntr`, `prtr`, ...).
pub(crate) fn icc_device_class(icc: &[u8]) -> Option<[u8; 4]> {
    icc.get(12..16).and_then(|s| s.try_into().ok())
}

/// Data color space signature at bytes 16..20 (`RGB `, `CMYK`, ...).
pub(crate) fn icc_color_space(icc: &[u8]) -> Option<[u8; 4]> {
    icc.get(16..20).and_then(|s| s.try_into().ok())
}

/// Adobe APP14 color transform flag of a JPEG: 0 = none/CMYK,
/// 1 = YCbCr, 2 = YCCK. `None` without an Adobe segment.
pub(crate) fn jpeg_adobe_transform(data: &[u8]) -> Option<u8> {
    const APP14: u8 = 0xEE;
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(data)).ok()?;
    let segment = jpeg
        .segments()
        .iter()
        .find(|s| s.marker() == APP14 && s.contents().starts_with(b"Adobe"))?;
    segment.contents().get(11).copied()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal header-only profile with the given class and color space.
    pub(crate) fn minimal_icc(class: &[u8; 4], space: &[u8; 4]) -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[3] = 0x80;
        data[4..8].copy_from_slice(b"ADBE");
        data[8] = 2;
        data[12..16].copy_from_slice(class);
        data[16..20].copy_from_slice(space);
        data[20..24].copy_from_slice(b"XYZ ");
        data
    }

    #[test]
    fn test_validate_icc_profile() {
        assert!(validate_icc_profile(&minimal_icc(b"mntr", b"RGB ")));
        assert!(!validate_icc_profile(&[0u8; 127]));

        let mut wrong_size = minimal_icc(b"mntr", b"RGB ");
        wrong_size[3] = 0xFF;
        assert!(!validate_icc_profile(&wrong_size));

        let mut bad_version = minimal_icc(b"mntr", b"RGB ");
        bad_version[8] = 20;
        assert!(!validate_icc_profile(&bad_version));
    }

    #[test]
    fn test_header_signatures() {
        let icc = minimal_icc(b"prtr", b"CMYK");
        assert_eq!(icc_device_class(&icc), Some(*b"prtr"));
        assert_eq!(icc_color_space(&icc), Some(*b"CMYK"));
        assert_eq!(icc_device_class(&[0u8; 4]), None);
    }

    #[test]
    fn test_extract_icc_profile_without_profile() {
        assert!(extract_icc_profile(&[0u8; 10]).is_none());
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert!(extract_icc_profile(&png).is_none());
        assert_eq!(jpeg_adobe_transform(&png), None);
    }

    #[test]
    fn test_sources_yield_same_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let path = Source::Path(file.path().to_path_buf());
        let mapped = Source::map(file.path()).unwrap();
        let memory = Source::from_bytes(b"0123456789".to_vec());
        assert_eq!(path.bytes().unwrap().as_ref(), b"0123456789");
        assert_eq!(mapped.bytes().unwrap().as_ref(), b"0123456789");
        assert_eq!(memory.bytes().unwrap().as_ref(), b"0123456789");
        assert!(path.as_path().is_some());
        assert!(memory.as_path().is_none());
    }

    #[test]
    fn test_missing_path_is_read_error() {
        let source = Source::Path(PathBuf::from("/nonexistent/iiif-image/source.jpg"));
        let err = source.bytes().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/iiif-image/source.jpg"));
    }
}
