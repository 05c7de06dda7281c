//! Content hashing of finished downloads.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use image_hasher::{HashAlg, HasherConfig};
use md5::{Digest, Md5};

use crate::error::{Error, Result};

/// Perceptual hash edge length.
const HASH_SIZE: u32 = 16;

/// MP4 boxes that carry mutable metadata rather than media.
const METADATA_BOXES: &[&[u8; 4]] = &[b"moov", b"free", b"skip", b"meta", b"udta"];

/// Broad class of a downloaded file, guessed from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let Some(mime) = mime_guess::from_path(path).first() else {
            return MediaKind::Other;
        };
        match mime.type_().as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

/// MIME type string for a path, `application/octet-stream` when unknown.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Hash a file so identical content maps to the same value.
///
/// Images hash perceptually, so re-encoded copies collide. MP4 video skips
/// metadata boxes. Everything else is a plain MD5 of the bytes.
pub fn hash_file(path: &Path, kind: MediaKind) -> Result<String> {
    match kind {
        MediaKind::Image => hash_image(path).or_else(|e| {
            tracing::debug!("Perceptual hash failed for {}, using MD5: {}", path.display(), e);
            hash_md5(path)
        }),
        MediaKind::Video if is_mp4(path) => hash_mp4(path),
        _ => hash_md5(path),
    }
}

fn hash_image(path: &Path) -> Result<String> {
    let image =
        image::open(path).map_err(|e| Error::Media(format!("Failed to open image: {}", e)))?;

    let hasher = HasherConfig::new()
        .hash_size(HASH_SIZE, HASH_SIZE)
        .hash_alg(HashAlg::DoubleGradient)
        .to_hasher();

    Ok(format!("img:{}", hasher.hash_image(&image).to_base64()))
}

fn is_mp4(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "mp4" | "m4v" | "mov"))
}

/// MD5 over every top-level MP4 box except metadata, or plain MD5 when the
/// file does not parse as a sequence of boxes ending exactly at EOF.
fn hash_mp4(path: &Path) -> Result<String> {
    match walk_mp4_boxes(path)? {
        Some(hash) => Ok(hash),
        None => {
            tracing::debug!("{} is not a well-formed MP4, using MD5", path.display());
            hash_md5(path)
        }
    }
}

/// Fill `buf` as far as possible. Returns how many bytes were read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// `None` when the walk does not end cleanly.
fn walk_mp4_boxes(path: &Path) -> Result<Option<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut boxes = 0usize;

    loop {
        let mut header = [0u8; 8];
        match read_up_to(&mut reader, &mut header)? {
            0 => break,
            8 => {}
            _ => return Ok(None),
        }

        let box_type = [header[4], header[5], header[6], header[7]];
        if !box_type.iter().all(|b| b.is_ascii_alphanumeric() || *b == b' ') {
            return Ok(None);
        }
        let keep = !METADATA_BOXES.contains(&&box_type);
        if keep {
            hasher.update(header);
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let body_len = match size {
            // Box runs to end of file.
            0 => None,
            // 64-bit size follows the header.
            1 => {
                let mut large = [0u8; 8];
                if read_up_to(&mut reader, &mut large)? != 8 {
                    return Ok(None);
                }
                if keep {
                    hasher.update(large);
                }
                match u64::from_be_bytes(large).checked_sub(16) {
                    Some(len) => Some(len),
                    None => return Ok(None),
                }
            }
            2..=7 => return Ok(None),
            _ => Some(size - 8),
        };

        let mut body = match body_len {
            Some(len) => (&mut reader).take(len),
            None => (&mut reader).take(u64::MAX),
        };
        let copied = if keep {
            std::io::copy(&mut body, &mut hasher)?
        } else {
            std::io::copy(&mut body, &mut std::io::sink())?
        };
        boxes += 1;

        match body_len {
            Some(len) if copied < len => return Ok(None),
            Some(_) => {}
            None => break,
        }
    }

    if boxes == 0 {
        return Ok(None);
    }
    Ok(Some(format!("mp4:{:x}", hasher.finalize())))
}

fn hash_md5(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("md5:{:x}", hasher.finalize()))
}
