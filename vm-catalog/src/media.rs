//! Install media inspection.
//!
//! A template's `source_media` path is either an ISO image (becomes the
//! template's CDROM) or a disk image (becomes the base of its first disk).
//! The [`MediaInspector`] trait decides which, and later tells the catalog
//! whether media a template points at is still there.

use crate::error::{CatalogError, Result};
use crate::messages;
use crate::reason;
use crate::template::DiskFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Offset of the ISO 9660 primary volume descriptor (sector 16)
const ISO_PVD_OFFSET: u64 = 16 * 2048;
const ISO_VOLUME_ID: std::ops::Range<usize> = 40..72;

const QCOW_MAGIC: &[u8; 4] = b"QFI\xfb";
const QED_MAGIC: &[u8; 4] = b"QED\0";
const VMDK_MAGIC: &[u8; 4] = b"KDMV";
const VPC_MAGIC: &[u8; 8] = b"conectix";

const GIB: u64 = 1024 * 1024 * 1024;

pub const UNKNOWN_OS: &str = "unknown";

/// Volume id patterns of common install media, mapped to distro names
static DISTRO_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)ubuntu[^0-9]*(\d+\.\d+)", "ubuntu"),
        (r"(?i)fedora[^0-9]*(\d+)", "fedora"),
        (r"(?i)rhel[^0-9]*(\d+(?:\.\d+)?)", "rhel"),
        (r"(?i)centos[^0-9]*(\d+(?:\.\d+)?)", "centos"),
        (r"(?i)debian[^0-9]*(\d+(?:\.\d+)?)", "debian"),
        (r"(?i)opensuse[^0-9]*(\d+(?:\.\d+)?)", "opensuse"),
        (r"(?i)sles[^0-9]*(\d+)", "sles"),
        (r"(?i)windows[^0-9]*(\d+)", "windows"),
    ]
    .into_iter()
    .map(|(pattern, distro)| {
        (
            Regex::new(pattern).expect("Distro regex should compile - this is a static pattern"),
            distro,
        )
    })
    .collect()
});

/// Distros with a dedicated icon
const KNOWN_ICONS: [&str; 7] = [
    "ubuntu", "fedora", "rhel", "centos", "debian", "opensuse", "sles",
];

/// Icon shown for a template of the given distro
pub fn icon_for(distro: &str) -> String {
    if KNOWN_ICONS.contains(&distro) {
        format!("images/icon-{}.png", distro)
    } else {
        "images/icon-vm.png".to_string()
    }
}

/// Match an ISO volume id against known distro patterns
pub fn detect_distro(volume_id: &str) -> Option<(String, String)> {
    DISTRO_PATTERNS.iter().find_map(|(pattern, distro)| {
        pattern
            .captures(volume_id)
            .and_then(|caps| caps.get(1))
            .map(|version| (distro.to_string(), version.as_str().to_string()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// Bootable install media
    Iso {
        distro: Option<String>,
        version: Option<String>,
    },
    /// A disk image to clone template disks from
    Image {
        format: DiskFormat,
        /// Virtual size rounded up to whole GiB
        size_gib: u64,
    },
}

pub trait MediaInspector: Send + Sync {
    /// Classify the media at `path`
    fn inspect(&self, path: &str) -> Result<MediaKind>;

    /// Whether local media at `path` is still present
    fn exists(&self, path: &str) -> bool;
}

fn invalid_media(path: &str) -> CatalogError {
    CatalogError::InvalidParameter(reason!(messages::TEMPLATE_INVALID_CDROM, param = path))
}

/// Inspects media on the local filesystem by reading image headers
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMediaInspector;

impl FsMediaInspector {
    fn read_iso_volume_id(file: &mut File) -> std::io::Result<Option<String>> {
        let mut descriptor = [0u8; 2048];
        file.seek(SeekFrom::Start(ISO_PVD_OFFSET))?;
        if file.read_exact(&mut descriptor).is_err() {
            return Ok(None);
        }
        if descriptor[0] != 1 || &descriptor[1..6] != b"CD001" {
            return Ok(None);
        }
        let volume_id = String::from_utf8_lossy(&descriptor[ISO_VOLUME_ID])
            .trim()
            .to_string();
        Ok(Some(volume_id))
    }

    fn read_image_format(file: &mut File, len: u64) -> std::io::Result<(DiskFormat, u64)> {
        let mut header = [0u8; 32];
        file.seek(SeekFrom::Start(0))?;
        let read = file.read(&mut header)?;
        let header = &header[..read];

        if header.len() >= 32 && header.starts_with(QCOW_MAGIC) {
            let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            let mut size = [0u8; 8];
            size.copy_from_slice(&header[24..32]);
            let format = if version == 1 {
                DiskFormat::Qcow
            } else {
                DiskFormat::Qcow2
            };
            return Ok((format, u64::from_be_bytes(size)));
        }
        if header.starts_with(QED_MAGIC) {
            return Ok((DiskFormat::Qed, len));
        }
        if header.starts_with(VMDK_MAGIC) {
            return Ok((DiskFormat::Vmdk, len));
        }
        if header.starts_with(VPC_MAGIC) {
            return Ok((DiskFormat::Vpc, len));
        }
        Ok((DiskFormat::Raw, len))
    }
}

impl MediaInspector for FsMediaInspector {
    fn inspect(&self, path: &str) -> Result<MediaKind> {
        let file_path = Path::new(path);
        if !file_path.is_absolute() || !file_path.is_file() {
            return Err(invalid_media(path));
        }

        let mut file = File::open(file_path)?;
        let len = file.metadata()?.len();

        if let Some(volume_id) = Self::read_iso_volume_id(&mut file)? {
            let detected = detect_distro(&volume_id);
            tracing::debug!(path, volume_id = %volume_id, ?detected, "Inspected ISO media");
            let (distro, version) = detected.unzip();
            return Ok(MediaKind::Iso { distro, version });
        }

        let (format, size) = Self::read_image_format(&mut file, len)?;
        tracing::debug!(path, %format, size, "Inspected disk image");
        Ok(MediaKind::Image {
            format,
            size_gib: size.div_ceil(GIB).max(1),
        })
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}
