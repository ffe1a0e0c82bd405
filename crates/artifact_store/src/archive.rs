//! Unpacking of archive payloads served over HTTP(S).

use std::{
    io::{self, Read, Seek},
    path::{Component, Path, PathBuf},
};

use flate2::read::GzDecoder;

/// Archive formats recognised from a response `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    /// Detect an archive from a content type, ignoring parameters such as
    /// `; charset=binary`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/zip" | "application/x-zip-compressed" => Some(Self::Zip),
            "application/x-tar" => Some(Self::Tar),
            "application/x-gtar" | "application/x-gzip" | "application/gzip" => Some(Self::TarGz),
            _ => None,
        }
    }
}

/// Extract the archive read from `reader` into `dest_dir`, returning the
/// regular files written.
///
/// Entries whose path would land outside `dest_dir` abort extraction.
pub fn unpack<R: Read + Seek>(
    kind: ArchiveKind,
    reader: R,
    dest_dir: &Path,
) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest_dir)?;
    match kind {
        ArchiveKind::Zip => unpack_zip(reader, dest_dir),
        ArchiveKind::Tar => unpack_tar(reader, dest_dir),
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(reader), dest_dir),
    }
}

fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archive = tar::Archive::new(reader);
    let mut written = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative = entry.path()?.into_owned();
        ensure_enclosed(&relative)?;

        let is_file = entry.header().entry_type().is_file();
        if !entry.unpack_in(dest_dir)? {
            return Err(escaping_entry(&relative));
        }
        if is_file {
            written.push(dest_dir.join(relative));
        }
    }

    Ok(written)
}

fn unpack_zip<R: Read + Seek>(reader: R, dest_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(reader).map_err(io::Error::other)?;
    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(io::Error::other)?;
        let relative = file
            .enclosed_name()
            .ok_or_else(|| escaping_entry(Path::new(file.name())))?;
        let target = dest_dir.join(&relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        written.push(target);
    }

    Ok(written)
}

fn ensure_enclosed(relative: &Path) -> io::Result<()> {
    let enclosed = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if enclosed {
        Ok(())
    } else {
        Err(escaping_entry(relative))
    }
}

fn escaping_entry(relative: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "archive entry escapes destination: {}",
            relative.display()
        ),
    )
}

/// Build a gzip'd tarball in memory.
#[cfg(test)]
pub(crate) fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    use flate2::{write::GzEncoder, Compression};

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
