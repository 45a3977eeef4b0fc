use std::fmt::Display;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use futures_util::{Stream, StreamExt};
use tar::{Archive, EntryType};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::error::PackagesError;

/// Chunks buffered between the network stream and the blocking decoder.
const CHUNK_QUEUE_DEPTH: usize = 16;

/// Streams a gzip-compressed tar archive into `destination`, dropping the archive's top-level
/// folder. Resolves once extraction has finished, not when the body has been received.
pub async fn unpack_tar_gz_stream<S, B, E>(stream: S, destination: &Path) -> Result<(), PackagesError>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(CHUNK_QUEUE_DEPTH);
    let target = destination.to_path_buf();
    let extraction =
        tokio::task::spawn_blocking(move || unpack_tar_gz(ChannelReader::new(rx), &target));

    let mut stream = Box::pin(stream);
    let mut transport_error = None;
    while let Some(chunk) = stream.next().await {
        let message = match chunk {
            Ok(bytes) => Ok(bytes.as_ref().to_vec()),
            Err(err) => {
                let reason = err.to_string();
                transport_error = Some(reason.clone());
                Err(io::Error::other(reason))
            }
        };
        let failed = message.is_err();
        // A closed channel means the decoder stopped early; its result carries the reason.
        if tx.send(message).await.is_err() || failed {
            break;
        }
    }
    drop(tx);

    let outcome = extraction
        .await
        .map_err(|err| PackagesError::Task(err.to_string()))?;
    if let Some(reason) = transport_error {
        return Err(PackagesError::Http(reason));
    }
    outcome
}

/// Blocking half of [`unpack_tar_gz_stream`].
pub fn unpack_tar_gz<R: Read>(reader: R, destination: &Path) -> Result<(), PackagesError> {
    fs::create_dir_all(destination).map_err(|err| PackagesError::Filesystem(err.to_string()))?;
    let root = destination
        .canonicalize()
        .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|err| PackagesError::Extraction(err.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| PackagesError::Extraction(err.to_string()))?;
        let entry_type = entry.header().entry_type();
        if matches!(
            entry_type,
            EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName
        ) {
            continue;
        }

        let path = entry
            .path()
            .map_err(|err| PackagesError::Extraction(err.to_string()))?
            .into_owned();
        let Some(relative) = strip_first_component(&path)? else {
            continue;
        };
        let target = root.join(&relative);
        prepare_target(&root, &relative, &target)?;

        if entry_type == EntryType::Link {
            let link_name = entry
                .link_name()
                .map_err(|err| PackagesError::Extraction(err.to_string()))?
                .ok_or_else(|| {
                    PackagesError::Extraction(format!("hard link without target: {}", path.display()))
                })?;
            let Some(link_relative) = strip_first_component(&link_name)? else {
                continue;
            };
            let source = root.join(link_relative);
            let resolved = source
                .canonicalize()
                .map_err(|err| PackagesError::Extraction(err.to_string()))?;
            if !resolved.starts_with(&root) {
                return Err(PackagesError::UnsafeArchivePath(link_name.display().to_string()));
            }
            fs::hard_link(resolved, &target)
                .map_err(|err| PackagesError::Extraction(err.to_string()))?;
            continue;
        }

        entry
            .unpack(&target)
            .map_err(|err| PackagesError::Extraction(format!("{}: {err}", path.display())))?;
    }
    Ok(())
}

/// Creates the parent of `target` and makes sure writing `target` stays under `root`.
///
/// Symlinks unpacked from earlier entries must not redirect later entries, so no existing
/// ancestor may be a symlink and an existing symlink at `target` is replaced, not followed.
fn prepare_target(root: &Path, relative: &Path, target: &Path) -> Result<(), PackagesError> {
    let unsafe_path = || PackagesError::UnsafeArchivePath(relative.display().to_string());

    let mut current = root.to_path_buf();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => return Err(unsafe_path()),
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => break,
                Err(err) => return Err(PackagesError::Filesystem(err.to_string())),
            }
        }
    }

    let parent = target.parent().ok_or_else(unsafe_path)?;
    fs::create_dir_all(parent).map_err(|err| PackagesError::Filesystem(err.to_string()))?;
    let canonical_parent = parent
        .canonicalize()
        .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
    if !canonical_parent.starts_with(root) {
        return Err(unsafe_path());
    }

    if let Ok(meta) = fs::symlink_metadata(target) {
        if meta.file_type().is_symlink() {
            remove_link_or_file(target)
                .map_err(|err| PackagesError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}

/// Drops the archive's wrapper folder. `None` for the wrapper itself.
fn strip_first_component(path: &Path) -> Result<Option<PathBuf>, PackagesError> {
    let mut stripped = PathBuf::new();
    let mut seen_root = false;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                if seen_root {
                    stripped.push(part);
                } else {
                    seen_root = true;
                }
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PackagesError::UnsafeArchivePath(path.display().to_string()));
            }
        }
    }
    if stripped.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(stripped))
}

struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(0),
            }
        }
        let available = &self.chunk[self.pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.pos += count;
        Ok(count)
    }
}

/// Removes whatever sits at `path`: file, symlink or directory tree.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => remove_link_or_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(windows)]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    // Directory symlinks are removed as directories on Windows.
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}

#[cfg(not(windows))]
fn remove_link_or_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Replaces `dest` with a copy of `source` (file, symlink or directory tree).
pub fn replace_with_copy(source: &Path, dest: &Path) -> io::Result<()> {
    remove_entry(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let meta = fs::symlink_metadata(source)?;
    if meta.is_dir() {
        copy_dir_recursive(source, dest)
    } else if meta.file_type().is_symlink() {
        copy_symlink(source, dest)
    } else {
        fs::copy(source, dest).map(|_| ())
    }
}

pub fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    let link_target = fs::read_link(source)?;
    std::os::unix::fs::symlink(link_target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    let resolved = fs::canonicalize(source)?;
    if resolved.is_dir() {
        copy_dir_recursive(&resolved, dest)
    } else {
        fs::copy(resolved, dest).map(|_| ())
    }
}
