//! File backed storage so images can be fetched and flashed from a host.

use crate::config::{Config, NandConfig};
use crate::error::SinkError;
use crate::otf::{OtfChunk, OtfSink};
use crate::partition::Partition;
use crate::probe::NandDevice;
use crate::source::Source;
use crate::transport::{DirectTransfer, Transport, TransportError};
use crate::Error;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

fn get_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner().template("  {spinner} {bytes} {bytes_per_sec} {elapsed}  "),
    );
    bar
}

fn open_error(path: &Path, e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::NotFound => TransportError::NotFound(path.display().to_string()),
        _ => TransportError::IO(e),
    }
}

/// An image placed at its load address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub addr: u64,
    pub data: Vec<u8>,
}

/// Serves every source from a directory.
///
/// Mass storage sources look for a `<dev>_<part>` subdirectory first, so
/// `0:2` reads from `<root>/0_2` when it exists.
#[derive(Default)]
pub struct HostTransport {
    roots: BTreeMap<Source, PathBuf>,
    nand: Option<FileNand>,
    ubifs: Option<PathBuf>,
    loaded: Option<LoadedImage>,
}

impl HostTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut transport = HostTransport::new();
        for (name, dir) in &config.storage {
            transport = transport.with_root(name.parse()?, dir);
        }
        if let Some(nand) = &config.nand {
            transport.nand = Some(FileNand::from_config(nand)?);
            transport.ubifs = nand.ubifs.clone();
        }
        Ok(transport)
    }

    pub fn with_root(mut self, source: Source, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(source, dir.into());
        self
    }

    pub fn with_nand(mut self, nand: FileNand) -> Self {
        self.nand = Some(nand);
        self
    }

    pub fn with_ubifs(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ubifs = Some(dir.into());
        self
    }

    pub fn nand_device(&self) -> Option<&FileNand> {
        self.nand.as_ref()
    }

    /// The image of the last whole-image load.
    pub fn loaded(&self) -> Option<&LoadedImage> {
        self.loaded.as_ref()
    }

    pub fn take_loaded(&mut self) -> Option<LoadedImage> {
        self.loaded.take()
    }

    fn file_path(&self, source: Source, device_partition: &str, filename: &str) -> Result<PathBuf, TransportError> {
        let root = self
            .roots
            .get(&source)
            .ok_or(TransportError::Unavailable(source))?;
        let mut dir = root.clone();
        if source.is_mass_storage() {
            let sub = root.join(device_partition.replace(':', "_"));
            if sub.is_dir() {
                dir = sub;
            }
        }
        Ok(dir.join(filename.trim_start_matches('/')))
    }

    fn read_file(path: &Path) -> Result<Vec<u8>, TransportError> {
        log::debug!("Reading {}", path.display());
        fs::read(path).map_err(|e| open_error(path, e))
    }
}

impl Transport for HostTransport {
    fn size(&mut self, source: Source, device_partition: &str, filename: &str) -> Result<u64, TransportError> {
        let path = self.file_path(source, device_partition, filename)?;
        let meta = fs::metadata(&path).map_err(|e| open_error(&path, e))?;
        Ok(meta.len())
    }

    fn fetch(
        &mut self,
        source: Source,
        device_partition: &str,
        filename: &str,
        dest: &mut [u8],
        offset: u64,
    ) -> Result<(), TransportError> {
        let path = self.file_path(source, device_partition, filename)?;
        let mut file = File::open(&path).map_err(|e| open_error(&path, e))?;
        let size = file.metadata()?.len();
        let fits = offset
            .checked_add(dest.len() as u64)
            .map_or(false, |end| end <= size);
        if !fits {
            return Err(TransportError::OutOfRange {
                offset,
                len: dest.len() as u64,
                size,
            });
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(dest)?;
        Ok(())
    }

    fn load(&mut self, transfer: &DirectTransfer, load_addr: u64) -> Result<u64, TransportError> {
        let data = match transfer {
            DirectTransfer::Net { source, path } => {
                Self::read_file(&self.file_path(*source, "", path)?)?
            }
            DirectTransfer::File {
                source,
                device_partition,
                filename,
                ..
            } => Self::read_file(&self.file_path(*source, device_partition, filename)?)?,
            DirectTransfer::NandRaw { partition, len } => {
                let nand = self
                    .nand
                    .as_mut()
                    .ok_or(TransportError::Unavailable(Source::Nand))?;
                let mut data = vec![0u8; *len as usize];
                let mut read = data.len();
                nand.read_skip_bad(partition.offset, &mut read, &mut data, partition.size)?;
                data.truncate(read);
                data
            }
            DirectTransfer::UbiFs {
                partition,
                filename,
            } => {
                let root = self
                    .ubifs
                    .as_ref()
                    .ok_or(TransportError::Unavailable(Source::Nand))?;
                Self::read_file(&root.join(&partition.name).join(filename.trim_start_matches('/')))?
            }
        };

        let len = data.len() as u64;
        self.loaded = Some(LoadedImage {
            addr: load_addr,
            data,
        });
        Ok(len)
    }

    fn nand(&mut self) -> Option<&mut dyn NandDevice> {
        self.nand.as_mut().map(|n| n as &mut dyn NandDevice)
    }
}

/// Raw NAND dump with a list of bad erase blocks.
pub struct FileNand {
    file: File,
    size: u64,
    write_size: usize,
    erase_size: u64,
    bad_blocks: BTreeSet<u64>,
}

impl FileNand {
    pub fn open(
        path: impl AsRef<Path>,
        write_size: usize,
        erase_size: u64,
        bad_blocks: impl IntoIterator<Item = u64>,
    ) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        if write_size == 0 || erase_size == 0 || erase_size % write_size as u64 != 0 {
            return Err(Error::InvalidSize(format!(
                "erase size {:#x} / write size {:#x}",
                erase_size, write_size
            )));
        }
        Ok(FileNand {
            file,
            size,
            write_size,
            erase_size,
            bad_blocks: bad_blocks.into_iter().collect(),
        })
    }

    pub fn from_config(config: &NandConfig) -> Result<Self, Error> {
        Self::open(
            &config.image,
            config.write_size.bytes() as usize,
            config.erase_size.bytes(),
            config.bad_blocks.iter().copied(),
        )
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_bad(&self, offset: u64) -> bool {
        self.bad_blocks.contains(&(offset / self.erase_size))
    }
}

impl NandDevice for FileNand {
    fn write_size(&self) -> usize {
        self.write_size
    }

    fn read_skip_bad(
        &mut self,
        offset: u64,
        len: &mut usize,
        buf: &mut [u8],
        max_size: u64,
    ) -> Result<(), TransportError> {
        let want = *len;
        let limit = offset.saturating_add(max_size).min(self.size);
        let out_of_range = TransportError::OutOfRange {
            offset,
            len: want as u64,
            size: max_size,
        };
        if buf.len() < want {
            return Err(out_of_range);
        }

        let mut done = 0;
        let mut pos = offset;
        *len = 0;
        while done < want {
            if pos >= limit {
                return Err(out_of_range);
            }
            let block_end = (pos / self.erase_size + 1) * self.erase_size;
            if self.is_bad(pos) {
                log::debug!("Skipping bad block {:#x}", pos - pos % self.erase_size);
                pos = block_end;
                continue;
            }

            let n = ((want - done) as u64).min(block_end - pos).min(limit - pos) as usize;
            self.file.seek(SeekFrom::Start(pos))?;
            self.file.read_exact(&mut buf[done..done + n])?;
            done += n;
            pos += n as u64;
            *len = done;
        }

        Ok(())
    }
}

/// Writes streamed chunks into a disk image at the target partition.
pub struct FileSink {
    file: File,
    hasher: Sha256,
    bar: Option<ProgressBar>,
    written: u64,
    digest: Option<Vec<u8>>,
}

impl FileSink {
    /// Opens `path` for writing without truncating it, so the other
    /// partitions of the image survive.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileSink {
            file,
            hasher: Sha256::new(),
            bar: None,
            written: 0,
            digest: None,
        })
    }

    pub fn with_progress(mut self) -> Self {
        self.bar = Some(get_bar());
        self
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// SHA-256 of the data of the last finished transfer.
    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }

    /// Reads back the `len` bytes written to `target` and hashes them.
    pub fn readback_digest(&mut self, target: &Partition, len: u64) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(target.offset))?;
        let mut hasher = Sha256::new();
        let mut reader = (&mut self.file).take(len);
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let size = reader.read(&mut buf)?;
            if size == 0 {
                break;
            }
            hasher.update(&buf[..size]);
        }
        Ok(hasher.finalize().to_vec())
    }
}

impl OtfSink for FileSink {
    fn write_chunk(&mut self, chunk: &OtfChunk<'_>) -> Result<(), SinkError> {
        let len = chunk.data.len() as u64;
        let position = chunk
            .offset
            .checked_add(len)
            .filter(|&end| end <= chunk.target.size)
            .and_then(|end| chunk.target.offset.checked_add(end))
            .map(|_| chunk.target.offset + chunk.offset);
        let position = match position {
            Some(position) => position,
            None => {
                log::error!(
                    "Image does not fit in '{}' ({:#x}+{:#x} > {:#x})",
                    chunk.target.name,
                    chunk.offset,
                    len,
                    chunk.target.size
                );
                return Err(SinkError::OutOfBounds);
            }
        };

        if chunk.is_first() {
            log::info!("Program '{}' at {:#x}", chunk.target.name, chunk.target.offset);
            self.hasher = Sha256::new();
            self.written = 0;
            self.digest = None;
        }

        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(chunk.data)?;
        self.hasher.update(chunk.data);
        self.written += len;
        if let Some(bar) = &self.bar {
            bar.inc(len);
        }

        if chunk.is_last() {
            self.file.flush()?;
            self.file.sync_data()?;
            let digest = self.hasher.finalize_reset().to_vec();
            if let Some(bar) = &self.bar {
                bar.finish_and_clear();
            }
            log::info!(
                "Program done {} sha256 {}",
                HumanBytes(self.written),
                hex::encode(&digest)
            );
            self.digest = Some(digest);
        }

        Ok(())
    }
}
