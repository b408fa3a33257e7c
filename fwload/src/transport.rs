use crate::partition::Partition;
use crate::probe::NandDevice;
use crate::source::Source;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("read of {len:#x} bytes at {offset:#x} is past the end ({size:#x})")]
    OutOfRange { offset: u64, len: u64, size: u64 },
    #[error("{0} is not available on this transport")]
    Unavailable(Source),
    #[error("{0}")]
    Failed(String),
}

/// A whole-image transfer to the load address, one variant per way the
/// board can fetch an image in a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectTransfer {
    /// TFTP or NFS download.
    Net { source: Source, path: String },
    /// File read from a filesystem on removable media.
    File {
        source: Source,
        device_partition: String,
        filesystem: Option<String>,
        filename: String,
    },
    /// Positional read of a raw NAND partition.
    NandRaw { partition: Partition, len: u64 },
    /// File read from the UBIFS volume named like its partition.
    UbiFs { partition: Partition, filename: String },
}

impl DirectTransfer {
    pub fn source(&self) -> Source {
        match self {
            DirectTransfer::Net { source, .. } | DirectTransfer::File { source, .. } => *source,
            DirectTransfer::NandRaw { .. } | DirectTransfer::UbiFs { .. } => Source::Nand,
        }
    }
}

/// The operations the loader needs from the board's storage and network
/// drivers.
pub trait Transport {
    /// Size in bytes of `filename` on a mass storage source.
    fn size(
        &mut self,
        source: Source,
        device_partition: &str,
        filename: &str,
    ) -> Result<u64, TransportError>;

    /// Reads exactly `dest.len()` bytes of `filename` starting at `offset`.
    fn fetch(
        &mut self,
        source: Source,
        device_partition: &str,
        filename: &str,
        dest: &mut [u8],
        offset: u64,
    ) -> Result<(), TransportError>;

    /// Runs a whole-image transfer to `load_addr`, returning the number of
    /// bytes loaded.
    fn load(&mut self, transfer: &DirectTransfer, load_addr: u64) -> Result<u64, TransportError>;

    fn nand(&mut self) -> Option<&mut dyn NandDevice> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn size(
        &mut self,
        source: Source,
        device_partition: &str,
        filename: &str,
    ) -> Result<u64, TransportError> {
        (**self).size(source, device_partition, filename)
    }

    fn fetch(
        &mut self,
        source: Source,
        device_partition: &str,
        filename: &str,
        dest: &mut [u8],
        offset: u64,
    ) -> Result<(), TransportError> {
        (**self).fetch(source, device_partition, filename, dest, offset)
    }

    fn load(&mut self, transfer: &DirectTransfer, load_addr: u64) -> Result<u64, TransportError> {
        (**self).load(transfer, load_addr)
    }

    fn nand(&mut self) -> Option<&mut dyn NandDevice> {
        (**self).nand()
    }
}
