use crate::partition::Partition;
use crate::transport::TransportError;
use byteorder::{NativeEndian, ReadBytesExt};

/// "UBI#" read as a host-endian word.
pub const UBI_MAGIC: u32 = 0x2349_4255;

/// Raw NAND access.
pub trait NandDevice {
    /// Page size in bytes.
    fn write_size(&self) -> usize;

    /// Reads `*len` bytes at `offset` into `buf`, skipping bad erase blocks.
    /// The read may not span more than `max_size` bytes of media, bad blocks
    /// included. On return `*len` holds the number of bytes actually read.
    fn read_skip_bad(
        &mut self,
        offset: u64,
        len: &mut usize,
        buf: &mut [u8],
        max_size: u64,
    ) -> Result<(), TransportError>;
}

/// Checks whether `part` starts with a UBI erase counter header.
///
/// Unreadable media is reported as not UBI.
pub fn is_ubi(nand: &mut dyn NandDevice, part: &Partition) -> bool {
    let mut len = nand.write_size();
    let mut page = vec![0u8; len];

    if let Err(e) = nand.read_skip_bad(part.offset, &mut len, &mut page, part.size) {
        log::debug!("Cannot read first page of '{}': {}", part.name, e);
        return false;
    }

    match (&page[..len.min(page.len())]).read_u32::<NativeEndian>() {
        Ok(magic) => {
            log::trace!("'{}' magic {:#010x}", part.name, magic);
            magic == UBI_MAGIC
        }
        Err(_) => false,
    }
}
