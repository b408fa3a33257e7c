use crate::size::{parse_memsize, MemSize};
use crate::Error;
use serde::Deserialize;

/// A named byte range on a storage device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Partition {
    pub name: String,
    #[serde(deserialize_with = "de_size")]
    pub offset: u64,
    #[serde(deserialize_with = "de_size")]
    pub size: u64,
}

fn de_size<'de, D: serde::Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    MemSize::deserialize(de).map(u64::from)
}

impl Partition {
    pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
        Partition {
            name: name.into(),
            offset,
            size,
        }
    }
}

pub trait PartitionTable {
    fn find_partition(&self, name: &str) -> Option<Partition>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PartitionMap {
    entries: Vec<Partition>,
}

impl PartitionMap {
    pub fn new(entries: Vec<Partition>) -> Self {
        PartitionMap { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses an `mtdparts` definition such as
    /// `nand0:1M(uboot),4M@2M(linux)ro,-(rootfs)`.
    ///
    /// `-` takes the rest of the device, which is `device_size` bytes long.
    /// Several devices may be given separated by `;`; their partitions are
    /// all placed in one table.
    pub fn from_mtdparts(mtdparts: &str, device_size: u64) -> Result<Self, Error> {
        let mtdparts = mtdparts.strip_prefix("mtdparts=").unwrap_or(mtdparts);
        let mut entries = Vec::new();

        for device in mtdparts.split(';').filter(|d| !d.is_empty()) {
            let (_id, list) = device
                .split_once(':')
                .ok_or_else(|| Error::InvalidPartitions(format!("missing ':' in '{}'", device)))?;
            let mut cursor = 0u64;

            for def in list.split(',') {
                let (size, rest) = if let Some(rest) = def.strip_prefix('-') {
                    (device_size.saturating_sub(cursor), rest)
                } else {
                    parse_memsize(def)?
                };
                let (offset, rest) = match rest.strip_prefix('@') {
                    Some(rest) => parse_memsize(rest)?,
                    None => (cursor, rest),
                };
                let name = rest
                    .strip_prefix('(')
                    .and_then(|r| r.split_once(')'))
                    .map(|(name, _flags)| name)
                    .ok_or_else(|| Error::InvalidPartitions(format!("unnamed partition '{}'", def)))?;

                let end = offset
                    .checked_add(size)
                    .filter(|&end| end <= device_size)
                    .ok_or_else(|| {
                        Error::InvalidPartitions(format!(
                            "'{}' ends past the device ({:#x}@{:#x} > {:#x})",
                            name, size, offset, device_size
                        ))
                    })?;
                cursor = end;
                entries.push(Partition::new(name, offset, size));
            }
        }

        Ok(PartitionMap { entries })
    }
}

impl PartitionTable for PartitionMap {
    fn find_partition(&self, name: &str) -> Option<Partition> {
        self.entries.iter().find(|p| p.name == name).cloned()
    }
}

impl PartitionTable for Vec<Partition> {
    fn find_partition(&self, name: &str) -> Option<Partition> {
        self.iter().find(|p| p.name == name).cloned()
    }
}
