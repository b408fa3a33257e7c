use crate::loader::LoaderConfig;
use crate::partition::PartitionMap;
use crate::size::MemSize;
use crate::source::SourceSet;
use crate::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: u64 = 32 << 20;
pub const DEFAULT_LOAD_ADDR: u64 = 0x8080_0000;
pub const DEFAULT_KERNEL_VAR: &str = "zimage";
pub const DEFAULT_CONFIG: &str = include_str!("../cfg/fwload.toml");
const CONFIG_FILE: &str = "fwload.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sources the board was built with.
    pub sources: SourceSet,
    pub chunk_size: MemSize,
    pub load_addr: MemSize,
    pub default_kernel_var: String,
    pub ubi: bool,
    pub mtdparts: Option<String>,
    pub env: BTreeMap<String, String>,
    #[serde(rename = "partition")]
    pub partitions: PartitionMap,
    /// Directory backing each source on the host.
    pub storage: BTreeMap<String, PathBuf>,
    pub nand: Option<NandConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NandConfig {
    pub image: PathBuf,
    #[serde(default = "NandConfig::default_write_size")]
    pub write_size: MemSize,
    #[serde(default = "NandConfig::default_erase_size")]
    pub erase_size: MemSize,
    /// Indices of bad erase blocks.
    #[serde(default)]
    pub bad_blocks: Vec<u64>,
    /// Directory holding one subdirectory per UBIFS volume.
    pub ubifs: Option<PathBuf>,
}

impl NandConfig {
    fn default_write_size() -> MemSize {
        MemSize(2048)
    }

    fn default_erase_size() -> MemSize {
        MemSize(128 << 10)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sources: SourceSet::all(),
            chunk_size: MemSize(DEFAULT_CHUNK_SIZE),
            load_addr: MemSize(DEFAULT_LOAD_ADDR),
            default_kernel_var: DEFAULT_KERNEL_VAR.to_string(),
            ubi: true,
            mtdparts: None,
            env: BTreeMap::new(),
            partitions: PartitionMap::default(),
            storage: BTreeMap::new(),
            nand: None,
        }
    }
}

impl Config {
    /// Reads `path`, or `fwload.toml` in the working directory, falling back
    /// to the bundled defaults when neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let text = match path {
            Some(path) => read_to_string(path)?,
            None if Path::new(CONFIG_FILE).exists() => read_to_string(CONFIG_FILE)?,
            None => DEFAULT_CONFIG.to_string(),
        };
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(text)?;
        if config.chunk_size.bytes() == 0 {
            return Err(Error::InvalidSize("chunk_size = 0".to_string()));
        }
        Ok(config)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            chunk_size: self.chunk_size.bytes(),
            load_addr: self.load_addr.bytes(),
            ubi: self.ubi,
        }
    }

    /// All partitions: the `[[partition]]` entries followed by the ones from
    /// `mtdparts`, which needs the size of the NAND device.
    pub fn partition_table(&self, device_size: Option<u64>) -> Result<PartitionMap, Error> {
        let mut entries: Vec<_> = self.partitions.iter().cloned().collect();
        if let Some(mtdparts) = &self.mtdparts {
            let device_size = device_size.ok_or_else(|| {
                Error::InvalidPartitions("mtdparts without a NAND device".to_string())
            })?;
            entries.extend(PartitionMap::from_mtdparts(mtdparts, device_size)?.iter().cloned());
        }
        Ok(PartitionMap::new(entries))
    }
}
