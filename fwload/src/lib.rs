pub mod config;
pub mod env;
mod error;
pub mod host;
pub mod loader;
pub mod otf;
pub mod partition;
pub mod probe;
pub mod size;
pub mod source;
pub mod transport;

pub use config::Config;
pub use error::{sink_status, Error, SinkError};
pub use loader::{LoadStatus, Loader, LoaderConfig};
pub use otf::{OtfChunk, OtfFlags, OtfSink};
pub use partition::{Partition, PartitionMap, PartitionTable};
pub use source::{Command, FirmwareRequest, LoadPolicy, Resolver, Source, SourceSet};
pub use transport::{DirectTransfer, Transport, TransportError};
