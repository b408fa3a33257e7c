use crate::env::Environment;
use crate::partition::{Partition, PartitionTable};
use crate::Error;
use serde::Deserialize;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Tftp,
    Nfs,
    Nand,
    Usb,
    Mmc,
    Ram,
    Sata,
}

impl Source {
    /// Matching order used when resolving a source token.
    pub const ALL: [Source; 7] = [
        Source::Tftp,
        Source::Nfs,
        Source::Nand,
        Source::Usb,
        Source::Mmc,
        Source::Ram,
        Source::Sata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Source::Tftp => "tftp",
            Source::Nfs => "nfs",
            Source::Nand => "nand",
            Source::Usb => "usb",
            Source::Mmc => "mmc",
            Source::Ram => "ram",
            Source::Sata => "sata",
        }
    }

    fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Sources read through a filesystem on a block device.
    pub fn is_mass_storage(self) -> bool {
        matches!(self, Source::Usb | Source::Mmc | Source::Sata)
    }

    /// Positional index of the filename in the resolver arguments.
    fn filename_index(self) -> Option<usize> {
        match self {
            Source::Tftp | Source::Nfs => Some(1),
            Source::Nand => Some(2),
            Source::Usb | Source::Mmc | Source::Sata => Some(3),
            Source::Ram => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Source::ALL
            .iter()
            .copied()
            .find(|src| src.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UndefinedSource(s.to_string()))
    }
}

/// Set of sources compiled into the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct SourceSet(u32);

impl SourceSet {
    pub fn all() -> Self {
        Source::ALL.iter().copied().collect()
    }

    pub fn empty() -> Self {
        SourceSet(0)
    }

    pub fn contains(self, source: Source) -> bool {
        self.0 & source.bit() != 0
    }

    pub fn insert(&mut self, source: Source) {
        self.0 |= source.bit();
    }

    pub fn remove(&mut self, source: Source) {
        self.0 &= !source.bit();
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self::all()
    }
}

impl std::iter::FromIterator<Source> for SourceSet {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        let mut set = SourceSet::empty();
        for source in iter {
            set.insert(source);
        }
        set
    }
}

impl TryFrom<Vec<String>> for SourceSet {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self, Error> {
        names.iter().map(|name| name.parse::<Source>()).collect()
    }
}

/// Whether a missing or failed load is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    Required,
    Try,
    Skip,
}

impl LoadPolicy {
    /// Interprets the value of a load variable. Absent or unrecognised
    /// values mean the file is required.
    pub fn from_var(value: Option<&str>) -> Self {
        match value {
            Some("no") => LoadPolicy::Skip,
            Some("try") => LoadPolicy::Try,
            _ => LoadPolicy::Required,
        }
    }
}

impl Default for LoadPolicy {
    fn default() -> Self {
        LoadPolicy::Required
    }
}

impl FromStr for LoadPolicy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LoadPolicy::from_var(Some(s)))
    }
}

/// The command a request is resolved for. Only affects default filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Dboot,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRequest {
    pub source: Source,
    pub device_partition: Option<String>,
    pub filesystem: Option<String>,
    pub filename: Option<String>,
    /// Only set for NAND sources.
    pub partition: Option<Partition>,
    pub policy: LoadPolicy,
    pub load_addr: Option<u64>,
}

impl FirmwareRequest {
    pub fn new(source: Source) -> Self {
        FirmwareRequest {
            source,
            device_partition: None,
            filesystem: None,
            filename: None,
            partition: None,
            policy: LoadPolicy::Required,
            load_addr: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Default filename for `object` when none was given on the command line.
pub fn default_filename(
    object: &str,
    command: Command,
    env: &dyn Environment,
    kernel_var: &str,
) -> Option<String> {
    match command {
        Command::Dboot => match object {
            "linux" | "android" => env.get(kernel_var),
            _ => None,
        },
        Command::Update => match object {
            "uboot" => env.get("uboot_file"),
            _ => env.get(&format!("{}_file", object)),
        },
    }
}

pub struct Resolver<'a> {
    enabled: SourceSet,
    partitions: &'a dyn PartitionTable,
    env: &'a dyn Environment,
    command: Command,
    kernel_var: String,
}

impl<'a> Resolver<'a> {
    pub fn new(
        enabled: SourceSet,
        partitions: &'a dyn PartitionTable,
        env: &'a dyn Environment,
    ) -> Self {
        Resolver {
            enabled,
            partitions,
            env,
            command: Command::Dboot,
            kernel_var: crate::config::DEFAULT_KERNEL_VAR.to_string(),
        }
    }

    pub fn command(mut self, command: Command) -> Self {
        self.command = command;
        self
    }

    pub fn kernel_var(mut self, var: impl Into<String>) -> Self {
        self.kernel_var = var.into();
        self
    }

    /// Finds the source named by `token`, matched case-insensitively as a
    /// prefix of the source names in table order.
    pub fn find_source(&self, token: &str) -> Result<Source, Error> {
        let lower = token.to_ascii_lowercase();
        match Source::ALL
            .iter()
            .copied()
            .find(|src| src.name().starts_with(lower.as_str()))
        {
            Some(src) if self.enabled.contains(src) => Ok(src),
            Some(_) => Err(Error::UnsupportedSource(token.to_string())),
            None => Err(Error::UndefinedSource(token.to_string())),
        }
    }

    /// Source named by the first of `args`. No arguments means TFTP.
    pub fn resolve_source<S: AsRef<str>>(&self, args: &[S]) -> Result<Source, Error> {
        match args.first() {
            Some(token) => self.find_source(token.as_ref()),
            None => {
                log::debug!("No source given, defaulting to tftp");
                Ok(Source::Tftp)
            }
        }
    }

    /// Builds a request for `object` from the positional `args`
    /// (`<source> [source specific...]`).
    ///
    /// Without arguments the request is for TFTP with the default filename,
    /// if there is one.
    pub fn resolve<S: AsRef<str>>(&self, object: &str, args: &[S]) -> Result<FirmwareRequest, Error> {
        let arg = |i: usize| args.get(i).map(|s| s.as_ref().to_string());

        let source = self.resolve_source(args)?;
        let mut request = FirmwareRequest::new(source);
        if args.is_empty() {
            request.filename = self.fallback_filename(object);
            return Ok(request);
        }

        match source {
            Source::Usb | Source::Mmc | Source::Sata => {
                request.device_partition = arg(1);
                request.filesystem = arg(2);
            }
            Source::Nand => {
                let name = arg(1).unwrap_or_else(|| object.to_string());
                let part = self
                    .partitions
                    .find_partition(&name)
                    .ok_or(Error::PartitionNotFound(name))?;
                log::debug!("Using partition {:?}", part);
                request.partition = Some(part);
            }
            _ => {}
        }

        request.filename = source
            .filename_index()
            .and_then(arg)
            .or_else(|| self.fallback_filename(object));

        self.check_filename(request)
    }

    fn fallback_filename(&self, object: &str) -> Option<String> {
        default_filename(object, self.command, self.env, &self.kernel_var)
    }

    fn check_filename(&self, request: FirmwareRequest) -> Result<FirmwareRequest, Error> {
        if request.filename.is_none() && request.source != Source::Ram {
            return Err(Error::MissingFilename(request.source));
        }
        Ok(request)
    }
}
