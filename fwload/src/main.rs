use env_logger::Env;
use fwload::{
    host::{FileNand, FileSink, HostTransport},
    probe::is_ubi,
    size::MemSize,
    Command, Config, Error, LoadPolicy, LoadStatus, Loader, OtfChunk, OtfFlags, OtfSink,
    PartitionMap, PartitionTable, Resolver, Source, Transport, TransportError,
};
use main_error::MainError;
use std::fs::write;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
struct Common {
    /// Path to fwload.toml, default to the bundled board config
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,
}

#[derive(StructOpt)]
struct LoadOpt {
    #[structopt(flatten)]
    common: Common,
    /// Object to load, e.g. linux, fdt
    object: String,
    /// <source> [source specific arguments]
    args: Vec<String>,
    /// required, try or no
    #[structopt(long, default_value = "required")]
    policy: LoadPolicy,
    /// Load address, default to $loadaddr
    #[structopt(long, parse(try_from_str = parse_int::parse))]
    load_addr: Option<u64>,
    /// Write the loaded image to a file
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Use the update default filenames
    #[structopt(long)]
    update: bool,
}

#[derive(StructOpt)]
struct UpdateOpt {
    #[structopt(flatten)]
    common: Common,
    /// Object to update, e.g. uboot, linux, rootfs
    object: String,
    /// <source> [source specific arguments]
    args: Vec<String>,
    /// Disk image to write into
    #[structopt(short, long, parse(from_os_str))]
    target: PathBuf,
    /// Target partition, default to the object name
    #[structopt(short, long)]
    partition: Option<String>,
    /// required, try or no
    #[structopt(long, default_value = "required")]
    policy: LoadPolicy,
}

#[derive(StructOpt)]
struct ProbeOpt {
    #[structopt(flatten)]
    common: Common,
    /// NAND partition
    partition: String,
}

#[derive(StructOpt)]
enum Opt {
    /// Load an image into memory
    Load(LoadOpt),
    /// Stream an image onto a partition of a disk image
    Update(UpdateOpt),
    /// Check whether a NAND partition holds UBI
    Probe(ProbeOpt),
    /// List the partition table
    Parts(Common),
}

struct Board {
    config: Config,
    transport: HostTransport,
    partitions: PartitionMap,
}

impl Board {
    fn open(common: &Common) -> Result<Self, Error> {
        let config = Config::load(common.config.as_deref())?;
        let transport = HostTransport::from_config(&config)?;
        let partitions = config.partition_table(transport.nand_device().map(FileNand::size))?;
        Ok(Board {
            config,
            transport,
            partitions,
        })
    }

    fn resolver(&self, command: Command) -> Resolver<'_> {
        Resolver::new(self.config.sources, &self.partitions, &self.config.env)
            .command(command)
            .kernel_var(&self.config.default_kernel_var)
    }
}

fn load(opt: LoadOpt) -> Result<(), Error> {
    let board = Board::open(&opt.common)?;
    let command = if opt.update {
        Command::Update
    } else {
        Command::Dboot
    };
    let mut request = board
        .resolver(command)
        .resolve(&opt.object, &opt.args[..])?
        .with_policy(opt.policy);
    request.load_addr = opt.load_addr;
    log::trace!("Request: {:x?}", request);

    let mut loader = Loader::new(
        board.transport,
        &board.config.env,
        board.config.loader_config(),
    );
    let status = loader.load_firmware(&request)?;
    let mut transport = loader.into_inner();

    match (status, transport.take_loaded(), opt.output) {
        (LoadStatus::Loaded, Some(image), Some(output)) => {
            write(&output, &image.data)?;
            log::info!("Saved {:#x} image to {}", image.addr, output.display());
        }
        (LoadStatus::NotLoaded, _, _) => log::info!("{} not loaded", opt.object),
        _ => {}
    }

    Ok(())
}

fn update(opt: UpdateOpt) -> Result<(), Error> {
    let board = Board::open(&opt.common)?;
    let request = board
        .resolver(Command::Update)
        .resolve(&opt.object, &opt.args[..])?
        .with_policy(opt.policy);

    let name = opt.partition.as_deref().unwrap_or(&opt.object);
    let target = board
        .partitions
        .find_partition(name)
        .ok_or_else(|| Error::PartitionNotFound(name.to_string()))?;

    let mut sink = FileSink::open(&opt.target)?.with_progress();
    let mut loader = Loader::new(
        board.transport,
        &board.config.env,
        board.config.loader_config(),
    );
    loader.register_otf(
        Box::new(|chunk: &OtfChunk<'_>| sink.write_chunk(chunk)),
        target.clone(),
    );
    let status = loader.load_firmware(&request)?;
    let mut transport = loader.into_inner();

    if status == LoadStatus::NotLoaded {
        log::info!("Nothing written to '{}'", target.name);
        return Ok(());
    }

    // sources that cannot stream were loaded whole
    if let Some(image) = transport.take_loaded() {
        let chunk = OtfChunk {
            data: &image.data,
            load_addr: image.addr,
            flags: OtfFlags::INIT | OtfFlags::FLUSH,
            target: &target,
            offset: 0,
        };
        sink.write_chunk(&chunk)
            .map_err(|status| Error::ChunkWriteFailed { offset: 0, status })?;
    }

    if let Some(digest) = sink.digest().map(<[u8]>::to_vec) {
        let written = sink.written();
        let readback = sink.readback_digest(&target, written)?;
        if readback == digest {
            log::info!("Success");
        } else {
            log::warn!(
                "sha256 not match: {} != {}",
                hex::encode(&readback),
                hex::encode(&digest)
            );
        }
    }

    Ok(())
}

fn probe(opt: ProbeOpt) -> Result<(), Error> {
    let mut board = Board::open(&opt.common)?;
    let part = board
        .partitions
        .find_partition(&opt.partition)
        .ok_or_else(|| Error::PartitionNotFound(opt.partition.clone()))?;
    let nand = board
        .transport
        .nand()
        .ok_or(Error::TransportFailed {
            from: Source::Nand,
            source: TransportError::Unavailable(Source::Nand),
        })?;

    let kind = if is_ubi(nand, &part) { "ubi" } else { "raw" };
    println!("{}: {}", part.name, kind);

    Ok(())
}

fn parts(opt: Common) -> Result<(), Error> {
    let board = Board::open(&opt)?;
    if board.partitions.is_empty() {
        log::warn!("No partitions defined");
        return Ok(());
    }
    for part in board.partitions.iter() {
        println!(
            "{:<16} {:#010x} {:>8}",
            part.name,
            part.offset,
            MemSize(part.size).to_string()
        );
    }

    Ok(())
}

#[paw::main]
fn main(args: Opt) -> Result<(), MainError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("fwload=info"))
        .format_timestamp(None)
        .init();

    match args {
        Opt::Load(opt) => load(opt)?,
        Opt::Update(opt) => update(opt)?,
        Opt::Probe(opt) => probe(opt)?,
        Opt::Parts(opt) => parts(opt)?,
    };

    Ok(())
}
