use crate::env::{device_partition_or_fallback, Environment};
use crate::otf::{OtfChunk, OtfFlags, OtfRegistry, OtfSink, OtfState};
use crate::partition::Partition;
use crate::probe::is_ubi;
use crate::source::{FirmwareRequest, LoadPolicy, Source};
use crate::transport::{DirectTransfer, Transport};
use crate::Error;
use indicatif::HumanBytes;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// Skipped, already in RAM, or failed while only being tried.
    NotLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub chunk_size: u64,
    pub load_addr: u64,
    /// Read UBI formatted NAND partitions through UBIFS.
    pub ubi: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            load_addr: crate::config::DEFAULT_LOAD_ADDR,
            ubi: true,
        }
    }
}

/// How a request is going to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Direct(DirectTransfer),
    Stream {
        source: Source,
        device_partition: String,
        filename: String,
    },
    /// The image is expected to be in RAM already.
    Resident,
}

pub struct Loader<'a, T> {
    transport: T,
    env: &'a dyn Environment,
    config: LoaderConfig,
    otf: OtfRegistry<'a>,
}

impl<'a, T: Transport> Loader<'a, T> {
    pub fn new(transport: T, env: &'a dyn Environment, config: LoaderConfig) -> Self {
        Loader {
            transport,
            env,
            config,
            otf: OtfRegistry::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Routes mass storage loads through `hook`, writing onto `target`.
    pub fn register_otf(&mut self, hook: Box<dyn OtfSink + 'a>, target: Partition) {
        log::debug!("On-the-fly update to '{}'", target.name);
        self.otf.register(hook, target);
    }

    pub fn unregister_otf(&mut self) -> Option<Box<dyn OtfSink + 'a>> {
        self.otf.unregister()
    }

    pub fn otf_state(&self) -> Option<&OtfState> {
        self.otf.state()
    }

    /// Address images are staged at: `loadaddr` from the environment, the
    /// configured default otherwise.
    pub fn staging_addr(&self) -> u64 {
        self.env
            .get_hex("loadaddr")
            .unwrap_or(self.config.load_addr)
    }

    pub fn load_firmware(&mut self, request: &FirmwareRequest) -> Result<LoadStatus, Error> {
        if request.policy == LoadPolicy::Skip {
            log::info!("Skipping load from {}", request.source);
            return Ok(LoadStatus::NotLoaded);
        }

        let device_partition = match &request.device_partition {
            Some(devpart) => devpart.clone(),
            None => device_partition_or_fallback(request.source, self.env),
        };
        let load_addr = request.load_addr.unwrap_or_else(|| self.staging_addr());

        let plan = self.plan(request, device_partition)?;
        match self.execute(plan, load_addr) {
            Ok(None) => Ok(LoadStatus::NotLoaded),
            Ok(Some(size)) => {
                log::info!(
                    "Loaded {} from {} at {:#x}",
                    HumanBytes(size),
                    request.source,
                    load_addr
                );
                Ok(LoadStatus::Loaded)
            }
            Err(e) if request.policy == LoadPolicy::Try => {
                log::warn!("{}, continuing without it", e);
                Ok(LoadStatus::NotLoaded)
            }
            Err(e) => Err(e),
        }
    }

    /// Picks the transfer for `request` once its device partition is known.
    pub fn plan(&mut self, request: &FirmwareRequest, device_partition: String) -> Result<Plan, Error> {
        let source = request.source;
        if source == Source::Ram {
            return Ok(Plan::Resident);
        }
        let filename = request
            .filename
            .clone()
            .ok_or(Error::MissingFilename(source))?;

        Ok(match source {
            Source::Tftp => Plan::Direct(DirectTransfer::Net {
                source,
                path: filename,
            }),
            Source::Nfs => {
                let rootpath = self.env.get("rootpath").unwrap_or_default();
                Plan::Direct(DirectTransfer::Net {
                    source,
                    path: format!("{}/{}", rootpath, filename),
                })
            }
            Source::Usb | Source::Mmc | Source::Sata if self.otf.is_registered() => Plan::Stream {
                source,
                device_partition,
                filename,
            },
            Source::Usb | Source::Mmc | Source::Sata => Plan::Direct(DirectTransfer::File {
                source,
                device_partition,
                filesystem: request.filesystem.clone(),
                filename,
            }),
            Source::Nand => {
                let partition = request
                    .partition
                    .clone()
                    .ok_or_else(|| Error::PartitionNotFound(source.to_string()))?;
                if self.config.ubi && self.probe_ubi(&partition) {
                    log::debug!("'{}' is UBI formatted", partition.name);
                    Plan::Direct(DirectTransfer::UbiFs {
                        partition,
                        filename,
                    })
                } else {
                    Plan::Direct(DirectTransfer::NandRaw {
                        len: partition.size,
                        partition,
                    })
                }
            }
            Source::Ram => Plan::Resident,
        })
    }

    fn probe_ubi(&mut self, partition: &Partition) -> bool {
        match self.transport.nand() {
            Some(nand) => is_ubi(nand, partition),
            None => false,
        }
    }

    fn execute(&mut self, plan: Plan, load_addr: u64) -> Result<Option<u64>, Error> {
        match plan {
            Plan::Resident => {
                log::info!("Image is already in RAM");
                Ok(None)
            }
            Plan::Direct(transfer) => {
                log::trace!("{:x?}", transfer);
                self.transport
                    .load(&transfer, load_addr)
                    .map(Some)
                    .map_err(|source| Error::TransportFailed {
                        from: transfer.source(),
                        source,
                    })
            }
            Plan::Stream {
                source,
                device_partition,
                filename,
            } => self
                .stream_transfer(source, &filename, &device_partition)
                .map(Some),
        }
    }

    /// Copies `filename` onto the registered target chunk by chunk.
    ///
    /// Every chunk is fetched into a staging buffer of at most `chunk_size`
    /// bytes and handed to the hook before the next one is read. The first
    /// chunk carries `INIT`, the last one `FLUSH`. Any failure ends the
    /// transfer; the state then tells how many bytes were written.
    pub fn stream_transfer(
        &mut self,
        source: Source,
        filename: &str,
        device_partition: &str,
    ) -> Result<u64, Error> {
        let chunk_size = self.config.chunk_size.max(1);
        let load_addr = self.staging_addr();
        let (hook, state) = self.otf.active().ok_or(Error::NoOtfHook)?;

        let total = self
            .transport
            .size(source, device_partition, filename)
            .map_err(Error::SizeQueryFailed)?;

        state.reset();
        state.load_addr = Some(load_addr);
        let mut staging = vec![0u8; chunk_size.min(total) as usize];
        let mut remaining = total;

        log::info!(
            "Writing {} ({}) to '{}' in {} chunks",
            filename,
            HumanBytes(total),
            state.target.name,
            (total + chunk_size - 1) / chunk_size
        );
        let start = Instant::now();

        while remaining > 0 {
            log::debug!("{} remaining bytes", remaining);
            let offset = state.offset;
            state.len = remaining.min(chunk_size);
            if remaining <= chunk_size {
                state.flags |= OtfFlags::FLUSH;
            }

            let buf = &mut staging[..state.len as usize];
            self.transport
                .fetch(source, device_partition, filename, buf, offset)
                .map_err(|source| Error::ChunkLoadFailed { offset, source })?;

            let chunk = OtfChunk {
                data: buf,
                load_addr,
                flags: state.flags,
                target: &state.target,
                offset,
            };
            hook.write_chunk(&chunk)
                .map_err(|status| Error::ChunkWriteFailed { offset, status })?;

            state.flags.remove(OtfFlags::INIT);
            state.offset += state.len;
            remaining -= state.len;
        }

        let elapsed = start.elapsed();
        log::info!(
            "Written {:?} {}/s",
            elapsed,
            HumanBytes((total as f64 / elapsed.as_millis().max(1) as f64 * 1000.0) as u64)
        );

        Ok(state.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::probe::{NandDevice, UBI_MAGIC};
    use crate::transport::TransportError;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct MockNand {
        first_page: Vec<u8>,
        broken: bool,
    }

    impl NandDevice for MockNand {
        fn write_size(&self) -> usize {
            4
        }

        fn read_skip_bad(
            &mut self,
            _offset: u64,
            len: &mut usize,
            buf: &mut [u8],
            _max_size: u64,
        ) -> Result<(), TransportError> {
            if self.broken {
                return Err(TransportError::Failed("uncorrectable".to_string()));
            }
            buf[..*len].copy_from_slice(&self.first_page[..*len]);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTransport {
        file: Vec<u8>,
        size_fails: bool,
        fetch_fails_at: Option<u64>,
        load_fails: bool,
        fetches: Vec<(u64, usize)>,
        loads: Vec<(DirectTransfer, u64)>,
        nand: Option<MockNand>,
    }

    impl Transport for MockTransport {
        fn size(&mut self, _: Source, _: &str, filename: &str) -> Result<u64, TransportError> {
            if self.size_fails {
                return Err(TransportError::NotFound(filename.to_string()));
            }
            Ok(self.file.len() as u64)
        }

        fn fetch(
            &mut self,
            _: Source,
            _: &str,
            _: &str,
            dest: &mut [u8],
            offset: u64,
        ) -> Result<(), TransportError> {
            self.fetches.push((offset, dest.len()));
            if self.fetch_fails_at == Some(offset) {
                return Err(TransportError::Failed("read error".to_string()));
            }
            let start = offset as usize;
            dest.copy_from_slice(&self.file[start..start + dest.len()]);
            Ok(())
        }

        fn load(&mut self, transfer: &DirectTransfer, load_addr: u64) -> Result<u64, TransportError> {
            self.loads.push((transfer.clone(), load_addr));
            if self.load_fails {
                return Err(TransportError::Failed("timeout".to_string()));
            }
            Ok(self.file.len() as u64)
        }

        fn nand(&mut self) -> Option<&mut dyn NandDevice> {
            self.nand.as_mut().map(|n| n as &mut dyn NandDevice)
        }
    }

    type Record = Rc<RefCell<Vec<(u64, Vec<u8>, OtfFlags)>>>;

    fn recorder(fail_at: Option<u64>) -> (Box<dyn OtfSink>, Record) {
        let record: Record = Rc::default();
        let seen = Rc::clone(&record);
        let sink = move |chunk: &OtfChunk<'_>| -> Result<(), SinkError> {
            if fail_at == Some(chunk.offset) {
                return Err(SinkError::from(-5));
            }
            seen.borrow_mut()
                .push((chunk.offset, chunk.data.to_vec(), chunk.flags));
            Ok(())
        };
        (Box::new(sink), record)
    }

    fn config(chunk_size: u64) -> LoaderConfig {
        LoaderConfig {
            chunk_size,
            load_addr: 0x8080_0000,
            ubi: true,
        }
    }

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    fn target() -> Partition {
        Partition::new("linux", 0x10_0000, 0x100)
    }

    #[test]
    fn test_stream_chunks() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());

        let written = loader.stream_transfer(Source::Mmc, "zImage", "0:1").unwrap();
        assert_eq!(written, 25);
        assert_eq!(loader.otf_state().unwrap().offset, 25);

        let record = record.borrow();
        let lens: Vec<_> = record.iter().map(|(_, data, _)| data.len()).collect();
        assert_eq!(lens, [10, 10, 5]);
        let offsets: Vec<_> = record.iter().map(|(offset, _, _)| *offset).collect();
        assert_eq!(offsets, [0, 10, 20]);
        assert_eq!(record[0].2, OtfFlags::INIT);
        assert_eq!(record[1].2, OtfFlags::empty());
        assert_eq!(record[2].2, OtfFlags::FLUSH);

        let data: Vec<u8> = record.iter().flat_map(|(_, d, _)| d.clone()).collect();
        assert_eq!(data, image(25));
        assert_eq!(loader.transport().fetches, [(0, 10), (10, 10), (20, 5)]);
    }

    #[test]
    fn test_stream_exact_multiple_and_single_chunk() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(20),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());
        assert_eq!(loader.stream_transfer(Source::Usb, "a", "0:1").unwrap(), 20);
        {
            let flags: Vec<_> = record.borrow().iter().map(|r| r.2).collect();
            assert_eq!(flags, [OtfFlags::INIT, OtfFlags::FLUSH]);
        }

        loader.transport_mut().file = image(3);
        record.borrow_mut().clear();
        assert_eq!(loader.stream_transfer(Source::Usb, "a", "0:1").unwrap(), 3);
        let flags: Vec<_> = record.borrow().iter().map(|r| r.2).collect();
        assert_eq!(flags, [OtfFlags::INIT | OtfFlags::FLUSH]);
    }

    #[test]
    fn test_stream_fetch_failure_stops() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            fetch_fails_at: Some(10),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());

        let err = loader.stream_transfer(Source::Mmc, "zImage", "0:1").unwrap_err();
        assert!(matches!(err, Error::ChunkLoadFailed { offset: 10, .. }));
        assert_eq!(loader.otf_state().unwrap().offset, 10);
        assert_eq!(record.borrow().len(), 1);
        assert_eq!(loader.transport().fetches.len(), 2);
    }

    #[test]
    fn test_stream_write_failure_stops() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(Some(10));
        loader.register_otf(sink, target());

        let err = loader.stream_transfer(Source::Mmc, "zImage", "0:1").unwrap_err();
        assert!(matches!(
            err,
            Error::ChunkWriteFailed {
                offset: 10,
                status: SinkError::Other(-5)
            }
        ));
        assert_eq!(loader.otf_state().unwrap().offset, 10);
        assert_eq!(record.borrow().len(), 1);
        assert_eq!(loader.transport().fetches, [(0, 10), (10, 10)]);
    }

    #[test]
    fn test_stream_size_failure_writes_nothing() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            size_fails: true,
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());

        let err = loader.stream_transfer(Source::Mmc, "zImage", "0:1").unwrap_err();
        assert!(matches!(err, Error::SizeQueryFailed(_)));
        assert!(record.borrow().is_empty());
        assert!(loader.transport().fetches.is_empty());
    }

    #[test]
    fn test_stream_without_hook() {
        let env: HashMap<String, String> = HashMap::new();
        let mut loader = Loader::new(MockTransport::default(), &env, config(10));
        assert!(matches!(
            loader.stream_transfer(Source::Mmc, "zImage", "0:1"),
            Err(Error::NoOtfHook)
        ));
    }

    #[test]
    fn test_stream_uses_env_loadaddr() {
        let mut env = HashMap::new();
        env.insert("loadaddr".to_string(), "0x90000000".to_string());
        let transport = MockTransport {
            file: image(4),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, _record) = recorder(None);
        loader.register_otf(sink, target());
        loader.stream_transfer(Source::Mmc, "zImage", "0:1").unwrap();
        assert_eq!(loader.otf_state().unwrap().load_addr, Some(0x9000_0000));
    }

    #[test]
    fn test_policy_mapping() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            load_fails: true,
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let request = FirmwareRequest::new(Source::Tftp).with_filename("recovery.img");

        assert!(matches!(
            loader.load_firmware(&request),
            Err(Error::TransportFailed {
                from: Source::Tftp,
                ..
            })
        ));
        assert_eq!(
            loader
                .load_firmware(&request.clone().with_policy(LoadPolicy::Try))
                .unwrap(),
            LoadStatus::NotLoaded
        );
        assert_eq!(loader.transport().loads.len(), 2);

        assert_eq!(
            loader
                .load_firmware(&request.clone().with_policy(LoadPolicy::Skip))
                .unwrap(),
            LoadStatus::NotLoaded
        );
        assert_eq!(loader.transport().loads.len(), 2);

        loader.transport_mut().load_fails = false;
        for policy in [LoadPolicy::Required, LoadPolicy::Try].iter() {
            assert_eq!(
                loader
                    .load_firmware(&request.clone().with_policy(*policy))
                    .unwrap(),
                LoadStatus::Loaded
            );
        }
    }

    #[test]
    fn test_ram_is_resident() {
        let env: HashMap<String, String> = HashMap::new();
        let mut loader = Loader::new(MockTransport::default(), &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());
        for policy in [LoadPolicy::Required, LoadPolicy::Try].iter() {
            let request = FirmwareRequest::new(Source::Ram).with_policy(*policy);
            assert_eq!(loader.load_firmware(&request).unwrap(), LoadStatus::NotLoaded);
        }
        assert!(loader.transport().loads.is_empty());
        assert!(loader.transport().fetches.is_empty());
        assert!(record.borrow().is_empty());
    }

    #[test]
    fn test_network_transfers() {
        let mut env = HashMap::new();
        env.insert("rootpath".to_string(), "/exports/rootfs".to_string());
        let mut loader = Loader::new(MockTransport::default(), &env, config(10));
        let (sink, _record) = recorder(None);
        loader.register_otf(sink, target());

        let devpart = "0:1".to_string();
        let request = FirmwareRequest::new(Source::Tftp).with_filename("zImage");
        assert_eq!(
            loader.plan(&request, devpart.clone()).unwrap(),
            Plan::Direct(DirectTransfer::Net {
                source: Source::Tftp,
                path: "zImage".to_string()
            })
        );
        let request = FirmwareRequest::new(Source::Nfs).with_filename("boot/zImage");
        assert_eq!(
            loader.plan(&request, devpart).unwrap(),
            Plan::Direct(DirectTransfer::Net {
                source: Source::Nfs,
                path: "/exports/rootfs/boot/zImage".to_string()
            })
        );
    }

    #[test]
    fn test_mass_storage_direct_with_defaults() {
        let mut env = HashMap::new();
        env.insert("mmcdev".to_string(), "1".to_string());
        let transport = MockTransport {
            file: image(8),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));

        let mut request = FirmwareRequest::new(Source::Mmc).with_filename("zImage");
        request.filesystem = Some("fat".to_string());
        assert_eq!(loader.load_firmware(&request).unwrap(), LoadStatus::Loaded);

        let request = FirmwareRequest::new(Source::Sata).with_filename("zImage");
        loader.load_firmware(&request).unwrap();

        let loads = &loader.transport().loads;
        assert_eq!(
            loads[0],
            (
                DirectTransfer::File {
                    source: Source::Mmc,
                    device_partition: "1:1".to_string(),
                    filesystem: Some("fat".to_string()),
                    filename: "zImage".to_string(),
                },
                0x8080_0000
            )
        );
        assert!(matches!(
            &loads[1].0,
            DirectTransfer::File { device_partition, .. } if device_partition == "0:1"
        ));
    }

    #[test]
    fn test_mass_storage_streams_with_hook() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, record) = recorder(None);
        loader.register_otf(sink, target());

        let mut request = FirmwareRequest::new(Source::Usb).with_filename("rootfs.ext4");
        request.device_partition = Some("0:2".to_string());
        assert_eq!(loader.load_firmware(&request).unwrap(), LoadStatus::Loaded);
        assert_eq!(record.borrow().len(), 3);
        assert!(loader.transport().loads.is_empty());

        assert!(loader.unregister_otf().is_some());
        assert_eq!(loader.load_firmware(&request).unwrap(), LoadStatus::Loaded);
        assert_eq!(record.borrow().len(), 3);
        assert_eq!(loader.transport().loads.len(), 1);
    }

    #[test]
    fn test_stream_failure_under_try() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            file: image(25),
            fetch_fails_at: Some(20),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        let (sink, _record) = recorder(None);
        loader.register_otf(sink, target());

        let request = FirmwareRequest::new(Source::Mmc).with_filename("zImage");
        assert!(matches!(
            loader.load_firmware(&request),
            Err(Error::ChunkLoadFailed { offset: 20, .. })
        ));
        let request = request.with_policy(LoadPolicy::Try);
        assert_eq!(loader.load_firmware(&request).unwrap(), LoadStatus::NotLoaded);
    }

    fn nand_request() -> FirmwareRequest {
        let mut request = FirmwareRequest::new(Source::Nand).with_filename("zImage");
        request.partition = Some(Partition::new("linux", 0x20_0000, 0x80_0000));
        request
    }

    #[test]
    fn test_nand_ubi_partition() {
        let env: HashMap<String, String> = HashMap::new();
        let transport = MockTransport {
            nand: Some(MockNand {
                first_page: UBI_MAGIC.to_ne_bytes().to_vec(),
                broken: false,
            }),
            ..Default::default()
        };
        let mut loader = Loader::new(transport, &env, config(10));
        assert_eq!(
            loader.plan(&nand_request(), "0:1".to_string()).unwrap(),
            Plan::Direct(DirectTransfer::UbiFs {
                partition: Partition::new("linux", 0x20_0000, 0x80_0000),
                filename: "zImage".to_string(),
            })
        );

        let mut config = config(10);
        config.ubi = false;
        let transport = loader.into_inner();
        let mut loader = Loader::new(transport, &env, config);
        assert_eq!(
            loader.plan(&nand_request(), "0:1".to_string()).unwrap(),
            Plan::Direct(DirectTransfer::NandRaw {
                partition: Partition::new("linux", 0x20_0000, 0x80_0000),
                len: 0x80_0000,
            })
        );
    }

    #[test]
    fn test_nand_raw_partition() {
        let env: HashMap<String, String> = HashMap::new();
        for nand in vec![
            Some(MockNand {
                first_page: vec![0xff; 4],
                broken: false,
            }),
            Some(MockNand {
                first_page: UBI_MAGIC.to_ne_bytes().to_vec(),
                broken: true,
            }),
            None,
        ] {
            let transport = MockTransport {
                nand,
                ..Default::default()
            };
            let mut loader = Loader::new(transport, &env, config(10));
            assert_eq!(
                loader.load_firmware(&nand_request()).unwrap(),
                LoadStatus::Loaded
            );
            assert!(matches!(
                &loader.transport().loads[0].0,
                DirectTransfer::NandRaw { len: 0x80_0000, .. }
            ));
        }
    }

    #[test]
    fn test_missing_filename() {
        let env: HashMap<String, String> = HashMap::new();
        let mut loader = Loader::new(MockTransport::default(), &env, config(10));
        let request = FirmwareRequest::new(Source::Tftp).with_policy(LoadPolicy::Try);
        assert!(matches!(
            loader.load_firmware(&request),
            Err(Error::MissingFilename(Source::Tftp))
        ));
    }
}
