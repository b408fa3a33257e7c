//! On-the-fly update: streaming an image onto its target partition in
//! chunks instead of loading it whole into RAM first.

use crate::error::SinkError;
use crate::partition::Partition;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OtfFlags: u8 {
        /// First chunk of a transfer.
        const INIT = 0b01;
        /// Last chunk of a transfer, the sink must finish writing.
        const FLUSH = 0b10;
    }
}

/// Bookkeeping for the transfer in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtfState {
    pub target: Partition,
    pub flags: OtfFlags,
    /// Bytes written so far.
    pub offset: u64,
    /// Length of the current chunk.
    pub len: u64,
    /// Staging area of the current chunk.
    pub load_addr: Option<u64>,
}

impl OtfState {
    pub fn new(target: Partition) -> Self {
        OtfState {
            target,
            flags: OtfFlags::INIT,
            offset: 0,
            len: 0,
            load_addr: None,
        }
    }

    /// Starts over for a new transfer to the same target.
    pub fn reset(&mut self) {
        self.flags = OtfFlags::INIT;
        self.offset = 0;
        self.len = 0;
        self.load_addr = None;
    }
}

/// View of one staged chunk handed to the sink.
#[derive(Debug)]
pub struct OtfChunk<'a> {
    pub data: &'a [u8],
    pub load_addr: u64,
    pub flags: OtfFlags,
    pub target: &'a Partition,
    /// Position of `data` within the image.
    pub offset: u64,
}

impl OtfChunk<'_> {
    pub fn is_first(&self) -> bool {
        self.flags.contains(OtfFlags::INIT)
    }

    pub fn is_last(&self) -> bool {
        self.flags.contains(OtfFlags::FLUSH)
    }
}

/// Writes streamed chunks to the target media.
pub trait OtfSink {
    fn write_chunk(&mut self, chunk: &OtfChunk<'_>) -> Result<(), SinkError>;
}

impl<F> OtfSink for F
where
    F: FnMut(&OtfChunk<'_>) -> Result<(), SinkError>,
{
    fn write_chunk(&mut self, chunk: &OtfChunk<'_>) -> Result<(), SinkError> {
        self(chunk)
    }
}

/// Single slot for the sink of the next on-the-fly transfer.
///
/// Registering replaces whatever sink was there before.
#[derive(Default)]
pub struct OtfRegistry<'a> {
    hook: Option<Box<dyn OtfSink + 'a>>,
    state: Option<OtfState>,
}

impl<'a> OtfRegistry<'a> {
    pub fn new() -> Self {
        OtfRegistry {
            hook: None,
            state: None,
        }
    }

    pub fn register(&mut self, hook: Box<dyn OtfSink + 'a>, target: Partition) {
        if self.hook.is_some() {
            log::debug!("Replacing on-the-fly hook");
        }
        self.hook = Some(hook);
        self.state = Some(OtfState::new(target));
    }

    /// Drops the hook. The state of the last transfer stays readable.
    pub fn unregister(&mut self) -> Option<Box<dyn OtfSink + 'a>> {
        self.hook.take()
    }

    pub fn is_registered(&self) -> bool {
        self.hook.is_some()
    }

    pub fn state(&self) -> Option<&OtfState> {
        self.state.as_ref()
    }

    /// The hook and the state it writes with, if a hook is registered.
    pub(crate) fn active(&mut self) -> Option<(&mut (dyn OtfSink + 'a), &mut OtfState)> {
        match (self.hook.as_mut(), self.state.as_mut()) {
            (Some(hook), Some(state)) => Some((&mut **hook, state)),
            _ => None,
        }
    }
}
