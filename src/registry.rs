//! Handle-based registry of sessions.
//!
//! Callers that cannot hold a [`Session`] directly (a C-style boundary, a
//! scripting bridge) address sessions through small integer handles, much
//! like file descriptors. Freed slots are reused lowest-index first before
//! the table grows, and the table never shrinks.
//!
//! The registry itself is not synchronized; wrap it in a mutex if several
//! threads create or release handles.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, ErrorCode, Result};
use crate::session::Session;
use crate::transport::{SerialConfig, SerialTransport, Transport};

/// Raw handle value returned to handle-based callers on failure.
pub const INVALID_HANDLE: i32 = -1;

/// Most sessions a registry can hold; every index fits a non-negative `i32`.
pub const MAX_HANDLES: usize = 1 << 31;

/// Index of a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the handle as a C-style integer.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        i32::try_from(self.0).unwrap_or(INVALID_HANDLE)
    }
}

impl TryFrom<i32> for Handle {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self> {
        usize::try_from(raw)
            .map(Self)
            .map_err(|_| Error::InvalidHandle(i64::from(raw)))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Factory<T> = Box<dyn FnMut() -> T + Send>;

/// Table of sessions addressed by [`Handle`].
pub struct InstanceRegistry<T> {
    slots: Vec<Option<Session<T>>>,
    factory: Factory<T>,
    limit: usize,
}

impl InstanceRegistry<SerialTransport> {
    /// Creates a registry whose sessions use serial ports.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(SerialTransport::new)
    }
}

impl<T: Transport> InstanceRegistry<T> {
    /// Creates an empty registry that builds transports with `factory`.
    #[must_use]
    pub fn new(factory: impl FnMut() -> T + Send + 'static) -> Self {
        Self {
            slots: Vec::new(),
            factory: Box::new(factory),
            limit: MAX_HANDLES,
        }
    }

    /// Caps the number of sessions the registry holds at once.
    ///
    /// Values above [`MAX_HANDLES`] are lowered to it.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_HANDLES);
        self
    }

    /// Connects a new session and stores it in the lowest free slot.
    ///
    /// The free slot is picked before the transport is built, so a full
    /// registry fails with [`Error::RegistryFull`] without touching a device.
    pub fn create(&mut self, config: SerialConfig) -> Result<Handle> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        if index >= self.limit {
            return Err(Error::RegistryFull { limit: self.limit });
        }

        let mut session = Session::new((self.factory)());
        session.connect(config)?;

        if index == self.slots.len() {
            self.slots.push(Some(session));
        } else {
            self.slots[index] = Some(session);
        }

        tracing::debug!("session stored at handle {}", index);
        Ok(Handle(index))
    }

    /// Like [`Self::create`], but reports through a raw handle and error code.
    ///
    /// Returns [`INVALID_HANDLE`] on failure with the reason in `out_error`.
    pub fn create_raw(&mut self, config: SerialConfig, out_error: &mut ErrorCode) -> i32 {
        match self.create(config) {
            Ok(handle) => {
                *out_error = ErrorCode::None;
                handle.as_raw()
            }
            Err(e) => {
                *out_error = e.code();
                INVALID_HANDLE
            }
        }
    }

    /// Returns the live session behind `handle`.
    pub fn session_mut(&mut self, handle: Handle) -> Result<&mut Session<T>> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::InvalidHandle(i64::try_from(handle.0).unwrap_or(i64::MAX)))
    }

    /// Closes the device but keeps the session for a later [`Self::open`].
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        self.session_mut(handle)?.disconnect();
        Ok(())
    }

    /// Closes the session and frees its slot for reuse.
    pub fn deinit(&mut self, handle: Handle) -> Result<()> {
        self.session_mut(handle)?.disconnect();
        self.slots[handle.0] = None;
        tracing::debug!("released handle {}", handle);
        Ok(())
    }

    /// Reopens the device with the configuration given at creation.
    pub fn open(&mut self, handle: Handle) -> Result<()> {
        self.session_mut(handle)?.open()
    }

    /// Sends one framed command, returning the frame bytes written.
    pub fn write(&mut self, handle: Handle, payload: &[u8]) -> Result<usize> {
        self.session_mut(handle)?.send_command(payload)
    }

    /// Waits for one response frame.
    pub fn read(&mut self, handle: Handle, max_len: usize, timeout: Duration) -> Result<Bytes> {
        self.session_mut(handle)?.read_response(max_len, timeout)
    }

    /// Sends a command and waits for its response.
    pub fn request(
        &mut self,
        handle: Handle,
        payload: &[u8],
        max_len: usize,
        timeout: Duration,
    ) -> Result<Bytes> {
        self.session_mut(handle)?.request(payload, max_len, timeout)
    }

    /// Discards data pending in the transport buffers.
    pub fn flush(&mut self, handle: Handle) -> Result<()> {
        self.session_mut(handle)?.flush()
    }

    /// Returns the number of slots, empty ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no slot was ever allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl<T> fmt::Debug for InstanceRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}
