use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ChannelError;
use crate::transfer::{Connector, RemoteFile, TransferSession};

type ConnectHook<T> = Arc<dyn Fn(&T) -> Result<(), ChannelError> + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryState {
    files: Vec<RemoteFile>,
    connections: usize,
    closed: usize,
}

/// In-memory [`Connector`] that records every uploaded file.
///
/// Used by tests and dry runs. A connect hook can inspect the target and
/// fail the connection; `failing_uploads` makes every upload fail.
pub struct MemoryConnector<T> {
    state: Arc<Mutex<MemoryState>>,
    connect_hook: Option<ConnectHook<T>>,
    fail_uploads: bool,
    _target: PhantomData<fn(&T)>,
}

impl<T> MemoryConnector<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            connect_hook: None,
            fail_uploads: false,
            _target: PhantomData,
        }
    }

    #[must_use]
    pub fn with_connect_hook(
        mut self,
        hook: impl Fn(&T) -> Result<(), ChannelError> + Send + Sync + 'static,
    ) -> Self {
        self.connect_hook = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Files uploaded so far, in upload order.
    pub fn files(&self) -> Vec<RemoteFile> {
        self.lock().files.clone()
    }

    /// Number of successful connects.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    pub fn closed_sessions(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for MemoryConnector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemoryConnector<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            connect_hook: self.connect_hook.clone(),
            fail_uploads: self.fail_uploads,
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for MemoryConnector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("fail_uploads", &self.fail_uploads)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Connector for MemoryConnector<T> {
    type Target = T;
    type Session = MemorySession;

    fn connect(&self, target: &T) -> Result<MemorySession, ChannelError> {
        if let Some(hook) = &self.connect_hook {
            hook(target)?;
        }
        self.lock().connections += 1;
        Ok(MemorySession {
            state: Arc::clone(&self.state),
            fail_uploads: self.fail_uploads,
        })
    }
}

/// Session handed out by [`MemoryConnector`].
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    fail_uploads: bool,
}

impl TransferSession for MemorySession {
    fn upload(&mut self, file: &RemoteFile) -> Result<(), ChannelError> {
        if self.fail_uploads {
            return Err(ChannelError::transfer_msg(format!(
                "write to {} rejected",
                file.path
            )));
        }
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .push(file.clone());
        Ok(())
    }

    fn close(self) -> Result<(), ChannelError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed += 1;
        Ok(())
    }
}
