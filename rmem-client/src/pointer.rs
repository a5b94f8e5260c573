//! Handle-based smart pointers to remote blocks.
//!
//! A [`RemotePtr`] owns one reference to a block on the server. Creating,
//! cloning and reassigning pointers adjusts the remote reference count;
//! dropping a pointer releases its reference. Nothing is cached locally:
//! every read and write is a round trip, so two pointers to the same block
//! always observe the same value.

use crate::client::RpcClient;
use crate::error::{ClientError, Result};
use crate::value::RemoteValue;
use rmem_core::BlockId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Owning handle to a remote block holding a `T`.
///
/// There is no `Clone` impl because copying a pointer is a network call
/// that can fail; use [`try_clone`](Self::try_clone).
pub struct RemotePtr<T: RemoteValue> {
    client: Arc<RpcClient>,
    id: Option<BlockId>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RemoteValue> RemotePtr<T> {
    /// A pointer bound to no block.
    pub fn null(client: Arc<RpcClient>) -> Self {
        Self::bind(client, None)
    }

    /// Allocate a zeroed block sized for `T`.
    ///
    /// The new block's single reference is owned by the returned pointer.
    pub fn allocate(client: Arc<RpcClient>) -> Result<Self> {
        let id = client.create_block(T::SIZE as u64, T::type_tag())?;
        Ok(Self::bind(client, Some(id)))
    }

    /// Allocate a block and store `value` in it.
    pub fn new(client: Arc<RpcClient>, value: &T) -> Result<Self> {
        let ptr = Self::allocate(client)?;
        ptr.write_value(value)?;
        Ok(ptr)
    }

    /// Bind to an existing block, taking one new reference to it.
    ///
    /// The server's count is incremented before the pointer is returned,
    /// so the caller's own reference (if any) is unaffected.
    pub fn from_id(client: Arc<RpcClient>, id: BlockId) -> Result<Self> {
        client.increase_ref(id)?;
        Ok(Self::bind(client, Some(id)))
    }

    /// Bind to a block whose reference the caller already owns.
    ///
    /// No request is sent. This is the counterpart of [`release`](Self::release)
    /// for handing ownership across code that stores raw ids.
    pub fn from_raw(client: Arc<RpcClient>, id: BlockId) -> Self {
        Self::bind(client, Some(id))
    }

    fn bind(client: Arc<RpcClient>, id: Option<BlockId>) -> Self {
        Self {
            client,
            id,
            _marker: PhantomData,
        }
    }

    /// The bound block, if any.
    pub fn id(&self) -> Option<BlockId> {
        self.id
    }

    /// Whether the pointer is bound to no block.
    pub fn is_null(&self) -> bool {
        self.id.is_none()
    }

    /// The client this pointer talks through.
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    /// Create a second pointer to the same block, adding a reference.
    pub fn try_clone(&self) -> Result<Self> {
        if let Some(id) = self.id {
            self.client.increase_ref(id)?;
        }
        Ok(Self::bind(Arc::clone(&self.client), self.id))
    }

    /// Rebind to the block `other` points to.
    ///
    /// The new block gains its reference before the old block loses one,
    /// so a block shared by both pointers is never transiently released.
    /// A failure to release the old block is logged; the pointer is
    /// rebound regardless.
    pub fn assign(&mut self, other: &Self) -> Result<()> {
        if self.id == other.id {
            return Ok(());
        }

        if let Some(id) = other.id {
            other.client.increase_ref(id)?;
        }

        let old = std::mem::replace(&mut self.id, other.id);
        self.client = Arc::clone(&other.client);
        if let Some(old) = old {
            self.drop_reference(old);
        }
        Ok(())
    }

    /// Release the bound block and become null.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(id) = self.id.take() {
            self.client.decrease_ref(id)?;
        }
        Ok(())
    }

    /// Detach from the block without releasing it.
    ///
    /// The caller takes over the reference; pass the id to
    /// [`from_raw`](Self::from_raw) to wrap it again.
    #[must_use = "the returned id owns a reference that is leaked if ignored"]
    pub fn release(mut self) -> Option<BlockId> {
        self.id.take()
    }

    /// Access the pointee through a proxy.
    pub fn proxy(&self) -> Result<Proxy<'_, T>> {
        let id = self.id.ok_or(ClientError::NullPointer)?;
        Ok(Proxy {
            client: &self.client,
            id,
            _marker: PhantomData,
        })
    }

    /// Fetch the current value.
    pub fn read_value(&self) -> Result<T> {
        self.proxy()?.read()
    }

    /// Store a new value.
    pub fn write_value(&self, value: &T) -> Result<()> {
        self.proxy()?.write(value)
    }

    fn drop_reference(&self, id: BlockId) {
        if let Err(e) = self.client.decrease_ref(id) {
            tracing::warn!(%id, error = %e, "Failed to release remote reference");
        }
    }
}

impl<T: RemoteValue> Drop for RemotePtr<T> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.drop_reference(id);
        }
    }
}

impl<T: RemoteValue> fmt::Debug for RemotePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePtr")
            .field("type", &T::type_tag())
            .field("id", &self.id)
            .finish()
    }
}

/// Short-lived accessor for the value behind a [`RemotePtr`].
///
/// Each call is a separate request; the proxy holds no copy of the value.
pub struct Proxy<'a, T: RemoteValue> {
    client: &'a RpcClient,
    id: BlockId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RemoteValue> Proxy<'_, T> {
    /// The block this proxy reads and writes.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Fetch the value.
    pub fn read(&self) -> Result<T> {
        let bytes = self.client.get_block(self.id, T::SIZE as u64)?;
        T::decode(&bytes)
    }

    /// Store a value.
    pub fn write(&self, value: &T) -> Result<()> {
        self.client.set_block(self.id, &value.encode())
    }
}
