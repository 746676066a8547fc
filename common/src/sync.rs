//! Adapter utilities to run carefully designed async code in a sync context.

use std::io;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{AsyncRead, Future, FutureExt};

//
// public types
//

/// An adapter for [`Read`] types implementing [`AsyncRead`].
///
/// The [`AsyncRead`] implementation will block on IO, so it must not be used when exposing async APIs.
#[derive(Debug)]
pub struct AsyncInputAdapter<T>(T);

//
// public functions
//

/// Run a future which only awaits on [`AsyncInputAdapter`]s to completion.
///
/// # Panics
///
/// Panics if the future yields, which can only happen if it awaits on something other than an [`AsyncInputAdapter`].
pub fn block_on<Fut: Future>(future: Fut) -> Fut::Output {
    // `future` should never yield, as the wrapped synchronous input is the only thing awaited upon.
    future.now_or_never().unwrap_or_else(|| unreachable!())
}

//
// AsyncInputAdapter impls
//

impl<T> AsyncInputAdapter<T> {
    /// Wrap a blocking [`Read`] input.
    pub fn new(input: T) -> Self {
        Self(input)
    }

    /// Returns the wrapped input.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Read + Unpin> AsyncRead for AsyncInputAdapter<T> {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        self.0.read(buf).into()
    }

    fn poll_read_vectored(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        bufs: &mut [io::IoSliceMut<'_>],
    ) -> Poll<io::Result<usize>> {
        self.0.read_vectored(bufs).into()
    }
}
