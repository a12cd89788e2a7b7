//! Off-thread conversions on a tokio blocking pool.
//!
//! Every conversion submitted to a [`Dispatcher`] runs on a pool thread and
//! ends in exactly one outcome. The callback form delivers it through a
//! [`Completion`]; the future form through [`Pending`]. Jobs cannot be
//! cancelled once submitted.

use crate::bitmap::PlatformBitmap;
use crate::config::EncodeConfig;
use crate::decode;
use crate::encode;
use crate::error::{Error, Result};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use whereat::*;

type SuccessFn<T> = Box<dyn FnOnce(T) + Send + 'static>;
type FailureFn = Box<dyn FnOnce(At<Error>) + Send + 'static>;

/// A success/failure callback pair that fires exactly once.
///
/// [`Completion::complete`] consumes the pair. A completion dropped without
/// being completed (for example because the runtime shut down before the job
/// ran) reports [`Error::Worker`] to its failure callback.
pub struct Completion<T> {
    callbacks: Option<(SuccessFn<T>, FailureFn)>,
}

impl<T> Completion<T> {
    /// Pair a success callback with a failure callback.
    pub fn new(
        on_success: impl FnOnce(T) + Send + 'static,
        on_failure: impl FnOnce(At<Error>) + Send + 'static,
    ) -> Self {
        Self {
            callbacks: Some((Box::new(on_success), Box::new(on_failure))),
        }
    }

    /// Deliver `result` to the matching callback.
    pub fn complete(mut self, result: Result<T>) {
        if let Some((on_success, on_failure)) = self.callbacks.take() {
            match result {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            }
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some((_, on_failure)) = self.callbacks.take() {
            log::warn!("conversion job dropped before it completed");
            on_failure(at!(Error::Worker(
                "conversion job dropped before it completed".into()
            )));
        }
    }
}

impl<T> core::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callbacks.is_some())
            .finish()
    }
}

/// Result of a conversion running on the blocking pool.
///
/// Dropping a `Pending` detaches the job; it still runs to completion.
#[derive(Debug)]
#[must_use = "the conversion result is only observable by awaiting"]
pub struct Pending<T>(JoinHandle<Result<T>>);

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(at!(Error::Worker(alloc::format!(
                "conversion job did not finish: {}",
                e
            )))),
        })
    }
}

/// Schedules encode and decode jobs on a runtime's blocking pool.
///
/// # Example
///
/// ```rust
/// use imgref::ImgVec;
/// use rgb::RGBA8;
/// use webpkit::{Dispatcher, EncodeConfig};
///
/// let runtime = tokio::runtime::Builder::new_multi_thread().build().unwrap();
/// let dispatcher = Dispatcher::new(runtime.handle().clone());
///
/// let img = ImgVec::new(vec![RGBA8::new(10, 20, 30, 255); 16], 4, 4);
/// let webp = runtime.block_on(dispatcher.encode(img, EncodeConfig::new()))?;
/// assert_eq!(&webp[..4], b"RIFF");
/// # Ok::<(), whereat::At<webpkit::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handle: Handle,
}

impl Dispatcher {
    /// Dispatch onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatch onto the runtime the caller is running inside.
    ///
    /// # Errors
    ///
    /// [`Error::Worker`] when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| at!(Error::Worker(alloc::format!("no tokio runtime: {}", e))))
    }

    /// The runtime handle jobs are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Encode `bitmap` off-thread and report to `done`.
    pub fn submit_encode<B>(&self, bitmap: B, config: EncodeConfig, done: Completion<Vec<u8>>)
    where
        B: PlatformBitmap + Send + 'static,
    {
        self.submit("encode", move || encode::encode_bitmap(&bitmap, &config), done);
    }

    /// Decode WebP bytes into a `B` off-thread and report to `done`.
    pub fn submit_decode<B>(&self, data: Vec<u8>, done: Completion<B>)
    where
        B: PlatformBitmap + Send + 'static,
    {
        self.submit("decode", move || decode::decode_bitmap(&data), done);
    }

    /// Read and decode a WebP file into a `B` off-thread and report to `done`.
    pub fn submit_decode_path<B>(&self, path: impl Into<PathBuf>, done: Completion<B>)
    where
        B: PlatformBitmap + Send + 'static,
    {
        let path = path.into();
        self.submit(
            "decode_path",
            move || decode::decode_bitmap_from_path(&path),
            done,
        );
    }

    /// Encode `bitmap` off-thread.
    pub fn encode<B>(&self, bitmap: B, config: EncodeConfig) -> Pending<Vec<u8>>
    where
        B: PlatformBitmap + Send + 'static,
    {
        self.spawn("encode", move || encode::encode_bitmap(&bitmap, &config))
    }

    /// Decode WebP bytes into a `B` off-thread.
    pub fn decode<B>(&self, data: Vec<u8>) -> Pending<B>
    where
        B: PlatformBitmap + Send + 'static,
    {
        self.spawn("decode", move || decode::decode_bitmap(&data))
    }

    /// Read and decode a WebP file into a `B` off-thread.
    pub fn decode_path<B>(&self, path: impl Into<PathBuf>) -> Pending<B>
    where
        B: PlatformBitmap + Send + 'static,
    {
        let path = path.into();
        self.spawn("decode_path", move || decode::decode_bitmap_from_path(&path))
    }

    fn submit<T, F>(&self, label: &'static str, job: F, done: Completion<T>)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        log::debug!("submitting {} job", label);
        // The join handle is detached; `done` owns the outcome.
        drop(
            self.handle
                .spawn_blocking(move || done.complete(run_guarded(label, job))),
        );
    }

    fn spawn<T, F>(&self, label: &'static str, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        log::debug!("spawning {} job", label);
        Pending(
            self.handle
                .spawn_blocking(move || run_guarded(label, job)),
        )
    }
}

/// Run `job`, turning a panic into [`Error::Worker`].
fn run_guarded<T>(label: &'static str, job: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("{} job panicked: {}", label, message);
        Err(at!(Error::Worker(alloc::format!(
            "{} job panicked: {}",
            label,
            message
        ))))
    });
    if let Err(e) = &result {
        log::debug!("{} job failed: {}", label, e.error());
    }
    result
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use imgref::ImgVec;
    use rgb::RGBA8;
    use std::sync::mpsc;
    use std::thread::{self, ThreadId};

    type Outcome<T> = (ThreadId, core::result::Result<T, ErrorKind>);

    fn channel_completion<T: Send + 'static>() -> (Completion<T>, mpsc::Receiver<Outcome<T>>) {
        let (tx, rx) = mpsc::channel();
        let tx_err = tx.clone();
        let done = Completion::new(
            move |value| {
                let _ = tx.send((thread::current().id(), Ok(value)));
            },
            move |err: At<Error>| {
                let _ = tx_err.send((thread::current().id(), Err(err.error().kind())));
            },
        );
        (done, rx)
    }

    fn sample_image() -> ImgVec<RGBA8> {
        ImgVec::new(alloc::vec![RGBA8::new(40, 80, 120, 255); 8 * 8], 8, 8)
    }

    #[test]
    fn test_run_guarded_catches_panic() {
        let result: Result<()> = run_guarded("test", || panic!("boom"));
        let err = result.unwrap_err();
        assert_eq!(err.error().kind(), ErrorKind::Worker);
        assert!(err.error().to_string().contains("boom"));
    }

    #[test]
    fn test_completion_fires_once() {
        let (done, rx) = channel_completion::<u32>();
        done.complete(Ok(7));
        let (_, outcome) = rx.recv().unwrap();
        assert_eq!(outcome, Ok(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_completion_reports_failure() {
        let (done, rx) = channel_completion::<u32>();
        drop(done);
        let (_, outcome) = rx.recv().unwrap();
        assert_eq!(outcome, Err(ErrorKind::Worker));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_current_outside_runtime_fails() {
        let err = Dispatcher::current().unwrap_err();
        assert_eq!(err.error().kind(), ErrorKind::Worker);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_encode_runs_off_thread() {
        let dispatcher = Dispatcher::current().unwrap();
        let (done, rx) = channel_completion();
        let caller = thread::current().id();

        dispatcher.submit_encode(sample_image(), EncodeConfig::new(), done);

        let (worker, outcome) = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert_ne!(worker, caller);
        assert_eq!(&outcome.unwrap()[..4], b"RIFF");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_decode_reports_failure() {
        let dispatcher = Dispatcher::current().unwrap();
        let (done, rx) = channel_completion::<ImgVec<RGBA8>>();

        dispatcher.submit_decode(Vec::new(), done);

        let (_, outcome) = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, Err(ErrorKind::DecodeFailure)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_roundtrip() {
        let dispatcher = Dispatcher::current().unwrap();
        let webp = dispatcher
            .encode(sample_image(), EncodeConfig::new().quality(90.0))
            .await
            .unwrap();
        let img: ImgVec<RGBA8> = dispatcher.decode(webp).await.unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_decode_path_missing_file() {
        let dispatcher = Dispatcher::current().unwrap();
        let err = dispatcher
            .decode_path::<ImgVec<RGBA8>>("/definitely/not/here.webp")
            .await
            .err()
            .expect("missing file should fail");
        assert_eq!(err.error().kind(), ErrorKind::IoFailure);
    }
}
