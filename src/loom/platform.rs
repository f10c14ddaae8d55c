#[inline]
pub fn spawn<O, F>(future: F) -> tokio::task::JoinHandle<O>
where
    O: Send + 'static,
    F: std::future::Future<Output = O> + Send + 'static,
{
    tokio::spawn(future)
}

/// Runs a blocking closure off the async workers and awaits its result.
///
/// Returns `None` if the closure panicked.
#[inline]
pub async fn handle<O, F>(f: F) -> Option<O>
where
    O: Send + 'static,
    F: FnOnce() -> O + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.ok()
}

pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;
