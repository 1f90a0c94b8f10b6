//! Work that must not outlive its dialog.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `token` is cancelled first.
///
/// Returns `None` when the dialog started closing before the work finished, in
/// which case the result must not be applied to the dialog.
pub async fn guarded<F>(token: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        _ = token.cancelled() => None,
        output = fut => {
            // Cancellation can land while the future is completing
            if token.is_cancelled() {
                None
            } else {
                Some(output)
            }
        }
    }
}

/// Spawn `fut` on the current runtime, guarded by `token`.
pub fn spawn_guarded<F>(token: CancellationToken, fut: F) -> JoinHandle<Option<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(async move { guarded(&token, fut).await })
}
