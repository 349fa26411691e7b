use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Detects signals sent to the process and turns them into cancellation. Also returns when
/// something else cancels the token, e.g. a `quit` command.
///
/// On Windows detached processes can't detect signals sent to them, so `quit` is the reliable
/// way to stop the host there.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
