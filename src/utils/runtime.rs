use anyhow::Result;

/// Everything in stempeluhr runs on one thread. Store operations rely on running to completion
/// before the next one is scheduled.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
