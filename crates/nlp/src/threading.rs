use ort::session::builder::SessionBuilder;
use ort::Error;

const DEFAULT_MAX_THREADS: usize = 4;

fn parse_env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse::<usize>().ok()
}

fn default_thread_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_MAX_THREADS);
    available.min(DEFAULT_MAX_THREADS).max(1)
}

/// Intra-op threads from `BLINDFOLD_NLP_THREADS`, capped default otherwise.
pub fn intra_threads() -> usize {
    parse_env_usize("BLINDFOLD_NLP_THREADS")
        .filter(|v| *v > 0)
        .unwrap_or_else(default_thread_count)
}

pub fn apply_session_threads(builder: SessionBuilder) -> Result<SessionBuilder, Error> {
    let intra = intra_threads();
    log::info!("[NLP] session threads: intra={}", intra);

    let builder = builder.with_intra_threads(intra)?;
    let builder = builder.with_inter_threads(1)?;
    builder.with_parallel_execution(false)
}
