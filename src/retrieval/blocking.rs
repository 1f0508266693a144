//! Running blocking model and index calls off the async runtime

use super::error::{RetrievalError, Stage};
use std::time::Duration;

/// Run `f` on the blocking pool with a deadline.
///
/// The outer error covers the deadline and a panicked task; the inner result
/// is whatever `f` returned. If the deadline passes, the task keeps running
/// to completion on the blocking pool and its result is discarded.
pub(crate) async fn run_blocking<T, E, F>(
    stage: Stage,
    deadline: Duration,
    f: F,
) -> Result<Result<T, E>, RetrievalError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(join_error)) => {
            tracing::error!("Blocking {} task failed: {}", stage, join_error);
            let message = format!("{} task failed: {}", stage, join_error);
            Err(match stage {
                Stage::Embedding => RetrievalError::EmbeddingService(message),
                Stage::Rerank => RetrievalError::Reranker(message),
                Stage::Lexical | Stage::Dense => RetrievalError::index_unavailable(stage, message),
            })
        }
        Err(_) => {
            let millis = deadline.as_millis() as u64;
            tracing::warn!("Stage {} timed out after {}ms", stage, millis);
            Err(RetrievalError::Timeout { stage, millis })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_inner_result() {
        let result = run_blocking(Stage::Lexical, Duration::from_secs(1), || {
            Ok::<_, String>(42)
        })
        .await
        .unwrap();
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = run_blocking(Stage::Rerank, Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok::<_, String>(())
        })
        .await;
        assert!(matches!(
            result,
            Err(RetrievalError::Timeout {
                stage: Stage::Rerank,
                millis: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_panic_maps_to_stage_error() {
        let result = run_blocking(Stage::Embedding, Duration::from_secs(1), || -> Result<(), String> {
            panic!("model crashed")
        })
        .await;
        assert!(matches!(result, Err(RetrievalError::EmbeddingService(_))));
    }
}
