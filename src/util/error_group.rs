//! "Wait-for-group, cancel-on-first-error" utility: runs a batch of
//! futures concurrently, and as soon as one fails, cancels every
//! sibling still outstanding rather than waiting for them to run to
//! completion or time out on their own.
//!
//! Grounded on `tokio::task::JoinSet`'s cancel-by-drop semantics: pushing
//! every future into a `JoinSet` and dropping the set the moment one
//! reports failure aborts every task still running.

use futures::future::BoxFuture;
use tokio::task::JoinSet;

/// Runs `futures` concurrently. Returns every success in spawn order once
/// all have completed, or the first error encountered, immediately
/// aborting whichever futures are still outstanding.
pub async fn run_to_first_error<O, E, Fut>(futures: Vec<Fut>) -> Result<Vec<O>, E>
where
    O: Send + 'static,
    E: Send + 'static,
    Fut: std::future::Future<Output = Result<O, E>> + Send + 'static,
{
    let mut set: JoinSet<(usize, Result<O, E>)> = JoinSet::new();
    for (index, fut) in futures.into_iter().enumerate() {
        set.spawn(async move { (index, fut.await) });
    }

    let mut results: Vec<Option<O>> = Vec::new();
    while let Some(joined) = set.join_next().await {
        let Ok((index, outcome)) = joined else {
            continue;
        };
        match outcome {
            Ok(value) => {
                while results.len() <= index {
                    results.push(None);
                }
                results[index] = Some(value);
            }
            Err(err) => {
                set.abort_all();
                return Err(err);
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn all_succeeding_tasks_return_every_output() {
        let futures: Vec<BoxFuture<'static, Result<u32, String>>> = vec![
            Box::pin(async { Ok(1) }),
            Box::pin(async { Ok(2) }),
        ];
        let result = run_to_first_error(futures).await.unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[tokio::test]
    async fn one_failure_is_reported_and_siblings_are_aborted() {
        let futures: Vec<BoxFuture<'static, Result<u32, String>>> = vec![
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            }),
            Box::pin(async { Err("boom".to_string()) }),
        ];
        let result = run_to_first_error(futures).await;
        assert_eq!(result, Err("boom".to_string()));
    }
}
