//! Pull-based log streams with optional deadline

use clusterlog_core::Error;
use futures::{stream, StreamExt};
use tokio::time::Instant;
use tracing::debug;

use crate::ports::LogStream;

/// Wrap an agent stream so that the first error ends it.
///
/// With a deadline, the whole stream must finish before `deadline`;
/// otherwise the consumer gets a single `RemoteTimeout` and the inner
/// stream is dropped. Without one the stream lives until the agent
/// closes it or the consumer drops it.
pub fn guarded(inner: LogStream, deadline: Option<Instant>, file_name: String) -> LogStream {
    stream::unfold(Some(inner), move |state| {
        let file_name = file_name.clone();
        async move {
            let mut inner = state?;
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, inner.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        debug!("Stream of {} hit its deadline", file_name);
                        let err = Error::timeout(format!(
                            "Reading {} did not complete before the deadline",
                            file_name
                        ));
                        return Some((Err(err), None));
                    }
                },
                None => inner.next().await,
            };

            match next {
                Some(Ok(chunk)) => Some((Ok(chunk), Some(inner))),
                Some(Err(e)) => {
                    debug!("Stream of {} failed: {}", file_name, e);
                    Some((Err(e), None))
                }
                None => None,
            }
        }
    })
    .boxed()
}
