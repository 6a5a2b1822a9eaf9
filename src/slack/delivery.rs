//! Response delivery: placeholder, chunked posting, error fallback.
//!
//! One [`DeliveryJob`] covers a single response. The placeholder goes up
//! before the AI round-trip starts; once the response text is ready the
//! placeholder is overwritten in place with the first chunk and any
//! remaining chunks are posted sequentially as replies threaded off the
//! first chunk's message. Every failure path converges on one fixed
//! localized error message — users never see raw errors, and never more
//! than one outcome per message.

use std::sync::Arc;

use tracing::warn;

use crate::chunk::chunk_text;
use crate::error::SlackError;
use crate::slack::client::ChatApi;

/// Placeholder posted while the AI is working ("Thinking...").
pub const THINKING_MESSAGE: &str = "Бодож байна...";

/// Fixed localized apology shown for any processing or delivery failure
/// ("Sorry, an error occurred. Please try again.").
pub const ERROR_MESSAGE: &str = "Уучлаарай, алдаа гарлаа. Дахин оролдоно уу.";

/// Ephemeral state for one response delivery.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub channel: String,
    /// Thread anchor of the inbound message, when it arrived in a thread.
    pub thread_ts: Option<String>,
    /// `ts` of the placeholder message, when posting it succeeded.
    pub placeholder_ts: Option<String>,
}

/// Failure during chunked delivery, remembering whether the first chunk
/// already reached the user.
struct DeliveryFailure {
    primary_sent: bool,
    source: SlackError,
}

/// Posts responses back into Slack with size-aware chunking.
pub struct DeliveryEngine {
    api: Arc<dyn ChatApi>,
}

impl DeliveryEngine {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    /// Post the "thinking" placeholder. A failed placeholder is not
    /// fatal — delivery then falls back to posting a fresh message.
    pub async fn post_placeholder(&self, channel: &str, thread_ts: Option<&str>) -> DeliveryJob {
        let mut job = DeliveryJob {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            placeholder_ts: None,
        };
        match self.api.post_message(channel, THINKING_MESSAGE, thread_ts).await {
            Ok(ts) => job.placeholder_ts = Some(ts),
            Err(e) => warn!(channel = %channel, error = %e, "Placeholder post failed"),
        }
        job
    }

    /// Deliver `text`, chunked, into the job's channel. Falls back to
    /// the localized error message if delivery fails before the first
    /// chunk reaches the user; a failure after that is only logged so
    /// the user never gets an error on top of a successful response.
    pub async fn deliver(&self, job: &DeliveryJob, text: &str) {
        match self.try_deliver(job, text).await {
            Ok(()) => {}
            Err(DeliveryFailure {
                primary_sent: true,
                source,
            }) => {
                warn!(channel = %job.channel, error = %source, "Follow-up chunk delivery failed");
            }
            Err(DeliveryFailure {
                primary_sent: false,
                source,
            }) => {
                warn!(channel = %job.channel, error = %source, "Response delivery failed");
                self.deliver_error(job).await;
            }
        }
    }

    async fn try_deliver(&self, job: &DeliveryJob, text: &str) -> Result<(), DeliveryFailure> {
        let chunks = chunk_text(text);
        let Some((first, rest)) = chunks.split_first() else {
            return Ok(());
        };

        // First chunk: overwrite the placeholder in place, or post fresh
        // when no placeholder exists. Follow-ups thread off the message
        // carrying the first chunk, so the whole response reads as one
        // thread regardless of where the question was asked.
        let anchor = match &job.placeholder_ts {
            Some(placeholder_ts) => {
                self.api
                    .update_message(&job.channel, placeholder_ts, first)
                    .await
                    .map_err(|source| DeliveryFailure {
                        primary_sent: false,
                        source,
                    })?;
                placeholder_ts.clone()
            }
            None => self
                .api
                .post_message(&job.channel, first, job.thread_ts.as_deref())
                .await
                .map_err(|source| DeliveryFailure {
                    primary_sent: false,
                    source,
                })?,
        };

        // Strictly sequential so thread-reply ordering is preserved.
        for chunk in rest {
            self.api
                .post_message(&job.channel, chunk, Some(&anchor))
                .await
                .map_err(|source| DeliveryFailure {
                    primary_sent: true,
                    source,
                })?;
        }

        Ok(())
    }

    /// Escalating error fallback: overwrite the placeholder with the
    /// fixed error message; failing that, post it as a new message;
    /// failing that too, log and give up (the user gets no reply).
    pub async fn deliver_error(&self, job: &DeliveryJob) {
        if let Some(placeholder_ts) = &job.placeholder_ts {
            match self
                .api
                .update_message(&job.channel, placeholder_ts, ERROR_MESSAGE)
                .await
            {
                Ok(()) => return,
                Err(e) => {
                    warn!(channel = %job.channel, error = %e, "Error-message update failed");
                }
            }
        }
        if let Err(e) = self
            .api
            .post_message(&job.channel, ERROR_MESSAGE, job.thread_ts.as_deref())
            .await
        {
            warn!(channel = %job.channel, error = %e, "Error-message post failed; giving up");
        }
    }
}
