use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use discuss_agent::{CompletionError, CompletionProvider, CompletionRequest};
use discuss_channels::{ChannelError, ChannelTransport, InboundMessage, OutboundMessage, SendReceipt};
use discuss_core::config::{DEFAULT_MULTIPART_TTL_SECS, DEFAULT_SUPPORT_CONTACT};
use discuss_core::Channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::{DedupCache, DedupKey};
use crate::notice;
use crate::policy::{reply_length, ChannelPolicy};

/// Marker stored under a dedup key; only its presence matters.
const DEDUP_MARKER: &str = "";

/// Why a message was answered with a notice instead of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnsupportedContentType(String),
    MultipartUnsupported,
    ResponseTooLong { length: usize, max: usize },
}

#[derive(Debug)]
pub enum RelayFailure {
    /// The completion provider failed or produced no usable text.
    Completion(CompletionError),
    /// The caller cancelled the invocation before it finished.
    Cancelled,
}

/// Result of the policy and completion stages for one inbound message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The completion text was handed to the transport.
    Delivered,
    /// A repeat multipart segment; nothing was sent.
    Suppressed,
    Rejected(RejectReason),
    Failed(RelayFailure),
}

impl RelayOutcome {
    /// Short snake_case label for log fields and HTTP acknowledgements.
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Delivered => "delivered",
            RelayOutcome::Suppressed => "suppressed",
            RelayOutcome::Rejected(RejectReason::UnsupportedContentType(_)) => {
                "rejected_unsupported_content_type"
            }
            RelayOutcome::Rejected(RejectReason::MultipartUnsupported) => {
                "rejected_multipart_unsupported"
            }
            RelayOutcome::Rejected(RejectReason::ResponseTooLong { .. }) => "rejected_too_long",
            RelayOutcome::Failed(RelayFailure::Completion(_)) => "failed_completion",
            RelayOutcome::Failed(RelayFailure::Cancelled) => "failed_cancelled",
        }
    }
}

/// What happened to the single outbound send of an invocation.
///
/// Reported separately from [`RelayOutcome`]: a transport failure never
/// changes the outcome computed from the policy and completion stages.
#[derive(Debug)]
pub enum DispatchStatus {
    NotAttempted,
    Sent(SendReceipt),
    Failed(ChannelError),
    /// The send was in flight when the invocation was cancelled; the provider
    /// may or may not have accepted it.
    Abandoned,
}

#[derive(Debug)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub dispatch: DispatchStatus,
}

impl RelayReport {
    fn cancelled(dispatch: DispatchStatus) -> Self {
        Self {
            outcome: RelayOutcome::Failed(RelayFailure::Cancelled),
            dispatch,
        }
    }
}

/// Translates one inbound message into at most one outbound message.
///
/// Holds no per-message state; share it behind an `Arc` across request handlers.
pub struct MessageRelay {
    completions: Arc<dyn CompletionProvider>,
    transport: Arc<dyn ChannelTransport>,
    cache: Arc<dyn DedupCache>,
    policies: HashMap<Channel, ChannelPolicy>,
    multipart_ttl: Duration,
    support_contact: String,
}

impl MessageRelay {
    pub fn new(
        completions: Arc<dyn CompletionProvider>,
        transport: Arc<dyn ChannelTransport>,
        cache: Arc<dyn DedupCache>,
    ) -> Self {
        let policies = [Channel::Sms, Channel::Whatsapp, Channel::Email]
            .into_iter()
            .map(|c| (c, ChannelPolicy::for_channel(c)))
            .collect();
        Self {
            completions,
            transport,
            cache,
            policies,
            multipart_ttl: Duration::from_secs(DEFAULT_MULTIPART_TTL_SECS),
            support_contact: DEFAULT_SUPPORT_CONTACT.to_string(),
        }
    }

    /// Replace the built-in policy for `channel`.
    pub fn with_policy(mut self, channel: Channel, policy: ChannelPolicy) -> Self {
        self.policies.insert(channel, policy);
        self
    }

    pub fn with_multipart_ttl(mut self, ttl: Duration) -> Self {
        self.multipart_ttl = ttl;
        self
    }

    pub fn with_support_contact(mut self, contact: impl Into<String>) -> Self {
        self.support_contact = contact.into();
        self
    }

    pub fn policy(&self, channel: Channel) -> ChannelPolicy {
        self.policies
            .get(&channel)
            .cloned()
            .unwrap_or_else(|| ChannelPolicy::for_channel(channel))
    }

    /// Apply channel policy to `msg`, ask for a completion when the policy
    /// allows it, and send exactly one reply (none for a suppressed repeat).
    ///
    /// Cancelling `cancel` abandons whichever network call is in flight; no
    /// later step runs and the outcome is `Failed(Cancelled)`.
    #[instrument(
        skip_all,
        fields(channel = %msg.channel, from = %msg.from, message_id = %msg.message_id)
    )]
    pub async fn handle(&self, msg: &InboundMessage, cancel: &CancellationToken) -> RelayReport {
        if cancel.is_cancelled() {
            return self.finish(RelayReport::cancelled(DispatchStatus::NotAttempted));
        }

        let policy = self.policy(msg.channel);

        let report = if !policy.supports(&msg.content_type) {
            info!(content_type = %msg.content_type, "unsupported content type");
            let body = notice::unsupported_content_type(&msg.content_type);
            let reason = RejectReason::UnsupportedContentType(msg.content_type.clone());
            self.reply(msg, &policy, body, RelayOutcome::Rejected(reason), cancel)
                .await
        } else if let Some(reference) = msg
            .multipart_reference
            .as_deref()
            .filter(|_| policy.suppress_multipart)
        {
            self.handle_multipart(msg, &policy, reference, cancel).await
        } else {
            self.handle_prompt(msg, &policy, cancel).await
        };

        self.finish(report)
    }

    async fn handle_multipart(
        &self,
        msg: &InboundMessage,
        policy: &ChannelPolicy,
        reference: &str,
        cancel: &CancellationToken,
    ) -> RelayReport {
        let key = DedupKey::multipart(msg.channel, &msg.from, &msg.to, reference);

        // check-then-set is not atomic: two segments racing here may both get the notice
        match until_cancelled(cancel, self.cache.get(key.as_str())).await {
            None => return RelayReport::cancelled(DispatchStatus::NotAttempted),
            Some(Ok(Some(_))) => {
                debug!(key = %key, "multipart segment already answered");
                return RelayReport {
                    outcome: RelayOutcome::Suppressed,
                    dispatch: DispatchStatus::NotAttempted,
                };
            }
            Some(Ok(None)) => {}
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "dedup lookup failed, treating segment as new");
            }
        }

        info!(reference, "multipart message not supported");
        let report = self
            .reply(
                msg,
                policy,
                notice::MULTIPART_UNSUPPORTED.to_string(),
                RelayOutcome::Rejected(RejectReason::MultipartUnsupported),
                cancel,
            )
            .await;

        // only a delivered notice closes the window; otherwise the next segment retries
        if !matches!(report.dispatch, DispatchStatus::Sent(_)) {
            return report;
        }

        match until_cancelled(
            cancel,
            self.cache.set(key.as_str(), DEDUP_MARKER, self.multipart_ttl),
        )
        .await
        {
            None => RelayReport::cancelled(report.dispatch),
            Some(Err(e)) => {
                error!(key = %key, error = %e, "cannot record multipart dedup key");
                report
            }
            Some(Ok(())) => report,
        }
    }

    async fn handle_prompt(
        &self,
        msg: &InboundMessage,
        policy: &ChannelPolicy,
        cancel: &CancellationToken,
    ) -> RelayReport {
        let req = CompletionRequest {
            channel: msg.channel,
            channel_id: msg.from.clone(),
            display_name: msg.display_name.clone(),
            prompt: msg.text.clone(),
        };

        let completion = match until_cancelled(cancel, self.completions.complete(&req)).await {
            None => return RelayReport::cancelled(DispatchStatus::NotAttempted),
            Some(result) => result.and_then(usable_text),
        };

        let text = match completion {
            Ok(text) => text,
            Err(e) => {
                error!(
                    error = %error_chain(&e),
                    "cannot get completion, sending failure notice"
                );
                return self
                    .reply(
                        msg,
                        policy,
                        notice::COMPLETION_FAILED.to_string(),
                        RelayOutcome::Failed(RelayFailure::Completion(e)),
                        cancel,
                    )
                    .await;
            }
        };

        if let Some(max) = policy.exceeded_limit(&text) {
            let length = reply_length(&text);
            info!(length, max, "completion too long for channel");
            let body = notice::response_too_long(length, max, &self.support_contact, msg.channel);
            return self
                .reply(
                    msg,
                    policy,
                    body,
                    RelayOutcome::Rejected(RejectReason::ResponseTooLong { length, max }),
                    cancel,
                )
                .await;
        }

        self.reply(msg, policy, text, RelayOutcome::Delivered, cancel)
            .await
    }

    /// Send `body` back to the sender of `msg` and pair the send result with
    /// the outcome already decided.
    async fn reply(
        &self,
        msg: &InboundMessage,
        policy: &ChannelPolicy,
        body: String,
        outcome: RelayOutcome,
        cancel: &CancellationToken,
    ) -> RelayReport {
        let mut outbound = OutboundMessage::reply_to(msg, body);
        if policy.supports_threading && !msg.message_id.is_empty() {
            outbound = outbound.threaded(&msg.message_id);
        }

        let dispatch = match until_cancelled(cancel, self.transport.send(&outbound)).await {
            None => return RelayReport::cancelled(DispatchStatus::Abandoned),
            Some(Ok(receipt)) => DispatchStatus::Sent(receipt),
            Some(Err(e)) => DispatchStatus::Failed(e),
        };

        RelayReport { outcome, dispatch }
    }

    fn finish(&self, report: RelayReport) -> RelayReport {
        match &report.dispatch {
            DispatchStatus::Sent(receipt) => info!(
                outcome = report.outcome.label(),
                provider_message_id = %receipt.provider_message_id,
                "reply sent"
            ),
            DispatchStatus::Failed(e) => error!(
                outcome = report.outcome.label(),
                transport = %self.transport.name(),
                error = %e,
                "cannot send reply"
            ),
            DispatchStatus::Abandoned => warn!(
                outcome = report.outcome.label(),
                "reply abandoned mid-send"
            ),
            DispatchStatus::NotAttempted => debug!(
                outcome = report.outcome.label(),
                "no reply sent"
            ),
        }
        report
    }
}

/// Strip the trailing newlines models like to append; blank text is unusable.
fn usable_text(text: String) -> Result<String, CompletionError> {
    let trimmed = text.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Err(CompletionError::Empty);
    }
    Ok(trimmed.to_string())
}

/// `None` when `cancel` fires before `fut` completes; `fut` is dropped.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Render an error and its sources as `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
