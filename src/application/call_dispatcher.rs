//! Call event dispatcher
//!
//! Drives each call through its lifecycle. The correlation store is the only
//! memory between deliveries: every webhook rebuilds the call's state machine
//! from its stored record, applies one event, and writes the outcome back.

use crate::domain::call::{CallContext, CallEventKind, CallState, IncomingCallData, WebhookEvent};
use crate::domain::correlation::{CallRecord, CorrelationStore, DEFAULT_RECORD_TTL};
use crate::domain::platform::{
    AnswerCallRequest, CallAutomation, TransferRequest, ANSWER_OPERATION_CONTEXT,
    TRANSFER_OPERATION_CONTEXT,
};
use crate::domain::shared::{CorrelationId, DomainError, PhoneNumber, Result};
use crate::infrastructure::media::MediaSessionRegistry;
use metrics::counter;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Builds the URLs handed to the platform when a call is answered
///
/// Both embed the correlation identifier so later deliveries can be joined
/// back to the call.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    callback_base: Url,
    media_base: Url,
}

impl CallbackUrls {
    /// `callback_base` is the normalized `.../api/callbacks` URL
    pub fn new(callback_base: &str) -> Result<Self> {
        let mut base = Url::parse(callback_base).map_err(|e| {
            DomainError::Configuration(format!("invalid callback base '{}': {}", callback_base, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(DomainError::Configuration(format!(
                "callback base '{}' cannot carry a path",
                callback_base
            )));
        }
        base.set_query(None);
        base.set_fragment(None);

        let host = base.host_str().ok_or_else(|| {
            DomainError::Configuration(format!("callback base '{}' has no host", callback_base))
        })?;
        let authority = match base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let media_base = Url::parse(&format!("wss://{}/ws", authority))
            .map_err(|e| DomainError::Configuration(format!("invalid media host: {}", e)))?;

        Ok(Self {
            callback_base: base,
            media_base,
        })
    }

    /// `<base>/<correlationId>?callerId=<callerId>`
    pub fn callback_uri(&self, correlation_id: &CorrelationId, caller_id: Option<&str>) -> String {
        let mut url = self.callback_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(correlation_id.as_str());
        }
        if let Some(caller_id) = caller_id {
            url.query_pairs_mut().append_pair("callerId", caller_id);
        }
        url.to_string()
    }

    /// `wss://<host>/ws?uuid=<correlationId>&acsPhoneNumber=<destination>`
    pub fn transport_url(&self, correlation_id: &CorrelationId, destination_number: &str) -> String {
        let mut url = self.media_base.clone();
        url.query_pairs_mut()
            .append_pair("uuid", correlation_id.as_str())
            .append_pair("acsPhoneNumber", destination_number);
        url.to_string()
    }
}

/// What happened to one lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event applied; the call is now in this state
    Applied(CallState),
    /// Hang-up issued (or attempted) and the record evicted
    Terminated,
    /// No record for the correlation id; event dropped
    Dropped,
    /// Event does not fit the call's current state; record unchanged
    Rejected,
    /// Unrecognised event type; record unchanged
    Ignored,
}

pub struct CallEventDispatcher {
    store: Arc<dyn CorrelationStore>,
    automation: Arc<dyn CallAutomation>,
    sessions: Arc<MediaSessionRegistry>,
    urls: CallbackUrls,
    ttl: Duration,
}

impl CallEventDispatcher {
    pub fn new(
        store: Arc<dyn CorrelationStore>,
        automation: Arc<dyn CallAutomation>,
        sessions: Arc<MediaSessionRegistry>,
        urls: CallbackUrls,
    ) -> Self {
        Self {
            store,
            automation,
            sessions,
            urls,
            ttl: DEFAULT_RECORD_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn urls(&self) -> &CallbackUrls {
        &self.urls
    }

    /// Answer an offered call
    ///
    /// Writes the correlation record first so callbacks racing the answer
    /// response find it. If the answer command fails the record is evicted and
    /// the error returned; nothing else exists for the call yet.
    ///
    /// With a `delivery_id` the correlation id is derived from it, and a
    /// redelivered event whose record still exists is acknowledged without a
    /// second answer.
    pub async fn handle_incoming_call(
        &self,
        data: IncomingCallData,
        delivery_id: Option<&str>,
    ) -> Result<CorrelationId> {
        let caller_id = data.caller_id()?;
        let destination = data.destination_number()?;
        let delivery_id = delivery_id.filter(|id| !id.trim().is_empty());
        let correlation_id = match delivery_id {
            Some(id) => CorrelationId::for_delivery(id),
            None => CorrelationId::new(),
        };

        if let Some(id) = delivery_id {
            if self.store.get(&correlation_id).await?.is_some() {
                counter!("incoming_call_redeliveries_total").increment(1);
                info!(
                    "Incoming call already taken: correlation_id={}, delivery_id={}",
                    correlation_id, id
                );
                return Ok(correlation_id);
            }
        }

        info!(
            "Incoming call: correlation_id={}, caller={}, destination={}",
            correlation_id, caller_id, destination
        );
        counter!("webhook_events_total", "kind" => "IncomingCall").increment(1);

        self.store
            .put(
                &correlation_id,
                CallRecord::offered(&caller_id, destination.as_str()),
                self.ttl,
            )
            .await?;

        let request = AnswerCallRequest {
            incoming_call_context: data.incoming_call_context,
            callback_uri: self.urls.callback_uri(&correlation_id, Some(&caller_id)),
            transport_url: self.urls.transport_url(&correlation_id, destination.as_str()),
            operation_context: ANSWER_OPERATION_CONTEXT.to_string(),
        };
        debug!(
            "Answering call: callback_uri={}, transport_url={}",
            request.callback_uri, request.transport_url
        );

        match self.automation.answer_call(request).await {
            Ok(answered) => {
                counter!("calls_answered_total").increment(1);
                info!(
                    "Answered call: correlation_id={}, call_connection_id={}",
                    correlation_id, answered.call_connection_id
                );
                Ok(correlation_id)
            }
            Err(e) => {
                counter!("platform_command_failures_total", "command" => "answer_call").increment(1);
                error!("Failed to answer call {}: {}", correlation_id, e);
                if let Err(evict) = self.store.delete(&correlation_id).await {
                    warn!("Failed to evict unanswered call {}: {}", correlation_id, evict);
                }
                Err(e)
            }
        }
    }

    /// Apply one lifecycle event to its call
    pub async fn dispatch(&self, event: WebhookEvent) -> Result<DispatchOutcome> {
        let kind = event.kind.clone();
        let correlation_id = event.correlation_id.clone();
        counter!("webhook_events_total", "kind" => metric_kind(&kind)).increment(1);

        info!(
            "Lifecycle event: kind={}, correlation_id={}, call_connection_id={}",
            kind,
            correlation_id,
            event.call_connection_id.as_deref().unwrap_or("-")
        );

        if !kind.is_known() {
            warn!(
                "Ignoring unknown event type '{}' for call {}",
                kind, correlation_id
            );
            return Ok(DispatchOutcome::Ignored);
        }

        let Some(record) = self.store.get(&correlation_id).await? else {
            counter!("correlation_misses_total").increment(1);
            warn!(
                "{}",
                DomainError::CorrelationMiss(correlation_id.to_string())
            );
            return Ok(DispatchOutcome::Dropped);
        };

        let context = CallContext::from_record(correlation_id.clone(), &record);
        let next = match context.state_machine().next_state(&kind) {
            Ok(next) => next,
            Err(e) => {
                warn!("Rejecting {} for call {}: {}", kind, correlation_id, e);
                return Ok(DispatchOutcome::Rejected);
            }
        };

        match kind {
            CallEventKind::CallConnected => self.on_call_connected(&context, &event, next).await,
            CallEventKind::MediaStreamingStarted | CallEventKind::MediaStreamingStopped => {
                self.on_streaming_update(&context, &event, next).await
            }
            CallEventKind::MediaStreamingFailed => {
                self.on_streaming_failed(&context, &event, next).await
            }
            CallEventKind::TerminateCall => self.on_terminate(&context, &event).await,
            CallEventKind::TransferCallToAgent => self.on_transfer(&context, &event, next).await,
            CallEventKind::IncomingCall | CallEventKind::Unknown(_) => {
                // Neither is accepted by the state machine
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn record_transition(
        &self,
        context: &CallContext,
        kind: &CallEventKind,
        next: CallState,
        extra: CallRecord,
    ) -> Result<DispatchOutcome> {
        let patch = extra.and(CallRecord::transition(next, kind.name()));
        self.store.put(context.correlation_id(), patch, self.ttl).await?;
        debug!(
            "Call {} moved {} -> {}",
            context.correlation_id(),
            context.state().name(),
            next.name()
        );
        Ok(DispatchOutcome::Applied(next))
    }

    async fn on_call_connected(
        &self,
        context: &CallContext,
        event: &WebhookEvent,
        next: CallState,
    ) -> Result<DispatchOutcome> {
        let Some(call_connection_id) = event.call_connection_id.as_deref() else {
            warn!(
                "CallConnected without callConnectionId for call {}",
                context.correlation_id()
            );
            return Ok(DispatchOutcome::Rejected);
        };

        let outcome = self
            .record_transition(
                context,
                &event.kind,
                next,
                CallRecord::connected(call_connection_id, event.server_correlation_id.as_deref()),
            )
            .await?;

        match self.automation.get_call_properties(call_connection_id).await {
            Ok(properties) => info!(
                "Call connected: correlation_id={}, call_connection_id={}, state={}, media_streaming_subscription={}",
                context.correlation_id(),
                call_connection_id,
                properties.call_connection_state.as_deref().unwrap_or("-"),
                properties
                    .media_streaming_subscription
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            Err(e) => {
                counter!("platform_command_failures_total", "command" => "get_call_properties")
                    .increment(1);
                error!(
                    "Failed to fetch properties of call {}: {}",
                    context.correlation_id(),
                    e
                );
            }
        }

        Ok(outcome)
    }

    async fn on_streaming_update(
        &self,
        context: &CallContext,
        event: &WebhookEvent,
        next: CallState,
    ) -> Result<DispatchOutcome> {
        let update = event.media_streaming_update();
        info!(
            "{}: correlation_id={}, content_type={}, status={}, details={}",
            event.kind,
            context.correlation_id(),
            update.content_type.as_deref().unwrap_or("-"),
            update.media_streaming_status.as_deref().unwrap_or("-"),
            update.media_streaming_status_details.as_deref().unwrap_or("-")
        );
        self.record_transition(context, &event.kind, next, CallRecord::default())
            .await
    }

    async fn on_streaming_failed(
        &self,
        context: &CallContext,
        event: &WebhookEvent,
        next: CallState,
    ) -> Result<DispatchOutcome> {
        let result = event.result_information();
        warn!(
            "Media streaming failed: correlation_id={}, code={}, sub_code={}, message={}",
            context.correlation_id(),
            result.code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            result.sub_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            result.message.as_deref().unwrap_or("-")
        );
        self.record_transition(context, &event.kind, next, CallRecord::default())
            .await
    }

    /// Hang up, then evict and stop the media session whatever the hang-up returned
    async fn on_terminate(&self, context: &CallContext, event: &WebhookEvent) -> Result<DispatchOutcome> {
        let correlation_id = context.correlation_id();

        match connection_id(context, event) {
            Some(call_connection_id) => {
                if let Err(e) = self.automation.hang_up(call_connection_id, true).await {
                    counter!("platform_command_failures_total", "command" => "hang_up").increment(1);
                    error!("Failed to hang up call {}: {}", correlation_id, e);
                }
            }
            None => warn!(
                "Terminating call {} before it was connected; no hang-up issued",
                correlation_id
            ),
        }

        let evicted = self.store.delete(correlation_id).await;
        if self.sessions.cancel(correlation_id).await {
            debug!("Stopped local media session for call {}", correlation_id);
        }
        evicted?;

        info!("Call terminated: correlation_id={}", correlation_id);
        Ok(DispatchOutcome::Terminated)
    }

    async fn on_transfer(
        &self,
        context: &CallContext,
        event: &WebhookEvent,
        next: CallState,
    ) -> Result<DispatchOutcome> {
        let correlation_id = context.correlation_id();
        let call_connection_id = connection_id(context, event).ok_or_else(|| {
            DomainError::InvalidStateTransition(format!(
                "call {} has no call connection to transfer",
                correlation_id
            ))
        })?;

        let target = event
            .payload_str("agentPhoneNumber")
            .map(PhoneNumber::new)
            .ok_or_else(|| {
                DomainError::ValidationError("TransferCallToAgent without agentPhoneNumber".into())
            })?;
        let source = event
            .payload_str("acsPhoneNumber")
            .or_else(|| context.destination_number().map(str::to_string))
            .map(PhoneNumber::new);

        let request = TransferRequest {
            target: target.clone(),
            source_caller_id_number: source,
            operation_context: TRANSFER_OPERATION_CONTEXT.to_string(),
            operation_callback_uri: self.urls.callback_uri(correlation_id, context.caller_id()),
        };

        if let Err(e) = self
            .automation
            .transfer_to_participant(call_connection_id, request)
            .await
        {
            counter!("platform_command_failures_total", "command" => "transfer_to_participant")
                .increment(1);
            error!("Failed to transfer call {} to {}: {}", correlation_id, target, e);
            return Err(e);
        }

        info!(
            "Transfer to agent requested: correlation_id={}, agent={}",
            correlation_id, target
        );
        self.record_transition(context, &event.kind, next, CallRecord::default())
            .await
    }
}

/// The event's call connection id, else the one stored at CallConnected
fn connection_id<'a>(context: &'a CallContext, event: &'a WebhookEvent) -> Option<&'a str> {
    event
        .call_connection_id
        .as_deref()
        .or_else(|| context.call_connection_id())
}

fn metric_kind(kind: &CallEventKind) -> String {
    if kind.is_known() {
        kind.name().to_string()
    } else {
        "Unknown".to_string()
    }
}
