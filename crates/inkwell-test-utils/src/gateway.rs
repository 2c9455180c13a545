//! Scripted model gateway.
//!
//! [`ScriptedGateway`] replays pre-programmed replies in order, records every
//! request it receives, and counts calls, so orchestrator tests run without
//! network access.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use inkwell_core::BoxFuture;
use inkwell_core::llm::{GatewayError, GatewayRequest, GatewayResponse, LmGateway, OutputItem};

/// One pre-programmed gateway reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(GatewayResponse),
    Fail(GatewayError),
    /// Wait, then give the inner reply.
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    /// A single assistant message.
    pub fn message(text: &str) -> Self {
        Self::Respond(GatewayResponse::new(vec![OutputItem::message(text)]))
    }

    /// A single function call.
    pub fn function_call(call_id: &str, name: &str, arguments: &str) -> Self {
        Self::Respond(GatewayResponse::new(vec![OutputItem::function_call(
            call_id, name, arguments,
        )]))
    }

    pub fn items(output: Vec<OutputItem>) -> Self {
        Self::Respond(GatewayResponse::new(output))
    }

    pub fn delayed(delay: Duration, inner: ScriptedReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

impl From<GatewayResponse> for ScriptedReply {
    fn from(response: GatewayResponse) -> Self {
        Self::Respond(response)
    }
}

/// Gateway that replays a script.
///
/// Replies are consumed front to back. Once the script is exhausted the
/// `repeat` reply (if any) answers every further call; otherwise calls fail
/// with [`GatewayError::Request`].
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<ScriptedReply>>,
    repeat: Option<ScriptedReply>,
    requests: Mutex<Vec<GatewayRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A gateway that gives the same reply forever.
    pub fn repeating(reply: ScriptedReply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    pub fn last_request(&self) -> Option<GatewayRequest> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .last()
            .cloned()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .or_else(|| self.repeat.clone())
    }
}

impl LmGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    fn respond(&self, request: &GatewayRequest) -> BoxFuture<'_, Result<GatewayResponse, GatewayError>> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request.clone());
        let reply = self.next_reply();

        Box::pin(async move {
            let mut reply = reply.ok_or_else(|| {
                GatewayError::Request(format!("ScriptedGateway: no reply scripted for call {call}"))
            })?;
            loop {
                match reply {
                    ScriptedReply::Respond(response) => return Ok(response),
                    ScriptedReply::Fail(error) => return Err(error),
                    ScriptedReply::Delay(delay, inner) => {
                        tokio::time::sleep(delay).await;
                        reply = *inner;
                    }
                }
            }
        })
    }
}
