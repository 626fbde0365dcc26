#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use petadmin_client::api_client::{Method, Transport};
use petadmin_client::{Repository, ResourceCache};
use petadmin_shared::ApiError;
use serde_json::Value;

struct Reply {
    result: Result<Value, ApiError>,
    delay: Duration,
}

/// In-memory backend double.
///
/// Replies are queued per `(method, path)`. The last reply for a route is
/// repeated once the queue runs down to it.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<(Method, String, Option<Value>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: Method, path: &str, result: Result<Value, ApiError>) {
        self.reply_after(method, path, Duration::ZERO, result);
    }

    pub fn reply_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        result: Result<Value, ApiError>,
    ) {
        self.replies
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Reply { result, delay });
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(m, p, _)| *m == method && p == path)
            .count()
    }

    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(m, p, _)| *m == method && p == path)
            .and_then(|(_, _, body)| body.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.calls.lock().push((method.clone(), path.to_string(), body));

        let (result, delay) = {
            let mut replies = self.replies.lock();
            let Some(queue) = replies.get_mut(&(method.clone(), path.to_string())) else {
                return Err(ApiError::from_response(404, "", path));
            };
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().map(|r| Reply {
                    result: r.result.clone(),
                    delay: r.delay,
                })
            };
            match reply {
                Some(r) => (r.result, r.delay),
                None => return Err(ApiError::from_response(404, "", path)),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

pub fn repository(transport: &Arc<ScriptedTransport>) -> Repository {
    repository_with_ttl(transport, Duration::from_secs(300))
}

pub fn repository_with_ttl(transport: &Arc<ScriptedTransport>, ttl: Duration) -> Repository {
    Repository::new(transport.clone(), Arc::new(ResourceCache::with_ttl(ttl)))
}

pub fn server_error() -> ApiError {
    ApiError::from_response(500, r#"{"message":"Internal error"}"#, "/")
}
