//! Per-request caller information

use crate::auth::Authorized;
use actix_web::HttpRequest;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Who is calling and under which request id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub client_id: String,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(request_id: String, authorized: Authorized) -> Self {
        Self {
            request_id,
            client_id: authorized.client_id,
            user_id: authorized.user_id,
        }
    }

    /// Build the context for an authorized request and tag the log MDC with it
    pub fn from_request(req: &HttpRequest, authorized: Authorized) -> Self {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        let context = Self::new(request_id, authorized);
        log_mdc::insert("request_id", &context.request_id);
        log_mdc::insert("client_id", &context.client_id);
        context
    }

    /// Who to credit in logs: the user if there is one, else the client
    pub fn actor(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.client_id)
    }
}

fn generate_request_id() -> String {
    let sequence = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:06x}", Utc::now().timestamp_millis(), sequence & 0xff_ffff)
}
