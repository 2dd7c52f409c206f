//! Helper functions for REST handlers

use crate::messages::{Message, RESTResponse};
use anyhow::Result;
use caryatid_sdk::Context;
use futures::future::Future;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handle a REST request whose path carries `count` parameters after the
/// resource name, e.g. `/spells/legacy/1-0xabc` has two
pub fn handle_rest_with_parameters<F, Fut>(
    context: Arc<Context<Message>>,
    topic: &str,
    count: usize,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<RESTResponse>> + Send + 'static,
{
    context.handle(topic, move |message: Arc<Message>| {
        let handler = handler.clone();
        async move {
            let response = match message.as_ref() {
                Message::RESTRequest(request) => {
                    info!("REST received {} {}", request.method, request.path);
                    let params: Vec<String> =
                        request.path_elements.iter().skip(1).take(count).cloned().collect();
                    if params.len() < count {
                        RESTResponse::with_text(400, &format!("{count} parameter(s) must be provided"))
                    } else {
                        match handler(params).await {
                            Ok(response) => response,
                            Err(error) => RESTResponse::with_text(500, &format!("{error:?}")),
                        }
                    }
                }
                _ => {
                    error!("Unexpected message type {:?}", message);
                    RESTResponse::with_text(500, "Unexpected message in REST request")
                }
            };

            Arc::new(Message::RESTResponse(response))
        }
    })
}

/// 200 with the entity as JSON, or 404 naming what was missing
pub fn json_or_not_found<T: Serialize>(entity: Option<T>, what: &str) -> Result<RESTResponse> {
    match entity {
        Some(entity) => Ok(RESTResponse::with_json(200, &serde_json::to_string(&entity)?)),
        None => Ok(RESTResponse::with_text(404, &format!("{what} not found"))),
    }
}
