//! Streaming document render driver.
//!
//! # Responsibilities
//! - Render the document shell and flush it first
//! - Resolve deferred sections concurrently, streaming each as it settles
//! - Reject sections still pending at the stream timeout
//! - Buffer the full document for crawlers and SPA mode
//!
//! # Data Flow
//! ```text
//! render()
//!     → shell template (fails → 500, Aborted)
//!     → spawned driver: shell chunk, section chunks in settle order,
//!       rejected chunks at timeout, document tail
//!     → mpsc channel → response body (streamed or buffered)
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::render::bot::is_bot;
use crate::render::templates::Templates;

/// Closes the document opened by the layout.
pub const DOCUMENT_TAIL: &str = "\n</body>\n</html>\n";

const SHELL_ERROR_BODY: &str =
    "<!DOCTYPE html><html><head><title>Error</title></head><body><h1>Internal Server Error</h1></body></html>";

const DEFAULT_ERROR_FALLBACK: &str = r#"<p role="alert">This section failed to load.</p>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Rendering,
    ShellRendered,
    Complete,
    Aborted,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Complete | RenderState::Aborted)
    }
}

/// Whether the body streams or waits for every section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Streaming,
    AllReady,
}

impl RenderMode {
    /// Crawlers and SPA mode get fully-resolved documents.
    pub fn for_request(user_agent: Option<&str>, spa_mode: bool) -> Self {
        if spa_mode || user_agent.is_some_and(is_bot) {
            RenderMode::AllReady
        } else {
            RenderMode::Streaming
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to render document shell `{template}`: {source}")]
    Shell {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },
}

pub type SectionError = Box<dyn std::error::Error + Send + Sync>;

/// Part of a document rendered after the shell.
pub struct Section {
    id: &'static str,
    fallback: String,
    error_fallback: String,
    pending: BoxFuture<'static, Result<String, SectionError>>,
}

impl Section {
    /// `fallback` is shown in the shell until `pending` settles.
    pub fn new<F>(id: &'static str, fallback: impl Into<String>, pending: F) -> Self
    where
        F: Future<Output = Result<String, SectionError>> + Send + 'static,
    {
        Self {
            id,
            fallback: fallback.into(),
            error_fallback: DEFAULT_ERROR_FALLBACK.to_string(),
            pending: pending.boxed(),
        }
    }

    /// Markup shown when the section fails or is rejected at the timeout.
    pub fn error_fallback(mut self, html: impl Into<String>) -> Self {
        self.error_fallback = html.into();
        self
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    fn placeholder(&self) -> String {
        format!(r#"<div data-section="{}">{}</div>"#, self.id, self.fallback)
    }
}

fn resolved_chunk(id: &str, html: &str) -> String {
    format!(
        r#"<template data-section-content="{id}">{html}</template><script>__resolveSection("{id}")</script>"#
    )
}

fn rejected_chunk(id: &str, html: &str) -> String {
    format!(
        r#"<template data-section-content="{id}" data-rejected>{html}</template><script>__resolveSection("{id}")</script>"#
    )
}

/// A page ready to render: shell template, its context and deferred sections.
///
/// Section placeholders are exposed to the template as `sections.<id>`.
pub struct Document {
    template: &'static str,
    context: Value,
    sections: Vec<Section>,
}

impl Document {
    pub fn new(template: &'static str, context: Value) -> Self {
        Self {
            template,
            context,
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    fn shell_context(&self) -> Value {
        let mut context = match &self.context {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let placeholders: Map<String, Value> = self
            .sections
            .iter()
            .map(|s| (s.id.to_string(), Value::String(s.placeholder())))
            .collect();
        context.insert("sections".to_string(), Value::Object(placeholders));
        Value::Object(context)
    }
}

/// Renders [`Document`]s into HTTP responses.
#[derive(Clone)]
pub struct StreamingRenderer {
    templates: Arc<Templates>,
    timeout: Duration,
}

impl StreamingRenderer {
    pub fn new(templates: Arc<Templates>, timeout: Duration) -> Self {
        Self { templates, timeout }
    }

    pub fn templates(&self) -> &Arc<Templates> {
        &self.templates
    }

    pub async fn render(&self, document: Document, mode: RenderMode) -> RenderedDocument {
        let deadline = Instant::now() + self.timeout;
        let (state_tx, state_rx) = watch::channel(RenderState::Rendering);

        let context = document.shell_context();
        let shell = match self.templates.render(document.template, &context) {
            Ok(shell) => shell,
            Err(source) => {
                let err = RenderError::Shell {
                    template: document.template,
                    source,
                };
                tracing::error!(error = %err, "Shell render failed");
                metrics::record_render("shell_error");
                state_tx.send_replace(RenderState::Aborted);
                return RenderedDocument {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: RenderBody::Buffered(Bytes::from_static(SHELL_ERROR_BODY.as_bytes())),
                    state: state_rx,
                };
            }
        };
        state_tx.send_replace(RenderState::ShellRendered);

        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(drive_sections(shell, document.sections, deadline, tx, state_tx));

        let body = match mode {
            RenderMode::Streaming => RenderBody::Stream(rx),
            RenderMode::AllReady => {
                let mut buffered = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    buffered.extend_from_slice(&chunk);
                }
                RenderBody::Buffered(Bytes::from(buffered))
            }
        };

        RenderedDocument {
            status: StatusCode::OK,
            body,
            state: state_rx,
        }
    }
}

async fn drive_sections(
    shell: String,
    sections: Vec<Section>,
    deadline: Instant,
    tx: mpsc::Sender<Bytes>,
    state: watch::Sender<RenderState>,
) {
    if tx.send(Bytes::from(shell)).await.is_err() {
        tracing::debug!("Client went away before the shell was sent");
        state.send_replace(RenderState::Aborted);
        return;
    }

    let mut unsettled: Vec<(&'static str, String)> = sections
        .iter()
        .map(|s| (s.id, s.error_fallback.clone()))
        .collect();
    let mut pending: FuturesUnordered<_> = sections
        .into_iter()
        .map(|s| {
            let id = s.id;
            s.pending.map(move |result| (id, result))
        })
        .collect();

    let timer = tokio::time::sleep_until(deadline);
    tokio::pin!(timer);
    let mut timed_out = false;

    while !pending.is_empty() {
        tokio::select! {
            Some((id, result)) = pending.next() => {
                let Some(index) = unsettled.iter().position(|(u, _)| *u == id) else {
                    continue;
                };
                let (_, error_fallback) = unsettled.swap_remove(index);
                let chunk = match result {
                    Ok(html) => resolved_chunk(id, &html),
                    Err(err) => {
                        tracing::error!(section = id, error = %err, "Deferred section failed");
                        rejected_chunk(id, &error_fallback)
                    }
                };
                if tx.send(Bytes::from(chunk)).await.is_err() {
                    tracing::debug!(section = id, "Client went away mid-stream");
                    state.send_replace(RenderState::Aborted);
                    return;
                }
            }
            _ = &mut timer => {
                timed_out = true;
                break;
            }
        }
    }
    drop(pending);

    if timed_out {
        let ids: Vec<&str> = unsettled.iter().map(|(id, _)| *id).collect();
        tracing::warn!(sections = ?ids, "Stream timeout reached; rejecting unsettled sections");
        for (id, error_fallback) in &unsettled {
            if tx.send(Bytes::from(rejected_chunk(id, error_fallback))).await.is_err() {
                state.send_replace(RenderState::Aborted);
                return;
            }
        }
    }

    // A closed channel here only means nobody reads the tail.
    let _ = tx.send(Bytes::from_static(DOCUMENT_TAIL.as_bytes())).await;

    if timed_out {
        metrics::record_render("timed_out");
        state.send_replace(RenderState::Aborted);
    } else {
        metrics::record_render("complete");
        state.send_replace(RenderState::Complete);
    }
}

enum RenderBody {
    Stream(mpsc::Receiver<Bytes>),
    Buffered(Bytes),
}

/// Output of [`StreamingRenderer::render`].
pub struct RenderedDocument {
    status: StatusCode,
    body: RenderBody,
    state: watch::Receiver<RenderState>,
}

impl RenderedDocument {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn state(&self) -> RenderState {
        *self.state.borrow()
    }

    /// Wait until rendering reaches a terminal state.
    pub async fn all_ready(&mut self) -> RenderState {
        if let Ok(state) = self.state.wait_for(|s| s.is_terminal()).await {
            return *state;
        }
        *self.state.borrow()
    }
}

impl IntoResponse for RenderedDocument {
    fn into_response(self) -> Response {
        let body = match self.body {
            RenderBody::Buffered(bytes) => Body::from(bytes),
            RenderBody::Stream(rx) => Body::from_stream(futures_util::stream::unfold(
                rx,
                |mut rx| async move {
                    rx.recv()
                        .await
                        .map(|chunk| (Ok::<_, Infallible>(chunk), rx))
                },
            )),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        response
    }
}
