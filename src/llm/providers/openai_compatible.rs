use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{CuaError, CuaResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{ChatMessage, CompletionRequest, LlmResponse, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// `timeout` bounds the whole request, including reading the response body.
    pub fn new(id: String, api_base: String, api_key: String, timeout: Duration) -> CuaResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: CompletionRequest) -> CuaResult<LlmResponse> {
        let cfg = &request.call;
        let messages = vec![ChatMessage::user_with_image(
            &request.prompt,
            &request.image_base64,
        )];
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            prompt_len = request.prompt.len(),
            image_b64_len = request.image_base64.len(),
            "sending LLM request"
        );
        tracing::trace!(body = %sanitized_body(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(CuaError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulate an SSE stream into a single response.
    async fn handle_stream(&self, response: reqwest::Response) -> CuaResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut out = LlmResponse::default();

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result?;
            for &b in bytes.iter() {
                if b != b'\n' {
                    line_buf.push(b);
                    continue;
                }
                let done = apply_sse_line(&mut out, &line_buf)?;
                line_buf.clear();
                if done {
                    break 'stream;
                }
            }
        }
        // Last event of a stream that ended without a trailing newline.
        if !line_buf.is_empty() {
            apply_sse_line(&mut out, &line_buf)?;
        }

        tracing::debug!(
            provider = %self.id,
            content_len = out.content.len(),
            reasoning_len = out.reasoning.len(),
            "LLM stream complete"
        );
        Ok(out)
    }

    async fn handle_json(&self, response: reqwest::Response) -> CuaResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;

        let message = &json["choices"][0]["message"];
        if message.is_null() {
            return Err(CuaError::LlmProvider(format!(
                "response has no choices[0].message: {json}"
            )));
        }

        let out = LlmResponse {
            content: message["content"].as_str().unwrap_or("").to_string(),
            reasoning: message["reasoning_content"].as_str().unwrap_or("").to_string(),
        };

        tracing::debug!(
            provider = %self.id,
            content_len = out.content.len(),
            "LLM JSON response received"
        );
        Ok(out)
    }
}

/// Fold one raw SSE line into `out`. Returns true once the stream is done.
fn apply_sse_line(out: &mut LlmResponse, raw: &[u8]) -> CuaResult<bool> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => match chunk.kind {
            StreamChunkKind::Reasoning => out.reasoning.push_str(&chunk.content),
            StreamChunkKind::Content => out.content.push_str(&chunk.content),
            StreamChunkKind::Error => return Err(CuaError::LlmProvider(chunk.content)),
            StreamChunkKind::Done => return Ok(true),
        },
        Ok(None) => {}
        Err(e) => tracing::debug!("SSE parse skipped: {e}"),
    }
    Ok(false)
}

/// Copy of the request body with base64 image payloads replaced, for logging.
fn sanitized_body(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                    continue;
                }
                if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                    *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}
