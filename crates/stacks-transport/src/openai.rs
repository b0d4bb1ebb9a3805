//! OpenAI-compatible HTTP transport: a runnable reference implementation
//! and the fixture the end-to-end loop tests exercise against a mock
//! server. Not part of the spec's core contract — the core only depends on
//! [`crate::GenerationTransport`].

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{EventStream, GenerateOptions, GenerateResult, GenerationTransport, StreamEvent, TransportError, Usage};

pub struct OpenAiTransport {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiTransport {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_body(&self, prompt: &str, options: &GenerateOptions, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system_prompt) = &options.system_prompt {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));
        json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        })
    }
}

#[async_trait]
impl GenerationTransport for OpenAiTransport {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateResult, TransportError> {
        let body = self.request_body(prompt, options, false);
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!("{status}: {text}")));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let usage = json.get("usage").map(|u| Usage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
        });
        Ok(GenerateResult { content, usage })
    }

    async fn generate_stream<'a>(
        &'a self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<EventStream<'a>, TransportError> {
        let body = self.request_body(prompt, options, true);
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!("{status}: {text}")));
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut byte_stream = resp.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(TransportError::Request(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        let _ = tx.send(Ok(StreamEvent::Complete { usage: None })).await;
                        return;
                    }
                    let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                    if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                        if !delta.is_empty() {
                            let _ = tx
                                .send(Ok(StreamEvent::Delta { text: delta.to_string() }))
                                .await;
                        }
                    }
                }
            }
            let _ = tx.send(Ok(StreamEvent::Complete { usage: None })).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_includes_system_prompt_when_present() {
        let t = OpenAiTransport::new("http://localhost", "key", "gpt-4o-mini");
        let opts = GenerateOptions {
            system_prompt: Some("be terse".to_string()),
            ..Default::default()
        };
        let body = t.request_body("hello", &opts, false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }
}
