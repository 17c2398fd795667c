use crate::models::*;
use crate::provider::{ChatProvider, TextStream};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::collections::VecDeque;
use std::env;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiService {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiService {
    pub fn new() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            client: Client::new(),
            api_base: API_BASE.to_string(),
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, system: &str, history: &[Message]) -> GeminiRequest {
        GeminiRequest {
            contents: history.iter().map(GeminiContent::from).collect(),
            system_instruction: Some(GeminiContent::text(None, system)),
            generation_config: Some(GeminiGenerationConfig {
                temperature: 0.3,
                max_output_tokens: 2048,
            }),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{}", self.api_base, self.model, method)
    }

    /// The key travels as a header so it never shows up in request URLs,
    /// and therefore never in `reqwest` error messages.
    async fn post(&self, url: &str, request: &GeminiRequest) -> Result<reqwest::Response> {
        let response = self.client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow::anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for GeminiService {
    async fn generate(&self, system: &str, history: &[Message]) -> Result<String> {
        let request = self.build_request(system, history);
        let url = self.endpoint("generateContent");

        let response = self.post(&url, &request).await?;
        let gemini_response: GeminiResponse = response.json().await?;

        let answer = gemini_response
            .first_text()
            .unwrap_or_else(|| "No response generated".to_string());

        Ok(answer)
    }

    async fn stream(&self, system: &str, history: &[Message]) -> Result<TextStream> {
        let request = self.build_request(system, history);
        let url = self.endpoint("streamGenerateContent?alt=sse");

        let response = self.post(&url, &request).await?;
        log::info!("Streaming reply from {}", self.model);

        let state = (
            Box::pin(response.bytes_stream()),
            SseTextDecoder::default(),
            VecDeque::<String>::new(),
            false,
        );

        let stream = futures::stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(text) = pending.pop_front() {
                    return Some((Ok::<String, anyhow::Error>(text), (bytes, decoder, pending, done)));
                }
                if done {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(anyhow::Error::from(e)), (bytes, decoder, pending, done)));
                    }
                    None => {
                        pending.extend(decoder.finish());
                        done = true;
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Pulls the text out of Gemini's `alt=sse` event stream. Bytes may be
/// split anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseTextDecoder {
    buf: Vec<u8>,
}

impl SseTextDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut texts = Vec::new();

        let mut start = 0;
        while let Some(len) = self.buf[start..].iter().position(|&b| b == b'\n') {
            if let Some(text) = Self::decode_line(&self.buf[start..start + len]) {
                texts.push(text);
            }
            start += len + 1;
        }
        self.buf.drain(..start);

        texts
    }

    /// Flushes a final line that had no trailing newline.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buf);
        Self::decode_line(&line).into_iter().collect()
    }

    fn decode_line(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let payload = line.trim_end_matches('\r').strip_prefix("data:")?.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return None;
        }

        match serde_json::from_str::<GeminiResponse>(payload) {
            Ok(event) => event.first_text().filter(|text| !text.is_empty()),
            Err(e) => {
                log::warn!("Skipping undecodable stream event: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\"{}\"}}]}}}}]}}\r\n\r\n",
            text
        )
    }

    #[test]
    fn decodes_whole_events() {
        let mut decoder = SseTextDecoder::default();
        let input = format!("{}{}", event("Hello"), event(" world"));
        assert_eq!(decoder.push(input.as_bytes()), vec!["Hello", " world"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseTextDecoder::default();
        let input = event("Grüße");
        let bytes = input.as_bytes();
        // split inside the multi-byte "ü"
        let cut = input.find('ü').unwrap() + 1;

        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(decoder.push(&bytes[cut..]), vec!["Grüße"]);
    }

    #[test]
    fn ignores_comments_and_bad_payloads() {
        let mut decoder = SseTextDecoder::default();
        let input = ": keep-alive\nevent: ping\ndata: not json\ndata: [DONE]\n";
        assert!(decoder.push(input.as_bytes()).is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseTextDecoder::default();
        let input = event("tail");
        let unterminated = input.trim_end();
        assert!(decoder.push(unterminated.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
    }

    #[test]
    fn keeps_partial_line_after_many_events_in_one_chunk() {
        let mut decoder = SseTextDecoder::default();
        let tail = event("d");
        let cut = tail.len() / 2;
        let input = format!("{}{}{}{}", event("a"), event("b"), event("c"), &tail[..cut]);

        assert_eq!(decoder.push(input.as_bytes()), vec!["a", "b", "c"]);
        assert_eq!(decoder.push(tail[cut..].as_bytes()), vec!["d"]);
    }

    fn service_at(api_base: &str, api_key: &str) -> GeminiService {
        GeminiService {
            client: Client::new(),
            api_base: api_base.to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    #[test]
    fn api_key_stays_out_of_the_url() {
        let service = service_at(API_BASE, "SECRETKEY123");
        let url = service.endpoint("streamGenerateContent?alt=sse");
        assert!(url.ends_with(":streamGenerateContent?alt=sse"));
        assert!(!url.contains("SECRETKEY123"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_api_key() {
        // port 9 (discard) is essentially never listening on loopback
        let service = service_at("http://127.0.0.1:9", "SECRETKEY123");

        let err = service.generate("sys", &[Message::user("q")]).await.unwrap_err();
        let text = format!("{:#} {:?}", err, err);
        assert!(text.contains("127.0.0.1:9"));
        assert!(!text.contains("SECRETKEY123"));

        let err = match service.stream("sys", &[Message::user("q")]).await {
            Ok(_) => panic!("stream should fail to connect"),
            Err(e) => e,
        };
        assert!(!format!("{:#}", err).contains("SECRETKEY123"));
    }

    #[test]
    fn request_carries_system_instruction_and_roles() {
        let service = service_at(API_BASE, "test");
        let history = vec![Message::user("q"), Message::assistant("a")];
        let request = service.build_request("be nice", &history);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system_instruction"]["parts"][0]["text"], "be nice");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert!(json["system_instruction"].get("role").is_none());
    }
}
