use futures::StreamExt;
use genie::formatter::{format, render_plain};
use reqwest::Client;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let base_url = std::env::var("GENIE_BACKEND_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());

    println!("Testing the chat completion relay at {}", base_url);

    let payload = json!({
        "messages": [
            { "role": "user", "content": "What kinds of questions can you answer about a PDF?" }
        ]
    });

    let response = client
        .post(format!("{}/api/chat", base_url))
        .json(&payload)
        .send()
        .await?;

    println!("Status: {}", response.status());
    if !response.status().is_success() {
        println!("Body: {}", response.text().await?);
        return Ok(());
    }

    let mut body = response.bytes_stream();
    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        print!("{}", String::from_utf8_lossy(&chunk));
        raw.extend_from_slice(&chunk);
    }
    println!();
    let reply = String::from_utf8_lossy(&raw);

    println!("\nFormatted:");
    print!("{}", render_plain(&format(&reply), true));

    println!("\nRelay test completed!");
    Ok(())
}
