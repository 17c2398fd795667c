// Terminal front-end: upload a PDF, then ask questions about it.
// The document backend is the `api` server (GENIE_BACKEND_URL).

use anyhow::Result;
use genie::formatter::{format, render_plain};
use genie::{
    ChatFlow, DocumentBackend, HttpDocumentBackend, MemorySessionStore, Role, SelectedFile,
    SubmitOutcome, UploadFlow, UploadOutcome,
};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

async fn read_selected_file(path: &str) -> Result<SelectedFile> {
    let path = Path::new(path);
    let bytes = tokio::fs::read(path).await?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.pdf".to_string());

    // stands in for the type a browser would declare for the picked file
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    Ok(SelectedFile {
        name,
        content_type,
        bytes,
    })
}

fn prompt(label: &str) -> Result<()> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(())
}

/// Runs the upload page until a document is accepted. `None` means stdin closed.
async fn upload_page(
    first_path: Option<String>,
    backend: &HttpDocumentBackend,
    store: &mut MemorySessionStore,
    input: &mut Input,
) -> Result<Option<String>> {
    let mut flow = UploadFlow::new();
    let mut next_path = first_path;

    loop {
        let path = match next_path.take() {
            Some(path) => path,
            None => {
                prompt("PDF to upload: ")?;
                match input.next_line().await? {
                    Some(line) => line.trim().to_string(),
                    None => return Ok(None),
                }
            }
        };
        if path.is_empty() {
            continue;
        }

        let file = match read_selected_file(&path).await {
            Ok(file) => file,
            Err(e) => {
                println!("Could not read {}: {}", path, e);
                continue;
            }
        };

        println!("Processing your PDF...");
        match flow.pick_file(Some(file), backend, store).await {
            UploadOutcome::Redirected { display_name, .. } => return Ok(Some(display_name)),
            UploadOutcome::Rejected(notice) | UploadOutcome::Failed(notice) => println!("{}", notice),
            UploadOutcome::Ignored => {}
        }
    }
}

enum ChatExit {
    Back,
    Quit,
}

async fn chat_page(
    backend: &HttpDocumentBackend,
    store: &mut MemorySessionStore,
    input: &mut Input,
) -> Result<ChatExit> {
    let mut chat = match ChatFlow::enter(&*store) {
        Ok(chat) => chat,
        Err(e) => {
            log::warn!("Cannot open chat: {}", e);
            return Ok(ChatExit::Back);
        }
    };

    println!();
    println!("Welcome to Genie! I've loaded your PDF: {}", chat.session().document_name);
    println!("Ask me anything about the document. /back uploads another file, /quit exits.");

    loop {
        prompt("\n> ")?;
        let Some(line) = input.next_line().await? else {
            return Ok(ChatExit::Quit);
        };

        match line.trim() {
            "/quit" => return Ok(ChatExit::Quit),
            "/back" => {
                chat.leave(store);
                return Ok(ChatExit::Back);
            }
            _ => {}
        }

        chat.set_input(line);
        println!("Genie is thinking...");

        match chat.submit_input(backend).await {
            SubmitOutcome::Answered => {
                if let Some(reply) = chat.messages().last().filter(|m| m.role == Role::Assistant) {
                    println!();
                    print!("{}", render_plain(&format(&reply.content), true));
                }
            }
            SubmitOutcome::Failed(_) => println!("Failed to get response. Please try again."),
            SubmitOutcome::Ignored => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let backend = HttpDocumentBackend::from_env();
    log::info!("Using document backend at {}", backend.base_url());

    let mut store = MemorySessionStore::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut first_path = std::env::args().nth(1);

    loop {
        let Some(name) = upload_page(first_path.take(), &backend, &mut store, &mut input).await? else {
            break;
        };
        log::info!("Uploaded {}", name);

        match chat_page(&backend, &mut store, &mut input).await? {
            ChatExit::Back => {
                if let Err(e) = backend.new_chat().await {
                    log::warn!("Could not reset backend session: {}", e);
                }
            }
            ChatExit::Quit => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie::PDF_MIME_TYPE;

    async fn write_temp(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("genie-pick-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(name);
        tokio::fs::write(&path, b"content").await.unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn picked_file_type_comes_from_its_extension() {
        let pdf = read_selected_file(&write_temp("Policy.PDF").await).await.unwrap();
        assert_eq!(pdf.name, "Policy.PDF");
        assert_eq!(pdf.content_type, PDF_MIME_TYPE);
        assert!(pdf.ensure_pdf().is_ok());

        let notes = read_selected_file(&write_temp("notes.txt").await).await.unwrap();
        assert_eq!(notes.content_type, "text/plain");

        let unknown = read_selected_file(&write_temp("blob.genie-unknown").await).await.unwrap();
        assert_eq!(unknown.content_type, "application/octet-stream");
    }
}
