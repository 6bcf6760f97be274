use anyhow::Result;
use slackcat::core::snippet::SnippetOptions;
use slackcat::core::Delivery;
use slackcat::{NoopSender, SlackcatError, SnippetEngine};
use std::io::Cursor;
use tempfile::TempDir;

fn uploads(sender: &NoopSender) -> Vec<slackcat::core::FileUpload> {
    sender
        .deliveries()
        .into_iter()
        .filter_map(|d| match d {
            Delivery::File { upload, .. } => Some(upload),
            Delivery::Message { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stdin_lines_become_one_newline_terminated_file() -> Result<()> {
    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), SnippetOptions::default());

    let upload = engine
        .upload_stream(Cursor::new(b"a\nb\r\nc".to_vec()))
        .await?;

    assert_eq!(upload.content, b"a\nb\nc\n");
    // Timestamped, e.g. 2026-10-18T09-30-00
    assert_eq!(upload.filename.len(), 19);
    assert!(upload.filename.starts_with(|c: char| c.is_ascii_digit()));
    assert_eq!(uploads(&sender), vec![upload]);
    Ok(())
}

#[tokio::test]
async fn test_empty_stdin_uploads_empty_file() -> Result<()> {
    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), SnippetOptions::default());

    let upload = engine.upload_stream(Cursor::new(Vec::new())).await?;

    assert!(upload.content.is_empty());
    assert_eq!(uploads(&sender).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_file_upload_defaults_to_base_name() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("build.log");
    tokio::fs::write(&path, "step 1\nstep 2\n").await?;

    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), SnippetOptions::default());
    let upload = engine.upload_path(&path).await?;

    assert_eq!(upload.filename, "build.log");
    assert_eq!(upload.content, b"step 1\nstep 2\n");
    assert!(upload.filetype.is_none());
    Ok(())
}

#[tokio::test]
async fn test_options_override_metadata() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("raw.txt");
    tokio::fs::write(&path, "fn main() {}\n").await?;

    let options = SnippetOptions {
        filename: Some("main.rs".to_string()),
        filetype: Some("rust".to_string()),
        comment: Some("look at this".to_string()),
    };
    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), options);
    let upload = engine.upload_path(&path).await?;

    assert_eq!(upload.filename, "main.rs");
    assert_eq!(upload.filetype.as_deref(), Some("rust"));
    assert_eq!(upload.comment.as_deref(), Some("look at this"));
    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_an_input_error() {
    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), SnippetOptions::default());

    let err = engine
        .upload_path(std::path::Path::new("/definitely/not/here.log"))
        .await
        .unwrap_err();

    assert!(matches!(err, SlackcatError::Input(_)));
    assert!(sender.deliveries().is_empty());
}

#[tokio::test]
async fn test_tee_echoes_while_spooling() -> Result<()> {
    let sender = NoopSender::new("general");
    let engine = SnippetEngine::new(sender.clone(), SnippetOptions::default());
    let (echo, mut echoed) = tokio::io::duplex(1024);

    let upload = engine
        .upload_stream_with_echo(Cursor::new(b"hello\n".to_vec()), echo)
        .await?;

    let mut text = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut echoed, &mut text).await?;
    assert_eq!(text, "hello\n");
    assert_eq!(upload.content, b"hello\n");
    Ok(())
}
