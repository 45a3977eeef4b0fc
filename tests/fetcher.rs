use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use git_packages::config::PackagesConfig;
use git_packages::error::PackagesError;
use git_packages::fetcher::{ArchiveFetcher, HttpArchiveFetcher, user_agent};
use git_packages::manifest::Manifest;
use git_packages::pipeline::Pipeline;

fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves one response and hands back the raw request head, lowercased.
async fn serve_once(status_line: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let status_line = status_line.to_string();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buf).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        // The client may hang up once the tar end marker has been read.
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).to_lowercase()
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn sends_user_agent_and_token_and_unpacks_body() {
    let archive = tar_gz(&[
        ("repo-c2792ca/bank-account/README.md", "bank"),
        ("repo-c2792ca/secrets/README.md", "secrets"),
    ]);
    let (base, server) = serve_once("200 OK", archive).await;
    let url = format!("{base}/repos/jon/test/tarball/c2792ca");

    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let config = PackagesConfig::new_with_paths(root.join("packages"), root, None);
    let manifest = Manifest::parse(&format!(
        r#"{{"{url}": [{{"name": "jon:bank-account", "path": "bank-account"}}], "token": "abc123"}}"#
    ))
    .unwrap();

    let pipeline = Pipeline::new(config.clone(), HttpArchiveFetcher::new().unwrap());
    let result = pipeline.acquire(&manifest).await.unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("get /repos/jon/test/tarball/c2792ca "));
    assert!(request.contains(&format!("user-agent: {}", user_agent().to_lowercase())));
    assert!(request.contains("authorization: token abc123"));
    assert_eq!(result.packages.len(), 1);
    assert_eq!(
        fs::read_to_string(
            config
                .package_path("jon_bank-account/README.md")
                .as_std_path()
        )
        .unwrap(),
        "bank"
    );
    assert!(!config.package_path("jon_secrets").as_std_path().exists());
}

#[tokio::test]
async fn omits_authorization_without_token() {
    let (base, server) = serve_once("200 OK", tar_gz(&[("repo/a.txt", "a")])).await;
    let dir = tempfile::tempdir().unwrap();

    HttpArchiveFetcher::new()
        .unwrap()
        .fetch(&format!("{base}/a.tar.gz"), None, dir.path())
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert!(!request.contains("authorization:"));
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a");
}

#[tokio::test]
async fn non_success_status_is_transport_fault() {
    let (base, server) = serve_once("404 Not Found", Vec::new()).await;
    let url = format!("{base}/missing.tar.gz");
    let dir = tempfile::tempdir().unwrap();

    let err = HttpArchiveFetcher::new()
        .unwrap()
        .fetch(&url, None, dir.path())
        .await
        .unwrap_err();
    server.await.unwrap();

    assert_matches!(err, PackagesError::HttpStatus { status: 404, url: failed } if failed == url);
}
