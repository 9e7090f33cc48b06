mod support;

use ftpgrab_ftp::*;
use support::{start_server, ServerState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_test::{assert_err, assert_ok};

fn create_test_config(addr: std::net::SocketAddr) -> FtpConnectionConfig {
    FtpConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: "tester".to_string(),
        password: "secret".to_string(),
        connect_timeout_sec: 5,
        data_timeout_sec: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connect_and_login() {
    let addr = start_server(ServerState::default()).await;
    let mut client = assert_ok!(FtpClient::connect(create_test_config(addr)).await);

    assert!(client.is_connected());
    assert!(!client.is_secure());
    assert!(client.banner.contains("test server ready"));
    assert!(client.features.size);
    assert!(client.features.raw_features.iter().any(|f| f == "REST STREAM"));
    assert!(!client.features.mlsd);
    assert_eq!(client.pwd().await.unwrap(), "/");

    client.quit().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_wrong_password_is_auth_failure() {
    let state = ServerState::default();
    *state.password.lock().unwrap() = "right".to_string();
    let addr = start_server(state).await;

    let err = FtpClient::connect(create_test_config(addr))
        .await
        .err()
        .expect("login should be refused");
    assert_eq!(err.kind, FtpErrorKind::AuthFailed);
    assert_eq!(err.code, Some(530));
}

#[tokio::test]
async fn test_empty_host_rejected() {
    let config = FtpConnectionConfig::default();
    let err = FtpClient::connect(config).await.err().expect("empty host");
    assert_eq!(err.kind, FtpErrorKind::InvalidConfig);
}

#[tokio::test]
async fn test_size_and_missing_file() {
    let state = ServerState::default().with_file("/pub/a.bin", &[7u8; 1000]);
    let addr = start_server(state).await;
    let mut client = FtpClient::connect(create_test_config(addr)).await.unwrap();

    assert_eq!(client.size("/pub/a.bin").await.unwrap(), 1000);
    let err = assert_err!(client.size("/pub/missing").await);
    assert_eq!(err.kind, FtpErrorKind::NotFound);
}

#[tokio::test]
async fn test_retrieve_from_offset() {
    let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let state = ServerState::default().with_file("/pub/a.bin", &data);
    let addr = start_server(state.clone()).await;
    let mut client = FtpClient::connect(create_test_config(addr)).await.unwrap();

    let mut stream = client.retrieve("/pub/a.bin", 500).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    drop(stream);
    assert_ok!(client.finish_transfer().await);

    assert_eq!(buf, data[500..].to_vec());
    assert!(state.saw("REST 500"));
    assert!(state.saw("TYPE I"));
}

#[tokio::test]
async fn test_retrieve_missing_file() {
    let addr = start_server(ServerState::default()).await;
    let mut client = FtpClient::connect(create_test_config(addr)).await.unwrap();

    let err = client.retrieve("/nope", 0).await.err().expect("RETR should fail");
    assert_eq!(err.kind, FtpErrorKind::NotFound);
    // The control connection stays usable after a rejected RETR.
    assert_ok!(client.noop().await);
}

#[tokio::test]
async fn test_store_uploads_bytes() {
    let state = ServerState::default();
    let addr = start_server(state.clone()).await;
    let mut client = FtpClient::connect(create_test_config(addr)).await.unwrap();

    let mut stream = client.store("/incoming/up.txt").await.unwrap();
    stream.write_all(b"hello over ftp").await.unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);
    assert_ok!(client.finish_transfer().await);

    assert_eq!(state.file("/incoming/up.txt").unwrap(), b"hello over ftp".to_vec());
}

#[tokio::test]
async fn test_list_parses_unix_listing() {
    let state = ServerState::default();
    *state.listing.lock().unwrap() = "drwxr-xr-x 2 ftp ftp 4096 Jan 01 2025 docs\r\n\
         -rw-r--r-- 1 ftp ftp 42 Jan 01 2025 readme.txt\r\n\
         lrwxrwxrwx 1 ftp ftp 4 Jan 01 2025 latest -> docs\r\n"
        .to_string();
    let addr = start_server(state.clone()).await;
    let mut client = FtpClient::connect(create_test_config(addr)).await.unwrap();

    let entries = client.list("/pub").await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].kind, FtpEntryKind::Directory);
    assert_eq!(entries[1].name, "readme.txt");
    assert_eq!(entries[1].size, 42);
    assert_eq!(entries[2].kind, FtpEntryKind::Symlink);
    assert!(state.saw("LIST /pub"));
    assert!(state.saw("TYPE A"));
}
