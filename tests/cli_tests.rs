use clap::Parser;
use ftpgrab::*;
use ftpgrab_core::{BackoffKind, Direction, TransferError};
use ftpgrab_ftp::{DataChannelMode, FtpSecurityMode, TextEncoding};
use std::path::PathBuf;
use std::time::Duration;
use tokio_test::assert_ok;

fn create_test_cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("ftpgrab").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_download_request_from_source() {
    let cli = create_test_cli(&["-s", "ftp.example.com:2121/pub/iso/disk.img", "-r", "3", "-p", "5"]);
    let request = cli.to_request().unwrap();

    assert_eq!(request.direction, Direction::Download);
    assert_eq!(request.host, "ftp.example.com");
    assert_eq!(request.effective_port(), 2121);
    assert_eq!(request.remote_path, "/pub/iso/disk.img");
    assert_eq!(request.local_path, PathBuf::from("disk.img"));
    assert_eq!(request.retry_limit, 3);
    assert_eq!(request.retry_delay_duration(), Duration::from_millis(500));
    assert_eq!(request.username, "anonymous");
}

#[test]
fn test_download_with_explicit_destination() {
    let cli = create_test_cli(&[
        "-a", "dwn", "-s", "10.0.0.2/data.bin", "-d", "/tmp/out.bin", "--offset", "500",
    ]);
    let request = assert_ok!(cli.to_request());

    assert_eq!(request.local_path, PathBuf::from("/tmp/out.bin"));
    assert_eq!(request.start_offset, 500);
    assert!(!request.resume);
    assert_eq!(request.effective_port(), 21);
}

#[test]
fn test_upload_swaps_source_and_destination() {
    let cli = create_test_cli(&["-a", "u", "-s", "report.csv", "-d", "files.local/incoming/report.csv"]);
    let request = cli.to_request().unwrap();

    assert_eq!(request.direction, Direction::Upload);
    assert_eq!(request.host, "files.local");
    assert_eq!(request.remote_path, "/incoming/report.csv");
    assert_eq!(request.local_path, PathBuf::from("report.csv"));
}

#[test]
fn test_upload_requires_local_source() {
    let cli = create_test_cli(&["-a", "upload", "-d", "host/x"]);
    assert!(matches!(cli.to_request(), Err(TransferError::Configuration(_))));
}

#[test]
fn test_missing_server_address() {
    let cli = create_test_cli(&["-a", "list"]);
    let err = cli.to_request().unwrap_err();
    assert!(err.to_string().contains("--source"));

    let cli = create_test_cli(&["-a", "upl", "-s", "local.txt"]);
    let err = cli.to_request().unwrap_err();
    assert!(err.to_string().contains("--destination"));
}

#[test]
fn test_bad_server_addresses() {
    for raw in ["no-path", ":21/x", "host:port/x"] {
        let cli = create_test_cli(&["-s", raw]);
        assert!(
            matches!(cli.to_request(), Err(TransferError::Configuration(_))),
            "{} should be rejected",
            raw
        );
    }
}

#[test]
fn test_retry_limit_below_unlimited_rejected() {
    let cli = create_test_cli(&["-s", "h/f", "-r", "-2"]);
    assert!(matches!(cli.to_request(), Err(TransferError::Configuration(_))));
}

#[test]
fn test_zero_data_timeout_rejected() {
    let cli = create_test_cli(&["-s", "h/f", "--data-timeout", "0"]);
    assert!(matches!(cli.to_request(), Err(TransferError::Configuration(_))));
}

#[test]
fn test_tls_settings() {
    let cli = create_test_cli(&["-s", "secure.example.com/f", "--ssl", "-I"]);
    let config = cli.to_request().unwrap().connection_config();
    assert_eq!(config.security, FtpSecurityMode::Explicit);
    assert_eq!(config.port, 21);
    assert!(config.accept_invalid_certs);

    let cli = create_test_cli(&["-s", "secure.example.com/f", "--ssl", "--implicit-tls"]);
    let config = cli.to_request().unwrap().connection_config();
    assert_eq!(config.security, FtpSecurityMode::Implicit);
    assert_eq!(config.port, 990);

    let cli = create_test_cli(&["-s", "secure.example.com/f", "--implicit-tls"]);
    assert!(cli.to_request().is_err());
}

#[test]
fn test_protocol_options() {
    let cli = create_test_cli(&[
        "-s",
        "h/f",
        "-e",
        "latin1",
        "--data-mode",
        "epsv",
        "--backoff",
        "exponential",
        "--connect-timeout",
        "3",
        "--data-timeout",
        "7",
        "--user",
        "bob",
        "--pass",
        "secret",
        "-c",
    ]);
    let request = cli.to_request().unwrap();

    assert_eq!(request.encoding, TextEncoding::Latin1);
    assert_eq!(request.data_channel_mode, DataChannelMode::ExtendedPassive);
    assert_eq!(request.backoff, BackoffKind::Exponential);
    assert_eq!(request.connect_timeout_sec, 3);
    assert_eq!(request.data_timeout_sec, 7);
    assert_eq!(request.username, "bob");
    assert_eq!(request.password, "secret");
    assert!(request.resume);
}

#[test]
fn test_verbose_is_counted() {
    assert_eq!(create_test_cli(&["-vv"]).verbose, 2);
    assert_eq!(create_test_cli(&["-v", "--verbose"]).verbose, 2);
}

#[tokio::test]
async fn test_help_action_succeeds() {
    let cli = create_test_cli(&["-a", "help"]);
    let status = run(&cli, &ftpgrab_core::CancellationToken::new()).await.unwrap();
    assert_eq!(status, RunStatus::Success);
}
