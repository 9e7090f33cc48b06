//! A tiny in-process FTP server good enough to drive the client in tests.
//!
//! One control connection at a time, passive mode only, files kept in memory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone, Default)]
pub struct ServerState {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
    pub password: Arc<Mutex<String>>,
    pub listing: Arc<Mutex<String>>,
}

impl ServerState {
    pub fn with_file(self, name: &str, data: &[u8]) -> Self {
        self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
        self
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn saw(&self, prefix: &str) -> bool {
        self.commands.lock().unwrap().iter().any(|c| c.starts_with(prefix))
    }
}

/// Start the server; it serves control connections until the test ends.
pub async fn start_server(state: ServerState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((sock, _)) = listener.accept().await {
            let state = state.clone();
            tokio::spawn(async move {
                let _ = serve(sock, state).await;
            });
        }
    });
    addr
}

async fn reply(w: &mut (impl AsyncWriteExt + Unpin), text: &str) -> std::io::Result<()> {
    w.write_all(text.as_bytes()).await?;
    w.write_all(b"\r\n").await
}

async fn serve(sock: TcpStream, state: ServerState) -> std::io::Result<()> {
    let (rd, mut wr) = sock.into_split();
    let mut rd = BufReader::new(rd);
    let mut data_listener: Option<TcpListener> = None;
    let mut rest: u64 = 0;

    reply(&mut wr, "220-Welcome\r\n220 test server ready").await?;
    let mut line = String::new();
    loop {
        line.clear();
        if rd.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let cmd = line.trim_end().to_string();
        state.commands.lock().unwrap().push(cmd.clone());
        let (verb, arg) = match cmd.split_once(' ') {
            Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
            None => (cmd.to_ascii_uppercase(), String::new()),
        };

        match verb.as_str() {
            "USER" => reply(&mut wr, "331 Password required").await?,
            "PASS" => {
                let expected = state.password.lock().unwrap().clone();
                if expected.is_empty() || arg == expected {
                    reply(&mut wr, "230 Logged in").await?
                } else {
                    reply(&mut wr, "530 Login incorrect").await?
                }
            }
            "FEAT" => reply(&mut wr, "211-Features:\r\n SIZE\r\n REST STREAM\r\n UTF8\r\n211 End").await?,
            "OPTS" | "TYPE" | "NOOP" => reply(&mut wr, "200 OK").await?,
            "PWD" => reply(&mut wr, "257 \"/\" is current directory").await?,
            "SIZE" => match state.file(&arg) {
                Some(data) => reply(&mut wr, &format!("213 {}", data.len())).await?,
                None => reply(&mut wr, "550 No such file").await?,
            },
            "REST" => {
                rest = arg.parse().unwrap_or(0);
                reply(&mut wr, &format!("350 Restarting at {}", rest)).await?
            }
            "PASV" => {
                let l = TcpListener::bind("127.0.0.1:0").await?;
                let port = l.local_addr()?.port();
                data_listener = Some(l);
                reply(
                    &mut wr,
                    &format!("227 Entering Passive Mode (127,0,0,1,{},{})", port / 256, port % 256),
                )
                .await?
            }
            "RETR" => {
                let Some(data) = state.file(&arg) else {
                    reply(&mut wr, "550 No such file").await?;
                    continue;
                };
                let Some(l) = data_listener.take() else {
                    reply(&mut wr, "425 Use PASV first").await?;
                    continue;
                };
                reply(&mut wr, "150 Opening BINARY mode data connection").await?;
                let (mut d, _) = l.accept().await?;
                let start = (rest as usize).min(data.len());
                d.write_all(&data[start..]).await?;
                d.shutdown().await?;
                drop(d);
                rest = 0;
                reply(&mut wr, "226 Transfer complete").await?
            }
            "STOR" => {
                let Some(l) = data_listener.take() else {
                    reply(&mut wr, "425 Use PASV first").await?;
                    continue;
                };
                reply(&mut wr, "150 Ok to send data").await?;
                let (mut d, _) = l.accept().await?;
                let mut buf = Vec::new();
                d.read_to_end(&mut buf).await?;
                state.files.lock().unwrap().insert(arg.clone(), buf);
                reply(&mut wr, "226 Transfer complete").await?
            }
            "LIST" => {
                let Some(l) = data_listener.take() else {
                    reply(&mut wr, "425 Use PASV first").await?;
                    continue;
                };
                reply(&mut wr, "150 Here comes the directory listing").await?;
                let (mut d, _) = l.accept().await?;
                let body = state.listing.lock().unwrap().clone();
                d.write_all(body.as_bytes()).await?;
                d.shutdown().await?;
                drop(d);
                reply(&mut wr, "226 Directory send OK").await?
            }
            "ABOR" => reply(&mut wr, "226 Abort OK").await?,
            "QUIT" => {
                reply(&mut wr, "221 Goodbye").await?;
                return Ok(());
            }
            _ => reply(&mut wr, "502 Command not implemented").await?,
        }
    }
}
