//! Line-oriented TCP front end.
//!
//! One handler thread per connection, commands processed in the order
//! received. The handler is pure plumbing: it parses a line, calls the
//! shared [`FileSystem`] (which owns all locking), and formats the reply.
//! A failed command writes an `ERROR:` line and leaves the session open;
//! only `QUIT` or EOF ends it.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use log::{info, warn};

use crate::constants::{MAXBLOCKS, MAXFILES, NAME_LEN};
use crate::error::Result;
use crate::fs::FileSystem;

pub struct FileServer {
    listener: TcpListener,
    fs: Arc<FileSystem>,
}

impl FileServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, fs: Arc<FileSystem>) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, fs })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients forever, one handler thread per connection.
    pub fn run(&self) -> Result<()> {
        info!(target: "server", "listening on {}", self.listener.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let fs = Arc::clone(&self.fs);
                    thread::spawn(move || {
                        let peer = stream
                            .peer_addr()
                            .map(|a| a.to_string())
                            .unwrap_or_else(|_| "<unknown>".to_string());
                        info!(target: "server", "client connected: {}", peer);
                        if let Err(e) = handle_client(stream, &fs) {
                            warn!(target: "server", "session with {} ended: {}", peer, e);
                        } else {
                            info!(target: "server", "client disconnected: {}", peer);
                        }
                    });
                }
                Err(e) => warn!(target: "server", "accept failed: {}", e),
            }
        }
        Ok(())
    }
}

fn handle_client(stream: TcpStream, fs: &FileSystem) -> std::io::Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    for line in reader.lines() {
        let line = line?;
        if !dispatch(&line, fs, &mut writer)? {
            break;
        }
    }
    Ok(())
}

/// Pull the filename out of a command, enforcing the protocol-level
/// length limit before the core ever sees the name.
fn parse_name<'a>(
    parts: &mut std::str::SplitN<'a, char>,
    command: &str,
    out: &mut dyn Write,
) -> std::io::Result<Option<&'a str>> {
    let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
        writeln!(out, "ERROR: {} requires a filename.", command)?;
        return Ok(None);
    };
    if name.len() > NAME_LEN {
        writeln!(out, "ERROR: filename too large")?;
        return Ok(None);
    }
    Ok(Some(name))
}

/// Handle one command line. Returns `false` once the client has quit.
fn dispatch(line: &str, fs: &FileSystem, out: &mut dyn Write) -> std::io::Result<bool> {
    // At most three parts: command, filename, and the rest of the line
    // (WRITE payloads may contain spaces).
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or("").to_uppercase();

    match command.as_str() {
        "CREATE" => {
            if let Some(name) = parse_name(&mut parts, "CREATE", out)? {
                match fs.create(name) {
                    Ok(()) => writeln!(out, "SUCCESS: File '{}' created.", name)?,
                    Err(e) => writeln!(out, "ERROR: {}", e)?,
                }
            }
        }
        "WRITE" => {
            if let Some(name) = parse_name(&mut parts, "WRITE", out)? {
                let data = parts.next().unwrap_or("").as_bytes();
                match fs.write(name, data) {
                    Ok(()) => writeln!(out, "SUCCESS: Wrote {} bytes to '{}'.", data.len(), name)?,
                    Err(e) => writeln!(out, "ERROR: {}", e)?,
                }
            }
        }
        "READ" => {
            if let Some(name) = parse_name(&mut parts, "READ", out)? {
                match fs.read(name) {
                    Ok(data) => {
                        writeln!(out, "SUCCESS:")?;
                        writeln!(out, "{}", String::from_utf8_lossy(&data))?;
                        writeln!(out, "END")?;
                    }
                    Err(e) => writeln!(out, "ERROR: {}", e)?,
                }
            }
        }
        "DELETE" => {
            if let Some(name) = parse_name(&mut parts, "DELETE", out)? {
                match fs.delete(name) {
                    Ok(()) => writeln!(out, "SUCCESS: File '{}' deleted.", name)?,
                    Err(e) => writeln!(out, "ERROR: {}", e)?,
                }
            }
        }
        "LIST" => {
            writeln!(out, "SUCCESS:")?;
            for name in fs.list() {
                writeln!(out, "{}", name)?;
            }
            writeln!(out, "END")?;
        }
        "STAT" => {
            let stats = fs.stats();
            writeln!(out, "SUCCESS:")?;
            writeln!(out, "files {}/{}", stats.live_files, MAXFILES)?;
            writeln!(out, "blocks {}/{}", stats.used_blocks, MAXBLOCKS)?;
            writeln!(out, "END")?;
        }
        "QUIT" => {
            writeln!(out, "SUCCESS: Disconnecting.")?;
            return Ok(false);
        }
        _ => writeln!(out, "ERROR: Unknown command.")?,
    }

    out.flush()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::IMAGE_SIZE;
    use crate::testutil::TempImage;
    use std::io::BufReader;

    struct TestClient {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    }

    impl TestClient {
        fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).unwrap();
            Self {
                reader: BufReader::new(stream.try_clone().unwrap()),
                writer: stream,
            }
        }

        fn send(&mut self, line: &str) {
            writeln!(self.writer, "{}", line).unwrap();
        }

        fn recv(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).unwrap();
            line.trim_end_matches('\n').to_string()
        }

        fn roundtrip(&mut self, line: &str) -> String {
            self.send(line);
            self.recv()
        }
    }

    /// Spin up a server on an ephemeral port. The image handle is returned
    /// so its backing file outlives the test body.
    fn start_server(tag: &str) -> (TempImage, SocketAddr) {
        let img = TempImage::new(tag);
        let fs = Arc::new(FileSystem::open(img.path(), IMAGE_SIZE as u64).unwrap());
        let server = FileServer::bind("127.0.0.1:0", fs).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || {
            let _ = server.run();
        });
        (img, addr)
    }

    #[test]
    fn test_end_to_end_session() {
        let (_img, addr) = start_server("session");
        let mut client = TestClient::connect(addr);

        assert_eq!(
            client.roundtrip("CREATE file1.txt"),
            "SUCCESS: File 'file1.txt' created."
        );
        assert_eq!(
            client.roundtrip("WRITE file1.txt Hello COEN317!"),
            "SUCCESS: Wrote 14 bytes to 'file1.txt'."
        );

        client.send("READ file1.txt");
        assert_eq!(client.recv(), "SUCCESS:");
        assert_eq!(client.recv(), "Hello COEN317!");
        assert_eq!(client.recv(), "END");

        client.send("LIST");
        assert_eq!(client.recv(), "SUCCESS:");
        assert_eq!(client.recv(), "file1.txt");
        assert_eq!(client.recv(), "END");

        assert_eq!(
            client.roundtrip("DELETE file1.txt"),
            "SUCCESS: File 'file1.txt' deleted."
        );
        assert_eq!(
            client.roundtrip("READ file1.txt"),
            "ERROR: file file1.txt does not exist"
        );

        assert_eq!(client.roundtrip("QUIT"), "SUCCESS: Disconnecting.");
        // Server closes the connection after QUIT.
        let mut rest = String::new();
        assert_eq!(client.reader.read_line(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_write_payload_keeps_spaces() {
        let (_img, addr) = start_server("spaces");
        let mut client = TestClient::connect(addr);

        client.roundtrip("CREATE notes");
        assert_eq!(
            client.roundtrip("WRITE notes one two  three"),
            "SUCCESS: Wrote 14 bytes to 'notes'."
        );
        client.send("READ notes");
        assert_eq!(client.recv(), "SUCCESS:");
        assert_eq!(client.recv(), "one two  three");
        assert_eq!(client.recv(), "END");
    }

    #[test]
    fn test_failed_command_keeps_session_alive() {
        let (_img, addr) = start_server("resilient");
        let mut client = TestClient::connect(addr);

        assert_eq!(client.roundtrip("FROBNICATE x"), "ERROR: Unknown command.");
        assert_eq!(client.roundtrip("CREATE"), "ERROR: CREATE requires a filename.");
        assert_eq!(
            client.roundtrip("CREATE waytoolongname"),
            "ERROR: filename too large"
        );
        assert_eq!(
            client.roundtrip("DELETE ghost"),
            "ERROR: file ghost does not exist"
        );

        // The session still works after every one of those failures.
        assert_eq!(client.roundtrip("CREATE ok.txt"), "SUCCESS: File 'ok.txt' created.");
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        let (_img, addr) = start_server("case");
        let mut client = TestClient::connect(addr);

        assert_eq!(client.roundtrip("create a.txt"), "SUCCESS: File 'a.txt' created.");
        client.send("list");
        assert_eq!(client.recv(), "SUCCESS:");
        assert_eq!(client.recv(), "a.txt");
        assert_eq!(client.recv(), "END");
    }

    #[test]
    fn test_stat_reports_usage() {
        let (_img, addr) = start_server("stat");
        let mut client = TestClient::connect(addr);

        client.roundtrip("CREATE a");
        client.roundtrip("WRITE a xyz");
        client.send("STAT");
        assert_eq!(client.recv(), "SUCCESS:");
        assert_eq!(client.recv(), "files 1/5");
        assert_eq!(client.recv(), "blocks 1/10");
        assert_eq!(client.recv(), "END");
    }

    #[test]
    fn test_two_clients_share_the_filesystem() {
        let (_img, addr) = start_server("shared");
        let mut alice = TestClient::connect(addr);
        let mut bob = TestClient::connect(addr);

        alice.roundtrip("CREATE swap");
        alice.roundtrip("WRITE swap from alice");

        bob.send("READ swap");
        assert_eq!(bob.recv(), "SUCCESS:");
        assert_eq!(bob.recv(), "from alice");
        assert_eq!(bob.recv(), "END");
    }
}
