use std::path::Path;
use std::process::Stdio;

use anyhow::Result;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Running gateway process; requests and responses are matched by order.
struct Gateway {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Gateway {
    async fn spawn(work: &Path, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_file-gateway"))
            .args(args)
            .current_dir(work)
            .env_remove("ALLOWED_DIRECTORIES")
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout")).lines();
        Ok(Self { child, stdin, stdout })
    }

    async fn send_raw(&mut self, line: &str) -> Result<Value> {
        self.send_bytes(line.as_bytes()).await
    }

    async fn send_bytes(&mut self, line: &[u8]) -> Result<Value> {
        let stdin = self.stdin.as_mut().expect("stdin open");
        stdin.write_all(line).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        let reply = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| anyhow::anyhow!("gateway closed stdout"))?;
        Ok(serde_json::from_str(&reply)?)
    }

    async fn send(&mut self, request: Value) -> Result<Value> {
        self.send_raw(&request.to_string()).await
    }

    async fn close(mut self) -> Result<std::process::ExitStatus> {
        drop(self.stdin.take());
        Ok(self.child.wait().await?)
    }
}

struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("allowed")).unwrap();
        Self { tmp }
    }

    fn root(&self) -> std::path::PathBuf {
        self.tmp.path().join("allowed")
    }

    fn p(&self, rel: &str) -> String {
        self.root().join(rel).to_string_lossy().into_owned()
    }

    async fn start(&self, extra: &[&str]) -> Result<Gateway> {
        let trash = self.tmp.path().join("trash");
        let root = self.root();
        let mut args = vec!["--trash-dir", trash.to_str().unwrap()];
        args.extend_from_slice(extra);
        args.push(root.to_str().unwrap());
        Gateway::spawn(self.tmp.path(), &args).await
    }
}

#[tokio::test]
async fn write_read_round_trip_over_stdio() -> Result<()> {
    let fx = Fixture::new();
    let mut gw = fx.start(&[]).await?;

    let w = gw
        .send(json!({
            "command": "WriteFile",
            "filePath": fx.p("notes/a.txt"),
            "content": "hello\nworld",
        }))
        .await?;
    assert_eq!(w["status"], "success");
    assert_eq!(w["result"]["renamed"], false);

    let r = gw.send(json!({"command": "ReadFile", "filePath": fx.p("notes/a.txt")})).await?;
    assert_eq!(r["status"], "success");
    assert_eq!(r["result"]["content"], "hello\nworld");
    assert_eq!(r["result"]["fileName"], "a.txt");

    assert!(gw.close().await?.success());
    Ok(())
}

#[tokio::test]
async fn collisions_rename_except_for_rename_file() -> Result<()> {
    let fx = Fixture::new();
    std::fs::write(fx.root().join("a.txt"), "first")?;
    std::fs::write(fx.root().join("b.txt"), "second")?;
    let mut gw = fx.start(&[]).await?;

    let w = gw
        .send(json!({"command": "WriteFile", "filePath": fx.p("a.txt"), "content": "x"}))
        .await?;
    assert_eq!(w["result"]["renamed"], true);
    assert_eq!(w["result"]["path"], fx.p("a(1).txt"));

    let r = gw
        .send(json!({
            "command": "RenameFile",
            "sourcePath": fx.p("b.txt"),
            "destinationPath": fx.p("a.txt"),
        }))
        .await?;
    assert_eq!(r["status"], "error");
    assert!(r["error"].as_str().unwrap().contains("already exists"));
    assert_eq!(std::fs::read_to_string(fx.root().join("a.txt"))?, "first");

    gw.close().await?;
    Ok(())
}

#[tokio::test]
async fn sandbox_denies_writes_but_allows_absolute_reads() -> Result<()> {
    let fx = Fixture::new();
    let outside = fx.tmp.path().join("outside.txt");
    std::fs::write(&outside, "visible")?;
    let mut gw = fx.start(&[]).await?;

    let info = gw
        .send(json!({"command": "FileInfo", "filePath": outside}))
        .await?;
    assert_eq!(info["status"], "success");
    assert_eq!(info["result"]["isFile"], true);

    let denied = gw
        .send(json!({"command": "WriteFile", "filePath": outside, "content": "x"}))
        .await?;
    assert_eq!(denied["status"], "error");
    assert!(denied["error"].as_str().unwrap().starts_with("Access denied:"));

    let escape = format!("{}/../outside.txt", fx.p(""));
    let denied = gw
        .send(json!({"command": "DeleteFile", "filePath": escape}))
        .await?;
    assert_eq!(denied["status"], "error");
    assert!(outside.exists());

    gw.close().await?;
    Ok(())
}

#[tokio::test]
async fn malformed_line_gets_its_own_error() -> Result<()> {
    let fx = Fixture::new();
    let mut gw = fx.start(&[]).await?;

    let bad = gw.send_raw("{\"command\": ").await?;
    assert_eq!(bad["status"], "error");
    let unknown = gw.send(json!({"command": "Teleport"})).await?;
    assert_eq!(unknown["error"], "Unknown action: Teleport");
    let ok = gw.send(json!({"command": "ListAllowedDirectories"})).await?;
    assert_eq!(ok["status"], "success");

    gw.close().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_line_does_not_end_the_session() -> Result<()> {
    let fx = Fixture::new();
    let mut gw = fx.start(&[]).await?;

    let bad = gw
        .send_bytes(b"{\"command\": \"ReadFile\", \"filePath\": \"\xc3\x28\"}")
        .await?;
    assert_eq!(bad["status"], "error");
    assert!(bad["error"].as_str().unwrap().contains("UTF-8"));
    let ok = gw.send(json!({"command": "ListAllowedDirectories"})).await?;
    assert_eq!(ok["status"], "success");

    assert!(gw.close().await?.success());
    Ok(())
}

#[tokio::test]
async fn batch_reads_and_deletes() -> Result<()> {
    let fx = Fixture::new();
    std::fs::write(fx.root().join("keep.txt"), "kept")?;
    std::fs::write(fx.root().join("junk.txt"), "junk")?;
    let mut gw = fx.start(&[]).await?;

    let out = gw
        .send(json!({
            "command1": "ReadFile",
            "filePath1": fx.p("keep.txt"),
            "command2": "DeleteFile",
            "filePath2": fx.p("junk.txt"),
        }))
        .await?;
    assert_eq!(out["status"], "success");
    let result = &out["result"];
    assert_eq!(result["succeeded"], 2);
    assert_eq!(result["failed"], 0);
    assert_eq!(
        result["content"][0]["text"],
        "Batch Operations Summary:\n- file moved to trash successfully"
    );
    assert_eq!(result["content"][2]["text"], "kept");
    assert!(!fx.root().join("junk.txt").exists());
    assert!(fx.tmp.path().join("trash/junk.txt").exists());

    gw.close().await?;
    Ok(())
}

#[tokio::test]
async fn configured_limits_apply() -> Result<()> {
    let fx = Fixture::new();
    for name in ["a", "b", "c"] {
        std::fs::write(fx.root().join(name), "1234")?;
    }
    let mut gw = fx
        .start(&["--max-file-size", "3", "--max-directory-items", "2"])
        .await?;

    let listing = gw
        .send(json!({"command": "ListDirectory", "directoryPath": fx.p("")}))
        .await?;
    assert_eq!(listing["result"]["totalItems"], 2);
    assert_eq!(listing["result"]["truncated"], true);

    let read = gw.send(json!({"command": "ReadFile", "filePath": fx.p("a")})).await?;
    assert_eq!(read["status"], "error");
    assert!(read["error"].as_str().unwrap().starts_with("File too large"));

    gw.close().await?;
    Ok(())
}
