//! JSON-RPC exchanges against an in-process MCP server over a duplex pipe.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcp::{Error, MAX_OUTPUT_SIZE, Server, ServerConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

type Received = Arc<Mutex<Vec<Value>>>;

/// Connect a client to a scripted server; returns everything the server reads.
fn connect() -> (Server, Received) {
    let (client, remote) = tokio::io::duplex(64 * 1024);
    let received = Received::default();
    tokio::spawn(serve(remote, received.clone()));

    let (reader, writer) = tokio::io::split(client);
    let server = Server::from_transport(ServerConfig::new("scripted", "in-process"), reader, writer);
    (server, received)
}

async fn connected() -> (Server, Received) {
    let (server, received) = connect();
    server.initialize().await.unwrap();
    (server, received)
}

async fn serve(stream: DuplexStream, received: Received) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let message: Value = serde_json::from_str(&line).unwrap();
        received.lock().unwrap().push(message.clone());
        for out in respond(&message).await {
            if writer.write_all(out.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                return;
            }
        }
    }
}

fn reply(id: &Value, result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

fn text(body: &str) -> Value {
    json!({"content": [{"type": "text", "text": body}]})
}

async fn respond(message: &Value) -> Vec<String> {
    let Some(id) = message.get("id") else {
        return Vec::new();
    };
    let params = &message["params"];

    match message["method"].as_str().unwrap_or_default() {
        "initialize" => vec![reply(
            id,
            json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "scripted", "version": "0.1.0"}
            }),
        )],
        "tools/list" => match params["cursor"].as_str() {
            None => vec![reply(
                id,
                json!({"tools": [{"name": "echo", "description": "Echo arguments"}], "nextCursor": "page-2"}),
            )],
            Some(_) => vec![reply(id, json!({"tools": [{"name": "slow"}, {"name": "noisy"}]}))],
        },
        "tools/call" => match params["name"].as_str().unwrap_or_default() {
            "echo" => vec![reply(id, text(&params["arguments"].to_string()))],
            "noisy" => vec![
                String::new(),
                json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"progress": 1}})
                    .to_string(),
                json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}).to_string(),
                reply(id, text("quiet now")),
            ],
            "broken" => vec![reply(
                id,
                json!({"content": [{"type": "text", "text": "disk full"}], "isError": true}),
            )],
            "slow" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                vec![reply(id, text("late"))]
            }
            "flood" => vec!["x".repeat(MAX_OUTPUT_SIZE + 64)],
            other => vec![
                json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32602, "message": format!("no tool {other}")}})
                    .to_string(),
            ],
        },
        _ => vec![
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "method not found"}})
                .to_string(),
        ],
    }
}

#[tokio::test]
async fn handshake_sends_initialized_notification() {
    let (server, received) = connected().await;
    assert!(server.is_initialized());

    let methods: Vec<String> = received
        .lock()
        .unwrap()
        .iter()
        .map(|m| m["method"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        methods,
        ["initialize", "notifications/initialized", "tools/list", "tools/list"]
    );

    let received = received.lock().unwrap();
    assert_eq!(received[0]["params"]["clientInfo"]["name"], "mcp-llm");
    assert!(received[1].get("id").is_none());
}

#[tokio::test]
async fn tool_listing_follows_cursor() {
    let (server, received) = connected().await;

    let names: Vec<String> = server.tools().await.into_iter().map(|t| t.name).collect();
    assert_eq!(names, ["echo", "slow", "noisy"]);
    assert_eq!(received.lock().unwrap()[3]["params"]["cursor"], "page-2");
}

#[tokio::test]
async fn call_before_initialize_is_rejected() {
    let (server, _) = connect();
    let result = server.call_tool("echo", None).await;
    assert!(matches!(result, Err(Error::NotInitialized)));
}

#[tokio::test]
async fn call_returns_matching_result() {
    let (server, _) = connected().await;

    let result = server
        .call_tool("echo", Some(json!({"query": "splats"})))
        .await
        .unwrap();
    assert_eq!(result.text(), r#"{"query":"splats"}"#);
}

#[tokio::test]
async fn notifications_and_blank_lines_are_skipped() {
    let (server, _) = connected().await;

    let result = server.call_tool("noisy", None).await.unwrap();
    assert_eq!(result.text(), "quiet now");

    let result = server.call_tool("echo", Some(json!({}))).await.unwrap();
    assert_eq!(result.text(), "{}");
}

#[tokio::test]
async fn error_flag_becomes_tool_call_failed() {
    let (server, _) = connected().await;

    let err = server.call_tool("broken", None).await.unwrap_err();
    assert!(matches!(err, Error::ToolCallFailed(ref reason) if reason == "disk full"));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn json_rpc_error_is_returned() {
    let (server, _) = connected().await;

    let err = server.call_tool("teleport", None).await.unwrap_err();
    match err {
        Error::JsonRpc(e) => {
            assert_eq!(e.code, -32602);
            assert_eq!(e.message, "no tool teleport");
        }
        other => panic!("expected JSON-RPC error, got {other:?}"),
    }
}

#[tokio::test]
async fn abandoned_call_does_not_desync_later_calls() {
    let (server, _) = connected().await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), server.call_tool("slow", None)).await;
    assert!(abandoned.is_err());

    for round in 0..3 {
        let result = server
            .call_tool("echo", Some(json!({"round": round})))
            .await
            .unwrap();
        assert_eq!(result.text(), json!({"round": round}).to_string());
    }
}

#[tokio::test]
async fn oversized_line_fails_that_call_only() {
    let (server, _) = connected().await;

    let err = server.call_tool("flood", None).await.unwrap_err();
    assert!(matches!(err, Error::OutputTooLarge { max, .. } if max == MAX_OUTPUT_SIZE));

    let result = server.call_tool("echo", Some(json!({"after": "flood"}))).await.unwrap();
    assert_eq!(result.text(), r#"{"after":"flood"}"#);
}

#[tokio::test]
async fn shutdown_closes_transport() {
    let (server, _) = connected().await;
    assert!(server.shutdown().await.is_ok());
}
