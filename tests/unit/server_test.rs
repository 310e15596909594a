use crate::support::{FakeEngine, Reply, dispatcher, numbered};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use trino_mcp::config::ConnectionConfig;
use trino_mcp::server::{DEFAULT_PROTOCOL_VERSION, McpServer, ResourceInfo, tool_definitions};

const RESOURCE_URI: &str = "trino://localhost:8080/default";

fn server(engine: &Arc<FakeEngine>) -> McpServer<crate::support::FakeConnector> {
    McpServer::new(
        dispatcher(engine),
        ResourceInfo {
            uri: RESOURCE_URI.to_string(),
            host: "localhost".to_string(),
            port: 8080,
            catalog: "hive".to_string(),
            schema: "default".to_string(),
        },
    )
}

fn request(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// Pull the command envelope out of a `tools/call` result.
fn envelope(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("envelope is JSON")
}

#[tokio::test]
async fn test_initialize_echoes_protocol_version() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);

    let resp = srv
        .handle_message(request(1, "initialize", json!({ "protocolVersion": "2025-03-26" })))
        .await
        .unwrap();
    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(resp["result"]["serverInfo"]["name"], "trino-mcp");
    assert!(resp["result"]["capabilities"]["tools"].is_object());

    let resp = srv.handle_message(request(2, "initialize", json!({}))).await.unwrap();
    assert_eq!(resp["result"]["protocolVersion"], DEFAULT_PROTOCOL_VERSION);
    assert_eq!(engine.connects(), 0);
}

#[tokio::test]
async fn test_tools_list_advertises_four_read_only_tools() {
    let engine = FakeEngine::with_rows(1);
    let resp = server(&engine)
        .handle_message(request(3, "tools/list", json!({})))
        .await
        .unwrap();
    let tools = resp["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["execute-query", "list-tables", "describe-table", "health-check"]);
    for tool in tools {
        assert_eq!(tool["annotations"]["readOnlyHint"], true);
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
    assert_eq!(tool_definitions().len(), 4);
}

#[tokio::test]
async fn test_ping_and_unknown_method() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);

    let resp = srv.handle_message(request(4, "ping", Value::Null)).await.unwrap();
    assert_eq!(resp["result"], json!({}));

    let resp = srv.handle_message(request(5, "prompts/list", json!({}))).await.unwrap();
    assert_eq!(resp["error"]["code"], -32601);
    assert!(resp["error"]["message"].as_str().unwrap().contains("prompts/list"));
}

#[tokio::test]
async fn test_parse_error_has_null_id() {
    let engine = FakeEngine::with_rows(1);
    let resp = server(&engine).handle_line("{not json").await.unwrap();
    assert_eq!(resp["id"], Value::Null);
    assert_eq!(resp["error"]["code"], -32700);
}

#[tokio::test]
async fn test_non_object_is_invalid_request() {
    let engine = FakeEngine::with_rows(1);
    let resp = server(&engine).handle_line("[1, 2, 3]").await.unwrap();
    assert_eq!(resp["error"]["code"], -32600);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);
    let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(srv.handle_message(note).await.is_none());
    // a reply to nothing we sent
    assert!(srv.handle_message(json!({ "jsonrpc": "2.0", "result": {} })).await.is_none());
}

#[tokio::test]
async fn test_tools_call_returns_envelope() {
    let engine = FakeEngine::with_rows(20);
    let resp = server(&engine)
        .handle_message(request(
            6,
            "tools/call",
            json!({ "name": "execute-query", "arguments": { "query": "SELECT * FROM t", "limit": 2 } }),
        ))
        .await
        .unwrap();

    assert_eq!(resp["result"]["isError"], false);
    assert_eq!(resp["result"]["content"][0]["type"], "text");
    let env = envelope(&resp);
    assert_eq!(env["status"], "ok");
    assert_eq!(env["data"]["columns"], json!(["id", "label"]));
    assert_eq!(env["data"]["rowCount"], 2);
    assert_eq!(env["data"]["rows"], json!([[0, "row-0"], [1, "row-1"]]));
}

#[tokio::test]
async fn test_tools_call_accepts_nested_params() {
    let engine = FakeEngine::new(|_| Reply::Rows(numbered(1)));
    let resp = server(&engine)
        .handle_message(request(
            7,
            "tools/call",
            json!({ "name": "describe-table", "arguments": { "params": { "table": "orders", "schema": "sales" } } }),
        ))
        .await
        .unwrap();
    assert_eq!(envelope(&resp)["status"], "ok");
    assert_eq!(engine.executed(), vec!["DESCRIBE \"sales\".\"orders\""]);
}

#[tokio::test]
async fn test_tools_call_failure_sets_is_error() {
    let engine = FakeEngine::new(|_| Reply::EngineError("line 1:1: mismatched input".to_string()));
    let resp = server(&engine)
        .handle_message(request(
            8,
            "tools/call",
            json!({ "name": "execute-query", "arguments": { "query": "SELEC 1" } }),
        ))
        .await
        .unwrap();
    assert_eq!(resp["result"]["isError"], true);
    let env = envelope(&resp);
    assert_eq!(env["status"], "error");
    assert_eq!(env["error"]["kind"], "QueryExecutionError");
    assert!(env.get("data").is_none());
}

#[tokio::test]
async fn test_tools_call_protocol_errors() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);

    let resp = srv
        .handle_message(request(9, "tools/call", json!({ "arguments": {} })))
        .await
        .unwrap();
    assert_eq!(resp["error"]["code"], -32602);

    let resp = srv
        .handle_message(request(10, "tools/call", json!({ "name": "health-check", "arguments": "x" })))
        .await
        .unwrap();
    assert_eq!(resp["error"]["code"], -32602);
    assert_eq!(engine.connects(), 0);
}

#[tokio::test]
async fn test_resources_list_and_read() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);

    let resp = srv.handle_message(request(11, "resources/list", json!({}))).await.unwrap();
    let resources = resp["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], RESOURCE_URI);

    let resp = srv
        .handle_message(request(12, "resources/read", json!({ "uri": RESOURCE_URI })))
        .await
        .unwrap();
    let text = resp["result"]["contents"][0]["text"].as_str().unwrap();
    let contents: Value = serde_json::from_str(text).unwrap();
    assert_eq!(contents["catalog"], "hive");
    assert_eq!(contents["port"], 8080);
    assert!(contents.get("password").is_none());

    let resp = srv
        .handle_message(request(13, "resources/read", json!({ "uri": "trino://elsewhere/x" })))
        .await
        .unwrap();
    assert_eq!(resp["error"]["code"], -32602);
}

#[tokio::test]
async fn test_serve_writes_one_line_per_request() {
    let engine = FakeEngine::with_rows(3);
    let srv = server(&engine);

    let input = [
        request(1, "initialize", json!({})).to_string(),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        String::new(),
        request(2, "tools/call", json!({ "name": "health-check" })).to_string(),
    ]
    .join("\n");
    let mut output: Vec<u8> = Vec::new();

    srv.serve(input.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["id"], 2);
    assert_eq!(envelope(&lines[1])["data"]["healthy"], true);
    assert_eq!(engine.executed(), vec!["SELECT 1"]);
}

#[test]
fn test_resource_info_from_config() {
    let config =
        ConnectionConfig::new("alice", SecretString::from("pw".to_string()));
    let info = ResourceInfo::from_config(&config);
    assert_eq!(info.uri, "trino://localhost:8080/default");
    assert_eq!(info.catalog, "hive");
}

#[tokio::test]
async fn test_serve_survives_invalid_utf8_frame() {
    let engine = FakeEngine::with_rows(1);
    let srv = server(&engine);

    let mut input = request(1, "ping", json!({})).to_string().into_bytes();
    input.extend_from_slice(b"\n\xff\xfe\n");
    input.extend_from_slice(request(2, "ping", json!({})).to_string().as_bytes());
    input.push(b'\n');
    let mut output: Vec<u8> = Vec::new();

    srv.serve(&input[..], &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["id"], Value::Null);
    assert_eq!(lines[1]["error"]["code"], -32700);
    assert_eq!(lines[2]["id"], 2);
    assert_eq!(lines[2]["result"], json!({}));
}
