mod common;

use anyhow::Result;
use chainport_api::documents::DocumentPath;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn chain_request() -> Value {
    json!({
        "chainData": {
            "name": "Summarizer",
            "steps": [
                {"type": "prompt", "prompt": "Summarize: {{input}}"},
                {"type": "prompt", "prompt": "Translate: {{previous}}"}
            ]
        },
        "apiKey": "sk-test",
        "userInfo": {"email": "alice@example.com", "displayName": "Alice A", "uid": "u-1"}
    })
}

async fn post(server: &common::TestServer, body: &Value) -> Result<reqwest::Response> {
    Ok(server
        .client
        .post(server.url("/api/create-endpoint"))
        .json(body)
        .send()
        .await?)
}

#[tokio::test]
async fn creates_endpoint_and_stores_chain() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = post(&server, &chain_request()).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;

    let id = body["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(id.len(), 32, "id should be a simple uuid: {}", body);
    assert_eq!(body["message"], "Chain endpoint created successfully");
    assert_eq!(body["userName"], "Alice A");

    // Loopback Host header ⇒ plain http
    let base = format!("http://127.0.0.1:{}", server.port);
    assert_eq!(body["endpointUrl"], format!("{}/api/chains/{}/run", base, id));

    let port = body["portNumber"].as_u64().unwrap_or_default();
    assert!((10000..60000).contains(&port), "port out of range: {}", port);
    assert_eq!(
        body["simplifiedApiUrl"],
        format!("{}/api/simple/{}?port={}", base, id, port)
    );

    let path = DocumentPath::chain("alice@example.com", &id)?;
    let stored = server.documents.get(&path).await.expect("chain document stored");
    assert_eq!(stored["name"], "Summarizer");
    assert_eq!(stored["steps"], 2);
    assert_eq!(stored["apiKey"], "sk-test");
    assert_eq!(stored["userEmail"], "alice@example.com");
    assert_eq!(stored["userId"], "u-1");
    assert_eq!(stored["portNumber"], port);
    assert_eq!(stored["chainData"]["steps"][0]["type"], "prompt");

    Ok(())
}

#[tokio::test]
async fn each_call_creates_a_new_chain() -> Result<()> {
    let server = common::spawn_server().await?;

    let first = post(&server, &chain_request()).await?.json::<Value>().await?;
    let second = post(&server, &chain_request()).await?.json::<Value>().await?;
    assert_ne!(first["id"], second["id"]);
    assert_eq!(server.documents.paths().await.len(), 2);

    Ok(())
}

#[tokio::test]
async fn empty_chain_is_rejected_regardless_of_other_fields() -> Result<()> {
    let server = common::spawn_server().await?;

    for body in [
        json!({"chainData": {"steps": []}, "apiKey": "sk", "userInfo": {"email": "a@example.com"}}),
        json!({"chainData": {"steps": []}}),
        json!({"apiKey": "sk"}),
        json!({"chainData": {"steps": []}, "apiKey": 123, "userInfo": {"email": "a@example.com"}}),
        json!({"chainData": {"steps": []}, "apiKey": "sk", "userInfo": "bob"}),
        json!({"chainData": {"steps": []}, "apiKey": "sk", "userInfo": {"email": 7}}),
    ] {
        let res = post(&server, &body).await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let error = res.json::<Value>().await?;
        assert_eq!(
            error["error"],
            "Invalid chain data. Chain must have at least one step."
        );
    }
    assert!(server.documents.paths().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn missing_api_key_is_bad_request() -> Result<()> {
    let server = common::spawn_server().await?;

    let mut body = chain_request();
    body["apiKey"] = json!("");
    let res = post(&server, &body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "OpenAI API key is required");

    body["apiKey"] = json!(123);
    let res = post(&server, &body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "OpenAI API key is required");

    Ok(())
}

#[tokio::test]
async fn missing_user_is_unauthorized() -> Result<()> {
    let server = common::spawn_server().await?;

    let mut body = chain_request();
    body["userInfo"] = json!({"name": "No Email"});
    let res = post(&server, &body).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "User information required");

    for user_info in [json!("alice@example.com"), json!({"email": 7})] {
        let mut body = chain_request();
        body["userInfo"] = user_info;
        let res = post(&server, &body).await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.json::<Value>().await?["error"], "User information required");
    }

    let mut body = chain_request();
    body.as_object_mut().map(|o| o.remove("userInfo"));
    let res = post(&server, &body).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(server.documents.paths().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn user_name_falls_back_to_email_local_part() -> Result<()> {
    let server = common::spawn_server().await?;

    let mut body = chain_request();
    body["userInfo"] = json!({"email": "bob@example.com"});
    let res = post(&server, &body).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["userName"], "bob");

    Ok(())
}
