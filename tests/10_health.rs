mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_reports_ok_with_memory_store() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["status"], "ok", "unexpected body: {}", body);
    assert_eq!(body["database"], "ok");
    assert_eq!(body["documents"], "memory");

    Ok(())
}

#[tokio::test]
async fn root_redirects_permanently_to_chain_page() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client.get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        res.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/chain")
    );

    Ok(())
}

#[tokio::test]
async fn unknown_paths_are_not_found() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client.get(server.url("/api/nothing-here")).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
