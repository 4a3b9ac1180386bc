//! Basic usage of the ServiceNow connector
//!
//! Reads the instance and OAuth credentials from the environment:
//! `SERVICENOW_URL`, `SERVICENOW_CLIENT_ID`, `SERVICENOW_CLIENT_SECRET`,
//! `SERVICENOW_OAUTH_USER`, `SERVICENOW_OAUTH_PASS`.

use anyhow::Context;
use servicenow_connector::{
    CancellationToken, Client, ClientBuilder, ConnectionOptions, CreateRecordInput,
    DeleteRecordInput, FetchAccessTokenInput, GetRecordInput, UpdateRecordInput,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let instance = env("SERVICENOW_URL")?;
    let client = ClientBuilder::new()
        .user_agent_extra("basic-usage-demo")
        .build()?;
    let cancel = CancellationToken::new();

    println!("=== Fetch access token ===");
    let token = fetch_token(&client, &instance, &cancel).await?;

    let options = ConnectionOptions::oauth(token).with_throw_on_error_response(true);
    let table = format!("{}/api/now/table/incident", instance.trim_end_matches('/'));

    println!("\n=== Create ===");
    let created = client
        .create_record(
            &CreateRecordInput::json(&table, r#"{"short_description":"Created by demo"}"#),
            &options,
            &cancel,
        )
        .await?;
    let sys_id = created
        .record()
        .and_then(|record| record["sys_id"].as_str())
        .context("created record has no sys_id")?
        .to_string();
    println!("created {} (status {})", sys_id, created.status_code);

    let record_url = format!("{}/{}", table, sys_id);

    println!("\n=== Update ===");
    let updated = client
        .update_record(
            &UpdateRecordInput::json(&record_url, r#"{"urgency":"3"}"#),
            &options,
            &cancel,
        )
        .await?;
    println!("status {}", updated.status_code);

    println!("\n=== Get ===");
    let fetched = client
        .get_record(
            &GetRecordInput::new(format!("{}?sysparm_fields=number,urgency", record_url)),
            &options,
            &cancel,
        )
        .await?;
    println!("{}", fetched.body);

    println!("\n=== Delete ===");
    let deleted = client
        .delete_record(&DeleteRecordInput::new(&record_url), &options, &cancel)
        .await?;
    println!("status {}", deleted.status_code);

    let stats = client.cache_stats();
    println!(
        "\nclient cache: {} hits, {} misses ({:.0}% hit rate)",
        stats.hits(),
        stats.misses(),
        stats.hit_rate()
    );

    client.client_cache().shutdown().await;
    Ok(())
}

async fn fetch_token(client: &Client, instance: &str, cancel: &CancellationToken) -> anyhow::Result<String> {
    let input = FetchAccessTokenInput::password(
        instance,
        env("SERVICENOW_CLIENT_ID")?,
        env("SERVICENOW_CLIENT_SECRET")?,
        env("SERVICENOW_OAUTH_USER")?,
        env("SERVICENOW_OAUTH_PASS")?,
    );
    let result = client
        .fetch_access_token(
            &input,
            &ConnectionOptions::default().with_throw_on_error_response(true),
            cancel,
        )
        .await?;
    println!("token expires in {:?}s", result.expires_in());
    result
        .access_token()
        .map(str::to_string)
        .context("token response has no access_token")
}

fn env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}
