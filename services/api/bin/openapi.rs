//! Writes the hardware API's OpenAPI document.
//!
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use anyhow::Context;
use mint_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    std::fs::write(&path, spec_json).with_context(|| format!("Failed to write {path}"))?;
    println!("OpenAPI document written to {path}");
    Ok(())
}
