//! Writes the OpenAPI document for the relay API.
//!
//! Usage: `openapi [PATH]`. Without a path the document goes to stdout.

use anyhow::Context;
use relay_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let spec_json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize the OpenAPI document")?;

    match std::env::args().nth(1) {
        Some(path) => std::fs::write(&path, spec_json)
            .with_context(|| format!("Failed to write OpenAPI document to {}", path))?,
        None => println!("{}", spec_json),
    }
    Ok(())
}
