/*
 * Responsibility
 * - tokio runtime entry
 * - delegates to app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    authz_core::app::run().await
}
