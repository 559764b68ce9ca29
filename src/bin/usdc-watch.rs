use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    usdc_watch::start_watcher().await
}
