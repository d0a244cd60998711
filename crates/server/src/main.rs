#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatme_server::run().await
}
