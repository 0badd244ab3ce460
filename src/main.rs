#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dev_events_lib::run().await
}
