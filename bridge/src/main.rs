mod host;
mod http;
mod poller;
mod status;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
