#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ledger_engine_cli::run(std::env::args()).await
}
