#[tokio::main]
async fn main() -> wired::error::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("wired=info,serenity=warn"),
    )
    .init();
    log::info!("Starting satoshi Discord bot");

    match wired::satoshi::run().await {
        Ok(()) => {
            log::info!("Bot shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Bot encountered an error: {e}");
            Err(e)
        }
    }
}
