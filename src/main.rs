#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = study_buddy::run().await {
        eprintln!("study-buddy fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
