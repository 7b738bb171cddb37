#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_marker::run().await {
        eprintln!("exam-marker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
