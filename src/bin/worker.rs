fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_marker::run_worker() {
        eprintln!("exam-marker-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
