#[tokio::main]
async fn main() {
    if let Err(e) = cuagent_lib::run().await {
        tracing::error!(error = %e, "evaluation run failed");
        std::process::exit(1);
    }
}
