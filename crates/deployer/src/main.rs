#[tokio::main]
async fn main() -> std::process::ExitCode {
    deployer::start(std::env::args()).await
}
