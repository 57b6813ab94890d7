#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = heartguard_lib::run().await {
        log::error!("HeartGuard failed: {:#}", e);
        eprintln!("heartguard: {:#}", e);
        std::process::exit(1);
    }
}
