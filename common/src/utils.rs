// common/src/utils.rs
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across the gateway
pub fn setup_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fill a buffer of `length` bytes from the operating system CSPRNG.
///
/// Fails only when the randomness source itself fails.
pub fn generate_secret(length: usize) -> Result<Vec<u8>, rand::Error> {
    let mut secret = vec![0u8; length];
    OsRng.try_fill_bytes(&mut secret)?;
    Ok(secret)
}
