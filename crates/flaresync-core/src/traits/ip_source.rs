// # IP Source Trait
//
// Defines the interface for looking up the caller's public IP address.
//
// ## Implementations
//
// - HTTP echo services: `flaresync-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use flaresync_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//     let ip = source.fetch_ip().await?;
//     println!("public IP: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for public IP lookups
///
/// The returned address is an opaque token: the engine compares it against
/// the previous value and writes it verbatim into address records. It is not
/// parsed or validated.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ One outbound request per call
/// - ✅ Bounded reads of the response
///
/// ## Forbidden Capabilities
/// - ❌ Retry or sleep (the engine's poll interval is the retry policy)
/// - ❌ Cache the previous address (change detection is owned by the engine)
/// - ❌ Spawn tasks
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IP
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The address text, trimmed and non-empty
    /// - `Err(Error)`: Transport failure, non-success status or empty body
    async fn fetch_ip(&self) -> Result<String, crate::Error>;

    /// Name used in log lines
    fn source_name(&self) -> &str {
        "ip"
    }
}
