//! Session lifecycle demo
//!
//! Usage:
//!   GSSC_USERNAME=alice GSSC_PASSWORD=secret cargo run --example session_demo
//!
//! Reads `GSSC_API_BASE_URL` / `GSSC_SESSION_FILE` like any other client.

use gssc_client::{ApiClient, ClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    let username = std::env::var("GSSC_USERNAME").unwrap_or_else(|_| "demo".to_string());
    let password = std::env::var("GSSC_PASSWORD").unwrap_or_else(|_| "demo".to_string());

    println!("=== GSSC Client Example ===");
    println!("Backend: {}", config.base_url);
    println!();

    let client = ApiClient::new(config)?.with_session_listener(|| {
        println!("! Session expired, please log in again");
    });

    if !client.auth_state().is_authenticated() {
        println!("Logging in as {username}...");
        match client.login(&username, &password).await {
            Ok(_) => println!("✓ Logged in"),
            Err(e) => {
                println!("! Login failed: {}", e.message());
                return Ok(());
            }
        }
    } else {
        println!("✓ Restored saved session");
    }
    println!();

    // Authenticated calls refresh the access token on their own if it has expired
    let page = client.price_list("solar_panels", 1).await?;
    println!("Price tracker: showing {} of {} items", page.items.len(), page.total);

    let history = client.chat_history().await?;
    println!("Chat history: {} turns", history.len());
    println!();

    println!("Logging out...");
    client.logout().await;
    println!("✓ State: {:?}", client.auth_state());

    Ok(())
}
