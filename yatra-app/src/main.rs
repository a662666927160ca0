use std::path::PathBuf;
use yatra_app::{run_checkout, telemetry, AppContext, CheckoutRequest};
use yatra_store::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: yatra-checkout <request.json>"))?;

    let config = Config::load()?;
    tracing::info!("Starting headless checkout against {}", config.backend.base_url);

    let ctx = AppContext::init(config).await?;
    let request = CheckoutRequest::from_file(&path).await?;

    let outcome = run_checkout(&ctx, request).await?;
    tracing::info!(
        booking_id = %outcome.booking.booking_id,
        reference = %outcome.booking.booking_reference,
        "Booking complete"
    );

    println!("{}", outcome.ticket.text);
    println!("QR: {}", outcome.ticket.qr_payload);
    Ok(())
}
