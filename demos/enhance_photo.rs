//! Enhancement example - normalizes a photo and sends it to a running proxy.
//!
//! Run with: `cargo run --example enhance_photo -- <photo> [style]`
//!
//! Start the proxy first with `API_KEY=... cargo run -- serve`.

use photoenhance::{EnhanceClient, EnhancementResult, EnhancementStyle, Session};

#[tokio::main]
async fn main() -> photoenhance::Result<()> {
    let mut args = std::env::args().skip(1);
    let input_path = args
        .next()
        .expect("Usage: enhance_photo <photo> [style]");
    let style = args
        .next()
        .and_then(|label| EnhancementStyle::from_label(&label))
        .unwrap_or_default();

    let client = EnhanceClient::builder().build()?;
    let mut session = Session::new();

    let image = session.load_file(&input_path)?;
    println!(
        "Normalized to {}x{} ({} bytes), style: {}",
        image.width(),
        image.height(),
        image.size(),
        style
    );

    let outcome = session.enhance(&client, style, None).await.cloned();
    match outcome {
        Some(EnhancementResult::Success { .. }) => {
            let path = session.download(".")?;
            println!("Enhanced image saved to {}", path.display());
        }
        Some(EnhancementResult::Failure { kind, message }) => {
            eprintln!("Enhancement failed ({kind}): {message}");
        }
        None => {}
    }

    Ok(())
}
