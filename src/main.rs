use sheet_links::{Config, SystemClock, WebClient};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("a TLS crypto provider was already installed");
    }

    let result = Config::from_env().and_then(|config| {
        let client = WebClient::new(&config.token, &config.api_base_url)?;
        sheet_links::run(&config, &client, &SystemClock)
    });

    match result {
        Ok(summary) => {
            println!("Data successfully saved to {}", summary.output.display());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
