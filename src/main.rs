use clap::Parser;
use color_eyre::Result;
use fleetmon::{
    errors,
    logging,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<()> {
    errors::init()?;
    logging::log_init()?;

    App::new(Args::parse())?.run().await
}
