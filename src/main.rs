mod age;
mod config;
mod github;
mod queries;
mod stats;
mod svg;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use config::Config;
use github::GithubClient;
use stats::Stats;
use svg::Renderer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("github_stats=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let client = GithubClient::new(&config.actor, &config.access_token, config.max_connections)
        .context("Failed to create GitHub client")?;
    let stats = Stats::new(client, config.filters.clone());
    let renderer = Renderer::new(
        config.template_dir.clone(),
        config.output_dir.clone(),
        config.image_path.clone(),
    );

    tracing::info!(user = %stats.username(), "Generating GitHub statistics images");

    // One shared aggregator: concurrent first reads join a single fetch.
    let (languages, overview, community) = tokio::try_join!(
        renderer.generate_languages(&stats),
        renderer.generate_overview(&stats),
        renderer.generate_community(&stats),
    )?;

    tracing::info!(
        files = languages.len() + overview.len() + community.len(),
        "Generated all images"
    );

    Ok(())
}
