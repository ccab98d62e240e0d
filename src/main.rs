use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use guest_reviews::{
    render_reviews, render_statistics, Config, HttpReviewService, PropertyKey, ReviewStore,
    ToggleOutcome,
};

#[derive(Parser)]
#[command(name = "guest-reviews")]
#[command(about = "Inspect and moderate guest reviews")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: .guest-reviews/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Review service API root (overrides the config file)
    #[arg(long, env = "REVIEWS_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List reviews matching the dashboard filters
    List {
        /// Only fetch and show this property
        #[arg(long)]
        property: Option<String>,

        /// Channel to show, or "all"
        #[arg(long)]
        channel: Option<String>,

        /// Rating range such as "4-5", or "all"
        #[arg(long)]
        rating: Option<String>,

        /// Sort by "date" or "rating"
        #[arg(long)]
        sort: Option<String>,
    },

    /// List approved reviews
    Approved {
        /// Restrict to one property
        #[arg(long)]
        property: Option<String>,
    },

    /// Show review statistics
    Stats,

    /// List properties that have reviews
    Properties,

    /// List channels reviews came from
    Channels,

    /// Toggle approval of a review
    Toggle {
        /// Review ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("guest_reviews=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        config.service.base_url = api_url;
    }

    let service = HttpReviewService::from_config(&config.service)
        .context("Failed to create review service client")?;
    let store = ReviewStore::new(service);
    store.update(|repository| config.dashboard.apply(repository)).await;

    match cli.command {
        Commands::List {
            property,
            channel,
            rating,
            sort,
        } => {
            let scope = property.map(PropertyKey::from);
            store
                .fetch(scope.as_ref())
                .await
                .context("Failed to fetch reviews")?;

            if let Some(scope) = &scope {
                store.set_filter("property", scope.as_str()).await;
            }
            for (field, value) in [("channel", channel), ("rating", rating)] {
                if let Some(value) = value {
                    store.set_filter(field, &value).await;
                }
            }
            if let Some(sort) = sort {
                if !store.set_sort_key(&sort).await {
                    anyhow::bail!("Unknown sort key '{}'. Expected 'date' or 'rating'", sort);
                }
            }

            println!("{}", render_reviews("Reviews", &store.filtered_view().await));
        }
        Commands::Approved { property } => {
            fetch_all(&store).await?;
            let scope = property.map(PropertyKey::from);
            let reviews = store.approved_view(scope.as_ref()).await;
            println!("{}", render_reviews("Approved Reviews", &reviews));
        }
        Commands::Stats => {
            fetch_all(&store).await?;
            println!("{}", render_statistics(&store.statistics().await));
        }
        Commands::Properties => {
            fetch_all(&store).await?;
            for property in store.property_list().await {
                println!("{}", property);
            }
        }
        Commands::Channels => {
            fetch_all(&store).await?;
            for channel in store.channel_list().await {
                println!("{}", channel);
            }
        }
        Commands::Toggle { id } => {
            fetch_all(&store).await?;
            let outcome = store
                .toggle_approval(&id)
                .await
                .with_context(|| format!("Failed to update approval for review {}", id))?;

            match outcome {
                ToggleOutcome::Applied { approved } => {
                    info!(id = %id, approved, "Toggled review approval");
                    let label = if approved { "approved" } else { "rejected" };
                    println!("Review {} is now {}", id, label);
                }
                ToggleOutcome::UnknownReview => {
                    println!("No review with ID {}; nothing changed", id);
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
}

async fn fetch_all(store: &ReviewStore<HttpReviewService>) -> Result<()> {
    store.fetch(None).await.context("Failed to fetch reviews")?;
    Ok(())
}
