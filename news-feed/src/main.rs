use clap::{Parser, Subcommand};
use news_feed::config::parse_limit;
use news_feed::{
    AppConfig, ArticleDetailLoader, ArticleDraft, DetailPage, FeedProjection, FeedSubscription, PublishPipeline,
    Section, StatusMessage, StoreConfig, StoreConnection,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "news-feed", about = "Publish and read articles of the news site")]
struct Cli {
    /// Store URL (`sqlite://news.db`, `https://project.firebaseio.com`). Overrides NEWS_STORE_URL.
    #[arg(long)]
    store: Option<String>,

    /// Auth token for a REST store. Overrides NEWS_STORE_AUTH.
    #[arg(long)]
    auth: Option<String>,

    /// Number of most recent articles to read. Overrides NEWS_FEED_LIMIT.
    #[arg(long)]
    limit: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a new article.
    Publish {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Print the homepage once.
    Feed,
    /// Print the homepage every time it changes, until Ctrl-C.
    Watch,
    /// Print one article.
    Show { id: String },
}

fn print_projection(projection: &FeedProjection) {
    match &projection.lead {
        Section::Filled(card) => println!("LEAD      [{}] {} ({}) -> {}", card.category, card.title, card.date, card.link),
        Section::Empty(placeholder) => println!("LEAD      {}", placeholder),
    }
    match &projection.secondary {
        Section::Filled(cards) => {
            for card in cards {
                println!("SECONDARY [{}] {} ({}) -> {}", card.category, card.title, card.date, card.link);
            }
        }
        Section::Empty(placeholder) => println!("SECONDARY {}", placeholder),
    }
    match &projection.trending {
        Section::Filled(links) => {
            for (rank, link) in links.iter().enumerate() {
                println!("TRENDING  {}. {} -> {}", rank + 1, link.title, link.link);
            }
        }
        Section::Empty(placeholder) => println!("TRENDING  {}", placeholder),
    }
}

fn print_detail(page: &DetailPage) {
    match page {
        DetailPage::Loaded(detail) => {
            println!("{}", detail.page_title);
            println!("{} | by {} | published {}", detail.category, detail.author, detail.date);
            println!("image: {}", detail.image_url);
            println!();
            println!("{}", detail.body);
        }
        DetailPage::Failed(notice) => {
            println!("{}", notice.heading);
            println!("{}", notice.message);
        }
        DetailPage::Loading { page_title } => println!("{}", page_title),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(store_url) = &cli.store {
        let auth = cli.auth.clone().or_else(|| match &config.store {
            StoreConfig::Rest { auth, .. } => auth.clone(),
            StoreConfig::Sqlite { .. } => None,
        });
        config.store = StoreConfig::parse(store_url, auth)?;
    } else if let (Some(token), StoreConfig::Rest { auth, .. }) = (&cli.auth, &mut config.store) {
        *auth = Some(token.clone());
    }
    if let Some(limit) = &cli.limit {
        config.feed.feed_limit = parse_limit("--limit", limit)?;
    }

    info!("Starting news feed ({})", config.store.redacted());
    let connection = Arc::new(StoreConnection::connect(&config.store).await);
    if !connection.is_ready() {
        warn!("Article store is {}; commands will report it as not connected", connection.state());
    }

    match cli.command {
        Command::Publish {
            title,
            summary,
            body,
            category,
            author,
            image_url,
        } => {
            let draft = ArticleDraft {
                title,
                summary,
                body,
                category,
                author,
                image_url,
            };
            let pipeline = PublishPipeline::new(connection, config.feed);
            let result = pipeline.publish(draft).await;
            let status = StatusMessage::from_result(&result);
            println!("{}", status.text());
            if let Ok(id) = result {
                println!("id: {}", id);
            } else {
                std::process::exit(1);
            }
        }
        Command::Feed => {
            let subscription = FeedSubscription::new(connection, config.feed);
            print_projection(&subscription.load_projection().await);
        }
        Command::Watch => {
            let subscription = FeedSubscription::new(connection, config.feed);
            let mut handle = subscription
                .subscribe(
                    |snapshot| {
                        println!("--- {} articles ---", snapshot.articles.len());
                        print_projection(&snapshot.projection);
                    },
                    |e| {
                        error!("Feed subscription stopped: {}", e);
                        print_projection(&FeedProjection::unreachable());
                    },
                )
                .await?;

            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe(&mut handle).await;
            info!("Stopped watching");
        }
        Command::Show { id } => {
            let loader = ArticleDetailLoader::new(connection, config.feed);
            print_detail(&loader.load_page(&id).await);
        }
    }

    Ok(())
}
