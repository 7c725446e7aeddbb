pub mod types;
pub mod article;
pub mod view;
pub mod config;
pub mod projector;
pub mod connection;
pub mod backends;
pub mod publish;
pub mod subscription;
pub mod detail;

pub use types::*;
pub use config::{AppConfig, FeedConfig, StoreConfig};
pub use connection::{ConnectionState, StoreConnection};
pub use backends::{RestStore, SqliteStore};
pub use projector::{FeedProjection, FeedProjector, Placeholder, Section};
pub use publish::{BusyControl, BusyFlag, BusyGuard, PublishPipeline, StatusMessage};
pub use subscription::{FeedSnapshot, FeedSubscription, SubscriptionHandle};
pub use detail::{ArticleDetailLoader, DetailPage};
