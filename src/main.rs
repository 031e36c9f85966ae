//! Beacon - multi-tenant real-time location ingestion gateway

use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon::{
    auth::{Authenticator, IdentityClient},
    bus::{BusClient, LocationConsumer},
    cache::SessionCache,
    config::Args,
    db::schemas::{
        DeadLetterDoc, FixDoc, TrackingSessionDoc, UserDoc, DEAD_LETTER_COLLECTION,
        FIX_COLLECTION, SESSION_COLLECTION, USER_COLLECTION,
    },
    db::MongoClient,
    delivery::ThirdPartyClient,
    producer::{EventProducer, ProducerConfig},
    retry::{DeadLetterStore, RetryConfig, RetryScheduler},
    server,
    sessions::SessionAuthority,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("beacon={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Beacon - Location Ingestion Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("NATS: {}", args.nats.nats_url);
    info!("Third-party sink: {}", args.third_party_endpoint);
    info!("Producer: {} workers, queue {}", args.worker_count, args.event_queue_size);
    info!(
        "Retry: max {}, batch {}, every {}s",
        args.max_retries, args.retry_batch_size, args.retry_check_interval_secs
    );
    info!("======================================");

    // Storage
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let sessions = mongo
        .collection::<TrackingSessionDoc>(SESSION_COLLECTION)
        .await?;
    let fixes = mongo.collection::<FixDoc>(FIX_COLLECTION).await?;
    let dead_letter_collection = mongo
        .collection::<DeadLetterDoc>(DEAD_LETTER_COLLECTION)
        .await?;
    let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    // Message bus
    let bus = match BusClient::new(&args.nats, &format!("beacon-{}", args.node_id)).await {
        Ok(client) => client,
        Err(e) => {
            error!("NATS connection failed: {}", e);
            std::process::exit(1);
        }
    };
    bus.ensure_location_stream().await?;

    // Caches
    let session_cache = Arc::new(SessionCache::new());
    session_cache.spawn_cleanup();

    // Auth
    let identity = Arc::new(IdentityClient::new(&args.identity)?);
    let auth = Arc::new(Authenticator::new(args.jwt_secret(), Arc::clone(&identity)));
    auth.sessions.spawn_cleanup();

    // Core services
    let authority = Arc::new(SessionAuthority::new(
        sessions,
        fixes,
        Arc::clone(&session_cache),
    ));
    let delivery = Arc::new(ThirdPartyClient::new(&args.third_party_endpoint)?);
    let dead_letters = DeadLetterStore::new(dead_letter_collection);

    let producer = Arc::new(EventProducer::new(
        bus.clone(),
        ProducerConfig {
            worker_count: args.worker_count,
            queue_size: args.event_queue_size,
        },
    ));

    // Bus consumer: pull location events, POST to the sink, dead-letter
    // failures
    let consumer = Arc::new(LocationConsumer::new(
        bus.clone(),
        Arc::clone(&delivery),
        dead_letters.clone(),
    ));
    let consumer_handle = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move {
            if let Err(e) = consumer.run().await {
                error!("Location consumer exited with error: {}", e);
            }
        })
    };

    // Retry scheduler: periodic sweep over due dead letters
    let retry_config = RetryConfig {
        max_retries: args.max_retries,
        batch_size: args.retry_batch_size,
        check_interval: args.retry_check_interval(),
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = RetryScheduler::new(
        dead_letters.clone(),
        Arc::clone(&authority),
        Arc::clone(&delivery),
        retry_config.clone(),
    );
    let scheduler_handle = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        })
    };

    let state = Arc::new(server::AppState::new(
        args,
        auth,
        authority,
        Arc::clone(&producer),
        dead_letters,
        delivery,
        retry_config,
        users,
    ));

    // Ctrl-c flips the shutdown signal observed by the accept loop and the
    // scheduler
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    // Serve until shutdown
    if let Err(e) = server::run(Arc::clone(&state), shutdown_rx).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    // Ordered teardown: accept loop is closed; drain the producer, stop the
    // consumer, let the scheduler observe the signal between sweeps
    producer.shutdown().await;
    consumer.stop().await;
    let _ = consumer_handle.await;
    let _ = scheduler_handle.await;

    info!("Beacon shutdown complete");
    Ok(())
}
