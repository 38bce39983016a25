use crate::bot::transport::{event_from_message, TelegramContentSource, TelegramReplySender};
use crate::cache::{ProcessedMessages, ScopedStatsStore};
use crate::config::{
    get_denial_cache_max_size, get_denial_cache_ttl, get_denial_cooldown,
    get_processed_retention, Settings,
};
use crate::ingest::{
    AccessPolicy, AllowAll, AllowList, Collaborators, DenialThrottle, DispatchError,
    EventDispatcher,
};
use crate::storage::{R2Storage, UploadProvider};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<Settings>) {
    let storage = init_storage(&settings).await;
    let bot = Bot::new(settings.telegram_token.clone());
    let dispatcher = Arc::new(init_dispatcher(&settings, &bot, storage));
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &Settings) -> Arc<dyn UploadProvider> {
    match R2Storage::new(settings).await {
        Ok(s) => {
            info!("R2 Storage initialized.");
            if s.check_connection().await.is_err() {
                error!("R2 Storage connection check returned error.");
            }
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize R2 Storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_dispatcher(
    settings: &Settings,
    bot: &Bot,
    storage: Arc<dyn UploadProvider>,
) -> EventDispatcher {
    let retention = get_processed_retention();
    info!("Initializing caches (message retention: {}s)", retention);

    let processed = Arc::new(ProcessedMessages::new(Duration::from_secs(retention)));
    let stats = Arc::new(ScopedStatsStore::new());
    let io = Collaborators {
        content: Arc::new(TelegramContentSource::new(bot.clone())),
        uploader: storage,
        replies: Arc::new(TelegramReplySender::new(bot.clone())),
    };

    EventDispatcher::new(processed, stats, io, init_access_policy(settings))
        .with_upload_prefix(settings.upload_prefix.clone())
        .with_denial_throttle(init_denial_throttle())
}

fn init_access_policy(settings: &Settings) -> Arc<dyn AccessPolicy> {
    if settings.allow_all_users {
        warn!("ALLOW_ALL_USERS is set: every Telegram user may use the bot.");
        return Arc::new(AllowAll);
    }

    let allowed = settings.allowed_users();
    if allowed.is_empty() {
        warn!("ALLOWED_USERS is empty: every sender will be denied.");
    } else {
        info!("Access restricted to {} users.", allowed.len());
    }
    Arc::new(AllowList::new(allowed))
}

fn init_denial_throttle() -> DenialThrottle {
    let cooldown = get_denial_cooldown();
    let ttl = get_denial_cache_ttl();
    let max_size = get_denial_cache_max_size();

    info!(
        "Initializing DenialThrottle (cooldown: {}s, ttl: {}s, max_size: {})",
        cooldown, ttl, max_size
    );

    DenialThrottle::new(cooldown, ttl, max_size)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_message))
}

async fn handle_message(
    msg: Message,
    dispatcher: Arc<EventDispatcher>,
) -> Result<(), teloxide::RequestError> {
    let event = event_from_message(&msg);
    match dispatcher.handle_event(&event).await {
        Err(DispatchError::Unsupported(kind)) => {
            debug!(message_id = %event.message_id, "Skipping unsupported message type: {kind}");
        }
        Err(e) => error!(message_id = %event.message_id, "Error handling message: {}", e),
        Ok(_) => {}
    }
    respond(())
}
