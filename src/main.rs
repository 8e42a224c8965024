use std::sync::Arc;

use paper_digest::config::DigestConfig;
use paper_digest::digest::DigestPipeline;
use paper_digest::feed::ArxivClient;
use paper_digest::llm::{LlmBackend, LlmConfig, RelevanceScorer, create_provider};
use paper_digest::notify::{EmailNotifier, Notifier, TeamsNotifier};
use paper_digest::store::LibSqlSeenStore;
use paper_digest::translate::{DeepLTranslator, NoopTranslator, Translator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = DigestConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    eprintln!("📚 Paper Digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm_model);
    eprintln!("   Topics: {}", config.research_topics.join(", "));
    eprintln!("   Database: {}", config.db_path);

    // Create LLM provider
    let llm_config = LlmConfig {
        backend: LlmBackend::Anthropic,
        api_key: config.llm_api_key.clone(),
        model: config.llm_model.clone(),
    };
    let llm = create_provider(&llm_config)?;
    let scorer = RelevanceScorer::new(llm);

    // ── Seen-paper store ────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store = Arc::new(LibSqlSeenStore::new_local(db_path).await.unwrap_or_else(
        |e| {
            eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
            std::process::exit(1);
        },
    ));

    // ── Translator ──────────────────────────────────────────────────────
    let translator: Arc<dyn Translator> = match &config.translate_api_key {
        Some(key) => Arc::new(DeepLTranslator::new(
            config.translate_api_url.clone(),
            key.clone(),
            config.target_language.clone(),
        )),
        None => {
            eprintln!("   Translation: disabled (DEEPL_API_KEY not set)");
            Arc::new(NoopTranslator)
        }
    };

    // ── Notification channels ───────────────────────────────────────────
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(webhook_url) = &config.teams_webhook_url {
        notifiers.push(Arc::new(TeamsNotifier::new(webhook_url.clone())));
        eprintln!("   Channel: teams");
    }
    if let Some(email_config) = &config.email {
        notifiers.push(Arc::new(EmailNotifier::new(email_config.clone())));
        eprintln!("   Channel: email -> {}", email_config.recipient);
    }
    if notifiers.is_empty() {
        eprintln!("Error: no notification channel configured");
        eprintln!("  set DIGEST_TEAMS_WEBHOOK_URL and/or DIGEST_SMTP_HOST");
        std::process::exit(1);
    }

    let pipeline = DigestPipeline::new(
        config,
        ArxivClient::new(),
        store,
        scorer,
        translator,
        notifiers,
    );

    match pipeline.run().await {
        Ok(run) => {
            eprintln!(
                "Done: {} papers, {} new, {} relevant ({:.1}s)",
                run.total_papers, run.new_papers, run.relevant_papers, run.elapsed_secs
            );
            Ok(())
        }
        Err(e) => {
            let message = format!("Digest run failed: {e}");
            tracing::error!("{message}");
            pipeline.notify_error(&message).await;
            std::process::exit(1);
        }
    }
}
