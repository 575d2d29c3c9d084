//! Routing facade integration tests
//!
//! `cargo test -p modelgate-tokenizer --test routing -- --nocapture`

use modelgate_foundation::{ModelRegistry, TokenizerConfig};
use modelgate_tokenizer::{
    AccurateCounter, CancellationToken, DefaultTokenizerManager, NormalizingCounter,
    SubwordCounter, TiktokenCounter, TokenRouter, TokenizerManager,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn router() -> TokenRouter {
    TokenRouter::from_config(
        &TokenizerConfig::default(),
        Arc::new(ModelRegistry::with_defaults()),
    )
}

#[test]
fn test_empty_text_is_zero_everywhere() {
    let tiktoken = TiktokenCounter::new();
    for model in ["gpt-4o", "gpt-4.1", "o3-mini", "gpt-4-turbo", "gpt-3.5-turbo"] {
        assert_eq!(tiktoken.count_tokens("", model).unwrap(), 0, "{}", model);
    }

    let subword = SubwordCounter::new();
    for model in ["gemini-2.0-flash", "gemini-1.5-pro", "gemma-3-27b-it"] {
        assert_eq!(subword.count_tokens("", model).unwrap(), 0, "{}", model);
    }

    let normalizing = NormalizingCounter::default();
    assert_eq!(normalizing.count_tokens("", "openrouter/auto").unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hello_world_across_providers() {
    init_tracing();
    let router = router();
    let cancel = CancellationToken::new();

    let openai = router
        .count_tokens(&cancel, "Hello, world!", "gpt-4o")
        .await
        .unwrap();
    assert!((2..=4).contains(&openai), "got {}", openai);

    let openrouter = router
        .count_tokens(&cancel, "Hello, world!", "openrouter/auto")
        .await
        .unwrap();
    assert_eq!(openai, openrouter);

    let gemini = router
        .count_tokens(&cancel, "Hello, world!", "gemini-2.0-flash")
        .await
        .unwrap();
    assert_eq!(gemini, SubwordCounter::approximate("Hello, world!"));
}

#[tokio::test]
async fn test_unknown_model_estimate() {
    let router = router();
    let cancel = CancellationToken::new();

    for text in ["", "a", "abcd", "The quick brown fox", "토큰 추정"] {
        let count = router
            .count_tokens(&cancel, text, "no-such-model")
            .await
            .unwrap();
        assert_eq!(count, (text.len() as f64 * 0.75).floor() as usize, "{:?}", text);
    }
}

#[tokio::test]
async fn test_clear_cache_rebuilds_counters() {
    let manager = Arc::new(DefaultTokenizerManager::new());
    let router = TokenRouter::new(manager.clone(), Arc::new(ModelRegistry::with_defaults()));
    let cancel = CancellationToken::new();

    let before = manager.get_tokenizer("openai").unwrap();
    router.count_tokens(&cancel, "warm up", "gpt-4o").await.unwrap();
    assert!(Arc::ptr_eq(&before, &manager.get_tokenizer("openai").unwrap()));

    router.clear_cache();
    assert_eq!(manager.cached_providers(), 0);

    let after = manager.get_tokenizer("openai").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(
        before.count_tokens("same text", "gpt-4o").unwrap(),
        after.count_tokens("same text", "gpt-4o").unwrap()
    );
}

#[tokio::test]
async fn test_streaming_large_input_within_tolerance() {
    let router = router();
    let cancel = CancellationToken::new();
    let text = "Token counting keeps requests inside context windows. ".repeat(2_000);

    let in_memory = router.count_tokens(&cancel, &text, "gpt-4o").await.unwrap();
    let streamed = router
        .count_tokens_streaming(&cancel, text.as_bytes(), "gpt-4o", Some(text.len() as u64))
        .await
        .unwrap();

    // a split word may re-tokenize into an extra piece on either side
    let boundaries = text.len() / (8 * 1024) + 1;
    assert!(
        streamed.abs_diff(in_memory) <= 2 * boundaries,
        "streamed {} vs {} (boundaries {})",
        streamed,
        in_memory,
        boundaries
    );
}

#[test]
fn test_sync_caller_with_block_on() {
    let router = TokenRouter::new(
        Arc::new(DefaultTokenizerManager::new()),
        Arc::new(ModelRegistry::with_defaults()),
    );
    let cancel = CancellationToken::new();

    let count =
        tokio_test::block_on(router.count_tokens(&cancel, "Hello, world!", "gpt-4o")).unwrap();
    assert!((2..=4).contains(&count), "got {}", count);
}
