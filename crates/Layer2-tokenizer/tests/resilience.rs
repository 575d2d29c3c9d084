//! Breaker, deadline and cancellation integration tests

use modelgate_foundation::{BreakerSettings, ModelRegistry};
use modelgate_tokenizer::{
    AccurateCounter, BreakerRegistry, BreakerState, CancellationToken, CircuitBreakerManager,
    CountError, ErrorCategory, Interrupt, ManualClock, ResilientManager, Result, StreamingCounter,
    TokenRouter, TokenizerError, TokenizerManager, MAX_COUNT_WORKERS,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counter whose behaviour is switched from the test
#[derive(Default)]
struct FlakyCounter {
    failing: AtomicBool,
    delay_ms: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyCounter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AccurateCounter for FlakyCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TokenizerError::new("", model, "backend crashed"));
        }
        Ok(text.split_whitespace().count())
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    fn get_encoding(&self, _model: &str) -> Result<String> {
        Ok("words".to_string())
    }
}

struct FlakyManager(Arc<FlakyCounter>);

impl TokenizerManager for FlakyManager {
    fn get_tokenizer(&self, _provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let counter: Arc<dyn AccurateCounter> = self.0.clone();
        Ok(counter)
    }

    fn supports_provider(&self, _provider: &str) -> bool {
        true
    }

    fn clear_cache(&self) {}
}

#[test]
fn test_breaker_lifecycle() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.failing.store(true, Ordering::SeqCst);

    let clock = Arc::new(ManualClock::new());
    let registry = BreakerRegistry::new(BreakerSettings {
        failure_threshold: 5,
        cooldown_ms: 30_000,
    })
    .with_clock(clock.clone());
    let manager = CircuitBreakerManager::with_registry(Arc::new(FlakyManager(flaky.clone())), registry);
    let counter = manager.get_tokenizer("openai").unwrap();

    for i in 1..=5 {
        assert!(counter.count_tokens("a b", "gpt-4o").is_err());
        let expected = if i < 5 { BreakerState::Closed } else { BreakerState::Open };
        assert_eq!(manager.breaker("openai").state(), expected, "after {} failures", i);
    }

    // rejected without touching the backend
    let err = counter.count_tokens("a b", "gpt-4o").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::RateLimit);
    assert_eq!(flaky.calls(), 5);

    // other providers unaffected
    assert_eq!(manager.breaker("gemini").state(), BreakerState::Closed);

    clock.advance(Duration::from_secs(31));
    flaky.failing.store(false, Ordering::SeqCst);
    assert_eq!(counter.count_tokens("a b", "gpt-4o").unwrap(), 2);

    let stats = manager.breaker("openai").stats();
    assert_eq!(stats.state, BreakerState::Closed);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test]
async fn test_facade_falls_back_while_breaker_open() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.failing.store(true, Ordering::SeqCst);
    let manager = Arc::new(CircuitBreakerManager::new(
        Arc::new(FlakyManager(flaky.clone())),
        BreakerSettings {
            failure_threshold: 2,
            cooldown_ms: 60_000,
        },
    ));
    let router = TokenRouter::new(manager.clone(), Arc::new(ModelRegistry::with_defaults()));
    let cancel = CancellationToken::new();

    for _ in 0..4 {
        // "abcdefgh" -> floor(8 * 0.75)
        assert_eq!(router.count_tokens(&cancel, "abcdefgh", "gpt-4o").await.unwrap(), 6);
    }
    assert_eq!(flaky.calls(), 2);
    assert_eq!(manager.breaker("openai").state(), BreakerState::Open);
}

#[tokio::test]
async fn test_streaming_cancellation_overshoot() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.delay_ms.store(100, Ordering::SeqCst);
    let streaming = StreamingCounter::new(flaky);
    let cancel = CancellationToken::new();
    // 6 MB, above the medium threshold
    let input = "lorem ipsum ".repeat(500_000);
    let total_size = input.len() as u64;
    assert!(total_size >= 5 * 1024 * 1024);
    assert_eq!(streaming.policy().chunk_size_for(Some(total_size)), 32 * 1024);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = streaming
        .count_tokens_streaming_adaptive(&cancel, input.as_bytes(), "m", total_size)
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, CountError::Interrupted(Interrupt::Cancelled)));
    assert!(elapsed < Duration::from_millis(50 + 150), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_router_streaming_cancellation() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.delay_ms.store(100, Ordering::SeqCst);
    let router = TokenRouter::new(
        Arc::new(FlakyManager(flaky)),
        Arc::new(ModelRegistry::with_defaults()),
    );
    let cancel = CancellationToken::new();
    let input = "lorem ipsum ".repeat(50_000);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = router
        .count_tokens_streaming(&cancel, input.as_bytes(), "gemini-2.0-flash", None)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_slow_backend_trips_breaker_through_facade() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.delay_ms.store(300, Ordering::SeqCst);
    let manager = Arc::new(ResilientManager::new(
        Arc::new(FlakyManager(flaky.clone())),
        Duration::from_millis(10),
        BreakerRegistry::new(BreakerSettings {
            failure_threshold: 3,
            cooldown_ms: 60_000,
        }),
    ));
    let router = TokenRouter::new(manager.clone(), Arc::new(ModelRegistry::with_defaults()));
    let cancel = CancellationToken::new();

    for _ in 0..10 {
        // "abcdefgh" -> floor(8 * 0.75)
        assert_eq!(router.count_tokens(&cancel, "abcdefgh", "gpt-4o").await.unwrap(), 6);
    }

    assert_eq!(manager.breaker("openai").state(), BreakerState::Open);
    assert_eq!(flaky.calls(), 3);
    let metrics = manager.metrics("openai").unwrap();
    assert_eq!(metrics.request_count, 10);
    assert_eq!(metrics.failure_count, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_workers_stay_bounded() {
    let flaky = Arc::new(FlakyCounter::default());
    flaky.delay_ms.store(2_000, Ordering::SeqCst);
    let manager = ResilientManager::new(
        Arc::new(FlakyManager(flaky.clone())),
        Duration::from_millis(5),
        BreakerRegistry::new(BreakerSettings {
            failure_threshold: u32::MAX,
            cooldown_ms: 60_000,
        }),
    );
    let counter = manager.get_tokenizer("openai").unwrap();

    for _ in 0..(MAX_COUNT_WORKERS * 3) {
        let err = counter.count_tokens("a b", "gpt-4o").unwrap_err();
        assert_eq!(err.interrupt(), Some(Interrupt::DeadlineExceeded));
    }
    assert_eq!(flaky.calls(), MAX_COUNT_WORKERS);
}
