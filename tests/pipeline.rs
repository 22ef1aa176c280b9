//! Pipeline integration tests.
//!
//! These drive [`Pipeline`] end to end with a scripted in-process
//! [`ModelClient`]: no network, no pdfium. Page images are built directly.

use async_trait::async_trait;
use futures::StreamExt;
use image::{DynamicImage, Rgb, RgbImage};
use pdf2records::{
    Channel, ExtractionConfig, ExtractionProgressCallback, ModelCallError, ModelClient,
    ModelGateway, ModelRequest, PageError, Pipeline,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

type AnalysisScript = Box<dyn Fn(&str) -> Result<String, ModelCallError> + Send + Sync>;

/// OCR answers are served in call order; analysis answers are computed from
/// the transcript the pipeline sends.
struct ScriptedClient {
    ocr: Mutex<VecDeque<Result<String, ModelCallError>>>,
    analysis: AnalysisScript,
    ocr_calls: AtomicUsize,
    instruct_calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(ocr: Vec<Result<String, ModelCallError>>, analysis: AnalysisScript) -> Arc<Self> {
        Arc::new(Self {
            ocr: Mutex::new(ocr.into()),
            analysis,
            ocr_calls: AtomicUsize::new(0),
            instruct_calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.ocr_calls.load(Ordering::SeqCst),
            self.instruct_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn call(&self, request: &ModelRequest) -> Result<String, ModelCallError> {
        match request.channel {
            Channel::Ocr => {
                self.ocr_calls.fetch_add(1, Ordering::SeqCst);
                self.ocr
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(transport("OCR script exhausted")))
            }
            Channel::Instruct => {
                self.instruct_calls.fetch_add(1, Ordering::SeqCst);
                let text = request
                    .messages
                    .last()
                    .map(|m| m.text())
                    .unwrap_or_default();
                (self.analysis)(&text)
            }
        }
    }
}

fn transport(detail: &str) -> ModelCallError {
    ModelCallError::Transport {
        channel: Channel::Ocr,
        detail: detail.to_string(),
    }
}

fn ocr_ok(text: &str) -> Result<String, ModelCallError> {
    Ok(json!({ "natural_text": text }).to_string())
}

/// Echo the transcript; anything mentioning a price is important.
fn echo_analysis() -> AnalysisScript {
    Box::new(|text: &str| {
        Ok(json!({
            "transcribed_contents": text,
            "optimized_details": format!("สรุป: {}", text.chars().take(10).collect::<String>()),
            "is_important": text.contains("บาท"),
        })
        .to_string())
    })
}

/// Distinct page rasters: different sizes survive binarisation as different
/// images, so their OCR requests never share a cache key.
fn pages(n: usize) -> Vec<DynamicImage> {
    (0..n)
        .map(|i| {
            let w = 8 + i as u32;
            DynamicImage::ImageRgb8(RgbImage::from_fn(w, 6, |x, _| {
                if x % 2 == 0 {
                    Rgb([20, 20, 20])
                } else {
                    Rgb([235, 235, 235])
                }
            }))
        })
        .collect()
}

fn pipeline_with(client: Arc<ScriptedClient>) -> Pipeline {
    let config = ExtractionConfig::builder()
        .client(client)
        .no_cache()
        .ocr_requests_per_minute(0)
        .instruct_requests_per_minute(0)
        .build()
        .unwrap();
    Pipeline::from_config(&config).unwrap()
}

// ── Orchestration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn transport_failure_on_one_page_does_not_stop_the_batch() {
    let client = ScriptedClient::new(
        vec![
            ocr_ok("ข้อ 1. คู่สัญญา"),
            Err(transport("connection refused")),
            Ok(format!(
                "Here is the transcription: {} Hope this helps!",
                json!({ "natural_text": "ราคาจะซื้อจะขาย 1,980,000.00 บาท" })
            )),
        ],
        echo_analysis(),
    );
    let pipeline = pipeline_with(client.clone());

    let output = pipeline.process(&pages(3)).await;
    let records = &output.records;

    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().map(|r| r.page_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    assert_eq!(records[0].analyze_contents, "ข้อ 1. คู่สัญญา");
    assert!(!records[0].is_important);
    assert!(records[0].error.is_none());

    assert!(records[1].is_important);
    assert!(records[1]
        .analyze_contents
        .starts_with("Error processing this page:"));
    assert!(records[1].analyze_contents.contains("connection refused"));
    assert_eq!(records[1].optimized_details, "Error");
    assert!(matches!(
        records[1].error,
        Some(PageError::TranscriptionFailed { page: 2, .. })
    ));

    assert_eq!(records[2].analyze_contents, "ราคาจะซื้อจะขาย 1,980,000.00 บาท");
    assert!(records[2].is_important);
    assert!(records[2].error.is_none());

    // The failed page never reaches analysis.
    assert_eq!(client.calls(), (3, 2));

    assert_eq!(output.stats.total_pages, 3);
    assert_eq!(output.stats.transcribed_pages, 2);
    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.stats.important_pages, 2);
    assert_eq!(output.stats.analysis_fallbacks, 0);
}

#[tokio::test]
async fn ocr_reply_without_json_is_a_page_error_with_raw_output() {
    let client = ScriptedClient::new(
        vec![Ok("The image is too blurry to read.".into())],
        echo_analysis(),
    );
    let output = pipeline_with(client.clone()).process(&pages(1)).await;

    let record = &output.records[0];
    assert!(record.is_important);
    assert!(record
        .analyze_contents
        .contains("The image is too blurry to read."));
    match &record.error {
        Some(PageError::TranscriptionFailed { detail, .. }) => {
            assert!(detail.contains("The image is too blurry to read."))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.calls(), (1, 0));
}

#[tokio::test]
async fn transcript_is_cleaned_before_analysis() {
    let client = ScriptedClient::new(
        vec![ocr_ok("\u{FEFF}ข้อ 3.   \r\n\r\n\r\n\r\nการชำระเงิน  ")],
        echo_analysis(),
    );
    let output = pipeline_with(client).process(&pages(1)).await;
    assert_eq!(output.records[0].analyze_contents, "ข้อ 3.\n\nการชำระเงิน");
}

// ── Analysis fail-safe ───────────────────────────────────────────────────────

#[tokio::test]
async fn analysis_missing_flag_falls_back_to_important() {
    let client = ScriptedClient::new(
        vec![ocr_ok("general clause")],
        Box::new(|_: &str| {
            Ok(json!({
                "transcribed_contents": "general clause",
                "optimized_details": "ทั่วไป",
            })
            .to_string())
        }),
    );
    let output = pipeline_with(client).process(&pages(1)).await;

    let record = &output.records[0];
    assert!(record.is_important);
    assert!(record.error.is_none());
    assert_eq!(record.analyze_contents, "general clause");
    assert!(record.optimized_details.contains("is_important"));
    assert_eq!(output.stats.analysis_fallbacks, 1);
}

#[tokio::test]
async fn analysis_never_raises() {
    let replies: Vec<Result<String, ModelCallError>> = vec![
        Err(ModelCallError::Timeout {
            channel: Channel::Instruct,
            secs: 120,
        }),
        Ok(String::new()),
        Ok("no json at all".into()),
        Ok("{ broken".into()),
        Ok("{\"transcribed_contents\": 1, \"optimized_details\": \"x\", \"is_important\": false}".into()),
        Ok("{\"transcribed_contents\": \"t\", \"optimized_details\": \"x\", \"is_important\": \"perhaps\"}".into()),
        Ok("[1, 2, 3]".into()),
    ];
    let n = replies.len();
    let replies = Mutex::new(VecDeque::from(replies));

    let client = ScriptedClient::new(
        (0..n).map(|i| ocr_ok(&format!("page text {i}"))).collect(),
        Box::new(move |_: &str| {
            replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("unexpected call".into()))
        }),
    );
    let output = pipeline_with(client).process(&pages(n)).await;

    assert_eq!(output.records.len(), n);
    for (i, record) in output.records.iter().enumerate() {
        assert!(record.error.is_none(), "page {}", i + 1);
        assert!(record.is_important, "page {} must fall back", i + 1);
        assert_eq!(record.analyze_contents, format!("page text {i}"));
    }
    assert_eq!(output.stats.analysis_fallbacks, n);
}

#[tokio::test]
async fn empty_echo_uses_the_transcript() {
    let client = ScriptedClient::new(
        vec![ocr_ok("ข้อ 5. ค่าธรรมเนียมการโอน")],
        Box::new(|_: &str| {
            Ok(json!({
                "transcribed_contents": "   ",
                "optimized_details": "ค่าธรรมเนียม",
                "is_important": false,
            })
            .to_string())
        }),
    );
    let output = pipeline_with(client).process(&pages(1)).await;

    let record = &output.records[0];
    assert_eq!(record.analyze_contents, "ข้อ 5. ค่าธรรมเนียมการโอน");
    assert!(!record.is_important);
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerun_is_served_from_cache() {
    let client = ScriptedClient::new(vec![ocr_ok("ราคา 999.00 บาท")], echo_analysis());
    let pipeline = pipeline_with(client.clone());
    let page = pages(1);

    let first = pipeline.process(&page).await;
    let second = pipeline.process(&page).await;

    assert_eq!(first.records, second.records);
    assert_eq!(client.calls(), (1, 1));
    assert_eq!((first.stats.cache_hits, first.stats.cache_misses), (0, 2));
    assert_eq!((second.stats.cache_hits, second.stats.cache_misses), (2, 0));
}

#[tokio::test]
async fn persisted_cache_survives_a_new_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache/responses.json");
    let page = pages(2);

    let config_for = |client: Arc<ScriptedClient>| {
        ExtractionConfig::builder()
            .client(client)
            .cache_path(&cache_path)
            .ocr_requests_per_minute(0)
            .instruct_requests_per_minute(0)
            .build()
            .unwrap()
    };

    let warm = ScriptedClient::new(vec![ocr_ok("หน้า 1"), ocr_ok("หน้า 2")], echo_analysis());
    let first = Pipeline::from_config(&config_for(warm))
        .unwrap()
        .process(&page)
        .await;
    assert!(cache_path.exists());

    // Every call on this client fails; only the cache can answer.
    let cold = ScriptedClient::new(vec![], Box::new(|_: &str| Err(transport("offline"))));
    let second = Pipeline::from_config(&config_for(cold.clone()))
        .unwrap()
        .process(&page)
        .await;

    assert_eq!(first.records, second.records);
    assert_eq!(cold.calls(), (0, 0));
}

#[tokio::test]
async fn failed_calls_are_not_cached() {
    let client = ScriptedClient::new(
        vec![Err(transport("502 Bad Gateway")), ocr_ok("retry worked")],
        echo_analysis(),
    );
    let pipeline = pipeline_with(client.clone());
    let page = pages(1);

    let first = pipeline.process(&page).await;
    assert!(first.records[0].error.is_some());

    let second = pipeline.process(&page).await;
    assert!(second.records[0].error.is_none());
    assert_eq!(second.records[0].analyze_contents, "retry worked");
    assert_eq!(client.calls().0, 2);
}

// ── Rate limiting ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ocr_calls_respect_the_channel_quota() {
    let client = ScriptedClient::new(
        vec![ocr_ok("a"), ocr_ok("b"), ocr_ok("c")],
        echo_analysis(),
    );
    let config = ExtractionConfig::builder()
        .client(client)
        .no_cache()
        .ocr_requests_per_minute(6)
        .instruct_requests_per_minute(0)
        .build()
        .unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();

    let start = tokio::time::Instant::now();
    let output = pipeline.process(&pages(3)).await;

    assert_eq!(output.stats.transcribed_pages, 3);
    // Three OCR calls at 6/min: two full 10s gaps.
    assert!(start.elapsed() >= std::time::Duration::from_secs(20));
}

/// One config carrying a gateway built for `client` at the given OCR quota.
fn shared_config(client: Arc<ScriptedClient>, ocr_rpm: u32) -> ExtractionConfig {
    let base = ExtractionConfig::builder()
        .client(client)
        .no_cache()
        .ocr_requests_per_minute(ocr_rpm)
        .instruct_requests_per_minute(0)
        .build()
        .unwrap();
    let gateway = ModelGateway::from_config(&base).unwrap();
    ExtractionConfig::builder().gateway(gateway).build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_quota() {
    let client = ScriptedClient::new(vec![ocr_ok("a"), ocr_ok("b")], echo_analysis());
    let config = shared_config(client.clone(), 1);

    let first = Pipeline::from_config(&config).unwrap();
    let second = Pipeline::from_config(&config).unwrap();
    let mut both = pages(2);
    let page_b = both.split_off(1);

    let start = tokio::time::Instant::now();
    let (a, b) = tokio::join!(first.process(&both), second.process(&page_b));

    assert_eq!(a.stats.transcribed_pages + b.stats.transcribed_pages, 2);
    assert_eq!(client.calls().0, 2);
    // Two OCR calls at 1/min from two requests: one full minute apart.
    assert!(start.elapsed() >= std::time::Duration::from_secs(60));
}

#[tokio::test]
async fn requests_sharing_a_gateway_share_its_cache() {
    let client = ScriptedClient::new(vec![ocr_ok("ข้อ 1")], echo_analysis());
    let config = shared_config(client.clone(), 0);
    let page = pages(1);

    let first = Pipeline::from_config(&config).unwrap().process(&page).await;
    let second = Pipeline::from_config(&config).unwrap().process(&page).await;

    assert_eq!(first.records, second.records);
    assert_eq!(client.calls(), (1, 1));
    assert_eq!(second.stats.cache_hits, 2);
    assert_eq!(second.stats.cache_misses, 0);
}

// ── Streaming and progress ───────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_records_in_page_order() {
    let client = ScriptedClient::new(
        vec![ocr_ok("one"), Err(transport("boom")), ocr_ok("three")],
        echo_analysis(),
    );
    let pipeline = pipeline_with(client);

    let records: Vec<_> = pipeline.process_stream(pages(3)).collect().await;

    assert_eq!(
        records.iter().map(|r| r.page_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(records[1].is_failed());
    assert_eq!(records[2].analyze_contents, "three");
}

#[derive(Default)]
struct Events {
    log: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Events {
    fn on_extraction_start(&self, total_pages: usize) {
        self.log.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.log.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, is_important: bool) {
        self.log
            .lock()
            .unwrap()
            .push(format!("done {page_num} {is_important}"));
    }
    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.log.lock().unwrap().push(format!("error {page_num}"));
    }
    fn on_extraction_complete(&self, total_pages: usize, transcribed: usize) {
        self.log
            .lock()
            .unwrap()
            .push(format!("complete {transcribed}/{total_pages}"));
    }
}

#[tokio::test]
async fn progress_events_follow_page_order() {
    let events = Arc::new(Events::default());
    let client = ScriptedClient::new(
        vec![ocr_ok("ราคา 10 บาท"), Err(transport("boom"))],
        echo_analysis(),
    );
    let config = ExtractionConfig::builder()
        .client(client)
        .no_cache()
        .ocr_requests_per_minute(0)
        .instruct_requests_per_minute(0)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    Pipeline::from_config(&config)
        .unwrap()
        .process(&pages(2))
        .await;

    assert_eq!(
        *events.log.lock().unwrap(),
        vec![
            "start 2",
            "page 1",
            "done 1 true",
            "page 2",
            "error 2",
            "complete 1/2",
        ]
    );
}
