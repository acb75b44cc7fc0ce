//! Integration tests for the note pipeline.
//!
//! Every collaborator (PDF backend, OCR engine, completion service,
//! publisher) is an in-process fake, so these run without pdfium,
//! tesseract, network access or API keys.

use async_trait::async_trait;
use futures::StreamExt;
use image::{DynamicImage, RgbaImage};
use memoir_notes::{
    Block, BlockConverter, BlockMode, BlockSource, BlockValidator, CompletionError,
    CompletionRequest, CompletionService, Document, ExtractionError, ExtractionMethod,
    NotePipeline, OcrError, OcrInput, OcrService, Parent, PdfBackend, PdfError,
    PipelineConfig, PipelineProgressCallback, PublishError, PublishRequest, PublishedPage,
    Publisher, SynthesisError, TableBlock, TableChild, TableRow, NO_INPUT_SUMMARY,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakePdf {
    pages: Vec<String>,
}

impl FakePdf {
    fn with_text(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        })
    }
}

impl PdfBackend for FakePdf {
    fn page_texts(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfError> {
        Ok(self.pages.clone())
    }

    fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<DynamicImage>, PdfError> {
        Ok(self
            .pages
            .iter()
            .map(|_| DynamicImage::ImageRgba8(RgbaImage::new(8, 8)))
            .collect())
    }
}

struct FakeOcr {
    calls: AtomicUsize,
    text: String,
}

impl FakeOcr {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            text: text.to_string(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for FakeOcr {
    fn name(&self) -> &'static str {
        "fake-ocr"
    }

    async fn recognize(&self, _input: &OcrInput) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Answers Markdown prompts with `markdown` and block prompts with `blocks`.
struct FakeCompletion {
    calls: AtomicUsize,
    markdown: String,
    blocks: String,
}

impl FakeCompletion {
    fn new(markdown: &str) -> Arc<Self> {
        Self::with_blocks(markdown, "")
    }

    fn with_blocks(markdown: &str, blocks: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            markdown: markdown.to_string(),
            blocks: blocks.to_string(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    fn name(&self) -> String {
        "fake-completion".to_string()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("JSON array") {
            Ok(self.blocks.clone())
        } else {
            Ok(self.markdown.clone())
        }
    }
}

#[derive(Default)]
struct FakePublisher {
    requests: Mutex<Vec<PublishRequest>>,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPage, PublishError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(PublishedPage {
            id: "page-1".into(),
            url: "https://www.notion.so/page1".into(),
        })
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for RecordingProgress {
    fn on_batch_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("batch_start:{total}"));
    }

    fn on_document_start(&self, index: usize, _total: usize, _name: &str) {
        self.events.lock().unwrap().push(format!("start:{index}"));
    }

    fn on_document_complete(&self, index: usize, _total: usize, _name: &str, _blocks: usize) {
        self.events.lock().unwrap().push(format!("complete:{index}"));
    }

    fn on_document_error(&self, index: usize, _total: usize, _name: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("error:{index}"));
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch_complete:{total}:{success_count}"));
    }
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pipeline(
    config: PipelineConfig,
    pdf: Arc<FakePdf>,
    ocr: Arc<FakeOcr>,
    completion: Arc<FakeCompletion>,
) -> NotePipeline {
    init_tracing();
    NotePipeline::new(config, pdf, ocr, completion)
}

fn pdf_doc(name: &str) -> Document {
    Document::from_bytes(name, b"%PDF-1.7 fake".to_vec())
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_layer_above_threshold_never_calls_ocr() {
    let ocr = FakeOcr::new("should not be used");
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&["Lecture 4: eigenvalues and eigenvectors"]),
        Arc::clone(&ocr),
        FakeCompletion::new("# Lecture 4"),
    );

    let result = p.extract(&pdf_doc("lecture.pdf")).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Direct);
    assert!(result.text.contains("eigenvalues"));
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn empty_text_layer_falls_back_to_ocr_once_per_page() {
    let ocr = FakeOcr::new("handwritten page");
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&["", "  \n ", ""]),
        Arc::clone(&ocr),
        FakeCompletion::new("# Notes"),
    );

    let result = p.extract(&pdf_doc("scan.pdf")).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(ocr.calls(), 3);
    assert!(result.text.starts_with("--- Page 1 (OCR) ---\nhandwritten page"));
    assert_eq!(result.page_breaks.len(), 3);
}

#[tokio::test]
async fn text_layer_at_threshold_uses_ocr() {
    // "--- Page 1 ---\nab" is 17 trimmed chars.
    let at = PipelineConfig::builder().min_direct_chars(17).build().unwrap();
    let ocr = FakeOcr::new("ocr text");
    let p = pipeline(
        at,
        FakePdf::with_text(&["ab"]),
        Arc::clone(&ocr),
        FakeCompletion::new("x"),
    );
    let result = p.extract(&pdf_doc("short.pdf")).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(ocr.calls(), 1);

    let below = PipelineConfig::builder().min_direct_chars(16).build().unwrap();
    let ocr = FakeOcr::new("ocr text");
    let p = pipeline(
        below,
        FakePdf::with_text(&["ab"]),
        Arc::clone(&ocr),
        FakeCompletion::new("x"),
    );
    let result = p.extract(&pdf_doc("short.pdf")).await.unwrap();
    assert_eq!(result.method, ExtractionMethod::Direct);
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn unsupported_extension_is_a_stored_failure() {
    let completion = FakeCompletion::new("unused");
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new(""),
        Arc::clone(&completion),
    );

    let note = p.process_bytes("report.docx", b"PK".to_vec()).await;
    assert_eq!(
        note.extraction,
        Err(ExtractionError::UnsupportedFileType {
            extension: ".docx".into()
        })
    );
    assert_eq!(note.extracted_text(), "Unsupported file type: .docx");
    assert_eq!(note.summary, Err(SynthesisError::NoExtractedText));
    assert!(note.blocks.is_empty());
    assert_eq!(completion.calls(), 0);
}

// ── Synthesis ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_input_returns_sentinel_without_calling_collaborator() {
    let completion = FakeCompletion::new("# never");
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new(""),
        Arc::clone(&completion),
    );

    let err = p.synthesize("   \n ").await.unwrap_err();
    assert_eq!(err, SynthesisError::EmptyInput);
    assert_eq!(err.sentinel_text(), NO_INPUT_SUMMARY);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn synthesized_markdown_is_cleaned() {
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new(""),
        FakeCompletion::new("  # Title  \n\n\n- item\n   \n"),
    );
    assert_eq!(p.synthesize("Title item").await.unwrap(), "# Title\n- item");
}

// ── Conversion and validation ────────────────────────────────────────────────

#[test]
fn converter_follows_rule_order() {
    let blocks = BlockConverter::new().to_blocks(
        "# Title\n- a\n1. b\n```rust\n**Bold**\nplain\n\n### Deep",
    );
    assert_eq!(
        blocks,
        vec![
            Block::heading(1, "Title"),
            Block::BulletItem { text: "a".into() },
            Block::NumberedItem { text: "b".into() },
            Block::CodeLine { text: "rust".into() },
            Block::BoldParagraph { text: "Bold".into() },
            Block::paragraph("plain"),
            Block::heading(3, "Deep"),
        ]
    );
}

fn table(width: usize, rows: Vec<TableChild>) -> Block {
    Block::Table(TableBlock {
        width,
        has_column_header: false,
        has_row_header: false,
        rows,
    })
}

fn row(cells: &[&str]) -> TableChild {
    TableChild::Row(TableRow::new(cells.iter().copied()))
}

fn widths(block: &Block) -> (usize, Vec<usize>) {
    match block {
        Block::Table(t) => (t.width, t.table_rows().map(|r| r.cells.len()).collect()),
        other => panic!("expected table, got {}", other.kind()),
    }
}

#[test]
fn validator_pads_truncates_and_infers_width() {
    let v = BlockValidator::new();
    let out = v.validate(vec![
        table(3, vec![row(&["a"]), row(&["a", "b", "c", "d"])]),
        table(0, vec![row(&["x", "y"]), row(&["z"])]),
        table(
            2,
            vec![
                TableChild::Foreign {
                    kind: "paragraph".into(),
                },
                row(&["1", "2"]),
            ],
        ),
        Block::paragraph("untouched"),
    ]);

    assert_eq!(widths(&out[0]), (3, vec![3, 3]));
    assert_eq!(widths(&out[1]), (2, vec![2, 2]));
    assert_eq!(widths(&out[2]), (2, vec![2]));
    match &out[2] {
        Block::Table(t) => assert_eq!(t.rows.len(), 1),
        _ => unreachable!(),
    }
    assert_eq!(out[3], Block::paragraph("untouched"));
}

#[test]
fn validation_is_idempotent() {
    let v = BlockValidator::new();
    let once = v.validate(vec![table(0, vec![row(&["a", "b"]), row(&["c"])])]);
    let twice = v.validate(once.clone());
    assert_eq!(once, twice);
}

// ── End to end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_note_produces_markdown_and_blocks() {
    let ocr = FakeOcr::new("Meeting notes. Important: ship by Friday.");
    let completion = FakeCompletion::new(
        "# Meeting notes\n**Important**\n- ship by Friday",
    );
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        Arc::clone(&ocr),
        Arc::clone(&completion),
    );

    let note = p.process_bytes("IMG_0042.jpeg", vec![0xFF, 0xD8, 0xFF]).await;
    assert!(note.is_ok(), "failures: {:?}", note.failures());
    assert_eq!(ocr.calls(), 1);
    assert_eq!(completion.calls(), 1);
    assert_eq!(note.extracted_text(), "Meeting notes. Important: ship by Friday.");
    assert!(!note.summary_text().is_empty());
    assert_eq!(note.block_source, BlockSource::Classified);
    assert_eq!(
        note.blocks,
        vec![
            Block::heading(1, "Meeting notes"),
            Block::BoldParagraph {
                text: "Important".into()
            },
            Block::BulletItem {
                text: "ship by Friday".into()
            },
        ]
    );
    assert!(!note.has_tables());
    assert!(note.stats.word_count > 0);
}

#[tokio::test]
async fn structured_mode_repairs_ragged_tables() {
    let blocks_json = r#"Here you go:
[
  {"type": "heading_2", "heading_2": {"rich_text": [{"type": "text", "text": {"content": "Budget"}}]}},
  {"type": "table", "table": {"table_width": 3, "has_column_header": true, "children": [
    {"type": "table_row", "table_row": {"cells": [[{"type": "text", "text": {"content": "Item"}}]]}},
    {"type": "paragraph", "paragraph": {"rich_text": []}},
    {"type": "table_row", "table_row": {"cells": [[], [], [], []]}}
  ]}}
]"#;
    let config = PipelineConfig::builder()
        .block_mode(BlockMode::Structured)
        .build()
        .unwrap();
    let completion = FakeCompletion::with_blocks("## Budget\nItem", blocks_json);
    let p = pipeline(
        config,
        FakePdf::with_text(&["Budget: item, cost, owner for the quarter"]),
        FakeOcr::new(""),
        Arc::clone(&completion),
    );

    let note = p.process(&pdf_doc("budget.pdf")).await;
    assert!(note.is_ok());
    assert_eq!(note.block_source, BlockSource::Structured);
    assert_eq!(completion.calls(), 2);
    assert_eq!(note.blocks[0], Block::heading(2, "Budget"));
    match &note.blocks[1] {
        Block::Table(t) => {
            assert_eq!(t.width, 3);
            assert!(t.has_column_header);
            assert_eq!(t.rows.len(), 2);
            assert!(t.table_rows().all(|r| r.cells.len() == 3));
        }
        other => panic!("expected table, got {}", other.kind()),
    }
}

#[tokio::test]
async fn structured_mode_falls_back_to_classification() {
    let config = PipelineConfig::builder()
        .block_mode(BlockMode::Structured)
        .build()
        .unwrap();
    let p = pipeline(
        config,
        FakePdf::with_text(&["Plenty of direct text on this page"]),
        FakeOcr::new(""),
        FakeCompletion::with_blocks("# Fallback\n- point", "sorry, I cannot do that"),
    );

    let note = p.process(&pdf_doc("notes.pdf")).await;
    assert!(note.is_ok());
    assert_eq!(note.block_source, BlockSource::Classified);
    assert_eq!(note.blocks[0], Block::heading(1, "Fallback"));
}

// ── Batches and streams ──────────────────────────────────────────────────────

#[tokio::test]
async fn batch_keeps_input_order_and_reports_progress() {
    let progress = Arc::new(RecordingProgress::default());
    let p = pipeline(
        PipelineConfig::builder().concurrency(3).build().unwrap(),
        FakePdf::with_text(&[]),
        FakeOcr::new("Quick note"),
        FakeCompletion::new("# Done"),
    )
    .with_progress(progress.clone());

    let docs = vec![
        Document::from_bytes("a.png", vec![1]),
        Document::from_bytes("b.docx", vec![2]),
        Document::from_bytes("c.png", vec![3]),
    ];
    let outputs = p.process_batch(&docs).await;

    let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["a.png", "b.docx", "c.png"]);
    assert!(outputs[1].extraction.is_err());

    let events = progress.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("batch_start:3"));
    assert_eq!(events.last().map(String::as_str), Some("batch_complete:3:2"));
    assert_eq!(events.iter().filter(|e| e.starts_with("start:")).count(), 3);
    assert!(events.contains(&"error:1".to_string()));
    assert!(events.contains(&"complete:0".to_string()));
    assert!(events.contains(&"complete:2".to_string()));
}

#[tokio::test]
async fn batch_successes_are_counted() {
    let progress = Arc::new(RecordingProgress::default());
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new("Groceries: eggs, milk"),
        FakeCompletion::new("- eggs\n- milk"),
    )
    .with_progress(progress.clone());

    let docs = vec![
        Document::from_bytes("one.png", vec![1]),
        Document::from_bytes("two.jpg", vec![2]),
    ];
    let outputs = p.process_batch(&docs).await;
    assert!(outputs.iter().all(|o| o.is_ok()));

    let events = progress.events.lock().unwrap().clone();
    assert_eq!(events.last().map(String::as_str), Some("batch_complete:2:2"));
    assert_eq!(events.iter().filter(|e| e.starts_with("complete:")).count(), 2);
}

#[tokio::test]
async fn zero_concurrency_still_makes_progress() {
    let mut config = PipelineConfig::default();
    config.concurrency = 0;
    let p = Arc::new(pipeline(
        config,
        FakePdf::with_text(&[]),
        FakeOcr::new("Zero"),
        FakeCompletion::new("Zero"),
    ));
    let docs = vec![
        Document::from_bytes("a.png", vec![1]),
        Document::from_bytes("b.png", vec![2]),
    ];

    let outputs = tokio::time::timeout(Duration::from_secs(5), p.process_batch(&docs))
        .await
        .expect("batch stalled");
    assert_eq!(outputs.len(), 2);

    let streamed: Vec<_> = tokio::time::timeout(
        Duration::from_secs(5),
        memoir_notes::process_stream(Arc::clone(&p), docs).collect::<Vec<_>>(),
    )
    .await
    .expect("stream stalled");
    assert_eq!(streamed.len(), 2);
}

#[tokio::test]
async fn stream_tags_items_with_input_index() {
    let p = Arc::new(pipeline(
        PipelineConfig::builder().concurrency(2).build().unwrap(),
        FakePdf::with_text(&[]),
        FakeOcr::new("Stream me"),
        FakeCompletion::new("Stream me"),
    ));

    let docs = vec![
        Document::from_bytes("0.png", vec![0]),
        Document::from_bytes("1.txt", vec![1]),
        Document::from_bytes("2.png", vec![2]),
    ];
    let mut items: Vec<_> = memoir_notes::process_stream(p, docs).collect().await;
    items.sort_by_key(|n| n.index);

    assert_eq!(items.len(), 3);
    for (i, note) in items.iter().enumerate() {
        assert_eq!(note.index, i);
        assert_eq!(note.item.name, format!("{i}.{}", if i == 1 { "txt" } else { "png" }));
    }
    assert!(items[0].item.is_ok());
    assert!(!items[1].item.is_ok());
}

#[tokio::test]
async fn unreadable_input_fails_only_its_own_item() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    std::fs::write(&good, [1u8, 2, 3]).unwrap();
    let missing = dir.path().join("missing.png");

    let p = Arc::new(pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new("Some text"),
        FakeCompletion::new("Some text"),
    ));
    let inputs = vec![
        good.to_string_lossy().into_owned(),
        missing.to_string_lossy().into_owned(),
    ];
    let mut items: Vec<_> = memoir_notes::process_inputs_stream(p, inputs).collect().await;
    items.sort_by_key(|n| n.index);

    assert!(items[0].item.as_ref().map(|n| n.is_ok()).unwrap_or(false));
    assert!(items[1].item.is_err());
}

// ── Publishing ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_without_publisher_is_a_setup_error() {
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new(""),
        FakeCompletion::new(""),
    );
    let err = p
        .publish("Week 1", vec![Block::paragraph("x")], Parent::Workspace)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::NoPublisher));
}

#[tokio::test]
async fn publish_validates_blocks_first() {
    let publisher = Arc::new(FakePublisher::default());
    let p = pipeline(
        PipelineConfig::default(),
        FakePdf::with_text(&[]),
        FakeOcr::new(""),
        FakeCompletion::new(""),
    )
    .with_publisher(publisher.clone());

    let page = p
        .publish(
            "Week 1",
            vec![table(2, vec![row(&["a"]), row(&["b", "c", "d"])])],
            Parent::Page("parent-id".into()),
        )
        .await
        .unwrap();
    assert_eq!(page.id, "page-1");

    let requests = publisher.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].title, "Week 1");
    assert_eq!(requests[0].parent, Parent::Page("parent-id".into()));
    assert_eq!(widths(&requests[0].blocks[0]), (2, vec![2, 2]));
}
