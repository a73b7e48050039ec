use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use halberd::collection::{Collection, CollectionConfig};
use halberd::error::{HalberdError, Result};
use halberd::index::IvfBuildConfig;
use halberd::retrieval::generator::NO_RELEVANT_INFORMATION;
use halberd::retrieval::{
    ExtractiveGenerator, FnEmbedder, HashingEmbedder, PipelineConfig, PromptGenerator,
    RetrievalPipeline, TextEmbedder, chunk_documents,
};
use halberd::search::StalenessPolicy;

const DIMENSION: usize = 256;

const DOCUMENTS: &[&str] = &[
    "Smart lighting lets users dim lights and change color temperature from a phone app.\n\n\
     Lighting schedules follow sunrise and sunset to save energy.",
    "Smart locks support fingerprint recognition, passwords and remote unlocking.",
    "The Matter protocol is a standard that lets devices from different brands work together.",
    "Smart thermostats learn household habits and adjust heating automatically.",
];

fn knowledge_pipeline(config: PipelineConfig) -> Result<RetrievalPipeline> {
    let collection = Collection::new(
        CollectionConfig::new(DIMENSION)
            .with_name("smart_home_knowledge")
            .with_index(IvfBuildConfig::default().with_nlist(2)),
    )?;
    Ok(RetrievalPipeline::with_config(Arc::new(collection), config))
}

#[test]
fn paragraphs_split_on_blank_lines() {
    assert_eq!(chunk_documents(&["A\n\nB", "C"]), vec!["A", "B", "C"]);
    assert_eq!(chunk_documents(&["A\n \t \nB\r\n\r\nC"]), vec!["A", "B", "C"]);
}

#[test]
fn ingest_documents_then_answer() -> Result<()> {
    let pipeline = knowledge_pipeline(PipelineConfig::default().with_probe_count(2))?;
    let embedder = HashingEmbedder::new(DIMENSION)?;

    let report = pipeline.ingest_documents(DOCUMENTS, &embedder)?;
    assert_eq!(report.inserted_ids, vec![0, 1, 2, 3, 4]);
    assert!(report.is_complete());
    pipeline.build_index()?;

    let answer = pipeline.answer(
        "What is the Matter protocol standard?",
        &embedder,
        &ExtractiveGenerator::default(),
    )?;
    assert_eq!(answer.context.len(), 3);
    assert!(answer.context[0].text.starts_with("The Matter protocol"));
    assert!(answer.answer.contains("The Matter protocol"));
    assert!(
        answer
            .context
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    assert!(answer.retrieval_ms >= 0.0 && answer.generation_ms >= 0.0);
    Ok(())
}

#[test]
fn failing_chunks_are_reported_and_skipped() -> Result<()> {
    let pipeline = knowledge_pipeline(PipelineConfig::default())?;
    let calls = AtomicUsize::new(0);
    let embedder = FnEmbedder::new(DIMENSION, |text: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("offline") {
            return Err(HalberdError::embedding("model offline"));
        }
        HashingEmbedder::new(DIMENSION)?.embed(text)
    });

    let chunks = ["first paragraph", "offline paragraph", "third paragraph"];
    let report = pipeline.ingest(&chunks, &embedder)?;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.inserted_ids, vec![0, 2]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert!(report.failures[0].reason.contains("model offline"));
    assert_eq!(pipeline.collection().len(), 2);

    // Reserved ids are never reused, even for failed chunks.
    let report = pipeline.ingest(&["fourth paragraph"], &embedder)?;
    assert_eq!(report.inserted_ids, vec![3]);
    Ok(())
}

#[test]
fn new_chunks_need_a_rebuild_unless_fallback_is_allowed() -> Result<()> {
    let pipeline = knowledge_pipeline(PipelineConfig::default())?;
    let embedder = HashingEmbedder::new(DIMENSION)?;
    pipeline.ingest_documents(DOCUMENTS, &embedder)?;
    pipeline.build_index()?;

    pipeline.ingest(&["Robot vacuums map rooms and avoid stairs."], &embedder)?;
    assert!(matches!(
        pipeline.retrieve("robot vacuums", &embedder, 1),
        Err(HalberdError::StaleIndex { .. })
    ));

    let fallback = RetrievalPipeline::with_config(
        Arc::clone(pipeline.collection()),
        PipelineConfig::default().with_staleness(StalenessPolicy::FallbackExhaustive),
    );
    let chunks = fallback.retrieve("robot vacuums", &embedder, 1)?;
    assert!(chunks[0].text.starts_with("Robot vacuums"));

    pipeline.build_index()?;
    let pipeline = RetrievalPipeline::with_config(
        Arc::clone(pipeline.collection()),
        PipelineConfig::default().with_probe_count(2),
    );
    let chunks = pipeline.retrieve("robot vacuums", &embedder, 1)?;
    assert!(chunks[0].text.starts_with("Robot vacuums"));
    Ok(())
}

#[test]
fn prompt_generator_receives_grounded_prompt() -> Result<()> {
    let pipeline = knowledge_pipeline(PipelineConfig::default().with_top_k(2).with_probe_count(2))?;
    let embedder = HashingEmbedder::new(DIMENSION)?;
    pipeline.ingest_documents(DOCUMENTS, &embedder)?;
    pipeline.build_index()?;

    let generator = PromptGenerator::new(|prompt: &str| {
        assert!(prompt.contains("Document 1: "));
        assert!(prompt.contains("Document 2: "));
        assert!(!prompt.contains("Document 3: "));
        assert!(prompt.contains("Question: How do smart locks unlock?"));
        Ok("generated".to_string())
    });

    let answer = pipeline.answer("How do smart locks unlock?", &embedder, &generator)?;
    assert_eq!(answer.answer, "generated");
    assert_eq!(answer.context.len(), 2);
    Ok(())
}

#[test]
fn empty_collection_answers_without_context() -> Result<()> {
    let pipeline = knowledge_pipeline(PipelineConfig::default())?;
    let embedder = HashingEmbedder::new(DIMENSION)?;

    let answer = pipeline.answer("anything at all", &embedder, &ExtractiveGenerator::default())?;
    assert!(answer.context.is_empty());
    assert_eq!(answer.answer, NO_RELEVANT_INFORMATION);
    Ok(())
}

#[test]
fn documents_loaded_from_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        "Zigbee is a low-power mesh protocol.\n\n   \nZ-Wave runs on sub-gigahertz radio.\n\nWi-Fi devices need more power.\n"
    )?;

    let text = std::fs::read_to_string(file.path())?;
    let pipeline = knowledge_pipeline(PipelineConfig::default())?;
    let embedder = HashingEmbedder::new(DIMENSION)?;

    let chunks = pipeline.chunk(&[text]);
    assert_eq!(chunks.len(), 3);
    let report = pipeline.ingest(&chunks, &embedder)?;
    assert_eq!(report.inserted(), 3);
    assert_eq!(pipeline.collection().stats().max_id, Some(2));
    Ok(())
}
