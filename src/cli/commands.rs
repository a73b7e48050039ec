//! Command implementations for the Halberd CLI.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::collection::{Collection, CollectionConfig};
use crate::error::{HalberdError, Result};
use crate::index::IvfBuildConfig;
use crate::retrieval::{ExtractiveGenerator, HashingEmbedder, PipelineConfig, RetrievalPipeline};
use crate::search::{Predicate, SearchRequest};
use crate::vector::{DistanceMetric, Record};

/// Paragraphs ingested by `rag` when no document file is given.
const SAMPLE_DOCUMENTS: &[&str] = &[
    "A smart home system uses sensors, controllers and connected devices to automate and manage the home environment.
    Smart homes improve quality of life, save energy, increase safety and add convenience for residents.
    Modern smart home systems usually include lighting control, temperature regulation, security monitoring, entertainment and appliance control.",
    "Smart lighting lets users control the lights at home from a phone app, by voice command or through automation scenes.
    Users can adjust brightness and color temperature, or even change the light color to create different moods.
    Smart lighting can also adjust itself to the time of day, daylight or occupancy, which saves energy.",
    "Smart security is an important part of the smart home and includes smart locks, surveillance cameras, door and window sensors and motion detectors.
    These devices monitor home safety in real time and notify the user immediately when something unusual is detected.
    Smart locks support fingerprint recognition, passwords, NFC cards and remote unlocking.",
    "Smart climate control uses smart thermostats to manage heating, air conditioning and ventilation and keep indoor temperature comfortable.
    These systems learn user habits and adjust temperature settings automatically to maximize comfort and energy efficiency.
    Studies show that smart thermostats save 10-15% of energy consumption on average.",
    "Voice control is a core feature of modern smart homes, provided by smart speakers or voice assistants.
    Users can control lights, temperature, music, TV and other smart devices with simple voice commands.
    Popular voice assistants include Alexa and Google Assistant, and they understand natural language commands.",
    "Interoperability between devices is one of the main challenges of the smart home industry.
    Compatibility problems between brands and systems can lead to a poor user experience.
    The Matter protocol is a new smart home standard designed to solve interoperability so devices from different brands work together.
    Other common smart home protocols include Zigbee, Z-Wave, Wi-Fi and Bluetooth.",
    "Privacy and security of smart home systems receive growing attention.
    Connected devices may have vulnerabilities that leak personal data or let attackers take control of them.
    Users should update device firmware regularly, use strong passwords and understand what data their devices collect.",
];

/// Questions answered by `rag` when none are given.
const SAMPLE_QUERIES: &[&str] = &[
    "What are the main features of a smart home system?",
    "How does smart lighting save energy?",
    "What are the security problems of smart homes?",
    "What is the Matter protocol?",
    "How can I control smart home devices by voice?",
];

/// Execute a CLI command.
pub fn execute_command(args: HalberdArgs) -> Result<()> {
    match &args.command {
        Command::DemoSearch(demo_args) => demo_search(demo_args, &args),
        Command::Rag(rag_args) => run_rag(rag_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

/// Fill a collection with random records and run the three kinds of search.
fn demo_search(args: &DemoSearchArgs, cli_args: &HalberdArgs) -> Result<()> {
    let filter = parse_filter(args.filter.as_deref(), Predicate::gt("score", 50.0))?;
    let query_filter = parse_filter(args.query_filter.as_deref(), Predicate::gt("score", 70.0))?;

    let config = CollectionConfig::new(args.dimension)
        .with_name("example_collection")
        .with_metric(args.metric)
        .with_index(IvfBuildConfig::default().with_nlist(args.nlist));
    let collection = Collection::new(config)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let inserted = collection.insert_batch(random_records(&mut rng, args.records, args.dimension, args.metric))?;
    info!("Inserted {inserted} random records");

    let start = Instant::now();
    collection.build_index()?;
    let build_ms = start.elapsed().as_secs_f64() * 1000.0;

    let query_vector = random_vector(&mut rng, args.dimension, args.metric);
    let request = SearchRequest::new(query_vector, args.limit).with_probe_count(args.probe_count);
    let search = collection.search(&request)?;
    let filtered = collection.search(&request.clone().with_filter(filter.clone()))?;

    let query_results = collection
        .query(&query_filter, args.limit)
        .iter()
        .map(|record| QueryRow {
            id: record.id,
            attributes: record.attributes.clone(),
        })
        .collect();

    output_result(
        "Search demo completed",
        &DemoSearchReport {
            collection: collection.stats(),
            build_ms,
            search,
            filter,
            filtered,
            query_filter,
            query_results,
        },
        cli_args,
    )
}

/// Ingest documents and answer questions from them.
fn run_rag(args: &RagArgs, cli_args: &HalberdArgs) -> Result<()> {
    let documents: Vec<String> = match &args.documents {
        Some(path) => {
            if cli_args.verbosity() > 1 {
                println!("Loading documents from: {}", path.display());
            }
            vec![fs::read_to_string(path)?]
        }
        None => SAMPLE_DOCUMENTS.iter().map(|doc| doc.to_string()).collect(),
    };
    let queries: Vec<String> = if args.queries.is_empty() {
        SAMPLE_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        args.queries.clone()
    };

    let config = CollectionConfig::new(args.dimension)
        .with_name("knowledge")
        .with_metric(DistanceMetric::Cosine)
        .with_index(IvfBuildConfig::default().with_nlist(args.nlist));
    let pipeline = RetrievalPipeline::with_config(
        Arc::new(Collection::new(config)?),
        PipelineConfig::default()
            .with_top_k(args.top_k)
            .with_probe_count(args.probe_count),
    );
    let embedder = HashingEmbedder::new(args.dimension)?;
    let generator = ExtractiveGenerator::default();

    let chunks = pipeline.chunk(&documents);
    let ingest = pipeline.ingest(&chunks, &embedder)?;
    pipeline.build_index()?;

    let answers = queries
        .iter()
        .map(|query| pipeline.answer(query, &embedder, &generator))
        .collect::<Result<Vec<_>>>()?;

    output_result(
        "Retrieval completed",
        &RagReport {
            chunks: chunks.len(),
            ingest,
            answers,
        },
        cli_args,
    )
}

/// Build a collection from a config file and show its statistics.
fn show_stats(args: &StatsArgs, cli_args: &HalberdArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Loading configuration from: {}", args.config.display());
    }
    let config = CollectionConfig::from_json_file(&args.config)?;
    let collection = Collection::new(config)?;

    if args.random_records > 0 {
        let mut rng = StdRng::seed_from_u64(args.seed);
        collection.insert_batch(random_records(
            &mut rng,
            args.random_records,
            collection.dimension(),
            collection.metric(),
        ))?;
        collection.build_index()?;
    }

    output_result("Collection statistics", &collection.stats(), cli_args)
}

fn parse_filter(json: Option<&str>, default: Predicate) -> Result<Predicate> {
    match json {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| HalberdError::invalid_argument(format!("Invalid filter: {e}"))),
        None => Ok(default),
    }
}

fn random_records(rng: &mut StdRng, count: usize, dimension: usize, metric: DistanceMetric) -> Vec<Record> {
    (0..count as u64)
        .map(|id| {
            let vector = random_vector(rng, dimension, metric);
            let score: f64 = rng.random_range(0.0..100.0);
            Record::new(id, vector)
                .with_attribute("text", format!("document {id}"))
                .with_attribute("score", score)
        })
        .collect()
}

/// Uniform vector in `[0, 1)`. Never all zeros under cosine.
fn random_vector(rng: &mut StdRng, dimension: usize, metric: DistanceMetric) -> Vec<f32> {
    loop {
        let vector: Vec<f32> = (0..dimension).map(|_| rng.random::<f32>()).collect();
        if metric.validate(&vector).is_ok() {
            return vector;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::chunk_documents;

    #[test]
    fn test_parse_filter() {
        let default = Predicate::gt("score", 50.0);
        assert_eq!(parse_filter(None, default.clone()).unwrap(), default);
        assert_eq!(
            parse_filter(
                Some(r#"{"compare": {"field": "score", "op": "lte", "value": 3}}"#),
                default.clone()
            )
            .unwrap(),
            Predicate::lte("score", 3)
        );
        assert!(matches!(
            parse_filter(Some("score > 50"), default),
            Err(HalberdError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_random_records_are_seeded() {
        let a = random_records(&mut StdRng::seed_from_u64(7), 3, 4, DistanceMetric::Euclidean);
        let b = random_records(&mut StdRng::seed_from_u64(7), 3, 4, DistanceMetric::Euclidean);
        assert_eq!(a, b);
        assert_eq!(a[2].id, 2);
        let score = a[0].attribute("score").and_then(|v| v.as_f64()).unwrap();
        assert!((0.0..100.0).contains(&score));
    }

    #[test]
    fn test_sample_corpus_is_one_chunk_per_document() {
        assert_eq!(chunk_documents(SAMPLE_DOCUMENTS).len(), SAMPLE_DOCUMENTS.len());
    }
}
