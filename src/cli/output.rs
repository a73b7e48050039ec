//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{HalberdArgs, OutputFormat};
use crate::collection::{CollectionStats, IndexStatus};
use crate::error::Result;
use crate::retrieval::{IngestReport, RagAnswer};
use crate::search::{Predicate, SearchPath, SearchResults};
use crate::vector::{AttributeValue, Attributes};

/// Result of the `demo-search` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct DemoSearchReport {
    pub collection: CollectionStats,
    pub build_ms: f64,
    pub search: SearchResults,
    pub filter: Predicate,
    pub filtered: SearchResults,
    pub query_filter: Predicate,
    pub query_results: Vec<QueryRow>,
}

/// One row of an attribute-only query.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRow {
    pub id: u64,
    pub attributes: Attributes,
}

/// Result of the `rag` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct RagReport {
    pub chunks: usize,
    pub ingest: IngestReport,
    pub answers: Vec<RagAnswer>,
}

/// Types that know how to print themselves for humans.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &HalberdArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &HalberdArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

impl HumanOutput for CollectionStats {
    fn print_human(&self) {
        println!("Collection Statistics:");
        println!("══════════════════════");
        println!("Name: {}", self.name);
        println!("Dimension: {}", self.dimension);
        println!("Metric: {}", self.metric);
        println!("Live records: {}", self.live_records);
        println!("Deleted records: {}", self.deleted_records);
        println!(
            "Max id: {}",
            self.max_id.map_or_else(|| "-".to_string(), |id| id.to_string())
        );
        println!("Generation: {}", self.generation);
        println!("Index: {}", format_index_status(&self.index));
    }
}

impl HumanOutput for DemoSearchReport {
    fn print_human(&self) {
        println!(
            "Collection '{}': {} records, index {} (built in {:.1}ms)",
            self.collection.name,
            self.collection.live_records,
            format_index_status(&self.collection.index),
            self.build_ms
        );

        println!();
        println!("Search Results:");
        println!("═══════════════");
        print_hits(&self.search);

        println!();
        println!("Filtered Search Results ({}):", format_predicate(&self.filter));
        println!("═══════════════════════════");
        print_hits(&self.filtered);

        println!();
        println!("Query Results ({}):", format_predicate(&self.query_filter));
        println!("══════════════");
        for row in &self.query_results {
            println!("ID: {}, {}", row.id, format_attributes(&row.attributes));
        }
    }
}

impl HumanOutput for RagReport {
    fn print_human(&self) {
        println!(
            "Inserted {} of {} chunks",
            self.ingest.inserted(),
            self.chunks
        );
        for failure in &self.ingest.failures {
            println!("  chunk {} skipped: {}", failure.index, failure.reason);
        }

        for answer in &self.answers {
            println!();
            println!("Question: {}", answer.query);
            println!("─────────");
            println!(
                "Retrieved {} chunks ({:.2}ms)",
                answer.context.len(),
                answer.retrieval_ms
            );
            for (i, chunk) in answer.context.iter().enumerate() {
                println!(
                    "Document {} (similarity: {:.4}): {}",
                    i + 1,
                    chunk.score,
                    preview(&chunk.text, 100)
                );
            }
            println!();
            println!("Answer ({:.2}ms):", answer.generation_ms);
            println!("{}", answer.answer);
        }
    }
}

fn print_hits(results: &SearchResults) {
    for hit in &results.hits {
        println!(
            "ID: {}, distance: {:.4}, {}",
            hit.id,
            hit.distance,
            format_attributes(&hit.attributes)
        );
    }
    let path = match results.path {
        SearchPath::Exhaustive => "exhaustive".to_string(),
        SearchPath::Index { probed, stale } => {
            format!("index, {probed} probed{}", if stale { ", stale" } else { "" })
        }
    };
    println!(
        "({} hits, {} candidates, {path}, {:.2}ms)",
        results.len(),
        results.candidates_examined,
        results.search_time_ms
    );
}

fn format_index_status(status: &IndexStatus) -> String {
    match status {
        IndexStatus::Missing => "missing".to_string(),
        IndexStatus::Fresh { nlist, .. } => format!("fresh ({nlist} clusters)"),
        IndexStatus::Stale { nlist, built, current } => format!(
            "stale ({nlist} clusters, built at generation {}, now {})",
            built.generation, current.generation
        ),
    }
}

fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!("{name}: {}", format_attribute_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_attribute_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Integer(i) => i.to_string(),
        AttributeValue::Float(f) => format!("{f:.2}"),
        AttributeValue::Text(s) => s.clone(),
    }
}

fn format_predicate(predicate: &Predicate) -> String {
    serde_json::to_string(predicate).unwrap_or_else(|_| "<filter>".to_string())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::StoreFingerprint;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("智能家居系统", 4), "智能家居...");
    }

    #[test]
    fn test_format_attributes() {
        let mut attributes = Attributes::new();
        attributes.insert("score".to_string(), AttributeValue::Float(71.256));
        attributes.insert("text".to_string(), AttributeValue::from("doc 3"));
        assert_eq!(format_attributes(&attributes), "score: 71.26, text: doc 3");
    }

    #[test]
    fn test_format_index_status() {
        let built = StoreFingerprint {
            record_count: 3,
            max_id: Some(2),
            generation: 3,
        };
        let current = StoreFingerprint {
            generation: 4,
            ..built
        };
        assert_eq!(format_index_status(&IndexStatus::Missing), "missing");
        assert_eq!(
            format_index_status(&IndexStatus::Fresh { built, nlist: 2 }),
            "fresh (2 clusters)"
        );
        assert_eq!(
            format_index_status(&IndexStatus::Stale { built, current, nlist: 2 }),
            "stale (2 clusters, built at generation 3, now 4)"
        );
    }
}
