//! Answer generation collaborators.

use std::fmt;

use crate::error::Result;
use crate::retrieval::pipeline::RetrievedChunk;

/// Reply given when retrieval found nothing to ground an answer on.
pub const NO_RELEVANT_INFORMATION: &str =
    "Sorry, I could not find any relevant information to answer your question.";

/// Produces an answer to a query from retrieved context.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, query: &str, context: &[RetrievedChunk]) -> Result<String>;
}

/// Render the grounded prompt handed to a language model.
///
/// ```
/// use halberd::retrieval::generator::build_prompt;
/// use halberd::retrieval::RetrievedChunk;
///
/// let context = vec![RetrievedChunk { id: 0, text: "Matter is a standard.".into(), score: 0.9 }];
/// let prompt = build_prompt("What is Matter?", &context);
/// assert!(prompt.contains("Document 1: Matter is a standard."));
/// assert!(prompt.ends_with("Question: What is Matter?\n\nAnswer:"));
/// ```
pub fn build_prompt(query: &str, context: &[RetrievedChunk]) -> String {
    let documents = context
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Document {}: {}", i + 1, chunk.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Answer the user's question based on the documents below.\n\
         If the documents do not contain the relevant information, say honestly that you don't know.\n\
         \n\
         Documents:\n\
         {documents}\n\
         \n\
         Question: {query}\n\
         \n\
         Answer:"
    )
}

/// Answers by quoting the best-ranked context chunks.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_chunks: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_chunks: 2 }
    }
}

impl ExtractiveGenerator {
    pub fn new(max_chunks: usize) -> Self {
        Self {
            max_chunks: max_chunks.max(1),
        }
    }
}

impl AnswerGenerator for ExtractiveGenerator {
    fn generate(&self, _query: &str, context: &[RetrievedChunk]) -> Result<String> {
        if context.is_empty() {
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        let mut answer = String::from("Based on the retrieved information: ");
        for (i, chunk) in context.iter().take(self.max_chunks).enumerate() {
            if i > 0 {
                answer.push_str(" In addition: ");
            }
            answer.push_str(&chunk.text);
        }
        Ok(answer)
    }
}

/// Sends the rendered [`build_prompt`] text to a closure, typically a
/// language model client.
pub struct PromptGenerator<F> {
    complete: F,
}

impl<F> PromptGenerator<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    pub fn new(complete: F) -> Self {
        Self { complete }
    }
}

impl<F> fmt::Debug for PromptGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptGenerator").finish_non_exhaustive()
    }
}

impl<F> AnswerGenerator for PromptGenerator<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, query: &str, context: &[RetrievedChunk]) -> Result<String> {
        if context.is_empty() {
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }
        (self.complete)(&build_prompt(query, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HalberdError;

    fn chunk(id: u64, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id,
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_prompt_lists_documents_in_rank_order() {
        let prompt = build_prompt("q?", &[chunk(7, "first"), chunk(2, "second")]);
        let first = prompt.find("Document 1: first").unwrap();
        let second = prompt.find("Document 2: second").unwrap();
        assert!(first < second);
        assert!(prompt.contains("say honestly that you don't know"));
    }

    #[test]
    fn test_extractive_generator() {
        let generator = ExtractiveGenerator::default();
        assert_eq!(generator.generate("q", &[]).unwrap(), NO_RELEVANT_INFORMATION);

        let answer = generator
            .generate("q", &[chunk(1, "One."), chunk(2, "Two."), chunk(3, "Three.")])
            .unwrap();
        assert_eq!(answer, "Based on the retrieved information: One. In addition: Two.");
    }

    #[test]
    fn test_prompt_generator_propagates_errors() {
        let generator = PromptGenerator::new(|prompt: &str| {
            if prompt.contains("fail") {
                Err(HalberdError::generation("model unavailable"))
            } else {
                Ok(prompt.lines().count().to_string())
            }
        });
        assert!(generator.generate("q", &[chunk(1, "ok")]).is_ok());
        assert!(matches!(
            generator.generate("fail", &[chunk(1, "ok")]),
            Err(HalberdError::Generation(_))
        ));
    }
}
