//! Answer generation trait and system-instruction construction.

use async_trait::async_trait;

use crate::error::Result;

/// Opening sentinel around retrieved context in the system instruction.
pub const CONTEXT_START: &str = "--- RETRIEVED CONTEXT ---";
/// Closing sentinel around retrieved context in the system instruction.
pub const CONTEXT_END: &str = "--- END CONTEXT ---";

/// A generative model that answers one user message.
///
/// The retrieved context travels in the system instruction, never in the
/// user turn. Implementations fail with
/// [`RagError::GenerationUnavailable`](crate::RagError::GenerationUnavailable)
/// when the model cannot be reached and with
/// [`RagError::EmptyGenerationResult`](crate::RagError::EmptyGenerationResult)
/// when it answers with no text.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Answer `user_message`, grounded in `context` when it is non-empty.
    async fn generate(&self, user_message: &str, context: &str) -> Result<String>;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "generation"
    }
}

/// Build the system instruction for a given context.
///
/// An empty context selects a plain assistant prompt; otherwise the prompt
/// frames the context as a knowledge base and fences it with
/// [`CONTEXT_START`] / [`CONTEXT_END`].
pub fn build_system_instruction(context: &str) -> String {
    if context.is_empty() {
        return [
            "You are a helpful AI assistant.",
            "Answer the user's question to the best of your ability.",
            "If you don't know the answer, say \"I don't know.\"",
        ]
        .join("\n");
    }

    [
        "You are a helpful AI assistant with access to a knowledge base.",
        "Use the following retrieved context to answer the user's question.",
        "If the context does not contain relevant information, say so and answer based on your general knowledge.",
        "Always cite which part of the context you used when applicable.",
        "",
        CONTEXT_START,
        context,
        CONTEXT_END,
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt_has_no_knowledge_base_framing() {
        let prompt = build_system_instruction("");
        assert!(prompt.contains("I don't know."));
        assert!(!prompt.contains("knowledge base"));
        assert!(!prompt.contains(CONTEXT_START));
    }

    #[test]
    fn context_is_fenced_by_sentinels() {
        let prompt = build_system_instruction("[Document 1] (similarity: 0.900)\nfact");
        let start = prompt.find(CONTEXT_START).unwrap();
        let body = prompt.find("fact").unwrap();
        let end = prompt.find(CONTEXT_END).unwrap();
        assert!(start < body && body < end);
        assert!(prompt.ends_with(CONTEXT_END));
    }

    #[test]
    fn grounded_prompt_asks_for_citations_and_fallback() {
        let prompt = build_system_instruction("something");
        assert!(prompt.contains("knowledge base"));
        assert!(prompt.contains("general knowledge"));
        assert!(prompt.contains("cite"));
    }
}
