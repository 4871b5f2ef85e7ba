/// Stands in for the context block when retrieval found nothing.
pub const NO_CONTEXT: &str = "No relevant context was found in the indexed documents.";

/// Numbered context blocks, in ranked order, followed by the question.
pub fn build_prompt(question: &str, context: &[String]) -> String {
    let context = if context.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        context
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Context {}:\n{}", i + 1, chunk))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!(
        "Based on the following context, please answer the question.\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}
