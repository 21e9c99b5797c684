//! Prompt assembly.
//!
//! Pure text layout, no I/O. The exact byte layout matters: it is what the
//! generation backend conditions on, and changing it changes answers.

use crate::models::Message;

/// Assemble conversation history, retrieved context, and the new query into
/// a single generation-ready prompt.
///
/// Layout:
/// 1. each history message as `"<role>: <content>\n"`, in order;
/// 2. if `context` is non-empty: a blank line, then
///    `"Relevant information:\n<context>\n\n"`;
/// 3. `"User: <query>\nAssistant: "`.
///
/// Token-budget enforcement belongs to the generator; nothing is truncated
/// here.
pub fn format_prompt(query: &str, context: &str, history: &[Message]) -> String {
    let mut prompt = String::new();

    for message in history {
        prompt.push_str(&format!("{}: {}\n", message.role, message.content));
    }

    if !context.is_empty() {
        prompt.push_str(&format!("\nRelevant information:\n{}\n\n", context));
    }

    prompt.push_str(&format!("User: {}\nAssistant: ", query));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_only() {
        let prompt = format_prompt("What is RAG?", "", &[]);
        assert_eq!(prompt, "User: What is RAG?\nAssistant: ");
    }

    #[test]
    fn test_context_block_layout() {
        let prompt = format_prompt("What is RAG?", "RAG retrieves context.", &[]);
        assert_eq!(
            prompt,
            "\nRelevant information:\nRAG retrieves context.\n\nUser: What is RAG?\nAssistant: "
        );
    }

    #[test]
    fn test_history_precedes_context() {
        let history = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help?"),
        ];
        let prompt = format_prompt("What is RAG?", "Some context.", &history);
        assert_eq!(
            prompt,
            "user: Hi\nassistant: Hello! How can I help?\n\
             \nRelevant information:\nSome context.\n\n\
             User: What is RAG?\nAssistant: "
        );
    }

    #[test]
    fn test_deterministic() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let first = format_prompt("q", "ctx", &history);
        let second = format_prompt("q", "ctx", &history);
        assert_eq!(first, second);
    }
}
