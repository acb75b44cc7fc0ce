//! Completion prompts for note synthesis.
//!
//! Every prompt lives here so prompt changes never touch the request or
//! error-handling code in [`crate::pipeline::synthesize`]. Callers can
//! override the Markdown prompt via
//! [`crate::config::PipelineConfig::prompt_template`]; the `{input}`
//! placeholder is replaced with the trimmed extracted text.

/// Placeholder substituted with the note text.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Default prompt asking for a faithful Markdown rendering of the note.
pub const DEFAULT_MARKDOWN_PROMPT: &str = r#"You are a Markdown generator.
Ensure that you take into account what is actually present in the input: if there are no tables, do not create tables forcefully.
Stick to the input while converting.
Convert the following plain text to a rich Markdown document with:
- Proper headings
- Task lists
- Tables
- Links
- Images
- Quotes
- Footnotes
- Math formatting
- Code blocks
Use **bold** and *italic* where appropriate.

Input:
{input}

Markdown Output:
"#;

/// Prompt asking for the note directly as a JSON array of Notion blocks.
///
/// This is the only path that produces table blocks; the answer is decoded
/// by [`crate::notion::decode_blocks`] and repaired by the validator.
pub const STRUCTURED_BLOCKS_PROMPT: &str = r#"You convert plain-text notes into Notion blocks.
Answer with a single JSON array and nothing else. Each element is a Notion block object using only these types:
heading_1, heading_2, heading_3, bulleted_list_item, numbered_list_item, code, paragraph, table.
Text goes in "rich_text" as [{"type": "text", "text": {"content": "..."}}].
A table is {"type": "table", "table": {"table_width": N, "has_column_header": bool, "has_row_header": bool, "children": [{"type": "table_row", "table_row": {"cells": [[rich text], ...]}}]}}.
Only emit a table when the input really contains tabular data. Do not invent content.

Input:
{input}

JSON:
"#;

/// Substitute the note text into a template.
pub fn render(template: &str, input: &str) -> String {
    template.replace(INPUT_PLACEHOLDER, input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompts_have_placeholder() {
        assert!(DEFAULT_MARKDOWN_PROMPT.contains(INPUT_PLACEHOLDER));
        assert!(STRUCTURED_BLOCKS_PROMPT.contains(INPUT_PLACEHOLDER));
    }

    #[test]
    fn render_trims_input() {
        let prompt = render(DEFAULT_MARKDOWN_PROMPT, "\n  buy milk  \n");
        assert!(prompt.contains("Input:\nbuy milk\n"));
        assert!(!prompt.contains(INPUT_PLACEHOLDER));
    }

    #[test]
    fn markdown_prompt_forbids_invented_tables() {
        assert!(DEFAULT_MARKDOWN_PROMPT.contains("do not create tables forcefully"));
    }
}
