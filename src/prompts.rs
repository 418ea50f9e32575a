//! Prompts for VLM-based slide review.
//!
//! Every prompt lives here so changing review behaviour means editing one
//! place, and unit tests can inspect prompts without a live model.
//! Callers can override both via [`crate::config::ReviewConfig`].

/// Default system prompt framing the reviewer.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert business consultant. \
Check the slides for unprofessional format, logic, and typos.";

/// Default review instructions sent with the slide images.
///
/// The key names and the `issue_type` / `severity` vocabulary must stay in
/// sync with [`crate::pipeline::reconcile`] and [`crate::issue`].
pub const DEFAULT_REVIEW_PROMPT: &str = "Please review the following slides for unprofessional formatting, logic and typos. \
No need to mention what is good. Only pick up obvious issues and give suggestions for improvement. \
Return the result as a JSON array, each item with keys: 'page', 'issue_type', 'severity', 'description', 'suggestion'. \
'issue_type' should be one of: format, logic, typo. 'severity' should be one of: high, medium, low. \
Please use the slide language as output.";

/// Build the user-turn text: the review instructions followed by the page
/// numbers of the attached images, in order, so the model can fill `page`
/// with real page numbers instead of counting from 1.
pub fn review_message(instructions: &str, pages: &[u32]) -> String {
    let list = pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if pages.len() == 1 { "page" } else { "pages" };
    format!(
        "{instructions}\n\nThe attached images are, in order, {noun} {list} of the deck. \
Use these page numbers for 'page'. Return only the JSON array; return [] if there are no issues."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_names_every_key() {
        for key in ["page", "issue_type", "severity", "description", "suggestion"] {
            assert!(
                DEFAULT_REVIEW_PROMPT.contains(&format!("'{key}'")),
                "prompt missing key {key}"
            );
        }
    }

    #[test]
    fn default_prompt_names_vocabulary() {
        for word in ["format, logic, typo", "high, medium, low"] {
            assert!(DEFAULT_REVIEW_PROMPT.contains(word));
        }
    }

    #[test]
    fn review_message_lists_pages_in_order() {
        let msg = review_message("Review.", &[7, 8]);
        assert!(msg.starts_with("Review."));
        assert!(msg.contains("pages 7, 8"));
    }

    #[test]
    fn review_message_singular_page() {
        let msg = review_message("Review.", &[3]);
        assert!(msg.contains("page 3 of the deck"));
    }
}
