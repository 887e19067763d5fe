//! Free-text post-filters for provider responses.

/// Extract driver code from an LLM reply: prefer a language-tagged fence,
/// then the first triple-backtick block, then the raw stripped text.
pub fn extract_code(response: &str) -> String {
    if let Some(start) = response.find("```go") {
        let body = &response[start + 5..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let body = &response[start + 3..];
        if let Some(end) = body.find("```") {
            let mut code = &body[..end];
            // Drop a bare language identifier on the first line.
            if let Some(rest) = code.strip_prefix("go\n") {
                code = rest;
            }
            return code.trim().to_string();
        }
    }

    response.trim().to_string()
}

/// Extract a JSON object from an LLM reply: fenced block first, then the
/// outermost brace span.
pub fn extract_json(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let body = &response[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let body = &response[start + 3..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return response[start..=end].to_string();
        }
    }

    response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_language_tagged_fence() {
        let response = "Here you go:\n```go\npage.MustNavigate(\"https://x.test\")\n```\nDone.";
        assert_eq!(extract_code(response), "page.MustNavigate(\"https://x.test\")");
    }

    #[test]
    fn falls_back_to_plain_fence_and_strips_language_line() {
        let response = "```\ngo\nelem.MustClick()\n```";
        assert_eq!(extract_code(response), "elem.MustClick()");

        let response = "```\nelem.MustClick()\n```";
        assert_eq!(extract_code(response), "elem.MustClick()");
    }

    #[test]
    fn unfenced_response_is_trimmed() {
        assert_eq!(extract_code("  elem.MustClick()\n"), "elem.MustClick()");
    }

    #[test]
    fn json_extraction_finds_brace_span() {
        let response = "Sure! The answer is {\"parameters\": []} as requested.";
        assert_eq!(extract_json(response), "{\"parameters\": []}");

        let response = "```json\n{\"parameters\": [1]}\n```";
        assert_eq!(extract_json(response), "{\"parameters\": [1]}");
    }
}
