use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
#[error("unparseable llm reply: {detail}")]
pub struct ParseError {
    pub detail: String,
}

/// Parses a JSON-shaped LLM reply with layered resilience. Models are asked
/// for bare JSON but routinely wrap it in markdown fences, smart quotes or
/// prose; each layer strips one class of noise:
///
/// 1. direct parse of the trimmed reply;
/// 2. markdown fences and smart quotes stripped, then parse;
/// 3. the text trimmed to its outermost `{`..`}` span, then parse.
///
/// Shared by every component that requests structured replies, so the
/// string surgery lives in exactly one place.
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let repaired = strip_fences_and_smart_quotes(trimmed);
    if let Ok(value) = serde_json::from_str(&repaired) {
        return Ok(value);
    }

    if let Some(braced) = outermost_braced(&repaired) {
        match serde_json::from_str(braced) {
            Ok(value) => return Ok(value),
            Err(e) => {
                return Err(ParseError {
                    detail: e.to_string(),
                });
            }
        }
    }

    Err(ParseError {
        detail: "no JSON object found".to_string(),
    })
}

fn strip_fences_and_smart_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for line in s.lines() {
        let t = line.trim();
        if t == "```" || t == "```json" {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn outermost_braced(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Reply {
        question: String,
    }

    #[test]
    fn parses_clean_json() {
        let reply: Reply = parse_llm_json(r#"{"question": "Reverse a list."}"#).unwrap();
        assert_eq!(reply.question, "Reverse a list.");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"question\": \"Find the cycle.\"}\n```";
        let reply: Reply = parse_llm_json(raw).unwrap();
        assert_eq!(reply.question, "Find the cycle.");
    }

    #[test]
    fn parses_json_with_smart_quotes() {
        let raw = "\u{201c}question\u{201d}: \u{201c}BFS vs DFS?\u{201d}";
        let wrapped = format!("{{{raw}}}");
        let reply: Reply = parse_llm_json(&wrapped).unwrap();
        assert_eq!(reply.question, "BFS vs DFS?");
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Sure! Here is the question:\n{\"question\": \"Two sum.\"}\nGood luck!";
        let reply: Reply = parse_llm_json(raw).unwrap();
        assert_eq!(reply.question, "Two sum.");
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_llm_json::<Reply>("I refuse to answer in JSON.").is_err());
    }

    #[test]
    fn rejects_json_missing_required_field() {
        assert!(parse_llm_json::<Reply>(r#"{"other": 1}"#).is_err());
    }
}
