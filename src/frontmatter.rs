//! YAML frontmatter tag extraction.
//!
//! Only the `tags` key matters to the exclusion rules. It may be a YAML list
//! or a single string of comma- or space-separated tags; a leading `#` on
//! any tag is stripped.

use serde_yaml::Value;

/// Return the raw YAML between the opening and closing `---` delimiters.
fn frontmatter_block(input: &str) -> Option<String> {
    let mut lines = input.lines();

    let first = lines.next()?.trim_start_matches('\u{feff}').trim_end();
    if first != "---" {
        return None;
    }

    let mut yaml_lines: Vec<&str> = Vec::new();
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some(yaml_lines.join("\n"));
        }
        yaml_lines.push(line);
    }
    None
}

/// Extract the frontmatter tags of a Markdown document.
pub fn extract_tags(input: &str) -> Vec<String> {
    let Some(block) = frontmatter_block(input) else {
        return Vec::new();
    };
    let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(&block) else {
        return Vec::new();
    };

    let raw: Vec<String> = match map.get(Value::String("tags".to_string())) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.to_string())
            .collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
