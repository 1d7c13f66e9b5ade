/// Instruction sent alongside every chunk of normalized text.
#[must_use]
pub fn build_extraction_prompt(filename: &str, chunk_index: usize, chunk_count: usize) -> String {
    let source = if filename.trim().is_empty() {
        "an uploaded document".to_string()
    } else {
        format!("the document \"{}\"", filename.trim())
    };
    let part = if chunk_count > 1 {
        format!(" This is part {} of {chunk_count}.", chunk_index + 1)
    } else {
        String::new()
    };

    format!(
        r#"Extract entities and relationships from {source}.{part}

INSTRUCTIONS:
1. Identify people, organizations, places, events, and important concepts
2. Record facts about each entity as string attributes (for example age, role, location, event)
3. Quote a short passage from the text as evidence for each entity and relationship
4. Output ONLY valid JSON, nothing else

SCHEMA:
{{
  "entities": [
    {{"name": "Full Name", "type": "PERSON|ORG|PLACE|EVENT|CONCEPT", "attributes": {{"key": "value"}}, "evidence": "quote from text"}}
  ],
  "relationships": [
    {{"source": "Entity A", "target": "Entity B", "relationship": "works_at", "evidence": "quote from text"}}
  ],
  "summary": "one or two sentences describing the document"
}}

RULES:
- Use the most complete form of each name that appears in the text
- Relationship labels are short snake_case verbs such as works_at, friend_of, member_of
- Use "mentioned_together" only when the text gives no specific relationship
- Put a place of residence or operation in the "location" attribute
- Put a shared occasion the entity took part in in the "event" attribute
- Do not invent facts that are not in the text
- Output ONLY the JSON object, no markdown, no explanations"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_the_document() {
        let prompt = build_extraction_prompt("notes.txt", 0, 1);
        assert!(prompt.contains("\"notes.txt\""));
        assert!(!prompt.contains("part 1"));
        assert!(prompt.contains("\"entities\""));
    }

    #[test]
    fn test_prompt_mentions_chunk_position() {
        let prompt = build_extraction_prompt("", 1, 3);
        assert!(prompt.contains("an uploaded document"));
        assert!(prompt.contains("This is part 2 of 3."));
    }
}
