// Citation prompt templates.
// All prompts for the citation module are defined here.

use crate::citation::CitationRequest;

pub const CITATION_SYSTEM: &str = "\
You are a careful assistant for railway infrastructure reviews. \
You locate the passage of a regulation that supports a given requirement. \
You MUST quote the reference text verbatim; never paraphrase inside the quote, never invent a passage. \
If the reference does not contain a matching passage, return an empty quote. \
You MUST respond with valid JSON only, no markdown fences, no explanations outside the JSON.";

pub const CITATION_PROMPT: &str = r#"Find the passage in the REFERENCE DOCUMENT that states or supports the requirement below.

REQUIREMENT:
Element: {target}
Property: {property}
Required value: {standard}
Administrator note: {note}

EXAMPLE
Requirement: Element: Bahnsteig, Property: Bahnsteighöhe (m), Required value: 0.55 … 0.96
Answer:
{"quote": "Die Bahnsteighöhe soll 0,76 m über Schienenoberkante betragen", "section": "§ 13 Abs. 1", "explanation": "Sets the regular platform height; 0.76 m lies inside the configured range."}

REFERENCE DOCUMENT ({origin}):
<<<
{reference}
>>>

OUTPUT SCHEMA (return exactly this structure):
{"quote": "verbatim passage or empty string", "section": "section/paragraph label or null", "explanation": "one sentence relating the passage to the requirement, or null"}

RULES:
1. The quote must be copied character for character from the reference document.
2. Keep the quote under 400 characters; use "…" to join two verbatim fragments if needed.
3. If nothing in the reference supports the requirement, use "" as the quote.
4. Return ONLY the JSON object, nothing else, no code fences."#;

pub fn build_citation_prompt(request: &CitationRequest<'_>) -> String {
    let property = match request.unit {
        Some(unit) => format!("{} ({unit})", request.property_label),
        None => request.property_label.to_string(),
    };
    CITATION_PROMPT
        .replace("{target}", request.target_label)
        .replace("{property}", &property)
        .replace("{standard}", request.standard)
        .replace("{note}", request.note.unwrap_or("none"))
        .replace("{origin}", &request.reference.origin)
        .replace("{reference}", &request.reference.text)
}
