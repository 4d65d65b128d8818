//! Prompt templates for thought extraction, pair scoring, and essay
//! generation (spec §4.6, §4.9, §4.11). Grounded on
//! `ai_service.py::extract_thoughts` / `_score_pairs_batch` /
//! `_make_simplified_score_prompt`.

use super::ScoringCandidate;

pub const EXTRACT_SYSTEM_MESSAGE: &str = "You are an expert at decomposing notes into independent units of thought.

Each unit of thought must satisfy:
1. A complete idea understandable on its own
2. Exactly one clear claim
3. Brief supporting context where useful
4. Length between 10 and 500 characters

Do not return the note verbatim — decompose it into meaningful units.";

pub fn extract_prompt(title: &str, content: &str) -> String {
    format!(
        "Extract 1-5 independent units of thought from the following note.\n\n\
         Title: {title}\n\n\
         Content:\n{content}\n\n\
         Respond in this JSON shape:\n\
         {{\n  \"thoughts\": [\n    {{\n      \"claim\": \"the core claim or idea (10-500 chars)\",\n      \"context\": \"optional background, max 200 chars\"\n    }}\n  ]\n}}\n\n\
         Return JSON only, no other text."
    )
}

pub const SCORE_SYSTEM_MESSAGE: &str = "You evaluate the creative-connection potential between ideas drawn from different domains.

Important context:
- The pairs you are given were deliberately chosen for LOW similarity (different topics/domains).
- Goal: filter out forced connections, keep only genuinely insightful, fresh links.

## Scoring (0-100)
- 0-40: forced or meaningless (e.g. \"coffee\" + \"quantum mechanics\" — barely any link)
- 41-64: connectable but obvious or shallow (e.g. \"exercise\" + \"health\" — trivial)
- 65-85: fresh, unexpected connection (e.g. \"game difficulty\" + \"optimal challenge in learning\" — both draw on flow theory)
- 86-100: highly creative, insightful connection (e.g. \"gardening\" + \"software refactoring\" — shared philosophy of incremental improvement)

## Principles
- Surface word similarity alone -> low score
- Only a metaphor-level connection -> mid score
- A shared underlying principle or structure -> high score
- No real connection at all -> very low score

Important: follow the JSON shape exactly. Do not put line breaks inside connection_reason.";

pub fn score_prompt(candidates: &[ScoringCandidate]) -> String {
    let pairs_text = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. thought_a_id={}, thought_b_id={}\n   - claim_a: {}\n   - claim_b: {}\n   - similarity: {:.2}",
                i + 1,
                c.thought_a_id,
                c.thought_b_id,
                c.claim_a,
                c.claim_b,
                c.similarity
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Below are pairs of ideas with low similarity (different domains). Evaluate each pair's creative-connection potential.\n\n\
         ## Candidate pairs\n{pairs_text}\n\n\
         ## Output shape (follow exactly)\n\
         {{\n  \"pair_scores\": [\n    {{\n      \"thought_a_id\": 1,\n      \"thought_b_id\": 2,\n      \"logical_expansion_score\": 75,\n      \"connection_reason\": \"specific explanation of the creative connection\"\n    }}\n  ]\n}}\n\n\
         ## Rules\n\
         - Include a result for every candidate pair\n\
         - connection_reason must be 10-300 chars, a single line (no line breaks)\n\
         - logical_expansion_score is an integer 0-100\n\
         - Do not use quotation marks inside connection_reason\n\n\
         Output JSON only, no other text."
    )
}

/// Simplified retry prompt used after a parse failure (spec §4.9 step 3
/// retry path): shorter claim previews, terser instructions.
pub fn simplified_score_prompt(candidates: &[ScoringCandidate]) -> String {
    let pairs: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| {
            serde_json::json!({
                "a_id": c.thought_a_id,
                "b_id": c.thought_b_id,
                "a": truncate(&c.claim_a, 100),
                "b": truncate(&c.claim_b, 100),
            })
        })
        .collect();

    format!(
        "Evaluate the pairs below. Output JSON only.\n\n\
         Input: {}\n\n\
         Output shape:\n\
         {{\"pair_scores\": [{{\"thought_a_id\": 1, \"thought_b_id\": 2, \"logical_expansion_score\": 75, \"connection_reason\": \"reason (one line, max 300 chars)\"}}]}}\n\n\
         Important:\n\
         - No line breaks or quotation marks inside connection_reason\n\
         - JSON only (no explanation)",
        serde_json::Value::Array(pairs)
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

pub const ESSAY_SYSTEM_MESSAGE: &str = "You write short essay-prompt briefs that connect two unrelated ideas into a single fresh writing topic.";

pub fn essay_prompt(claim_a: &str, claim_b: &str, connection_reason: &str) -> String {
    format!(
        "Two ideas have been identified as an unusually creative pair:\n\n\
         Idea A: {claim_a}\n\
         Idea B: {claim_b}\n\
         Why they connect: {connection_reason}\n\n\
         Write an essay prompt that invites the reader to explore this connection.\n\n\
         Respond in this JSON shape:\n\
         {{\n  \"title\": \"essay title (5-100 chars)\",\n  \"outline\": [\"point one\", \"point two\", \"point three\"],\n  \"reason\": \"why this pairing makes a compelling essay (max 300 chars)\"\n}}\n\n\
         Output JSON only."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prompt_embeds_title_and_content() {
        let p = extract_prompt("My Note", "Some body text");
        assert!(p.contains("My Note"));
        assert!(p.contains("Some body text"));
    }

    #[test]
    fn simplified_score_prompt_truncates_claims() {
        let candidates = vec![ScoringCandidate {
            thought_a_id: 1,
            thought_b_id: 2,
            claim_a: "x".repeat(200),
            claim_b: "short".to_string(),
            similarity: 0.1,
        }];
        let p = simplified_score_prompt(&candidates);
        assert!(!p.contains(&"x".repeat(200)));
        assert!(p.contains(&"x".repeat(100)));
    }
}
