//! Prompt text for every model call.

use shaderloop_core::{EditRequest, InitialRequest, Pacing, RepairRequest, INTERFACE_CONTRACT};

pub const SYSTEM_JSON: &str = "Return JSON only. Output must be valid JSON.";

const REPLY_SHAPE: &str = "Return JSON with keys: fragment_shader, notes.\n\
notes should be a short string explaining the change.";

const STRUCTURE_RULES: &str = "Do NOT map or sample the source image UVs as the primary structure.\n\
Use procedural structure; the source image is only a loose color/texture guide.";

pub const CRITIQUE_PROMPT: &str = "Compare these two images:\n\
- IMAGE 1: TARGET (the goal)\n\
- IMAGE 2: CURRENT OUTPUT (shader render)\n\
Analyze these aspects and describe what needs to change:\n\
STRUCTURE: shape/form issues\n\
EDGES: silhouettes/edge brightness\n\
TEXTURE: grain/smoothness/density\n\
COLOR/CONTRAST: colors should match the TARGET image. Note palette and contrast differences.\n\
Provide your analysis as:\n\
SIMILARITY SCORE: <1-10, where 1 = completely different, 10 = nearly identical>\n\
BIGGEST GAP: <single most important difference to fix next>\n\
WHAT'S WORKING:\n\
- ...\n\
WHAT NEEDS TO CHANGE (ranked by priority, most important first):\n\
- ...\n";

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

fn json_or_empty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn initial(request: &InitialRequest) -> String {
    format!(
        "You are a shader generation assistant. Return JSON only.\n\
         Goal: generate an initial single-pass GLSL fragment shader that visually\n\
         matches the target image as closely as possible.\n\
         {STRUCTURE_RULES}\n\
         Do everything in one fragment shader; no extra passes or buffers.\n\
         {INTERFACE_CONTRACT}\n\
         The run has {iterations} iterations.\n\
         Score weights: {weights}\n\
         Target description: {description}\n\
         Reference summary:\n{reference}\n\
         {REPLY_SHAPE}",
        iterations = request.iteration_count,
        weights = json_or_empty(&request.weights),
        description = or_na(request.target_description.as_deref()),
        reference = or_na(request.reference_context.as_deref()),
    )
}

pub fn edit(request: &EditRequest) -> String {
    let pacing = match request.pacing {
        Pacing::Explore => "Early in the run: bold structural changes are welcome.",
        Pacing::Refine => "Late in the run: keep the structure and refine details.",
    };
    let scores = request
        .previous_scores
        .as_ref()
        .map(json_or_empty)
        .unwrap_or_else(|| "{}".to_string());

    format!(
        "You are a shader editing assistant. Return JSON only.\n\
         Goal: modify the shader to better match the target image.\n\
         {STRUCTURE_RULES}\n\
         Apply the critique, keep the interface contract unchanged.\n\
         {INTERFACE_CONTRACT}\n\
         Iteration {n} of {total}. {pacing}\n\
         Score weights: {weights}\n\
         Previous scores: {scores}\n\
         Target description: {description}\n\
         Critique:\n{critique}\n\
         Reference summary:\n{reference}\n\
         Current shader:\n{source}\n\
         {REPLY_SHAPE}",
        n = request.iteration + 1,
        total = request.iteration_count,
        weights = json_or_empty(&request.weights),
        description = or_na(request.target_description.as_deref()),
        critique = request.critique,
        reference = or_na(request.reference_context.as_deref()),
        source = request.current_source,
    )
}

pub fn repair(request: &RepairRequest) -> String {
    format!(
        "You are a shader repair assistant. Return JSON only.\n\
         Fix compile errors without changing the visual intent.\n\
         {INTERFACE_CONTRACT}\n\
         Compile error:\n{diagnostic}\n\
         {REPLY_SHAPE}",
        diagnostic = request.diagnostic,
    )
}

pub fn discovery(reference_context: Option<&str>) -> String {
    format!(
        "Describe this TARGET image so a shader author can reproduce it procedurally.\n\
         Cover overall structure, dominant shapes, edge character, texture grain,\n\
         palette and contrast, and any motion the image implies.\n\
         Finish with the three features that matter most for a close match.\n\
         Reference notes: {}",
        or_na(reference_context)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shaderloop_core::ScoreWeights;

    fn edit_request(pacing: Pacing) -> EditRequest {
        EditRequest {
            iteration: 3,
            iteration_count: 6,
            current_source: "#version 330\nvoid main() {}".to_string(),
            critique: "needs more contrast".to_string(),
            pacing,
            previous_scores: None,
            weights: ScoreWeights::default(),
            target_description: None,
            reference_context: Some("particle flow".to_string()),
        }
    }

    #[test]
    fn test_initial_prompt_carries_contract() {
        let prompt = initial(&InitialRequest {
            iteration_count: 4,
            target_description: None,
            reference_context: None,
            weights: ScoreWeights::default(),
        });
        assert!(prompt.contains("#version 330"));
        assert!(prompt.contains("Target description: N/A"));
        assert!(prompt.contains("fragment_shader"));
    }

    #[test]
    fn test_edit_prompt_includes_critique_and_pacing() {
        let early = edit(&edit_request(Pacing::Explore));
        assert!(early.contains("needs more contrast"));
        assert!(early.contains("Iteration 4 of 6"));
        assert!(early.contains("bold structural"));
        assert!(early.contains("particle flow"));
        assert!(early.contains("Previous scores: {}"));

        let late = edit(&edit_request(Pacing::Refine));
        assert!(late.contains("refine details"));
    }

    #[test]
    fn test_repair_prompt_includes_diagnostic() {
        let prompt = repair(&RepairRequest {
            iteration: 1,
            source: "x".to_string(),
            diagnostic: "0:7: 'vec5' undeclared".to_string(),
        });
        assert!(prompt.contains("'vec5' undeclared"));
    }
}
