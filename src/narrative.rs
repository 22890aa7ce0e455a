use crate::{
    labs::LabValueMap,
    llm::{LlmClient, LlmError, Sampling},
    prompt::build_prompt,
};
use tracing::debug;

/// Builds the prompt, makes one chat call, returns the trimmed reply.
pub fn generate_summary(
    llm: &dyn LlmClient,
    sampling: &Sampling,
    raw_text: &str,
    labs: &LabValueMap,
) -> Result<String, LlmError> {
    let prompt = build_prompt(raw_text, labs);
    debug!(
        "summary prompt chars={} lab_values={} temperature={} max_tokens={}",
        prompt.len(),
        labs.len(),
        sampling.temperature,
        sampling.max_tokens
    );
    let reply = llm.complete(&prompt, sampling)?;
    Ok(reply.trim().to_string())
}
