//! Prompts for enhancement requests.
//!
//! The system prompt is fixed so that backends can cache it; everything
//! iteration-specific goes into the user message.

use promptwright_core::{PromptContent, QualityMetrics, ScoreCard};

use super::session::EnhancementTarget;
use super::LoopConfig;
use crate::invocation::InvocationRequest;
use crate::providers::ChatMessage;

/// System prompt shared by every enhancement request.
pub const ENHANCEMENT_SYSTEM_PROMPT: &str = r#"
You are a prompt engineer improving a structured prompt for a generative language model.

The prompt is a JSON object with these fields:
- role: the persona the model should adopt (include expertise and seniority)
- directive: the task instruction (start with an action verb, be specific)
- framework: a named prompting framework such as CO-STAR or RISEN
- guardrails: a list of constraints the response must respect
- context: background material and worked examples (Input:/Output: pairs)
- metadata: string annotations; keep them unchanged

## Rules
1. Preserve the user's intent. Never change what the task is about.
2. Focus on the unmet targets first, largest gap first.
3. Keep every field that is already good.
4. Do not invent facts about the user's domain.

## Output Format (JSON only, no prose)
{
  "content": {
    "role": "string",
    "directive": "string",
    "framework": "string",
    "guardrails": ["string"],
    "context": "string",
    "metadata": {}
  },
  "rationale": "one or two sentences on what you changed"
}
"#;

/// Appended to the system prompt after an unusable reply.
pub const STRICT_FORMAT_REMINDER: &str = r#"
## Format Reminder
Your reply must be a single JSON object matching the Output Format above.
Do not wrap it in prose. The "directive" field is required and must not be empty.
"#;

/// Build the request for one enhancement iteration.
pub fn enhancement_request(
    current: &PromptContent,
    card: &ScoreCard,
    targets: &[EnhancementTarget],
    iteration: u32,
    max_iterations: u32,
    config: &LoopConfig,
) -> InvocationRequest {
    let messages = vec![
        ChatMessage::system(ENHANCEMENT_SYSTEM_PROMPT.trim()),
        ChatMessage::user(enhancement_message(
            current,
            card,
            targets,
            iteration,
            max_iterations,
        )),
    ];
    configured_request(messages, config)
}

/// Re-ask after a reply that could not be parsed.
///
/// Keeps the original exchange, adds the bad reply and names the problem.
pub fn strict_retry_request(
    previous: &InvocationRequest,
    reply: &str,
    problem: &str,
    config: &LoopConfig,
) -> InvocationRequest {
    let system = format!(
        "{}\n{}",
        ENHANCEMENT_SYSTEM_PROMPT.trim(),
        STRICT_FORMAT_REMINDER.trim_end()
    );

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(previous.conversation().cloned());
    messages.push(ChatMessage::assistant(reply));
    messages.push(ChatMessage::user(format!(
        "Your previous reply could not be used: {problem}\n\
         Reply again with only the JSON object."
    )));

    configured_request(messages, config)
}

fn configured_request(messages: Vec<ChatMessage>, config: &LoopConfig) -> InvocationRequest {
    let request = InvocationRequest::new(messages)
        .with_capabilities(config.required_capabilities.iter().copied())
        .with_priority(config.priority)
        .with_temperature(config.temperature)
        .with_max_output_tokens(config.max_output_tokens);

    match &config.model {
        Some(model) => request.with_model(model.clone()),
        None => request,
    }
}

fn enhancement_message(
    current: &PromptContent,
    card: &ScoreCard,
    targets: &[EnhancementTarget],
    iteration: u32,
    max_iterations: u32,
) -> String {
    let content_json =
        serde_json::to_string_pretty(current).unwrap_or_else(|_| current.render());

    let mut message = format!(
        "## Iteration\n{iteration} of {max_iterations}\n\n\
         ## Current Prompt\n```json\n{content_json}\n```\n\n\
         ## Current Scores (1.0 - 5.0)\n{}\n",
        scores_section(&card.metrics)
    );

    let unmet: Vec<String> = targets
        .iter()
        .filter(|t| !t.is_met(&card.metrics))
        .map(|t| {
            format!(
                "- {} ({:?} priority): {:.2} -> {:.2} (needs +{:.2})",
                t.dimension,
                t.priority,
                card.metrics.get(t.dimension),
                t.target_score,
                t.gap(&card.metrics)
            )
        })
        .collect();

    message.push_str("\n## Unmet Targets\n");
    if unmet.is_empty() {
        message.push_str(&format!(
            "- none set; raise the weakest dimension ({})\n",
            card.metrics.weakest_dimension()
        ));
    } else {
        message.push_str(&unmet.join("\n"));
        message.push('\n');
    }

    message.push_str("\n## Already Credited\n");
    for dimension in &card.dimensions {
        let bonuses = if dimension.bonuses.is_empty() {
            "nothing yet".to_string()
        } else {
            dimension.bonuses.join(", ")
        };
        message.push_str(&format!("- {}: {}\n", dimension.dimension, bonuses));
    }

    message
}

fn scores_section(metrics: &QualityMetrics) -> String {
    format!(
        "- clarity: {:.2}\n- completeness: {:.2}\n- structure: {:.2}\n- examples: {:.2}\n- guardrails: {:.2}\n- overall: {:.2}",
        metrics.clarity(),
        metrics.completeness(),
        metrics.structure(),
        metrics.examples(),
        metrics.guardrails(),
        metrics.overall()
    )
}
