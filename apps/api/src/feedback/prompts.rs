// All LLM prompt templates for the feedback module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::language::LanguageCode;
use crate::llm_client::prompts::{fill_template, PLAIN_LANGUAGE_INSTRUCTION};

/// Document analysis template.
/// Slots: {document_text}, {document_language}, {plain_language}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"
You are a job counselor for the Red Cross. Here is a CV or cover letter:

{document_text}

Your mission is to help someone in a vulnerable situation (e.g., no home, disability, etc.).

1. Give 3 simple positive points (e.g., clear layout, good experience).
2. Give 3 things to improve (be kind).
3. Suggest 5 concrete improvements (short, simple phrases).

Respond in the same language as the CV: {document_language}
{plain_language}
"#;

/// Interview preparation template.
/// Slots: {job_description}, {document_text}, {plain_language}
pub const INTERVIEW_PROMPT_TEMPLATE: &str = r#"
You are a Red Cross job counselor. Here's a job offer:

{job_description}

Here is the CV of the person applying:

{document_text}

1. Suggest 5 simple interview questions tailored to this candidate and job.
2. Give a good answer to each (short and easy to remember).
3. Add a section with 5 Important Words:
   - For each: give a simple definition + a sentence example.

Respond in the same language as the job offer.
{plain_language}
"#;

pub fn build_analysis_prompt(document_text: &str, document_language: &LanguageCode) -> String {
    fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("document_text", document_text),
            ("document_language", document_language.as_str()),
            ("plain_language", PLAIN_LANGUAGE_INSTRUCTION),
        ],
    )
}

pub fn build_interview_prompt(job_description: &str, document_text: &str) -> String {
    fill_template(
        INTERVIEW_PROMPT_TEMPLATE,
        &[
            ("job_description", job_description),
            ("document_text", document_text),
            ("plain_language", PLAIN_LANGUAGE_INSTRUCTION),
        ],
    )
}
