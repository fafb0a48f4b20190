// Shared prompt fragments and the placeholder filler used by every template.
// Each feature that needs LLM calls defines its own prompts.rs alongside it.

/// Plain-language constraint appended to every counselling prompt.
pub const PLAIN_LANGUAGE_INSTRUCTION: &str = "\
Use very simple words. Short sentences. No complicated vocabulary.
Avoid using markdown or formatting symbols like ** or *.";

/// Fills `{name}` slots in a template in one left-to-right pass.
///
/// Substituted values are never re-scanned, so text that itself contains `{name}`
/// lands in the output verbatim. Unknown slots are left untouched.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
