use crate::history::{ConversationTurn, Role};

/// Renders the last `window` turns as `User: …` / `Assistant: …` lines.
pub fn render_conversation(turns: &[ConversationTurn], window: usize) -> String {
    let start = turns.len().saturating_sub(window);
    turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", speaker(turn.role), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prior turns followed by the new user message.
pub fn render_conversation_with(
    turns: &[ConversationTurn],
    window: usize,
    message: &str,
) -> String {
    let prior = render_conversation(turns, window);
    let latest = format!("{}: {}", speaker(Role::User), message);
    if prior.is_empty() {
        latest
    } else {
        format!("{}\n{}", prior, latest)
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Agent => "Assistant",
    }
}

/// Substitutes `{name}` placeholders in a single pass, so braces inside the
/// substituted values are never expanded. Unknown placeholders are kept.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match replaced {
            Some((close, value)) => {
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
