// SPDX-License-Identifier: MIT

//! Prompt text for the assistant nodes

use super::state::UserRules;
use crate::adk::model::Message;

const RULES_PLACEHOLDER: &str = "{userRules}";

pub const SYSTEM_PROMPT: &str = "You are a helpful writing assistant. \
Follow the user's learned preferences below when writing.

<user-rules>
{userRules}
</user-rules>";

pub const NO_RULES: &str = "No rules have been learned for this user yet.";

pub const CONTENT_CHECK_PROMPT: &str = "Decide whether the last assistant message \
contains generated content the user could accept, such as a draft, post or rewrite, \
as opposed to a question or small talk. Respond only with the requested JSON.";

pub const INSIGHTS_PROMPT: &str = "The user accepted the generated text in this \
conversation. Derive the style rules and content rules that explain their preferences, \
merging them with the existing rules below. Keep rules short and drop duplicates. \
Respond only with the requested JSON.

<existing-rules>
{userRules}
</existing-rules>";

/// Render rules as bulleted sections
///
/// Empty rules render as an explicit notice, and an empty section inside
/// non-empty rules renders as "- none".
pub fn format_rules(rules: &UserRules) -> String {
    if rules.is_empty() {
        return NO_RULES.to_string();
    }
    format!(
        "Style rules:\n{}\n\nContent rules:\n{}",
        bullets(&rules.style_rules),
        bullets(&rules.content_rules)
    )
}

fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "- none".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute formatted rules into a template
pub fn with_rules(template: &str, rules: &UserRules) -> String {
    template.replace(RULES_PLACEHOLDER, &format_rules(rules))
}

/// System prompt followed by the conversation
pub fn conversation(system: String, history: Vec<Message>) -> Vec<Message> {
    std::iter::once(Message::system(system))
        .chain(history)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_rules() {
        let prompt = with_rules(SYSTEM_PROMPT, &UserRules::default());
        assert!(prompt.contains(NO_RULES));
        assert!(!prompt.contains(RULES_PLACEHOLDER));
    }

    #[test]
    fn test_format_rules_sections() {
        let rules = UserRules {
            style_rules: vec!["be concise".to_string(), "no emojis".to_string()],
            content_rules: vec![],
        };
        assert_eq!(
            format_rules(&rules),
            "Style rules:\n- be concise\n- no emojis\n\nContent rules:\n- none"
        );
    }

    #[test]
    fn test_conversation_order() {
        let msgs = conversation("sys".to_string(), vec![Message::user("Hi")]);
        assert_eq!(msgs, vec![Message::system("sys"), Message::user("Hi")]);
    }
}
