//! Prompt assembly from a tenant's conversation window.

use crate::history::{Turn, TurnRole};
use crate::llm::ChatMessage;

/// Assemble the model prompt: history oldest-first, the new user message
/// last, truncated from the oldest end until within `char_budget`.
///
/// A pure function of its inputs, so identical (window, message) pairs
/// always produce identical prompts. The newest message always survives
/// truncation; the optional system preamble is not counted against the
/// budget.
pub fn build_prompt(
    system: Option<&str>,
    window: &[Turn],
    user_text: &str,
    char_budget: usize,
) -> Vec<ChatMessage> {
    let mut budget = char_budget.saturating_sub(user_text.chars().count());

    // Walk newest-to-oldest; the first turn that does not fit ends the
    // window, so no holes appear mid-conversation.
    let mut kept: Vec<&Turn> = Vec::new();
    for turn in window.iter().rev() {
        let chars = turn.content.chars().count();
        if chars > budget {
            break;
        }
        budget -= chars;
        kept.push(turn);
    }
    kept.reverse();

    let mut messages = Vec::with_capacity(kept.len() + 2);
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    for turn in kept {
        messages.push(match turn.role {
            TurnRole::User => ChatMessage::user(turn.content.as_str()),
            TurnRole::Assistant => ChatMessage::assistant(turn.content.as_str()),
        });
    }
    messages.push(ChatMessage::user(user_text));
    messages
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::llm::Role;

    fn turn(seq: i64, role: TurnRole, content: &str) -> Turn {
        Turn {
            tenant: "t1".to_string(),
            seq,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn window(pairs: usize) -> Vec<Turn> {
        let mut turns = Vec::new();
        for i in 0..pairs {
            turns.push(turn(2 * i as i64 + 1, TurnRole::User, &format!("question {i}")));
            turns.push(turn(2 * i as i64 + 2, TurnRole::Assistant, &format!("answer {i}")));
        }
        turns
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let w = window(3);
        let a = build_prompt(Some("be brief"), &w, "next question", 500);
        let b = build_prompt(Some("be brief"), &w, "next question", 500);
        assert_eq!(a, b);
    }

    #[test]
    fn test_history_is_oldest_first_and_message_last() {
        let w = window(2);
        let prompt = build_prompt(None, &w, "newest", 10_000);

        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["question 0", "answer 0", "question 1", "answer 1", "newest"]
        );
    }

    #[test]
    fn test_truncation_drops_oldest_first() {
        let w = vec![
            turn(1, TurnRole::User, "aaaaaaaaaa"),      // 10 chars, dropped
            turn(2, TurnRole::Assistant, "bbbbb"),      // 5 chars
            turn(3, TurnRole::User, "ccccc"),           // 5 chars
        ];
        // Budget 13 = "hi" (2) + 10 for history: fits seq 2 and 3 only.
        let prompt = build_prompt(None, &w, "hi", 13);

        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["bbbbb", "ccccc", "hi"]);
    }

    #[test]
    fn test_oversized_middle_turn_ends_the_window() {
        let w = vec![
            turn(1, TurnRole::User, "old"),
            turn(2, TurnRole::Assistant, "x".repeat(50).as_str()),
            turn(3, TurnRole::User, "new"),
        ];
        // The 50-char turn cannot fit, so nothing older than it is kept
        // either, even though "old" alone would fit.
        let prompt = build_prompt(None, &w, "hi", 20);

        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["new", "hi"]);
    }

    #[test]
    fn test_newest_message_always_survives() {
        let w = window(5);
        let prompt = build_prompt(None, &w, "a very long message indeed", 3);

        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].content, "a very long message indeed");
        assert_eq!(prompt[0].role, Role::User);
    }

    #[test]
    fn test_system_prompt_not_counted_against_budget() {
        let w = vec![turn(1, TurnRole::User, "12345")];
        let prompt = build_prompt(Some("x".repeat(1_000).as_str()), &w, "hi", 7);

        let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1], "12345");
        assert_eq!(contents[2], "hi");
        assert_eq!(prompt[0].role, Role::System);
    }
}
