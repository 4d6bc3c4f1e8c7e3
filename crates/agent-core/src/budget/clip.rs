//! Context clipping for budget management.
//!
//! Keeps the leading system message and the longest run of recent messages
//! that fits the prompt budget. Messages are never reordered: older content
//! is dropped first, and at most one message (the newest one that did not
//! fit) is cut short to use up the remaining room.

use crate::agent::types::{Message, Role};
use crate::budget::tokenizer::{SharedTokenizer, Tokenizer, ELLIPSIS, MESSAGE_OVERHEAD_TOKENS};
use crate::budget::types::{BudgetError, ClippedContext, TokenUsageBreakdown};

/// Tokens held back whenever content is hard-truncated.
pub const TRUNCATION_MARGIN_TOKENS: u32 = 8;

/// Below this much leftover room a message is dropped rather than truncated.
pub const MIN_TRUNCATION_BUDGET: u32 = 16;

/// Clips conversations for one model with a shared tokenizer.
#[derive(Clone)]
pub struct ContextBudgeter {
    tokenizer: SharedTokenizer,
    model: String,
}

impl ContextBudgeter {
    pub fn new(tokenizer: SharedTokenizer, model: impl Into<String>) -> Self {
        Self {
            tokenizer,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Fit `messages` into `max_prompt_tokens - reserve_for_response` tokens.
    ///
    /// A negative reserve counts as zero. The returned messages are the
    /// leading system message (if any) followed by the retained suffix of
    /// the conversation, oldest first.
    pub fn clip(
        &self,
        messages: &[Message],
        max_prompt_tokens: i64,
        reserve_for_response: i64,
    ) -> Result<ClippedContext, BudgetError> {
        clip_messages(
            self.tokenizer.as_ref(),
            &self.model,
            messages,
            max_prompt_tokens,
            reserve_for_response,
        )
    }
}

pub fn clip_messages(
    tokenizer: &dyn Tokenizer,
    model: &str,
    messages: &[Message],
    max_prompt_tokens: i64,
    reserve_for_response: i64,
) -> Result<ClippedContext, BudgetError> {
    if max_prompt_tokens <= 0 {
        return Err(BudgetError::InvalidConfig { max_prompt_tokens });
    }
    let reserve = reserve_for_response.max(0);
    let available = max_prompt_tokens - reserve;
    if available <= 0 {
        return Err(BudgetError::Exhausted {
            max_prompt_tokens,
            reserve,
        });
    }
    let budget = u32::try_from(available).unwrap_or(u32::MAX);

    // 1. Everything fits: hand the conversation back untouched.
    let full_cost = tokenizer.count_messages(model, messages);
    if full_cost <= budget {
        let system_tokens = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| tokenizer.count_message(model, m))
            .unwrap_or(0);
        return Ok(ClippedContext {
            messages: messages.to_vec(),
            token_usage: TokenUsageBreakdown {
                system_tokens,
                window_tokens: full_cost - system_tokens,
                total_tokens: full_cost,
                budget_limit: budget,
            },
            messages_dropped: 0,
            truncation_occurred: false,
        });
    }

    // 2. Split off the first system message.
    let system_index = messages.iter().position(|m| m.role == Role::System);
    let rest: Vec<&Message> = messages
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != system_index)
        .map(|(_, m)| m)
        .collect();

    let mut system_tokens = 0u32;
    let mut system = None;
    if let Some(idx) = system_index {
        let message = &messages[idx];
        let cost = tokenizer.count_message(model, message);
        if cost > budget {
            // 3. The system message alone is over budget: cut it down and send it alone.
            let floor = MESSAGE_OVERHEAD_TOKENS + tokenizer.count(model, ELLIPSIS);
            if budget < floor {
                return Err(BudgetError::Exhausted {
                    max_prompt_tokens,
                    reserve,
                });
            }
            let limit = if budget > TRUNCATION_MARGIN_TOKENS {
                budget - TRUNCATION_MARGIN_TOKENS
            } else {
                budget.saturating_sub(MESSAGE_OVERHEAD_TOKENS)
            };
            let truncated = Message::system(tokenizer.truncate(model, &message.content, limit));
            let cost = tokenizer.count_message(model, &truncated);
            tracing::warn!(
                "System message ({} tokens) exceeds prompt budget ({} tokens), truncated to {} tokens",
                tokenizer.count_message(model, message),
                budget,
                cost
            );
            return Ok(ClippedContext {
                messages: vec![truncated],
                token_usage: TokenUsageBreakdown {
                    system_tokens: cost,
                    window_tokens: 0,
                    total_tokens: cost,
                    budget_limit: budget,
                },
                messages_dropped: rest.len(),
                truncation_occurred: true,
            });
        }
        system_tokens = cost;
        system = Some(message.clone());
    }

    // 4. Walk backwards from the newest message while the budget holds.
    let mut total = system_tokens;
    let mut selected: Vec<Message> = Vec::new();
    let mut truncation_occurred = false;

    for message in rest.iter().rev() {
        let cost = tokenizer.count_message(model, message);
        if total.saturating_add(cost) <= budget {
            total += cost;
            selected.push((*message).clone());
            continue;
        }

        // 5. Newest rejected message: truncate it into the leftover room if worthwhile.
        let allow = budget - total;
        if message.role.is_conversational() && allow > MIN_TRUNCATION_BUDGET {
            let content =
                tokenizer.truncate(model, &message.content, allow - TRUNCATION_MARGIN_TOKENS);
            if !content.trim_end_matches(ELLIPSIS).trim().is_empty() {
                let truncated = Message::new(message.role, content);
                total += tokenizer.count_message(model, &truncated);
                selected.push(truncated);
                truncation_occurred = true;
            }
        }
        break;
    }

    selected.reverse();
    let messages_dropped = rest.len() - selected.len();
    tracing::debug!(
        "Clipped context: kept {} of {} messages ({} / {} tokens), truncated: {}",
        selected.len() + usize::from(system.is_some()),
        messages.len(),
        total,
        budget,
        truncation_occurred
    );

    let mut clipped = Vec::with_capacity(selected.len() + 1);
    clipped.extend(system);
    clipped.extend(selected);

    Ok(ClippedContext {
        messages: clipped,
        token_usage: TokenUsageBreakdown {
            system_tokens,
            window_tokens: total - system_tokens,
            total_tokens: total,
            budget_limit: budget,
        },
        messages_dropped,
        truncation_occurred,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::tokenizer::HeuristicTokenizer;
    use std::sync::Arc;

    const MODEL: &str = "deepseek-chat";

    fn budgeter() -> ContextBudgeter {
        ContextBudgeter::new(Arc::new(HeuristicTokenizer::default()), MODEL)
    }

    fn cost(budgeter: &ContextBudgeter, messages: &[Message]) -> u32 {
        budgeter.tokenizer().count_messages(MODEL, messages)
    }

    fn long_conversation(turns: usize) -> Vec<Message> {
        let mut messages = vec![Message::system("You are a concise assistant.")];
        for i in 0..turns {
            messages.push(Message::user(format!(
                "Question number {i}: please explain the topic in some detail"
            )));
            messages.push(Message::assistant(format!(
                "Answer number {i}: here is a reasonably long explanation of the topic"
            )));
        }
        messages
    }

    #[test]
    fn rejects_non_positive_max_prompt_tokens() {
        let messages = vec![Message::user("Hi")];
        assert_eq!(
            budgeter().clip(&messages, 0, 0).unwrap_err(),
            BudgetError::InvalidConfig { max_prompt_tokens: 0 }
        );
        assert!(matches!(
            budgeter().clip(&messages, -5, 0),
            Err(BudgetError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_reserve_that_consumes_the_budget() {
        let messages = vec![Message::user("Hi")];
        assert_eq!(
            budgeter().clip(&messages, 50, 50).unwrap_err(),
            BudgetError::Exhausted {
                max_prompt_tokens: 50,
                reserve: 50
            }
        );
    }

    #[test]
    fn negative_reserve_counts_as_zero() {
        let messages = vec![Message::user("Hi")];
        let clipped = budgeter().clip(&messages, 50, -100).unwrap();
        assert_eq!(clipped.token_usage.budget_limit, 50);
        assert_eq!(clipped.messages, messages);
    }

    #[test]
    fn single_short_message_is_returned_unchanged() {
        let messages = vec![Message::user("Hi")];
        let clipped = budgeter().clip(&messages, 50, 10).unwrap();

        assert_eq!(clipped.messages, messages);
        assert_eq!(clipped.token_usage.budget_limit, 40);
        assert!(!clipped.was_clipped());
    }

    #[test]
    fn fitting_conversation_is_returned_unchanged_in_order() {
        let messages = long_conversation(3);
        let clipped = budgeter().clip(&messages, 10_000, 500).unwrap();

        assert_eq!(clipped.messages, messages);
        assert_eq!(clipped.messages_dropped, 0);
        assert_eq!(clipped.token_usage.total_tokens, cost(&budgeter(), &messages));
    }

    #[test]
    fn oversized_system_message_is_truncated_and_sent_alone() {
        let messages = vec![
            Message::system("rules ".repeat(2_000)),
            Message::user("Hi"),
            Message::assistant("Hello"),
        ];
        let budgeter = budgeter();
        let clipped = budgeter.clip(&messages, 100, 0).unwrap();

        assert_eq!(clipped.messages.len(), 1);
        assert_eq!(clipped.messages[0].role, Role::System);
        assert!(clipped.messages[0].content.ends_with(ELLIPSIS));
        assert!(cost(&budgeter, &clipped.messages) <= 100);
        assert_eq!(clipped.messages_dropped, 2);
        assert!(clipped.truncation_occurred);
    }

    #[test]
    fn tiny_budget_still_marks_truncated_system_message() {
        let messages = vec![Message::system("x".repeat(500))];
        let budgeter = budgeter();
        let floor = MESSAGE_OVERHEAD_TOKENS + budgeter.tokenizer().count(budgeter.model(), ELLIPSIS);

        for max in 1..=8i64 {
            let result = budgeter.clip(&messages, max, 0);
            if (max as u32) < floor {
                assert!(
                    matches!(result, Err(BudgetError::Exhausted { .. })),
                    "budget {max} cannot hold a marked system message"
                );
                continue;
            }
            let clipped = result.unwrap();
            assert_eq!(clipped.messages.len(), 1);
            assert!(clipped.messages[0].content.ends_with(ELLIPSIS), "no marker at {max}");
            assert!(cost(&budgeter, &clipped.messages) <= max as u32, "over budget at {max}");
        }
    }

    #[test]
    fn drops_oldest_messages_first_and_keeps_system() {
        let messages = long_conversation(30);
        let budgeter = budgeter();
        let clipped = budgeter.clip(&messages, 300, 50).unwrap();

        assert!(clipped.messages_dropped > 0);
        assert_eq!(clipped.messages[0], messages[0]);
        let last = clipped.messages.last().unwrap();
        assert_eq!(last, messages.last().unwrap());
        assert!(cost(&budgeter, &clipped.messages) <= 250);
    }

    #[test]
    fn output_never_exceeds_budget() {
        let messages = long_conversation(25);
        let budgeter = budgeter();
        for max in [40i64, 64, 100, 173, 256, 999] {
            for reserve in [0i64, 10, 30] {
                let clipped = budgeter.clip(&messages, max, reserve).unwrap();
                let spent = cost(&budgeter, &clipped.messages);
                assert!(
                    spent as i64 <= max - reserve,
                    "{spent} > {} (max {max}, reserve {reserve})",
                    max - reserve
                );
                assert_eq!(spent, clipped.token_usage.total_tokens);
            }
        }
    }

    #[test]
    fn retained_messages_keep_relative_order() {
        let messages = long_conversation(20);
        let clipped = budgeter().clip(&messages, 220, 0).unwrap();

        let mut last_index = None;
        for kept in &clipped.messages {
            let body = kept.content.trim_end_matches(ELLIPSIS);
            let index = messages
                .iter()
                .position(|m| m.role == kept.role && m.content.starts_with(body))
                .expect("retained message must come from the input");
            if let Some(previous) = last_index {
                assert!(index > previous, "message order changed");
            }
            last_index = Some(index);
        }
    }

    #[test]
    fn truncates_newest_rejected_message_into_leftover_room() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("old question ".repeat(60)),
            Message::assistant("Short answer."),
            Message::user("Latest question?"),
        ];
        let budgeter = budgeter();
        let clipped = budgeter.clip(&messages, 90, 0).unwrap();

        assert!(clipped.truncation_occurred);
        assert_eq!(clipped.messages.len(), 4);
        assert!(clipped.messages[1].content.ends_with(ELLIPSIS));
        assert!(clipped.messages[1].content.starts_with("old question"));
        assert_eq!(clipped.messages[3].content, "Latest question?");
        assert!(cost(&budgeter, &clipped.messages) <= 90);
    }

    #[test]
    fn drops_rejected_message_when_leftover_room_is_small() {
        let messages = vec![
            Message::user("old question ".repeat(60)),
            Message::user("x".repeat(60)),
        ];
        let budgeter = budgeter();
        // Second message costs 23 tokens; 35 leaves 12 <= 16 of room.
        let clipped = budgeter.clip(&messages, 35, 0).unwrap();

        assert_eq!(clipped.messages, vec![messages[1].clone()]);
        assert!(!clipped.truncation_occurred);
        assert_eq!(clipped.messages_dropped, 1);
    }

    #[test]
    fn later_system_messages_are_never_truncated() {
        let messages = vec![
            Message::system("Primary prompt."),
            Message::system("secondary notes ".repeat(80)),
            Message::user("Question?"),
        ];
        let clipped = budgeter().clip(&messages, 80, 0).unwrap();

        assert_eq!(clipped.messages.len(), 2);
        assert_eq!(clipped.messages[0].content, "Primary prompt.");
        assert_eq!(clipped.messages[1].content, "Question?");
        assert!(!clipped.truncation_occurred);
    }

    #[test]
    fn handles_empty_conversation() {
        let clipped = budgeter().clip(&[], 100, 10).unwrap();
        assert!(clipped.messages.is_empty());
        assert_eq!(clipped.token_usage.total_tokens, 0);
    }
}
