use super::*;
use crate::budget::MESSAGE_OVERHEAD_TOKENS;

#[test]
fn session_messages_clip_within_budget() {
    let mut session = Session::new(Some("You are concise.".to_string()));
    for turn in 0..20 {
        session.record_exchange(&format!("question {turn}"), &"answer ".repeat(40));
    }

    let tokenizer: SharedTokenizer = std::sync::Arc::new(HeuristicTokenizer::default());
    let budgeter = ContextBudgeter::new(tokenizer.clone(), "deepseek-chat");
    let messages = session.build_messages("latest question");

    let clipped = budgeter.clip(&messages, 400, 100).unwrap();
    assert!(clipped.was_clipped());
    assert_eq!(clipped.messages[0].role, Role::System);
    assert_eq!(
        clipped.messages.last().map(|m| m.content.as_str()),
        Some("latest question")
    );
    assert!(tokenizer.count_messages("deepseek-chat", &clipped.messages) <= 300);
}

#[test]
fn exhausted_budget_is_reported() {
    let tokenizer: SharedTokenizer = std::sync::Arc::new(HeuristicTokenizer::default());
    let budgeter = ContextBudgeter::new(tokenizer, "gpt-4");

    let error = budgeter
        .clip(&[Message::user("hi")], 100, 100)
        .unwrap_err();
    assert!(matches!(error, BudgetError::Exhausted { .. }));
}

#[test]
fn overhead_constant_matches_empty_message_cost() {
    let tokenizer = HeuristicTokenizer::default();
    assert_eq!(
        tokenizer.count_message("gpt-4", &Message::assistant("")),
        MESSAGE_OVERHEAD_TOKENS
    );
}

#[test]
fn response_frame_carries_tool_result() {
    let result = ToolCallResult::text("12:00");
    let frame = ResponseFrame::with_result(frame_type::TOOLS_CALL_RESULT, "t-1", result.to_json_map());

    let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
    assert_eq!(value["result"]["content"][0]["text"], "12:00");
    assert_eq!(value["type"], "tools/call.result");
}
