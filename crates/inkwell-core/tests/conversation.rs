//! End-to-end conversation tests against a scripted gateway.

use std::sync::Arc;

use inkwell_core::docs::PROCESSOR_INFO_TOOL;
use inkwell_core::llm::{ConversationItem, GatewayError, OutputItem, Usage};
use inkwell_core::marker::MarkerError;
use inkwell_core::orchestrator::Phase;
use inkwell_core::tools::{ParamType, ToolParameter};
use inkwell_core::{
    Assistant, ConversationError, ConversationOrchestrator, ConversationOutcome, DocCatalog,
    DocumentSnapshot, EditReport, EditRequest, OrchestratorSettings, ToolDefinition, ToolRegistry,
};
use inkwell_test_utils::gateway::ScriptedReply;
use inkwell_test_utils::{MemoryDocument, ScriptedGateway};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn assistant(gateway: &Arc<ScriptedGateway>, settings: OrchestratorSettings) -> Assistant {
    Assistant::new(gateway.clone(), settings, DocCatalog::default())
}

fn final_answer() -> ScriptedReply {
    ScriptedReply::message("```xml\n<Task/>[CURSOR]\n```")
}

fn user_text(item: &ConversationItem) -> &str {
    match item {
        ConversationItem::UserMessage { text } => text,
        other => panic!("expected a user message, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_add_log_command_end_to_end() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message(
        "Added the command:\n```xml\n<Task><Log/>[CURSOR]</Task>\n```",
    )]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("<Task/>").with_caret(6);

    let report = assistant.edit(&mut doc, "add a Log command").await.unwrap();

    assert_eq!(
        report,
        EditReport::Applied(DocumentSnapshot::new("<Task><Log/></Task>").with_caret(12))
    );
    assert_eq!(doc.text, "<Task><Log/></Task>");
    assert_eq!(doc.caret, 12);
    assert_eq!(doc.apply_count, 1);
    assert_eq!(doc.after_apply_count, 1);

    let request = gateway.last_request().unwrap();
    assert_eq!(request.model, "gpt-5-mini");
    let prompt = user_text(&request.input[0]);
    assert!(prompt.contains("Source:\n```xml\n<Task/[CURSOR]>\n```"));
    assert!(prompt.contains("[CURSOR] - Cursor position."));
    assert!(prompt.ends_with("Input:\nadd a Log command\n"));
    let tools: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tools, vec![PROCESSOR_INFO_TOOL]);
}

#[tokio::test]
async fn test_unknown_tool_gets_empty_result() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::function_call("call_1", "doesNotExist", "{}"),
        final_answer(),
    ]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("");

    let report = assistant.edit(&mut doc, "anything").await.unwrap();
    assert!(matches!(report, EditReport::Applied(_)));
    assert_eq!(gateway.call_count(), 2);

    let second = &gateway.requests()[1];
    assert_eq!(
        second.input[1..].to_vec(),
        vec![
            ConversationItem::FunctionCall {
                call_id: "call_1".to_string(),
                name: "doesNotExist".to_string(),
                arguments: "{}".to_string(),
            },
            ConversationItem::function_result("call_1", ""),
        ]
    );
}

#[tokio::test]
async fn test_malformed_arguments_get_empty_result() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::function_call("call_1", PROCESSOR_INFO_TOOL, "{oops"),
        final_answer(),
    ]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("");

    assistant.edit(&mut doc, "anything").await.unwrap();

    let second = &gateway.requests()[1];
    assert_eq!(
        second.input.last(),
        Some(&ConversationItem::function_result("call_1", ""))
    );
}

#[tokio::test]
async fn test_turn_bound_stops_endless_tool_calls() {
    let gateway = Arc::new(ScriptedGateway::repeating(ScriptedReply::function_call(
        "call",
        PROCESSOR_INFO_TOOL,
        r#"{"name":"BaseProcessor"}"#,
    )));
    let assistant = assistant(&gateway, OrchestratorSettings::default().with_max_turns(3));
    let mut doc = MemoryDocument::new("<Task/>").with_caret(2);

    let err = assistant.edit(&mut doc, "loop forever").await.unwrap_err();

    assert!(matches!(err, ConversationError::TooManyTurns { limit: 3 }));
    assert_eq!(gateway.call_count(), 3);
    assert_eq!(doc.text, "<Task/>");
    assert_eq!(doc.caret, 2);
    assert_eq!(doc.apply_count, 0);
}

#[tokio::test]
async fn test_default_turn_bound_is_four() {
    let gateway = Arc::new(ScriptedGateway::repeating(ScriptedReply::function_call(
        "call",
        "doesNotExist",
        "{}",
    )));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("");

    let err = assistant.edit(&mut doc, "loop").await.unwrap_err();
    assert!(matches!(err, ConversationError::TooManyTurns { limit: 4 }));
    assert_eq!(gateway.call_count(), 4);
}

#[tokio::test]
async fn test_rate_limit_is_surfaced_without_retry() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::Fail(GatewayError::RateLimited {
            retry_after_secs: 30,
        }),
        final_answer(),
    ]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("<Task/>");

    let err = assistant.edit(&mut doc, "add").await.unwrap_err();

    assert!(matches!(
        err,
        ConversationError::RateLimited {
            retry_after_secs: 30
        }
    ));
    assert_eq!(gateway.call_count(), 1);
    assert_eq!(doc.apply_count, 0);
}

#[tokio::test]
async fn test_transport_error_fails_request() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::Fail(
        GatewayError::Network("connection reset".to_string()),
    )]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("<Task/>");

    let err = assistant.edit(&mut doc, "add").await.unwrap_err();
    assert!(matches!(err, ConversationError::Gateway(GatewayError::Network(_))));
    assert_eq!(doc.text, "<Task/>");
}

#[tokio::test]
async fn test_reasoning_is_replayed_in_order() {
    let reasoning = json!({"type": "reasoning", "id": "rs_1", "summary": []});
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::items(vec![
            OutputItem::Reasoning {
                payload: reasoning.clone(),
            },
            OutputItem::function_call("call_1", PROCESSOR_INFO_TOOL, r#"{"name":"Web"}"#),
        ]),
        final_answer(),
    ]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("");

    assistant.edit(&mut doc, "go").await.unwrap();

    let second = &gateway.requests()[1];
    assert_eq!(second.input.len(), 4);
    assert_eq!(second.input[1], ConversationItem::Reasoning { payload: reasoning });
    assert!(matches!(second.input[2], ConversationItem::FunctionCall { .. }));
    match &second.input[3] {
        ConversationItem::FunctionResult { call_id, output } => {
            assert_eq!(call_id, "call_1");
            assert!(output.contains("# Command Processor: Web"));
        }
        other => panic!("expected a function result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_response_without_message_is_a_no_op() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::items(vec![
        OutputItem::Reasoning {
            payload: json!({"type": "reasoning"}),
        },
    ])]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("<Task/>").with_caret(3);

    let report = assistant.edit(&mut doc, "go").await.unwrap();

    assert_eq!(report, EditReport::NoChange);
    assert_eq!(doc.apply_count, 0);
    assert_eq!(doc.text, "<Task/>");
}

#[tokio::test]
async fn test_parallel_calls_answered_before_resubmission() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::items(vec![
            OutputItem::function_call("a", PROCESSOR_INFO_TOOL, r#"{"name":"One"}"#),
            OutputItem::function_call("b", PROCESSOR_INFO_TOOL, r#"{"name":"Two"}"#),
        ]),
        final_answer(),
    ]));
    let orchestrator =
        ConversationOrchestrator::new(gateway.clone(), OrchestratorSettings::default());
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let doc = MemoryDocument::new("");
    let prepared = assistant.prepare(&doc, "go");
    let mut scope = prepared.scope;

    let report = orchestrator
        .run(
            &prepared.request,
            &prepared.tools,
            scope.as_mut(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.state.phase(), Phase::Done);
    assert_eq!(report.state.turns(), 2);
    assert!(report.state.unanswered_calls().is_empty());

    let second = &gateway.requests()[1];
    let kinds: Vec<_> = second
        .input
        .iter()
        .map(|item| match item {
            ConversationItem::UserMessage { .. } => "user",
            ConversationItem::FunctionCall { call_id, .. } if call_id == "a" => "call a",
            ConversationItem::FunctionCall { .. } => "call b",
            ConversationItem::FunctionResult { call_id, .. } if call_id == "a" => "result a",
            ConversationItem::FunctionResult { .. } => "result b",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["user", "call a", "result a", "call b", "result b"]);
}

#[tokio::test]
async fn test_document_tool_runs_fragment() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptedReply::function_call("call_1", "lookup_user", r#"{"id": 7}"#),
        final_answer(),
    ]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("<Task/>")
        .with_tool(
            ToolDefinition::fragment(
                "lookup_user",
                "Looks up a user by id.",
                "<Lookup/>",
                Some("result".to_string()),
            )
            .with_parameter(ToolParameter::required("id", ParamType::Integer)),
        )
        .on_fragment("<Lookup/>", |scope| {
            let id = scope.get("id").unwrap_or_default().to_string();
            scope.set("result", format!("user-{id}"));
            Ok(())
        });

    assistant.edit(&mut doc, "who is 7?").await.unwrap();

    assert_eq!(doc.fragments_run(), vec!["<Lookup/>"]);
    let second = &gateway.requests()[1];
    assert_eq!(
        second.input.last(),
        Some(&ConversationItem::function_result("call_1", "user-7"))
    );
    let tools: Vec<_> = second.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tools, vec![PROCESSOR_INFO_TOOL, "lookup_user"]);
    // The shared registry is untouched.
    assert_eq!(assistant.tools().names(), vec![PROCESSOR_INFO_TOOL]);
}

#[tokio::test]
async fn test_selection_round_trip() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message(
        "```xml\n[SELECTION_START]HELLO[SELECTION_END] world\n```",
    )]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("hello world").with_selection(0, 5);

    assistant.edit(&mut doc, "uppercase the selection").await.unwrap();

    let prompt = user_text(&gateway.requests()[0].input[0]).to_string();
    assert!(prompt.contains("[SELECTION_START]hello[SELECTION_END] world"));
    assert!(!prompt.contains("```xml\n[CURSOR]"));
    assert_eq!(doc.text, "HELLO world");
    assert_eq!(doc.selection, (0, 5));
}

#[tokio::test]
async fn test_reversed_selection_markers_fail_loudly() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message(
        "[SELECTION_END]abc[SELECTION_START]",
    )]));
    let assistant = assistant(&gateway, OrchestratorSettings::default());
    let mut doc = MemoryDocument::new("abc");

    let err = assistant.edit(&mut doc, "go").await.unwrap_err();

    assert!(matches!(
        err,
        ConversationError::Marker(MarkerError::ReversedSelection { .. })
    ));
    assert_eq!(doc.apply_count, 0);
}

#[tokio::test]
async fn test_usage_is_summed_across_turns() {
    let usage = Usage {
        input_tokens: 100,
        cached_input_tokens: 20,
        output_tokens: 10,
        reasoning_tokens: 5,
    };
    let gateway = Arc::new(ScriptedGateway::new(vec![
        inkwell_core::llm::GatewayResponse::new(vec![OutputItem::function_call(
            "c", "doesNotExist", "{}",
        )])
        .with_usage(usage)
        .into(),
        inkwell_core::llm::GatewayResponse::new(vec![OutputItem::message("<Task/>")])
            .with_usage(usage)
            .into(),
    ]));
    let orchestrator = ConversationOrchestrator::new(gateway, OrchestratorSettings::default());
    let doc = MemoryDocument::new("");
    let mut scope = inkwell_core::DocumentContext::tool_scope(&doc);

    let report = orchestrator
        .run(
            &EditRequest::new(DocumentSnapshot::new(""), "go"),
            &ToolRegistry::new(),
            scope.as_mut(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.usage.input_tokens, 200);
    assert_eq!(report.usage.reasoning_tokens, 10);
    assert_eq!(
        report.outcome,
        ConversationOutcome::Edit(DocumentSnapshot::new("<Task/>"))
    );
}

#[test_log::test(tokio::test)]
async fn test_cancelled_before_first_turn() {
    let gateway = Arc::new(ScriptedGateway::new(vec![final_answer()]));
    let orchestrator =
        ConversationOrchestrator::new(gateway.clone(), OrchestratorSettings::default());
    let doc = MemoryDocument::new("");
    let mut scope = inkwell_core::DocumentContext::tool_scope(&doc);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .run(
            &EditRequest::new(DocumentSnapshot::new(""), "go"),
            &ToolRegistry::new(),
            scope.as_mut(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConversationError::Cancelled));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_transcript_logging_does_not_change_outcome() {
    inkwell_test_utils::tracing_setup::init_test_tracing_with("inkwell::transcript=info");
    let gateway = Arc::new(ScriptedGateway::new(vec![final_answer()]));
    let settings = OrchestratorSettings {
        log_transcript: true,
        ..Default::default()
    };
    let assistant = assistant(&gateway, settings);
    let mut doc = MemoryDocument::new("<Task/>");

    let report = assistant.edit(&mut doc, "anything").await.unwrap();
    assert_eq!(report, EditReport::Applied(DocumentSnapshot::new("<Task/>").with_caret(7)));
}

#[tokio::test]
async fn test_empty_answer_leaves_document_alone() {
    let answers = ["", "  \n", "```xml\n[CURSOR]\n```"];
    for answer in answers {
        let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message(answer)]));
        let assistant = assistant(&gateway, OrchestratorSettings::default());
        let mut doc = MemoryDocument::new("<Task><Log/></Task>").with_caret(6);

        let report = assistant.edit(&mut doc, "add a Log command").await.unwrap();

        assert_eq!(report, EditReport::NoChange, "answer {answer:?}");
        assert_eq!(doc.text, "<Task><Log/></Task>");
        assert_eq!(doc.caret, 6);
        assert_eq!(doc.apply_count, 0);
    }
}

#[tokio::test]
async fn test_tool_calls_on_last_turn_are_not_dispatched() {
    let gateway = Arc::new(ScriptedGateway::repeating(ScriptedReply::function_call(
        "call",
        "bump",
        "{}",
    )));
    let assistant = assistant(&gateway, OrchestratorSettings::default().with_max_turns(2));
    let mut doc = MemoryDocument::new("<Task/>")
        .with_tool(ToolDefinition::fragment("bump", "Increments a counter.", "<Bump/>", None))
        .on_fragment("<Bump/>", |_| Ok(()));

    let err = assistant.edit(&mut doc, "loop").await.unwrap_err();

    assert!(matches!(err, ConversationError::TooManyTurns { limit: 2 }));
    assert_eq!(gateway.call_count(), 2);
    // Only the first turn's call ran; the second would never be answered.
    assert_eq!(doc.fragments_run(), vec!["<Bump/>"]);
    assert_eq!(doc.apply_count, 0);
}
