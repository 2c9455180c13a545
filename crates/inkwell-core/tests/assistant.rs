//! Background edit tasks: spawning, cancellation, and concurrent documents.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use inkwell_config::{CatalogConfig, ProcessorDocConfig};
use inkwell_core::orchestrator::OrchestratorSettings;
use inkwell_core::{Assistant, ConversationError, DocCatalog, DocumentSnapshot, EditReport};
use inkwell_test_utils::config::TestConfigBuilder;
use inkwell_test_utils::gateway::ScriptedReply;
use inkwell_test_utils::{MemoryDocument, ScriptedGateway};
use pretty_assertions::assert_eq;

fn assistant(gateway: &Arc<ScriptedGateway>) -> Assistant {
    Assistant::new(
        gateway.clone(),
        OrchestratorSettings::default(),
        DocCatalog::default(),
    )
}

#[tokio::test]
async fn test_spawn_edit_applies_result() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message(
        "```xml\n<Task><Log/>[CURSOR]</Task>\n```",
    )]));
    let doc = Arc::new(Mutex::new(MemoryDocument::new("<Task/>").with_caret(6)));

    let task = assistant(&gateway).spawn_edit(Arc::clone(&doc), "add a Log command");
    let report = task.join().await.unwrap();

    assert_eq!(
        report,
        EditReport::Applied(DocumentSnapshot::new("<Task><Log/></Task>").with_caret(12))
    );
    let doc = doc.lock().unwrap();
    assert_eq!(doc.text, "<Task><Log/></Task>");
    assert_eq!(doc.caret, 12);
    assert_eq!(doc.after_apply_count, 1);
}

#[tokio::test]
async fn test_cancelled_task_never_applies() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::delayed(
        Duration::from_millis(200),
        ScriptedReply::message("<Replaced/>"),
    )]));
    let doc = Arc::new(Mutex::new(MemoryDocument::new("<Task/>")));

    let task = assistant(&gateway).spawn_edit(Arc::clone(&doc), "replace everything");
    tokio::time::sleep(Duration::from_millis(20)).await;
    task.cancel();
    assert!(task.cancellation_token().is_cancelled());

    let report = task.join().await.unwrap();
    assert_eq!(report, EditReport::Cancelled);

    let doc = doc.lock().unwrap();
    assert_eq!(doc.text, "<Task/>");
    assert_eq!(doc.apply_count, 0);
}

#[tokio::test]
async fn test_cancel_before_start_skips_gateway() {
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptedReply::message("<A/>")]));
    let doc = Arc::new(Mutex::new(MemoryDocument::new("<Task/>")));

    // Hold the document so the task cannot snapshot before it is cancelled.
    let guard = doc.lock().unwrap();
    let task = assistant(&gateway).spawn_edit(Arc::clone(&doc), "go");
    task.cancel();
    drop(guard);

    assert_eq!(task.join().await.unwrap(), EditReport::Cancelled);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_documents_share_one_assistant() {
    let gateway = Arc::new(ScriptedGateway::repeating(ScriptedReply::message(
        "```xml\n<Done/>[CURSOR]\n```",
    )));
    let assistant = assistant(&gateway);
    let first = Arc::new(Mutex::new(MemoryDocument::new("<One/>")));
    let second = Arc::new(Mutex::new(MemoryDocument::new("<Two/>")));

    let a = assistant.spawn_edit(Arc::clone(&first), "finish");
    let b = assistant.spawn_edit(Arc::clone(&second), "finish");
    let (a, b) = tokio::join!(a.join(), b.join());

    assert!(matches!(a.unwrap(), EditReport::Applied(_)));
    assert!(matches!(b.unwrap(), EditReport::Applied(_)));
    assert_eq!(first.lock().unwrap().text, "<Done/>");
    assert_eq!(second.lock().unwrap().caret, 7);
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_spawn_edit_reports_failure() {
    let gateway = Arc::new(ScriptedGateway::repeating(ScriptedReply::function_call(
        "c",
        "doesNotExist",
        "{}",
    )));
    let assistant = Assistant::new(
        gateway.clone(),
        OrchestratorSettings::default().with_max_turns(2),
        DocCatalog::default(),
    );
    let doc = Arc::new(Mutex::new(MemoryDocument::new("<Task/>")));

    let task = assistant.spawn_edit(Arc::clone(&doc), "go");
    let err = task.join().await.unwrap_err();

    assert!(matches!(err, ConversationError::TooManyTurns { limit: 2 }));
    assert_eq!(doc.lock().unwrap().apply_count, 0);
}

#[test]
fn test_prompt_context_sections() {
    let config = TestConfigBuilder::new()
        .processor("BaseProcessor", &[("Log", "Plain message: <Log>text</Log>")])
        .build();
    let catalog = DocCatalog::from_config(&config.catalog, &config.assistant.content_type);
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let assistant = Assistant::new(gateway, OrchestratorSettings::default(), catalog)
        .with_general_info("Recipes are XML task files.");
    let doc = MemoryDocument::new("<Task/>")
        .with_processor("Web")
        .with_system_variable("HOME")
        .with_documentation("Web docs from the document.");

    let prompt = assistant.render_prompt(&doc, "add a Log command").unwrap();

    let general = prompt.find("Context:\nRecipes are XML task files.").unwrap();
    let base = prompt.find("# Command Processor: BaseProcessor").unwrap();
    let web = prompt.find("# Command Processor: Web").unwrap();
    let doc_docs = prompt.find("Web docs from the document.").unwrap();
    let vars = prompt.find("# System Variable Names\n\n1. HOME").unwrap();
    let source = prompt.find("Source:\n```xml\n[CURSOR]<Task/>\n```").unwrap();
    assert!(general < base && base < web && web < doc_docs && doc_docs < vars && vars < source);
    assert!(prompt.contains("- Plain message: `<Log>text</Log>`"));
}

#[test]
fn test_catalog_from_config_types() {
    let config = CatalogConfig {
        processors: vec![ProcessorDocConfig {
            name: "Web".to_string(),
            description: String::new(),
            commands: Vec::new(),
        }],
    };
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let assistant = Assistant::new(
        gateway,
        OrchestratorSettings::default(),
        DocCatalog::from_config(&config, "xml"),
    );
    assert_eq!(assistant.catalog().names(), vec!["Web"]);
}
