/*!
 * Steps chained through the pipeline engine
 */

use std::fs;

use textskel::app_config::Config;
use textskel::connectors::TmEntry;
use textskel::errors::PipelineResult;
use textskel::event::EventType;
use textskel::pipeline::engine::run_batch;
use textskel::pipeline::{CancelToken, FilterRegistry, StepRegistry};
use textskel::resource::model::BatchItemContext;
use textskel::steps::RawDocumentToEventsStep;
use textskel::steps::leverage::{MATCH_TYPE_ANNOTATION, SCORE_ANNOTATION};
use textskel::{Event, EventValidator, Flow, Pipeline, PipelineError, RawDocument, Step};

use crate::common::{self, SAMPLE_PO};

fn pipeline_for(config: &Config) -> Pipeline {
    StepRegistry::new().build_pipeline(config, &FilterRegistry::new()).unwrap()
}

fn config_with_steps(steps: &[&str]) -> Config {
    let mut config = Config::default();
    config.pipeline.steps = steps.iter().map(|s| s.to_string()).collect();
    config
}

fn item(name: &str, text: &str) -> (BatchItemContext, Event) {
    let context = BatchItemContext {
        document: name.to_string(),
        target_locale: Some(common::fr()),
        ..BatchItemContext::default()
    };
    (context, Event::raw_document(RawDocument::from_text(name, text, common::en())))
}

fn item_with_output(name: &str, text: &str, output: &std::path::Path) -> (BatchItemContext, Event) {
    let (mut context, event) = item(name, text);
    context.output_path = Some(output.to_path_buf());
    (context, event)
}

#[test]
fn test_extraction_eventStream_shouldFollowGrammar() {
    common::init_logging();
    let mut pipeline = pipeline_for(&config_with_steps(&["raw-to-events", "segmentation"]));

    let events = run_batch(
        &mut pipeline,
        vec![item("a.po", SAMPLE_PO), item("b.txt", "one. two.\n\nthree\n")],
    )
    .unwrap();

    let mut validator = EventValidator::new();
    for event in &events {
        validator.validate(event.event_type).unwrap();
    }
    assert!(validator.is_complete());
    assert_eq!(events.first().unwrap().event_type, EventType::StartBatch);
    assert_eq!(events.last().unwrap().event_type, EventType::EndBatch);
    assert_eq!(events.iter().filter(|e| e.event_type == EventType::StartDocument).count(), 2);
}

#[test]
fn test_segmentation_thenWriter_shouldReproduceDocument() {
    let dir = common::create_temp_dir().unwrap();
    let input = "msgid \"Open file. Save file.\"\nmsgstr \"Ouvrir. Enregistrer.\"\n";

    let mut inspect = pipeline_for(&config_with_steps(&["raw-to-events", "segmentation"]));
    let events = run_batch(&mut inspect, vec![item("a.po", input)]).unwrap();
    let tu = events.iter().find_map(|e| e.as_text_unit()).unwrap();
    assert_eq!(tu.source().segment_count(), 2);
    assert_eq!(tu.target(&common::fr()).unwrap().segment_count(), 2);

    let output = dir.path().join("a.po");
    let mut pipeline = pipeline_for(&config_with_steps(&["raw-to-events", "segmentation", "events-writer"]));
    run_batch(&mut pipeline, vec![item_with_output("a.po", input, &output)]).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), input);
}

#[test]
fn test_leverage_fromConfiguredMemory_shouldTranslatePlainText() {
    let dir = common::create_temp_dir().unwrap();
    let tm_path = dir.path().join("memory.json");
    let entries = vec![TmEntry::new(&common::en(), &common::fr(), "Hello world", "Bonjour le monde")];
    fs::write(&tm_path, serde_json::to_string(&entries).unwrap()).unwrap();

    let mut config = config_with_steps(&["raw-to-events", "leverage"]);
    config.leverage.tm_path = Some(tm_path.clone());
    let events = run_batch(&mut pipeline_for(&config), vec![item("a.txt", "Hello world\nUnknown line\n")]).unwrap();
    let units: Vec<_> = events.iter().filter_map(|e| e.as_text_unit()).collect();
    assert_eq!(units[0].annotations.get(SCORE_ANNOTATION).and_then(|v| v.as_integer()), Some(100));
    assert_eq!(units[0].annotations.get(MATCH_TYPE_ANNOTATION).and_then(|v| v.as_text()), Some("EXACT"));
    assert!(!units[1].has_target(&common::fr()));

    let output = dir.path().join("out.txt");
    let mut config = config_with_steps(&["raw-to-events", "leverage", "events-writer"]);
    config.leverage.tm_path = Some(tm_path);
    run_batch(
        &mut pipeline_for(&config),
        vec![item_with_output("a.txt", "Hello world\nUnknown line\n", &output)],
    )
    .unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "Bonjour le monde\nUnknown line\n");
}

#[test]
fn test_splice_withWriter_shouldKeepContinuedLines() {
    let dir = common::create_temp_dir().unwrap();
    let input = "first part \\\nsecond part\nthird\n";

    let events = run_batch(
        &mut pipeline_for(&config_with_steps(&["raw-to-events", "splice-lines"])),
        vec![item("a.txt", input)],
    )
    .unwrap();
    let units: Vec<_> = events.iter().filter_map(|e| e.as_text_unit()).collect();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].source().content().to_display_text(), "first part second part");

    let output = dir.path().join("a.txt");
    run_batch(
        &mut pipeline_for(&config_with_steps(&["raw-to-events", "splice-lines", "events-writer"])),
        vec![item_with_output("a.txt", input, &output)],
    )
    .unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), input);
}

/// Cancels the pipeline when it sees its second text unit.
struct CancelOnSecondUnit {
    token: CancelToken,
    seen: usize,
}

impl Step for CancelOnSecondUnit {
    fn name(&self) -> &str {
        "cancel-on-second-unit"
    }

    fn handle_text_unit(&mut self, event: Event) -> PipelineResult<Flow> {
        self.seen += 1;
        if self.seen == 2 {
            self.token.cancel();
        }
        Ok(Flow::Produced(event))
    }
}

#[test]
fn test_cancel_duringExtraction_shouldEndStreamWithCanceled() {
    let mut pipeline = Pipeline::new().with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())));
    let token = pipeline.cancel_token();
    pipeline.add_step(Box::new(CancelOnSecondUnit { token, seen: 0 }));

    let mut events = Vec::new();
    let mut sink = |event: Event| -> PipelineResult<()> {
        events.push(event);
        Ok(())
    };
    pipeline.start_batch(&mut sink).unwrap();
    let (context, input) = item("a.txt", "one\ntwo\nthree\nfour\n");
    let result = pipeline.process(context, input, &mut sink);

    assert!(matches!(result, Err(PipelineError::Canceled)));
    assert!(events.last().unwrap().is_canceled());
    assert_eq!(events.iter().filter(|e| e.as_text_unit().is_some()).count(), 2);
    assert!(!events.iter().any(|e| e.event_type == EventType::EndDocument));

    let mut validator = EventValidator::new();
    for event in &events {
        validator.validate(event.event_type).unwrap();
    }
    assert!(validator.is_canceled());
}
