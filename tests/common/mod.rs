//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;

use inspection_agent::agent::NamedValueEvaluator;
use inspection_agent::model::{
    well_known, ErrorValue, ListObject, MemberDescriptor, ObjectRef, RecordObject, RecordTypeExt,
    RuntimeType, Value,
};
use inspection_agent::protocol::{encode_frame, FrameDecoder, RequestEnvelope};
use inspection_agent::{Agent, AgentConfig, AgentServer};

/// Keepalive used by test agents so ping tests stay fast.
pub const TEST_KEEPALIVE: Duration = Duration::from_millis(200);

/// Globals: `answer` (42), `point` (record with X, Y and a failing member),
/// `numbers` (list of 1..=25).
pub fn fixture_evaluator() -> NamedValueEvaluator {
    let types = well_known::types();
    let point = RuntimeType::class("Fixture.Point")
        .base(&types.object)
        .record_field("X", &types.int32)
        .record_field("Y", &types.int32)
        .member(MemberDescriptor::property("Broken", &types.string, |_| {
            Err(ErrorValue::new("InvalidOperation", "getter failed"))
        }))
        .build();

    let point: ObjectRef = Arc::new(RecordObject::new(&point).with("X", 1).with("Y", 2));
    let numbers: ObjectRef = Arc::new(ListObject::new((1..=25).map(Value::I32).collect()));

    NamedValueEvaluator::new()
        .with("answer", 42)
        .with("point", point)
        .with("numbers", numbers)
}

pub fn fixture_agent() -> Arc<Agent> {
    Agent::builder("test", "integration-tests")
        .config(&AgentConfig::default())
        .keepalive(TEST_KEEPALIVE)
        .evaluator(Arc::new(fixture_evaluator()))
        .build()
        .unwrap()
}

pub async fn start_server() -> AgentServer {
    AgentServer::start(fixture_agent(), &AgentConfig::default())
        .await
        .unwrap()
}

/// Post one request and collect every frame of the response stream.
pub async fn send(client: &reqwest::Client, server: &AgentServer, payload: Json) -> Vec<Json> {
    send_raw(client, server, encode_frame(&RequestEnvelope::new(payload)).unwrap()).await
}

pub async fn send_raw(client: &reqwest::Client, server: &AgentServer, body: Vec<u8>) -> Vec<Json> {
    let mut res = client
        .post(server.endpoint_uri())
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success(), "status {}", res.status());

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    while let Some(chunk) = res.chunk().await.unwrap() {
        decoder.extend(&chunk);
        while let Some(frame) = decoder.next_message::<Json>().unwrap() {
            frames.push(frame);
        }
    }
    assert_eq!(decoder.buffered(), 0);
    frames
}

/// The single response frame's body value, checking the stream shape.
pub fn response_value(frames: &[Json]) -> &Json {
    assert_eq!(frames.len(), 2, "frames: {frames:?}");
    assert_eq!(frames[0]["type"], "response", "frames: {frames:?}");
    assert_eq!(frames[1]["type"], "end_of_messages");
    &frames[0]["body"]["value"]
}

/// First proxy of the given kind among a represented object's representations.
pub fn find_proxy<'a>(represented: &'a Json, kind: &str) -> Option<&'a Json> {
    represented["representations"]
        .as_array()?
        .iter()
        .map(|r| &r["value"])
        .filter(|v| v["kind"] == "proxy")
        .map(|v| &v["value"])
        .find(|p| p["kind"] == kind)
}

pub fn handle_of(proxy: &Json) -> i64 {
    proxy["handle"].as_i64().unwrap()
}
