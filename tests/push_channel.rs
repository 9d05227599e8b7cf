//! Long-poll push channel over HTTP.

use std::time::Duration;

use serde_json::{json, Value as Json};

use inspection_agent::protocol::{encode_frame, FrameDecoder, RequestEnvelope};

mod common;

use common::{send, start_server, TEST_KEEPALIVE};

async fn next_frame(res: &mut reqwest::Response, decoder: &mut FrameDecoder) -> Json {
    loop {
        if let Some(frame) = decoder.next_message::<Json>().unwrap() {
            return frame;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(5), res.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        decoder.extend(&chunk);
    }
}

#[tokio::test]
async fn pushes_arrive_in_order_then_pings_keep_the_poll_alive() {
    let mut server = start_server().await;
    let client = reqwest::Client::new();

    send(
        &client,
        &server,
        json!({"type": "evaluate", "code_cell_id": "c1", "unit": "answer"}),
    )
    .await;
    send(&client, &server, json!({"type": "reset_state"})).await;

    let envelope = RequestEnvelope::new(json!({"type": "open_message_channel"}));
    let request_id = envelope.message_id;
    let mut res = client
        .post(server.endpoint_uri())
        .body(encode_frame(&envelope).unwrap())
        .send()
        .await
        .unwrap();
    let mut decoder = FrameDecoder::new();

    let first = next_frame(&mut res, &mut decoder).await;
    assert_eq!(first["type"], "push");
    assert_eq!(first["message"]["kind"], "evaluation");
    assert_eq!(first["message"]["value"]["code_cell_id"], "c1");

    let second = next_frame(&mut res, &mut decoder).await;
    assert_eq!(second["message"]["kind"], "state_reset");

    let started = std::time::Instant::now();
    let ping = next_frame(&mut res, &mut decoder).await;
    assert_eq!(ping, json!({"type": "ping", "request_id": request_id.to_string()}));
    assert!(started.elapsed() >= TEST_KEEPALIVE / 2);

    // Messages pushed while the poll is open are delivered on it.
    send(
        &client,
        &server,
        json!({"type": "evaluate", "code_cell_id": "c2", "unit": "answer"}),
    )
    .await;
    let mut frame = next_frame(&mut res, &mut decoder).await;
    while frame["type"] == "ping" {
        frame = next_frame(&mut res, &mut decoder).await;
    }
    assert_eq!(frame["message"]["value"]["code_cell_id"], "c2");

    drop(res);
    server.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn captured_output_precedes_its_evaluation() {
    let mut server = start_server().await;
    let client = reqwest::Client::new();

    send(
        &client,
        &server,
        json!({"type": "evaluate", "code_cell_id": "c1", "unit": "eprint disk full"}),
    )
    .await;

    let envelope = RequestEnvelope::new(json!({"type": "open_message_channel"}));
    let mut res = client
        .post(server.endpoint_uri())
        .body(encode_frame(&envelope).unwrap())
        .send()
        .await
        .unwrap();
    let mut decoder = FrameDecoder::new();

    let output = next_frame(&mut res, &mut decoder).await;
    assert_eq!(
        output["message"],
        json!({
            "kind": "captured_output",
            "value": {"code_cell_id": "c1", "stream": "stderr", "text": "disk full\n"}
        })
    );

    let evaluation = next_frame(&mut res, &mut decoder).await;
    assert_eq!(evaluation["message"]["kind"], "evaluation");
    assert_eq!(evaluation["message"]["value"]["code_cell_id"], "c1");

    drop(res);
    server.stop(Duration::from_secs(1)).await;
}
