use std::time::Duration;

use tokio::task::{LocalSet, spawn_local};

use super::*;
use crate::client::correlator::{Correlator, CorrelatorOpts};
use crate::protocol::command::{Command, CommandKind, Request, Response, ResponsePayload};
use crate::protocol::wire::decode_request;
use crate::schedule::present::RetainingPresenter;
use crate::transport::channel::pair;

/// Scheduler over an in-thread worker whose renders take 50 ms.
fn slow_scheduler(
    initial: RenderParameters,
) -> Rc<RenderScheduler<SharedParameters, RetainingPresenter>> {
    let (channel, mut port) = pair();
    spawn_local(async move {
        while let Some(msg) = port.recv().await {
            let Request { id, command } = decode_request(msg).unwrap();
            let response = match command {
                Command::DrawImage(params) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Response::success(
                        id,
                        CommandKind::DrawImage,
                        ResponsePayload::Image(params.text_top.into_bytes()),
                    )
                }
                other => Response::success(id, other.kind(), ResponsePayload::Empty),
            };
            port.respond(response).unwrap();
        }
    });
    Rc::new(RenderScheduler::new(
        Correlator::new(channel, CorrelatorOpts::default()),
        SharedParameters::new(initial),
        RetainingPresenter::default(),
    ))
}

fn p(top: &str) -> RenderParameters {
    RenderParameters {
        text_top: top.to_owned(),
        ..RenderParameters::default()
    }
}

fn step(delay_ms: u64, top: Option<&str>) -> ReplayStep {
    ReplayStep {
        delay_ms,
        params: top.map(p),
        force: false,
    }
}

#[test]
fn parses_camel_case_script_with_defaults() {
    let json = r#"{
        "initial": {
            "textTop": "a", "textBottom": "b",
            "fontSize": 40, "stripeCount": 3, "stripeHeightPercent": 10
        },
        "steps": [
            {"delayMs": 25, "params": {
                "textTop": "ab", "textBottom": "b",
                "fontSize": 40, "stripeCount": 3, "stripeHeightPercent": 10
            }},
            {"force": true}
        ]
    }"#;
    let script = ReplayScript::from_reader(json.as_bytes()).unwrap();
    assert_eq!(script.initial.font_size, 40);
    assert_eq!(script.steps.len(), 2);
    assert_eq!(script.steps[0].delay_ms, 25);
    assert_eq!(script.steps[0].params.as_ref().unwrap().text_top, "ab");
    assert_eq!(script.steps[1], ReplayStep { force: true, ..ReplayStep::default() });
}

#[test]
fn rejects_unknown_fields_and_invalid_parameters() {
    let err = ReplayScript::from_reader(r#"{"initial": {}, "stepz": []}"#.as_bytes()).unwrap_err();
    assert!(matches!(err, StripesError::Serde(_)));

    let script = ReplayScript {
        initial: p("ok"),
        steps: vec![ReplayStep {
            params: Some(RenderParameters {
                stripe_height_percent: 0,
                ..p("bad")
            }),
            ..ReplayStep::default()
        }],
    };
    let err = script.validate().unwrap_err();
    assert!(err.to_string().contains("step 0"));
    assert!(err.to_string().contains("stripeHeightPercent"));
}

#[test]
fn missing_script_file_is_reported() {
    let err = ReplayScript::from_path("target/does-not-exist/replay.json").unwrap_err();
    assert!(err.to_string().contains("open replay script"));
}

#[tokio::test(start_paused = true)]
async fn typing_burst_coalesces_into_one_follow_up() {
    LocalSet::new()
        .run_until(async {
            let script = ReplayScript {
                initial: p("v0"),
                steps: vec![
                    step(0, Some("v1")),
                    step(10, Some("v2")),
                    step(10, Some("v3")),
                    step(100, Some("v4")),
                    step(100, None),
                ],
            };
            let sched = slow_scheduler(script.initial.clone());

            let report = replay(&sched, &script).await;

            assert_eq!(
                report.outcomes,
                vec![
                    Ok(RenderOutcome::Rendered),
                    Ok(RenderOutcome::Coalesced),
                    Ok(RenderOutcome::Coalesced),
                    Ok(RenderOutcome::Rendered),
                    Ok(RenderOutcome::Unchanged),
                ]
            );
            assert_eq!(report.stats.rendered, 3);
            assert_eq!(report.stats.coalesced, 2);
            assert_eq!(report.last_rendered, Some(p("v4")));
            assert_eq!(sched.presenter().presented(), 3);
        })
        .await;
}
