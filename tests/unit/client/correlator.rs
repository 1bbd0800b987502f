use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::foundation::params::RenderParameters;
use crate::protocol::command::Response;
use crate::protocol::wire::decode_request;
use crate::transport::channel::{WorkerEvent, WorkerPort, pair};

fn recorded(correlator: Correlator) -> (Correlator, Rc<RefCell<Vec<CallRecord>>>) {
    let records = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&records);
    let correlator = correlator.with_observer(move |record| sink.borrow_mut().push(record.clone()));
    (correlator, records)
}

async fn answer_with(port: &mut WorkerPort, reply: impl FnOnce(Request) -> Response) {
    let request = decode_request(port.recv().await.unwrap()).unwrap();
    port.respond(reply(request)).unwrap();
}

fn draw() -> Command {
    Command::DrawImage(RenderParameters::default())
}

#[tokio::test]
async fn matching_response_resolves_with_payload() {
    let (channel, mut port) = pair();
    let (mut correlator, records) = recorded(Correlator::new(channel, CorrelatorOpts::default()));

    let (result, ()) = tokio::join!(
        correlator.call(draw()),
        answer_with(&mut port, |req| {
            Response::success(req.id, CommandKind::DrawImage, ResponsePayload::Image(vec![7; 3]))
        })
    );
    assert_eq!(result.unwrap(), ResponsePayload::Image(vec![7; 3]));

    let records = records.borrow();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 1);
    assert_eq!(records[0].command, CommandKind::DrawImage);
    assert_eq!(records[0].failure, None);
}

#[tokio::test]
async fn call_ids_increase() {
    let (channel, mut port) = pair();
    let mut correlator = Correlator::new(channel, CorrelatorOpts::default());

    for expected in 1..=3u64 {
        let (result, ()) = tokio::join!(
            correlator.call(Command::Ping),
            answer_with(&mut port, move |req| {
                assert_eq!(req.id, expected);
                Response::success(req.id, CommandKind::Ping, ResponsePayload::Empty)
            })
        );
        result.unwrap();
    }
    assert_eq!(correlator.calls_issued(), 3);
}

#[tokio::test]
async fn tag_mismatch_is_a_protocol_error() {
    let (channel, mut port) = pair();
    let (mut correlator, records) = recorded(Correlator::new(channel, CorrelatorOpts::default()));

    let (result, ()) = tokio::join!(
        correlator.call(Command::Ping),
        answer_with(&mut port, |req| {
            Response::success(req.id, CommandKind::SetFont, ResponsePayload::Empty)
        })
    );
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        StripesError::ProtocolMismatch {
            expected: CommandKind::Ping,
            actual: CommandKind::SetFont
        }
    ));
    assert_eq!(records.borrow().len(), 1);
    assert_eq!(records.borrow()[0].failure, Some("protocol_mismatch"));
}

#[tokio::test]
async fn error_response_is_an_engine_error() {
    let (channel, mut port) = pair();
    let (mut correlator, records) = recorded(Correlator::new(channel, CorrelatorOpts::default()));

    let (result, ()) = tokio::join!(
        correlator.call(Command::SetImage(vec![0xff, 0xd8])),
        answer_with(&mut port, |req| {
            Response::failure(req.id, CommandKind::SetImage, "truncated jpeg")
        })
    );
    let err = result.unwrap_err();
    assert!(matches!(&err, StripesError::Engine(msg) if msg == "truncated jpeg"));
    assert_eq!(records.borrow()[0].failure, Some("engine"));
}

#[tokio::test]
async fn transport_error_rejects_the_call() {
    let (channel, mut port) = pair();
    let (mut correlator, records) = recorded(Correlator::new(channel, CorrelatorOpts::default()));

    let responder = async {
        port.recv().await.unwrap();
        port.post(WorkerEvent::MessageError("could not deserialize".to_owned()));
    };
    let (result, ()) = tokio::join!(correlator.call(Command::Ping), responder);
    assert!(matches!(
        result.unwrap_err(),
        StripesError::Transport(r) if r == "could not deserialize"
    ));
    assert_eq!(records.borrow().len(), 1);
}

#[tokio::test]
async fn fault_rejects_this_and_every_later_call() {
    let (channel, mut port) = pair();
    let (mut correlator, records) = recorded(Correlator::new(channel, CorrelatorOpts::default()));

    let responder = async {
        port.recv().await.unwrap();
        port.post(WorkerEvent::Error("worker panicked: boom".to_owned()));
    };
    let (result, ()) = tokio::join!(correlator.call(draw()), responder);
    assert!(matches!(result.unwrap_err(), StripesError::ChannelFault(_)));

    let err = correlator.call(Command::Ping).await.unwrap_err();
    assert!(matches!(err, StripesError::ChannelFault(r) if r.contains("boom")));

    let records = records.borrow();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.failure == Some("channel_fault")));
}

#[tokio::test(start_paused = true)]
async fn timed_out_call_ignores_its_late_response() {
    let (channel, mut port) = pair();
    let opts = CorrelatorOpts {
        call_timeout: Some(Duration::from_millis(50)),
    };
    let (mut correlator, records) = recorded(Correlator::new(channel, opts));

    let err = correlator.call(draw()).await.unwrap_err();
    assert!(matches!(err, StripesError::Timeout(_)));
    assert_eq!(records.borrow()[0].failure, Some("timeout"));

    // The worker finally answers the first call, then the second one.
    let late = decode_request(port.try_recv().unwrap()).unwrap();
    assert_eq!(late.id, 1);
    port.respond(Response::success(
        1,
        CommandKind::DrawImage,
        ResponsePayload::Image(vec![1]),
    ))
    .unwrap();

    let (result, ()) = tokio::join!(
        correlator.call(Command::SetImage(vec![5, 5])),
        answer_with(&mut port, |req| {
            assert_eq!(req.id, 2);
            Response::success(req.id, CommandKind::SetImage, ResponsePayload::Empty)
        })
    );
    assert_eq!(result.unwrap(), ResponsePayload::Empty);
    assert_eq!(records.borrow().len(), 2);
}
