use std::io::Cursor;

use super::*;
use crate::engine::passthrough::PassthroughInit;
use crate::foundation::error::StripesError;
use crate::foundation::params::RenderParameters;
use crate::protocol::command::CommandKind;
use crate::schedule::present::{RetainingPresenter, SharedParameters};

type Session = EditorSession<SharedParameters, RetainingPresenter>;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn font() -> Vec<u8> {
    vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x0c]
}

fn opts(name: &str) -> SessionOpts {
    SessionOpts {
        worker: WorkerOpts {
            thread_name: name.to_owned(),
        },
        ..SessionOpts::default()
    }
}

async fn start(params: &SharedParameters, name: &str) -> Session {
    let started = EditorSession::start(
        PassthroughInit,
        params.clone(),
        RetainingPresenter::default(),
        font(),
        png(4, 4),
        opts(name),
    )
    .await;
    match started {
        Ok(session) => session,
        Err(err) => panic!("session failed to start: {err}"),
    }
}

fn kinds(session: &Session) -> Vec<CommandKind> {
    session.calls().iter().map(|c| c.command).collect()
}

fn latest_dimensions(session: &Session) -> (u32, u32) {
    let presenter = session.scheduler().presenter();
    let bytes = &presenter.latest().unwrap().bytes;
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

#[tokio::test]
async fn startup_pings_uploads_and_renders() {
    let params = SharedParameters::new(RenderParameters::default());
    let session = start(&params, "session-startup").await;

    assert_eq!(
        kinds(&session),
        vec![
            CommandKind::Ping,
            CommandKind::SetFont,
            CommandKind::SetImage,
            CommandKind::DrawImage
        ]
    );
    assert!(session.calls().iter().all(|c| c.failure.is_none()));
    assert_eq!(session.scheduler().presenter().presented(), 1);
    assert_eq!(latest_dimensions(&session), (4, 4));

    session.shutdown().unwrap();
}

#[tokio::test]
async fn edits_render_only_when_parameters_change() {
    let params = SharedParameters::new(RenderParameters::default());
    let session = start(&params, "session-edits").await;

    assert_eq!(session.edited().await.unwrap(), RenderOutcome::Unchanged);
    params.update(|p| p.text_top = "lofi".to_owned());
    assert_eq!(session.edited().await.unwrap(), RenderOutcome::Rendered);
    assert_eq!(session.resized().await.unwrap(), RenderOutcome::Rendered);

    let stats = session.scheduler().stats();
    assert_eq!((stats.rendered, stats.unchanged), (3, 1));
    session.shutdown().unwrap();
}

#[tokio::test]
async fn replacing_the_image_renders_it() {
    let params = SharedParameters::new(RenderParameters::default());
    let session = start(&params, "session-replace").await;

    let outcome = session.replace_image(png(7, 3)).await.unwrap();
    assert_eq!(outcome, RenderOutcome::Rendered);
    assert_eq!(latest_dimensions(&session), (7, 3));

    assert_eq!(
        session.replace_font(b"wOF2....".to_vec()).await.unwrap(),
        RenderOutcome::Rendered
    );

    let err = session.replace_image(b"garbage".to_vec()).await.unwrap_err();
    assert!(matches!(err, StripesError::Engine(_)));
    assert_eq!(latest_dimensions(&session), (7, 3));
    session.shutdown().unwrap();
}

#[tokio::test]
async fn unusable_font_aborts_startup() {
    let started = EditorSession::start(
        PassthroughInit,
        SharedParameters::default(),
        RetainingPresenter::default(),
        b"<!doctype html>".to_vec(),
        png(2, 2),
        opts("session-bad-font"),
    )
    .await;
    let Err(err) = started else {
        panic!("startup should fail on an unusable font");
    };
    assert!(matches!(&err, StripesError::Engine(msg) if msg.contains("font data")));
}

#[tokio::test]
async fn failed_first_render_keeps_the_session() {
    let params = SharedParameters::new(RenderParameters {
        font_size: 0,
        ..RenderParameters::default()
    });
    let session = start(&params, "session-first-render").await;

    let presenter = session.scheduler().presenter();
    assert_eq!(presenter.presented(), 0);
    assert_eq!(presenter.failures().len(), 1);
    assert!(presenter.failures()[0].contains("fontSize"));
    drop(presenter);

    params.update(|p| p.font_size = 32);
    assert_eq!(session.edited().await.unwrap(), RenderOutcome::Rendered);
    session.shutdown().unwrap();
}
