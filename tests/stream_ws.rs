use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tungstenite::{Message, WebSocket};

use maskwatch::frame::FrameMessage;
use maskwatch::ingest::{SyntheticConfig, SyntheticSource};
use maskwatch::overlay::{OverlayRenderer, OverlayStyle, OverlayView, Size};
use maskwatch::stream::{ConnectionState, ReconnectPolicy, SessionSettings, StreamSession, WsTransport};

const REPLY: &str = r#"{"predictions":[{"bbox":[0.1,0.2,0.4,0.6],"label":"with_mask","confidence":0.91}]}"#;

fn accept(listener: &TcpListener) -> WebSocket<TcpStream> {
    let (stream, _) = listener.accept().expect("accept");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("server read timeout");
    tungstenite::accept(stream).expect("websocket handshake")
}

/// Reads until the peer goes away.
fn drain(mut ws: WebSocket<TcpStream>) {
    while ws.read().is_ok() {}
}

/// Answers the first frame with `REPLY`; returns that frame.
fn answer_first_frame(mut ws: WebSocket<TcpStream>) -> String {
    let frame = loop {
        match ws.read().expect("read frame") {
            Message::Text(text) => break text,
            _ => continue,
        }
    };
    ws.send(Message::Text(REPLY.to_string())).expect("send reply");
    drain(ws);
    frame
}

fn live_session(port: u16) -> StreamSession {
    let settings = SessionSettings {
        endpoint: format!("ws://127.0.0.1:{}/ws", port),
        frame_interval: Duration::from_millis(20),
        jpeg_quality: 60,
        reconnect: ReconnectPolicy::Fixed {
            delay: Duration::from_millis(50),
        },
        max_frames: None,
    };
    let source = SyntheticSource::new(SyntheticConfig {
        name: "stub://ws-test".to_string(),
        width: 48,
        height: 32,
        warmup_polls: 0,
    });
    let overlay = OverlayView::new(OverlayStyle::live(), OverlayRenderer::new(None), Size::new(96, 64));
    StreamSession::new(
        settings,
        Box::new(source),
        Box::new(WsTransport::new(Duration::from_millis(10))),
        overlay,
    )
}

fn step_until(session: &mut StreamSession, mut done: impl FnMut(&StreamSession) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(session) {
        assert!(Instant::now() < deadline, "timed out; status {:?}", session.status());
        session.step(Instant::now());
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn frames_go_out_and_detections_come_back() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server: JoinHandle<String> = thread::spawn(move || answer_first_frame(accept(&listener)));

    let mut session = live_session(port);
    session.mount(Instant::now()).expect("mount");
    assert_eq!(session.state(), ConnectionState::Open);

    step_until(&mut session, |s| !s.detections().is_empty());
    assert_eq!(session.stats().get("with_mask"), 1);

    let boxes = session.overlay_mut().render().to_vec();
    assert_eq!(boxes.len(), 1);
    // Normalized box mapped through the 48x32 frame onto the 96x64 display.
    assert!((boxes[0].rect.x - 9.6).abs() < 1e-6);
    assert!((boxes[0].rect.y - 12.8).abs() < 1e-6);

    session.teardown();
    let frame = server.join().expect("server thread");
    let message: FrameMessage = serde_json::from_str(&frame).expect("frame message");
    assert!(message.image.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn reconnects_after_the_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let mut first = accept(&listener);
        first.close(None).expect("close");
        drain(first);
        answer_first_frame(accept(&listener))
    });

    let mut session = live_session(port);
    session.mount(Instant::now()).expect("mount");

    step_until(&mut session, |s| s.state() == ConnectionState::Closed);
    assert!(!session.status().connected);
    assert!(session.status().banner.is_some());

    step_until(&mut session, |s| !s.detections().is_empty());
    assert!(session.status().connected);
    assert_eq!(session.status().failures, 0);

    session.teardown();
    server.join().expect("server thread");
}
