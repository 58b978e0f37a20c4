//! Session manager scenarios driven through the in-memory devices and transport.

use std::sync::Arc;
use std::time::Duration;

use livepilot::settings::{CONVERSATION_INSTRUCTION, MOUSE_CONTROL_INSTRUCTION};
use livepilot::testing::{MockDevices, MockModel, Outbound};
use livepilot::{
    Action, CaptureError, ConnectOptions, Direction, FacingMode, LiveError, LiveEvent,
    LiveSessionManager, LiveSettings, MOUSE_CONTROL_TOOL, ManagerOptions, SessionStatus, Shortcut,
    TranscriptRole,
};
use livepilot_realtime::{
    AudioChunk, AudioFormat, FunctionCall, Modality, RealtimeError, ServerEvent,
};
use serde_json::json;
use tokio::sync::broadcast;

struct Harness {
    manager: LiveSessionManager,
    model: Arc<MockModel>,
    devices: Arc<MockDevices>,
}

fn harness() -> Harness {
    harness_with(LiveSettings::default(), ManagerOptions::default())
}

fn harness_with(settings: LiveSettings, options: ManagerOptions) -> Harness {
    let model = Arc::new(MockModel::new());
    let devices = Arc::new(MockDevices::new());
    let manager = LiveSessionManager::builder()
        .model(model.clone())
        .devices(devices.clone())
        .settings(settings)
        .options(options)
        .build()
        .unwrap();
    Harness { manager, model, devices }
}

async fn connected(settings: LiveSettings) -> Harness {
    let h = harness_with(settings, ManagerOptions::default());
    h.manager.connect(ConnectOptions::new()).await.unwrap();
    assert_eq!(h.manager.status().status, SessionStatus::Connected);
    h
}

/// Poll `cond` while letting spawned tasks run.
async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn drain(events: &mut broadcast::Receiver<LiveEvent>) -> Vec<LiveEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn audio_event(seconds: f64) -> ServerEvent {
    let samples = vec![0i16; (seconds * 24_000.0) as usize];
    ServerEvent::Audio {
        mime_type: "audio/pcm;rate=24000".into(),
        data: AudioChunk::from_i16_samples(&samples, AudioFormat::pcm16_24khz()).to_base64(),
    }
}

fn text(text: &str) -> ServerEvent {
    ServerEvent::Text { text: text.to_string() }
}

#[tokio::test(start_paused = true)]
async fn test_connect_opens_audio_session_with_control_tool() {
    let h = harness();
    let mut events = h.manager.subscribe_events();
    h.manager.connect(ConnectOptions::new()).await.unwrap();

    assert_eq!(h.manager.status().status, SessionStatus::Connected);
    assert_eq!(h.model.connect_count(), 1);

    let session = h.model.last_session().unwrap();
    let config = session.config();
    assert_eq!(config.instruction.as_deref(), Some(CONVERSATION_INSTRUCTION));
    assert_eq!(config.voice.as_deref(), Some("Puck"));
    assert_eq!(config.modalities, Some(vec![Modality::Audio]));
    assert!(config.input_transcription && config.output_transcription);
    let tools = config.tools.as_ref().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, MOUSE_CONTROL_TOOL);

    assert_eq!(h.devices.input().resume_count(), 1);
    assert_eq!(h.devices.output().resume_count(), 1);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [LiveEvent::SessionOpened { mouse_mode: false, .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_noop_without_audio_capture() {
    let model = Arc::new(MockModel::new());
    let manager = LiveSessionManager::builder()
        .model(model.clone())
        .devices(Arc::new(MockDevices::new().without_audio()))
        .build()
        .unwrap();

    manager.connect(ConnectOptions::new()).await.unwrap();
    assert_eq!(manager.status().status, SessionStatus::Idle);
    assert_eq!(model.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_overrides_mode_and_instruction() {
    let h = harness();
    h.manager
        .connect(ConnectOptions::new().with_mouse_mode(true).with_instruction("Pilot, take over."))
        .await
        .unwrap();

    let session = h.model.last_session().unwrap();
    assert_eq!(session.config().instruction.as_deref(), Some("Pilot, take over."));
    assert!(h.manager.status().mouse_mode);
    assert!(h.manager.settings().mouse_mode);
}

#[tokio::test(start_paused = true)]
async fn test_microphone_frames_are_sent_and_flag_speech() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    // Half a frame is buffered, not sent.
    assert!(h.devices.push_microphone(vec![0.5; 2048]));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.sent_media().is_empty());

    assert!(h.devices.push_microphone(vec![0.5; 2048]));
    eventually(|| session.sent_media().len() == 1).await;
    assert!(h.manager.status().user_talking);

    let frame = &session.sent_media()[0];
    assert_eq!(frame.mime_type, "audio/pcm;rate=16000");
    assert_eq!(livepilot_realtime::audio::decode(&frame.data).unwrap().len(), 4096 * 2);

    assert!(h.devices.push_microphone(vec![0.001; 4096]));
    eventually(|| session.sent_media().len() == 2).await;
    assert!(!h.manager.status().user_talking);
}

#[tokio::test(start_paused = true)]
async fn test_muted_frames_are_neither_sent_nor_counted() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    assert!(h.manager.toggle_mute());
    assert!(h.manager.status().muted);
    assert!(h.devices.push_microphone(vec![0.8; 4096]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.sent_media().is_empty());
    assert!(!h.manager.status().user_talking);

    assert!(!h.manager.toggle_mute());
    assert!(h.devices.push_microphone(vec![0.8; 4096]));
    eventually(|| session.sent_media().len() == 1).await;
    assert!(h.manager.status().user_talking);
}

#[tokio::test(start_paused = true)]
async fn test_response_audio_plays_back_to_back() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let output = h.devices.output();

    session.push(audio_event(0.5));
    session.push(audio_event(0.25));
    eventually(|| output.scheduled().len() == 2).await;

    let scheduled = output.scheduled();
    assert_eq!(scheduled[0].start_at, 0.0);
    assert_eq!(scheduled[1].start_at, 0.5);
    assert!(h.manager.status().model_talking);

    output.advance(1.0);
    assert!(!h.manager.status().model_talking);
}

#[tokio::test(start_paused = true)]
async fn test_interruption_stops_all_queued_audio() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let output = h.devices.output();

    for _ in 0..3 {
        session.push(audio_event(1.0));
    }
    eventually(|| output.scheduled().len() == 3).await;
    assert!(h.manager.status().model_talking);

    output.advance(0.2);
    session.push(ServerEvent::Interrupted);
    eventually(|| !h.manager.status().model_talking).await;
    assert!(output.scheduled().iter().all(|s| s.stopped));

    // The timeline was rewound: the next chunk starts now, not after the flushed ones.
    session.push(audio_event(0.5));
    eventually(|| output.scheduled().len() == 4).await;
    assert_eq!(output.scheduled()[3].start_at, output.now());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_audio_is_skipped() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let output = h.devices.output();

    session.push(ServerEvent::Audio { mime_type: "audio/pcm;rate=24000".into(), data: "AAA".into() });
    session.push(ServerEvent::Audio { mime_type: "audio/pcm;rate=24000".into(), data: "AAAA".into() });
    session.push(audio_event(0.1));
    eventually(|| output.scheduled().len() == 1).await;
    assert_eq!(h.manager.status().status, SessionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_tool_call_is_acknowledged_before_restart() {
    let h = connected(LiveSettings::default()).await;
    let first = h.model.last_session().unwrap();

    first.push(ServerEvent::ToolCall {
        calls: vec![FunctionCall::new("call-1", MOUSE_CONTROL_TOOL, json!({ "enabled": true }))],
    });
    eventually(|| h.model.connect_count() == 2).await;
    eventually(|| h.manager.status().status == SessionStatus::Connected).await;

    let sent = first.sent();
    let ack = sent.iter().position(|o| matches!(o, Outbound::ToolResponse(_))).unwrap();
    let close = sent.iter().position(|o| matches!(o, Outbound::Close)).unwrap();
    assert!(ack < close);

    let response = &first.tool_responses()[0];
    assert_eq!(response.call_id, "call-1");
    assert_eq!(response.name, MOUSE_CONTROL_TOOL);
    assert_eq!(response.output["status"], "success");

    let second = h.model.last_session().unwrap();
    assert_eq!(second.config().instruction.as_deref(), Some(MOUSE_CONTROL_INSTRUCTION));
    assert!(h.manager.status().mouse_mode);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool_gets_error_ack_without_restart() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    session.push(ServerEvent::ToolCall {
        calls: vec![FunctionCall::new("call-7", "open_pod_bay_doors", json!({}))],
    });
    eventually(|| session.tool_responses().len() == 1).await;
    assert_eq!(session.tool_responses()[0].output["status"], "error");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.model.connect_count(), 1);
    assert!(!session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_switch_mode_restarts_after_settle_delay() {
    let h = connected(LiveSettings::default().with_mouse_mode(true)).await;
    let first = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    first.push(text(r#"{"action":"left_click","direction":"","value":0,"application":""}"#));
    eventually(|| h.manager.status().command.is_some()).await;

    let started = tokio::time::Instant::now();
    h.manager.switch_mode(false).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));

    assert!(first.is_closed());
    assert_eq!(h.model.connect_count(), 2);
    let second = h.model.last_session().unwrap();
    assert_eq!(second.config().instruction.as_deref(), Some(CONVERSATION_INSTRUCTION));

    let status = h.manager.status();
    assert_eq!(status.status, SessionStatus::Connected);
    assert!(!status.mouse_mode);
    assert!(status.command.is_none());

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, LiveEvent::ModeChanged { mouse_mode: false })));
    assert!(events.iter().any(|e| matches!(e, LiveEvent::CommandExpired { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_switch_mode_while_idle_only_updates_settings() {
    let h = harness();
    h.manager.switch_mode(true).await.unwrap();
    assert_eq!(h.model.connect_count(), 0);
    assert!(h.manager.settings().mouse_mode);
    assert_eq!(h.manager.settings().instruction, MOUSE_CONTROL_INSTRUCTION);
}

#[tokio::test(start_paused = true)]
async fn test_commands_ignored_in_conversation_mode() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    session.push(text(r#"{"action":"move","direction":"left","value":10,"application":""}"#));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.manager.status().command.is_none());
    assert!(matches!(drain(&mut events).as_slice(), [LiveEvent::ModelText { .. }]));
}

#[tokio::test(start_paused = true)]
async fn test_command_parsed_from_output_transcription() {
    let h = connected(LiveSettings::default().with_mouse_mode(true)).await;
    let session = h.model.last_session().unwrap();

    session.push(ServerEvent::OutputTranscription { text: r#"{"action": "scroll", "#.into() });
    session.push(ServerEvent::OutputTranscription { text: r#""direction": "down", "value": 3}"#.into() });
    eventually(|| h.manager.status().command.is_some()).await;

    let command = h.manager.status().command.unwrap();
    assert_eq!(command.action, Action::Scroll);
    assert_eq!(command.direction, Some(Direction::Down));
    assert_eq!(command.value, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_prose_around_json_text_is_not_a_command() {
    let h = connected(LiveSettings::default().with_mouse_mode(true)).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    session.push(text(r#"Okay, clicking now. {"action":"left_click"}"#));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.manager.status().command.is_none());
    assert!(matches!(drain(&mut events).as_slice(), [LiveEvent::ModelText { .. }]));
}

#[tokio::test(start_paused = true)]
async fn test_command_in_text_and_transcript_is_published_once_per_turn() {
    let h = connected(LiveSettings::default().with_mouse_mode(true)).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();
    let payload = r#"{"action":"scroll","direction":"down","value":3,"application":""}"#;
    let issued = |events: &[LiveEvent]| {
        events.iter().filter(|e| matches!(e, LiveEvent::CommandIssued { .. })).count()
    };

    session.push(text(payload));
    session.push(ServerEvent::OutputTranscription { text: payload.into() });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(issued(&drain(&mut events)), 1);

    // A new turn may repeat the same command.
    session.push(ServerEvent::TurnComplete);
    session.push(text(payload));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(issued(&drain(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_command_expires_after_display_window() {
    let h = connected(LiveSettings::default().with_mouse_mode(true)).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    session.push(text(r#"{"action":"open","application":"Calculator"}"#));
    eventually(|| h.manager.status().command.is_some()).await;

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert!(h.manager.status().command.is_none());

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        LiveEvent::CommandIssued { command } if command.application == "Calculator"
    )));
    assert!(events.iter().any(|e| matches!(e, LiveEvent::CommandExpired { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_transcripts_are_published() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    session.push(ServerEvent::InputTranscription { text: "hello".into() });
    session.push(ServerEvent::OutputTranscription { text: "hi there".into() });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transcripts: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            LiveEvent::Transcript { role, text } => Some((role, text)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transcripts,
        vec![(TranscriptRole::User, "hello".to_string()), (TranscriptRole::Model, "hi there".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rapid_camera_toggle_discards_stale_stream() {
    let h = connected(LiveSettings::default()).await;
    h.devices.queue_video_delay(Duration::from_millis(300));

    let enabling = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.set_camera(true).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.manager.set_camera(false).await.unwrap();
    enabling.await.unwrap().unwrap();

    let sources = h.devices.video_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].is_stopped());
    assert!(!h.manager.status().camera_active);
    assert!(!h.manager.settings().camera_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_camera_frames_are_sampled_once_per_second() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    h.manager.set_camera(true).await.unwrap();
    assert!(h.manager.status().camera_active);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let stills: Vec<_> =
        session.sent_media().into_iter().filter(|m| m.mime_type == "image/jpeg").collect();
    assert_eq!(stills.len(), 3);

    let bytes = livepilot_realtime::audio::decode(&stills[0].data).unwrap();
    let frame = image::load_from_memory(&bytes).unwrap();
    assert_eq!((frame.width(), frame.height()), (640, 480));
}

#[tokio::test(start_paused = true)]
async fn test_camera_and_screen_are_exclusive() {
    let h = connected(LiveSettings::default()).await;

    h.manager.set_camera(true).await.unwrap();
    h.manager.set_screen(true).await.unwrap();

    let status = h.manager.status();
    assert!(status.screen_active);
    assert!(!status.camera_active);
    let sources = h.devices.video_sources();
    assert!(sources[0].is_stopped());
    assert!(!sources[1].is_stopped());
    assert_eq!(sources[1].facing(), None);

    h.manager.set_screen(false).await.unwrap();
    assert!(sources[1].is_stopped());
    assert!(!h.manager.status().screen_active);
}

#[tokio::test(start_paused = true)]
async fn test_flip_camera_reacquires_with_new_facing() {
    let h = connected(LiveSettings::default()).await;
    h.manager.set_camera(true).await.unwrap();

    assert_eq!(h.manager.flip_camera().await.unwrap(), FacingMode::Environment);

    let sources = h.devices.video_sources();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].is_stopped());
    assert_eq!(sources[1].facing(), Some(FacingMode::Environment));
    assert!(h.manager.status().camera_active);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flip_keeps_current_camera() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    h.manager.set_camera(true).await.unwrap();

    h.devices.fail_video(CaptureError::permission_denied("rear camera"));
    let result = h.manager.flip_camera().await;
    assert!(matches!(result, Err(LiveError::Capture(CaptureError::PermissionDenied(_)))));

    let settings = h.manager.settings();
    assert!(settings.camera_enabled);
    assert_eq!(settings.facing, FacingMode::User);
    assert!(h.manager.status().camera_active);
    let sources = h.devices.video_sources();
    assert_eq!(sources.len(), 1);
    assert!(!sources[0].is_stopped());

    // Still sampling the attached camera.
    let stills = || session.sent_media().iter().filter(|m| m.mime_type == "image/jpeg").count();
    let before = stills();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(stills() >= before + 2);

    // A later flip still works.
    assert_eq!(h.manager.flip_camera().await.unwrap(), FacingMode::Environment);
    assert!(h.devices.video_sources()[0].is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_video_ending_out_of_band_resets_flags() {
    let h = connected(LiveSettings::default()).await;
    let mut events = h.manager.subscribe_events();
    h.manager.set_camera(true).await.unwrap();

    h.devices.video_sources()[0].end();
    eventually(|| !h.manager.status().camera_active).await;
    assert!(!h.manager.settings().camera_enabled);
    assert_eq!(h.manager.status().status, SessionStatus::Connected);
    assert!(drain(&mut events).iter().any(|e| matches!(e, LiveEvent::VisualStopped { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_keeps_session_open() {
    let h = connected(LiveSettings::default()).await;
    h.devices.fail_video(CaptureError::permission_denied("camera"));

    let result = h.manager.set_camera(true).await;
    assert!(matches!(result, Err(LiveError::Capture(CaptureError::PermissionDenied(_)))));
    assert!(!h.manager.settings().camera_enabled);
    assert_eq!(h.manager.status().status, SessionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_mode_switch_resumes_visual_capture() {
    let h = connected(LiveSettings::default()).await;
    h.manager.set_camera(true).await.unwrap();

    h.manager.switch_mode(true).await.unwrap();

    let sources = h.devices.video_sources();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].is_stopped());
    assert!(!sources[1].is_stopped());
    assert!(h.manager.status().camera_active);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();
    h.manager.set_camera(true).await.unwrap();

    h.manager.disconnect().await;
    h.manager.disconnect().await;

    assert_eq!(session.close_calls(), 1);
    assert_eq!(h.devices.microphone_tracks()[0].stop_count(), 1);
    assert!(h.devices.video_sources()[0].is_stopped());

    let status = h.manager.status();
    assert_eq!(status.status, SessionStatus::Idle);
    assert!(!status.camera_active && !status.user_talking && !status.model_talking);

    let closed = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, LiveEvent::SessionClosed { .. }))
        .count();
    assert_eq!(closed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_microphone_ending_closes_session() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();
    let mut events = h.manager.subscribe_events();

    h.devices.end_microphone();
    eventually(|| h.manager.status().status == SessionStatus::Idle).await;

    assert!(session.is_closed());
    assert!(drain(&mut events).iter().any(|e| matches!(e, LiveEvent::SessionClosed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_service_close_tears_down() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    session.push(audio_event(1.0));
    eventually(|| h.devices.output().scheduled().len() == 1).await;
    session.close_from_service();

    eventually(|| h.manager.status().status == SessionStatus::Idle).await;
    assert!(h.devices.microphone_tracks()[0].is_stopped());
    assert!(h.devices.output().scheduled()[0].stopped);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors() {
    let h = connected(LiveSettings::default()).await;
    let session = h.model.last_session().unwrap();

    session.push_error(RealtimeError::MessageError("bad json".into()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.manager.status().status, SessionStatus::Connected);

    session.push_error(RealtimeError::transport("connection reset"));
    eventually(|| h.manager.status().status == SessionStatus::Idle).await;
}

#[tokio::test(start_paused = true)]
async fn test_audio_contexts_are_created_once() {
    let h = connected(LiveSettings::default()).await;
    h.manager.disconnect().await;
    h.manager.connect(ConnectOptions::new()).await.unwrap();

    assert_eq!(h.devices.context_creations(), (1, 1));
    assert_eq!(h.devices.input().resume_count(), 2);
    assert_eq!(h.model.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_connect_discards_session() {
    let h = harness();
    h.model.set_connect_delay(Duration::from_secs(1));

    let connecting = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.connect(ConnectOptions::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.manager.status().status, SessionStatus::Connecting);

    h.manager.disconnect().await;
    connecting.await.unwrap().unwrap();

    assert_eq!(h.manager.status().status, SessionStatus::Idle);
    assert!(h.model.last_session().unwrap().is_closed());
    assert!(h.devices.microphone_tracks()[0].is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_returns_to_idle() {
    let h = harness();
    h.model.fail_next_connect(RealtimeError::connection("refused"));

    let result = h.manager.connect(ConnectOptions::new()).await;
    assert!(matches!(result, Err(LiveError::Realtime(RealtimeError::ConnectionError(_)))));
    assert_eq!(h.manager.status().status, SessionStatus::Idle);
    assert!(h.devices.microphone_tracks()[0].is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_microphone_denied_fails_connect() {
    let h = harness();
    h.devices.fail_microphone(CaptureError::permission_denied("microphone"));

    let result = h.manager.connect(ConnectOptions::new()).await;
    assert!(matches!(result, Err(LiveError::Capture(CaptureError::PermissionDenied(_)))));
    assert_eq!(h.manager.status().status, SessionStatus::Idle);
    assert_eq!(h.model.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out() {
    let options = ManagerOptions { connect_timeout: Duration::from_secs(1), ..Default::default() };
    let h = harness_with(LiveSettings::default(), options);
    h.model.set_connect_delay(Duration::from_secs(5));

    let result = h.manager.connect(ConnectOptions::new()).await;
    assert!(matches!(result, Err(LiveError::Realtime(RealtimeError::Timeout(_)))));
    assert_eq!(h.manager.status().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_keyboard_shortcuts() {
    let h = harness();

    h.manager.handle_shortcut(Shortcut::from_key("Escape").unwrap()).await.unwrap();
    assert_eq!(h.model.connect_count(), 0);

    h.manager.handle_shortcut(Shortcut::from_key("Enter").unwrap()).await.unwrap();
    assert_eq!(h.manager.status().status, SessionStatus::Connected);

    h.manager.handle_shortcut(Shortcut::from_key("m").unwrap()).await.unwrap();
    assert!(h.manager.status().muted);

    h.manager.handle_shortcut(Shortcut::from_key("Escape").unwrap()).await.unwrap();
    assert_eq!(h.manager.status().status, SessionStatus::Idle);

    h.manager.handle_shortcut(Shortcut::from_key("Enter").unwrap()).await.unwrap();
    h.manager.handle_shortcut(Shortcut::from_key("Enter").unwrap()).await.unwrap();
    assert_eq!(h.manager.status().status, SessionStatus::Idle);
    assert_eq!(h.model.connect_count(), 2);
}

#[tokio::test]
async fn test_builder_requires_model_and_devices() {
    let result = LiveSessionManager::builder().devices(Arc::new(MockDevices::new())).build();
    assert!(matches!(result, Err(LiveError::Config(_))));

    let result = LiveSessionManager::builder().model(Arc::new(MockModel::new())).build();
    assert!(matches!(result, Err(LiveError::Config(_))));
}
