use super::*;
use crate::config::CameraConfig;
use crate::error::{CameraError, PosecamError};
use crate::events::{EventBus, PosecamEvent};
use crate::frame::LensFacing;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn create_test_camera_config() -> CameraConfig {
    CameraConfig {
        resolution: (64, 48),
        fps: 50,
        facing: LensFacing::Back,
        rotation_degrees: 90,
        jpeg_quality: 80,
    }
}

fn controller() -> (CameraController, Arc<SyntheticCamera>, EventBus) {
    let camera = Arc::new(SyntheticCamera::new(create_test_camera_config()));
    let event_bus = EventBus::new(16);
    let controller = CameraController::new(camera.clone(), event_bus.clone());
    (controller, camera, event_bus)
}

#[tokio::test]
async fn test_synthetic_camera_streams_frames_after_bind() {
    let camera = SyntheticCamera::new(create_test_camera_config());
    let mut frames = camera.frames();
    assert!(frames.borrow().is_none());

    camera.bind(LensFacing::Front).await.unwrap();
    timeout(Duration::from_secs(1), frames.changed())
        .await
        .unwrap()
        .unwrap();

    let frame = frames.borrow().clone().unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));
    assert_eq!(frame.rotation_degrees, 90);
    assert_eq!(frame.facing, LensFacing::Front);
    assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);

    camera.unbind().await.unwrap();
    assert!(!camera.is_bound());
}

#[tokio::test]
async fn test_double_bind_is_rejected() {
    let camera = SyntheticCamera::new(create_test_camera_config());
    camera.bind(LensFacing::Back).await.unwrap();

    match camera.bind(LensFacing::Front).await {
        Err(CameraError::Bind { .. }) => {}
        other => panic!("expected bind error, got {:?}", other),
    }
    assert_eq!(camera.facing(), Some(LensFacing::Back));
}

#[tokio::test]
async fn test_still_capture_requires_binding() {
    let camera = SyntheticCamera::new(create_test_camera_config());
    assert!(matches!(
        camera.capture_still().await,
        Err(CameraError::NotBound)
    ));

    camera.bind(LensFacing::Back).await.unwrap();
    let still = camera.capture_still().await.unwrap();
    assert_eq!(still.facing, LensFacing::Back);
    assert_eq!(&still.jpeg[..2], &[0xFF, 0xD8]);

    camera.set_fail_stills(true);
    assert!(matches!(
        camera.capture_still().await,
        Err(CameraError::StillCapture { .. })
    ));
}

#[tokio::test]
async fn test_switch_facing_rebinds_and_invalidates_tracker() {
    let (controller, camera, event_bus) = controller();
    let mut events = event_bus.subscribe();

    controller.start(LensFacing::Back).await.unwrap();
    let _ = events.recv().await.unwrap();

    // Prime the tracker so the invalidation is observable
    let mut frames = controller.frames();
    timeout(Duration::from_secs(1), frames.changed())
        .await
        .unwrap()
        .unwrap();
    let frame = frames.borrow().clone().unwrap();
    controller.tracker().lock().resolve(&frame).unwrap();
    assert!(!controller.tracker().lock().is_dirty());

    controller.switch_facing(LensFacing::Front).await.unwrap();
    assert_eq!(controller.facing(), Some(LensFacing::Front));
    assert!(controller.tracker().lock().is_dirty());
    assert_eq!(camera.bind_count(), 2);

    match events.recv().await.unwrap() {
        PosecamEvent::CameraRebound { facing, .. } => assert_eq!(facing, LensFacing::Front),
        other => panic!("unexpected event {:?}", other),
    }

    // Same lens again is a no-op
    controller.switch_facing(LensFacing::Front).await.unwrap();
    assert_eq!(camera.bind_count(), 2);
}

#[tokio::test]
async fn test_concurrent_switches_never_double_bind() {
    let (controller, camera, _event_bus) = controller();
    let controller = Arc::new(controller);
    controller.start(LensFacing::Back).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move { controller.toggle_facing().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Eight toggles from Back land on Back again
    assert_eq!(controller.facing(), Some(LensFacing::Back));
    assert_eq!(camera.bind_count(), 9);
}

#[tokio::test]
async fn test_stop_releases_camera() {
    let (controller, _camera, _event_bus) = controller();
    controller.start(LensFacing::Back).await.unwrap();
    controller.stop().await.unwrap();

    match controller.capture_still().await {
        Err(CameraError::NotBound) => {}
        other => panic!("expected not bound, got {:?}", other.map(|s| s.width)),
    }
    let err: PosecamError = CameraError::NotBound.into();
    assert!(!err.is_recoverable());
}
