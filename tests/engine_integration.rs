/*
 *  tests/engine_integration.rs
 *
 *  Integration tests for the coordination engine
 *
 *  EPaperD - e-paper panel supervisor
 *  (c) 2020-26 Stuart Hunter
 */

use std::time::Duration;

use epaperd::display::{Canvas, MockPanel, PanelOp, RefreshMode, WHITE_FILL};
use epaperd::engine::{Engine, EngineError, LoopStatus, RenderOutcome, ScreenPhase, Timing};
use epaperd::touch::{MockTouch, PinLevel, SwipeDirection, TouchScan};

async fn start_with(timing: Timing) -> (Engine, MockPanel, MockTouch) {
    let panel = MockPanel::new();
    let touch = MockTouch::new();
    let engine = Engine::start(panel.clone(), touch.clone(), timing)
        .await
        .expect("engine starts on mock hardware");
    (engine, panel, touch)
}

async fn start() -> (Engine, MockPanel, MockTouch) {
    start_with(Timing::default()).await
}

fn bitmap(engine: &Engine, fill: u8) -> Vec<u8> {
    let window = engine.get_window();
    vec![fill; Canvas::packed_len(window.width, window.height)]
}

#[tokio::test(start_paused = true)]
async fn test_thirty_first_render_is_full() {
    let (engine, panel, _touch) = start().await;

    for i in 0..30u8 {
        let outcome = engine.render(bitmap(&engine, i)).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Partial, "render {}", i + 1);
    }
    assert_eq!(engine.status().await.unwrap().partial_refresh_counter, 30);

    let outcome = engine.render(bitmap(&engine, 0xAA)).await.unwrap();
    assert_eq!(outcome, RenderOutcome::Full);
    assert_eq!(engine.status().await.unwrap().partial_refresh_counter, 0);

    {
        let state = panel.state();
        let state = state.lock().unwrap();
        assert_eq!(state.partial_count, 30);
        // base image at startup plus the budget reset
        assert_eq!(state.full_count, 2);
        assert_eq!(state.init_count(RefreshMode::Full), 2);
    }
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_screen_goes_to_sleep() {
    let (engine, panel, _touch) = start().await;

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert!(engine.status().await.unwrap().screen_active);

    tokio::time::sleep(Duration::from_secs(25)).await;
    let status = engine.status().await.unwrap();
    assert!(!status.screen_active);
    assert_eq!(status.phase, ScreenPhase::Sleeping);

    {
        let state = panel.state();
        let state = state.lock().unwrap();
        assert!(state.asleep);
        assert_eq!(state.clear_count, 1);
        let tail: Vec<_> = state.ops.iter().rev().take(3).cloned().collect();
        assert_eq!(
            tail,
            vec![PanelOp::Sleep, PanelOp::Clear(WHITE_FILL), PanelOp::Init(RefreshMode::Full)]
        );
    }
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_render_while_asleep_is_dropped() {
    let (engine, panel, _touch) = start().await;
    tokio::time::sleep(Duration::from_secs(125)).await;
    assert!(!engine.status().await.unwrap().screen_active);

    let outcome = engine.render(bitmap(&engine, 0x00)).await.unwrap();
    assert_eq!(outcome, RenderOutcome::Dropped);
    assert_eq!(panel.state().lock().unwrap().partial_count, 0);

    // the canvas still took the new content
    assert_eq!(engine.canvas().await.unwrap().count_ink_pixels(), 250 * 122);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_touch_wakes_sleeping_screen() {
    let (engine, panel, touch) = start().await;
    tokio::time::sleep(Duration::from_secs(125)).await;
    engine.render(bitmap(&engine, 0x0F)).await.unwrap();

    touch.push_scans([TouchScan::single(60, 100)]);
    let report = engine.detect_interaction().await.unwrap();
    assert!(report.is_touching);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(engine.status().await.unwrap().screen_active);

    {
        let state = panel.state();
        let state = state.lock().unwrap();
        assert!(!state.asleep);
        assert_eq!(state.mode, Some(RefreshMode::Partial));
        // the canvas drawn while asleep is what comes back
        let canvas = Canvas::from_packed(250, 122, vec![0x0F; Canvas::packed_len(250, 122)]).unwrap();
        assert_eq!(state.last_buffer, Some(canvas.pack_for_panel(122, 250).unwrap()));
    }
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sleep_then_awaken_restores_canvas() {
    let (engine, panel, _touch) = start().await;
    engine.render(bitmap(&engine, 0x5A)).await.unwrap();
    let shown = panel.state().lock().unwrap().last_buffer.clone();

    engine.sleep().await.unwrap();
    {
        let state = panel.state();
        let state = state.lock().unwrap();
        let clear = state.ops.iter().position(|op| *op == PanelOp::Clear(WHITE_FILL)).unwrap();
        assert_eq!(state.ops.get(clear + 1), Some(&PanelOp::Sleep));
    }

    engine.awaken().await.unwrap();
    let status = engine.status().await.unwrap();
    assert!(status.screen_active);
    assert_eq!(panel.state().lock().unwrap().last_buffer, shown);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_recent_touch_undoes_explicit_sleep() {
    let (engine, panel, _touch) = start().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    engine.sleep().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // last touch (startup) is still inside the timeout window
    assert!(engine.status().await.unwrap().screen_active);
    assert!(!panel.state().lock().unwrap().asleep);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_clear_screen_counts_as_full_refresh() {
    let (engine, panel, _touch) = start().await;
    for _ in 0..3 {
        engine.request_render().await.unwrap();
    }
    assert_eq!(engine.status().await.unwrap().partial_refresh_counter, 3);

    engine.clear_screen().await.unwrap();
    let status = engine.status().await.unwrap();
    assert_eq!(status.partial_refresh_counter, 0);
    assert_eq!(status.secs_since_full_refresh, 0);
    assert!(status.screen_active);
    assert_eq!(panel.state().lock().unwrap().clear_count, 1);

    engine.reset_canvas().await.unwrap();
    assert_eq!(engine.canvas().await.unwrap().count_ink_pixels(), 0);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forced_refresh_keeps_sleeping_panel_asleep() {
    let timing = Timing { max_refresh_interval: Duration::from_secs(300), ..Timing::default() };
    let (engine, panel, _touch) = start_with(timing).await;

    // asleep at ~121s; that clear is the last full refresh
    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(panel.state().lock().unwrap().clear_count, 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    {
        let state = panel.state();
        let state = state.lock().unwrap();
        assert_eq!(state.clear_count, 2);
        assert!(state.asleep);
        assert_eq!(state.ops.last(), Some(&PanelOp::Sleep));
    }
    assert!(!engine.status().await.unwrap().screen_active);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_swipe_through_engine() {
    let (engine, _panel, touch) = start().await;
    touch.state().lock().unwrap().interrupt_level = PinLevel::Low;
    touch.push_scans([TouchScan::single(60, 200), TouchScan::single(60, 150), TouchScan::single(61, 90)]);

    let mut gestures = Vec::new();
    for _ in 0..4 {
        gestures.push(engine.detect_interaction().await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let last = gestures.last().unwrap();
    assert!(last.did_swipe);
    assert_eq!(last.swipe_direction, Some(SwipeDirection::Right));
    assert!(!last.is_touching);
    assert_eq!(gestures.iter().filter(|r| r.did_swipe).count(), 1);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent_and_releases_hardware() {
    let (engine, panel, touch) = start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(engine.health().ready);

    engine.shutdown().await.unwrap();
    engine.shutdown().await.unwrap();

    let health = engine.health();
    assert!(!health.ready);
    assert!(health.shutting_down);
    assert_eq!(health.sampler, LoopStatus::Stopped);
    assert_eq!(health.supervisor, LoopStatus::Stopped);

    {
        let state = panel.state();
        let state = state.lock().unwrap();
        assert!(state.released);
        assert!(state.ops.contains(&PanelOp::Sleep));
    }
    assert!(touch.state().lock().unwrap().released);

    let err = engine.render(bitmap(&engine, 0x00)).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test(start_paused = true)]
async fn test_pending_render_fails_on_shutdown() {
    let (engine, panel, _touch) = start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let render = {
        let engine = engine.clone();
        let data = bitmap(&engine, 0x00);
        tokio::spawn(async move { engine.render(data).await })
    };
    tokio::task::yield_now().await;
    engine.shutdown().await.unwrap();

    let err = render.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
    assert_eq!(panel.state().lock().unwrap().partial_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_panel_fault_stops_supervisor() {
    let (engine, panel, _touch) = start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    panel.state().lock().unwrap().simulate_display_failure = true;

    let err = engine.render(bitmap(&engine, 0x00)).await.unwrap_err();
    assert!(err.is_hardware_fault());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let health = engine.health();
    assert!(!health.ready);
    assert!(matches!(health.supervisor, LoopStatus::Faulted(_)));
    assert_eq!(health.sampler, LoopStatus::Running);

    // no supervisor left to consume it
    let err = engine.request_render().await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // shutdown still completes; the failed push does not block sleep
    panel.state().lock().unwrap().simulate_display_failure = false;
    engine.shutdown().await.unwrap();
    assert!(panel.state().lock().unwrap().released);
}

#[tokio::test(start_paused = true)]
async fn test_sampler_fault_reported_in_health() {
    let (engine, _panel, touch) = start().await;
    touch.state().lock().unwrap().simulate_pin_failure = true;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let health = engine.health();
    assert!(!health.ready);
    assert!(matches!(health.sampler, LoopStatus::Faulted(_)));
    assert_eq!(health.supervisor, LoopStatus::Running);

    // commands still work
    assert_eq!(engine.request_render().await.unwrap(), RenderOutcome::Partial);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_bitmap_rejected_without_side_effects() {
    let (engine, panel, _touch) = start().await;
    let before = engine.canvas().await.unwrap();

    let err = engine.render(vec![0u8; 10]).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(engine.canvas().await.unwrap(), before);
    assert!(!engine.status().await.unwrap().should_render);
    assert_eq!(panel.state().lock().unwrap().ops.len(), 2);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forced_refresh_settles_before_sleep() {
    let timing = Timing { max_refresh_interval: Duration::from_secs(300), ..Timing::default() };
    let settle = timing.sleep_settle;
    let (engine, panel, _touch) = start_with(timing).await;

    tokio::time::sleep(Duration::from_secs(430)).await;
    let gaps = panel.state().lock().unwrap().clear_to_sleep_gaps();
    // idle sleep, then the forced refresh on the sleeping panel
    assert_eq!(gaps.len(), 2);
    assert!(gaps.iter().all(|gap| *gap >= settle), "gaps {:?}", gaps);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_render_during_failing_tick_resolves() {
    let (engine, panel, _touch) = start().await;
    panel.state().lock().unwrap().simulate_sleep_failure = true;

    // idle sleep starts at 121s and fails after its settle delay
    tokio::time::sleep(Duration::from_millis(121_500)).await;
    let result = tokio::time::timeout(Duration::from_secs(60), engine.render(bitmap(&engine, 0x00)))
        .await
        .expect("render resolves once the tick fails");
    assert!(matches!(result, Err(EngineError::StateConflict(_))), "{:?}", result);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(engine.health().supervisor, LoopStatus::Faulted(_)));

    // later renders are refused straight away
    let err = engine.request_render().await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    assert!(engine.shutdown().await.unwrap_err().is_hardware_fault());
    assert!(panel.state().lock().unwrap().released);
}

#[tokio::test(start_paused = true)]
async fn test_full_only_panel_never_renders_partial() {
    let panel = MockPanel::new().full_only();
    let engine = Engine::start(panel.clone(), MockTouch::new(), Timing::default()).await.unwrap();

    for _ in 0..3 {
        assert_eq!(engine.render(bitmap(&engine, 0x33)).await.unwrap(), RenderOutcome::Full);
    }
    assert_eq!(engine.status().await.unwrap().partial_refresh_counter, 0);
    assert_eq!(panel.state().lock().unwrap().partial_count, 0);
    engine.shutdown().await.unwrap();
}
