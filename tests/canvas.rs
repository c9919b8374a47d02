use std::cell::RefCell;
use std::rc::Rc;

use image::RgbaImage;

use mapcanvas::gpu::{Gpu, GpuCommand, PipelineCache, RecordingGpu, TextureId};
use mapcanvas::map::Instance;
use mapcanvas::renderer::bucket::{Bucket, Placeholder};
use mapcanvas::sprites::{Quad, SpriteStore};
use mapcanvas::{Canvas, Color, DisposalQueue, RenderError};

fn setup() -> (RecordingGpu, Canvas<RecordingGpu>, DisposalQueue<RecordingGpu>) {
    let mut gpu = RecordingGpu::new();
    let pipeline = PipelineCache::<RecordingGpu>::new().get_or_init(&mut gpu).unwrap();
    gpu.take_commands();
    (gpu, Canvas::new(pipeline), DisposalQueue::new())
}

fn small_bucket(gpu: &mut RecordingGpu) -> Bucket {
    let texture = gpu.upload_texture(&RgbaImage::new(8, 8)).unwrap();
    let mut sprites = SpriteStore::new();
    sprites.insert("dot", texture, Quad::full(8.0, 8.0));
    let list = [Instance::new(0.0, 0.0, "dot"), Instance::new(8.0, 0.0, "dot")];
    Bucket::build(list.as_slice(), &sprites, &Placeholder::default())
}

fn created_targets(gpu: &RecordingGpu) -> usize {
    gpu.count(|c| matches!(c, GpuCommand::CreateTarget { .. }))
}

fn destroyed_targets(gpu: &RecordingGpu) -> usize {
    gpu.count(|c| matches!(c, GpuCommand::DestroyTarget { .. }))
}

// ── Resize ────────────────────────────────────────────────────────────────

#[test]
fn no_texture_before_first_frame() {
    let (gpu, canvas, _q) = setup();
    assert_eq!(canvas.texture(&gpu), None);
    assert_eq!(canvas.size(&gpu), [0, 0]);
}

#[test]
fn resize_to_the_same_size_is_a_no_op() {
    let (mut gpu, mut canvas, mut q) = setup();
    assert!(canvas.resize(&mut gpu, &mut q, 640, 480).unwrap());
    let first = canvas.texture(&gpu);

    assert!(!canvas.resize(&mut gpu, &mut q, 640, 480).unwrap());
    assert_eq!(canvas.texture(&gpu), first);
    assert_eq!(created_targets(&gpu), 1);
    assert!(q.is_empty());
}

#[test]
fn resize_retires_the_old_target_through_the_queue() {
    let (mut gpu, mut canvas, mut q) = setup();
    canvas.resize(&mut gpu, &mut q, 640, 480).unwrap();
    let old = canvas.texture(&gpu).unwrap();

    canvas.resize(&mut gpu, &mut q, 800, 600).unwrap();
    let new = canvas.texture(&gpu).unwrap();
    assert_ne!(old, new);
    assert_eq!(canvas.size(&gpu), [800, 600]);

    // The old texture may still be on screen until the next frame starts.
    assert_eq!(destroyed_targets(&gpu), 0);
    assert_eq!(q.drain(&mut gpu), 1);
    assert!(gpu.commands().contains(&GpuCommand::DestroyTarget { texture: old }));
    assert_eq!(gpu.live_resources(), 1);
}

#[test]
fn failed_resize_keeps_the_previous_target() {
    let (mut gpu, mut canvas, mut q) = setup();
    gpu.max_target_size = 1024;
    canvas.resize(&mut gpu, &mut q, 800, 600).unwrap();
    let before = canvas.texture(&gpu);

    let err = canvas.resize(&mut gpu, &mut q, 2000, 600).unwrap_err();
    assert_eq!(err, RenderError::TargetTooLarge { width: 2000, height: 600, max: 1024 });
    assert_eq!(canvas.texture(&gpu), before);
    assert_eq!(canvas.size(&gpu), [800, 600]);
    assert!(q.is_empty());
    assert_eq!(destroyed_targets(&gpu), 0);
}

// ── process_frame ─────────────────────────────────────────────────────────

#[test]
fn process_frame_renders_into_its_own_target() {
    let (mut gpu, canvas, mut q) = setup();
    let mut canvas = canvas.with_background(Color::BLACK);
    let bucket = small_bucket(&mut gpu);
    canvas.load_batch(&mut gpu, &mut q, bucket).unwrap();
    gpu.take_commands();

    let texture = canvas.process_frame(&mut gpu, &mut q, [320.0, 200.0]).unwrap();
    assert_eq!(Some(texture), canvas.texture(&gpu));

    let cmds = gpu.take_commands();
    assert_eq!(cmds[0], GpuCommand::CreateTarget { texture, width: 320, height: 200 });
    assert_eq!(cmds[1], GpuCommand::BeginPass { texture, viewport: [320, 200], clear: Color::BLACK });
    assert!(matches!(cmds[2], GpuCommand::Prepare { .. }));
    assert_eq!(cmds.last(), Some(&GpuCommand::EndPass));
    let draws = cmds.iter().filter(|c| matches!(c, GpuCommand::DrawIndexed { .. })).count();
    assert_eq!(draws, 1);
}

#[test]
fn process_frame_reuses_target_while_panel_size_is_stable() {
    let (mut gpu, mut canvas, mut q) = setup();
    let a = canvas.process_frame(&mut gpu, &mut q, [320.0, 200.0]).unwrap();
    let b = canvas.process_frame(&mut gpu, &mut q, [320.2, 199.8]).unwrap();
    assert_eq!(a, b);
    assert_eq!(created_targets(&gpu), 1);
    assert_eq!(gpu.count(|c| matches!(c, GpuCommand::BeginPass { .. })), 2);
}

#[test]
fn process_frame_clamps_degenerate_panels_to_one_pixel() {
    let (mut gpu, mut canvas, mut q) = setup();
    canvas.process_frame(&mut gpu, &mut q, [0.0, 0.3]).unwrap();
    assert_eq!(canvas.size(&gpu), [1, 1]);
}

#[test]
fn process_frame_without_batch_only_clears() {
    let (mut gpu, mut canvas, mut q) = setup();
    canvas.process_frame(&mut gpu, &mut q, [64.0, 64.0]).unwrap();
    let cmds = gpu.take_commands();
    assert_eq!(cmds.len(), 3);
    match &cmds[1] {
        GpuCommand::BeginPass { clear, .. } => assert_eq!(*clear, Color::CANVAS),
        other => panic!("expected BeginPass, got {other:?}"),
    }
    assert_eq!(cmds[2], GpuCommand::EndPass);
}

#[test]
fn process_frame_error_leaves_last_texture_displayable() {
    let (mut gpu, mut canvas, mut q) = setup();
    gpu.max_target_size = 512;
    let shown = canvas.process_frame(&mut gpu, &mut q, [256.0, 256.0]).unwrap();
    gpu.take_commands();

    assert!(canvas.process_frame(&mut gpu, &mut q, [4096.0, 256.0]).is_err());
    assert_eq!(canvas.texture(&gpu), Some(shown));
    assert!(gpu.commands().is_empty());
}

#[test]
fn first_frame_failure_has_no_texture() {
    let (mut gpu, mut canvas, mut q) = setup();
    gpu.max_target_size = 16;
    assert!(canvas.process_frame(&mut gpu, &mut q, [64.0, 64.0]).is_err());
    assert_eq!(canvas.texture(&gpu), None);
}

#[test]
fn view_state_changes_reach_the_frame() {
    let (mut gpu, mut canvas, mut q) = setup();
    let bucket = small_bucket(&mut gpu);
    canvas.load_batch(&mut gpu, &mut q, bucket).unwrap();

    canvas.state_mut().set_shift(-1000.0, 0.0);
    canvas.process_frame(&mut gpu, &mut q, [100.0, 100.0]).unwrap();
    assert!(gpu.draw_calls().is_empty());
    assert_eq!(canvas.state().shift(), [-1000.0, 0.0]);
}

// ── Disposal ──────────────────────────────────────────────────────────────

#[test]
fn reloading_a_batch_retires_old_buffers_via_queue() {
    let (mut gpu, mut canvas, mut q) = setup();
    let first = small_bucket(&mut gpu);
    canvas.load_batch(&mut gpu, &mut q, first).unwrap();
    let second = small_bucket(&mut gpu);
    canvas.load_batch(&mut gpu, &mut q, second).unwrap();

    assert_eq!(gpu.live_resources(), 2);
    assert_eq!(q.len(), 1);
    q.drain(&mut gpu);
    assert_eq!(gpu.live_resources(), 1);
    assert!(canvas.renderer().has_batch());
}

#[test]
fn dispose_is_deferred_until_drain() {
    let (mut gpu, mut canvas, mut q) = setup();
    let bucket = small_bucket(&mut gpu);
    canvas.load_batch(&mut gpu, &mut q, bucket).unwrap();
    canvas.process_frame(&mut gpu, &mut q, [128.0, 128.0]).unwrap();
    assert_eq!(gpu.live_resources(), 2);

    canvas.dispose(&mut q);
    assert_eq!(gpu.live_resources(), 2);

    assert_eq!(q.drain(&mut gpu), 1);
    assert_eq!(gpu.live_resources(), 0);
    assert_eq!(gpu.count(|c| matches!(c, GpuCommand::DestroyBuffers { .. })), 1);
    assert_eq!(destroyed_targets(&gpu), 1);
}

#[test]
fn dispose_of_a_never_drawn_canvas_is_harmless() {
    let (mut gpu, canvas, mut q) = setup();
    canvas.dispose(&mut q);
    assert_eq!(q.drain(&mut gpu), 1);
    assert!(gpu.commands().is_empty());
    assert_eq!(gpu.live_resources(), 0);
}

#[test]
fn resize_then_dispose_frees_everything() {
    let (mut gpu, mut canvas, mut q) = setup();
    canvas.process_frame(&mut gpu, &mut q, [100.0, 100.0]).unwrap();
    canvas.process_frame(&mut gpu, &mut q, [200.0, 100.0]).unwrap();
    canvas.process_frame(&mut gpu, &mut q, [300.0, 100.0]).unwrap();
    canvas.dispose(&mut q);

    assert_eq!(q.drain(&mut gpu), 3);
    assert_eq!(gpu.live_resources(), 0);
    assert_eq!(destroyed_targets(&gpu), 3);
}

#[test]
fn two_canvases_share_one_pipeline() {
    let mut gpu = RecordingGpu::new();
    let mut cache = PipelineCache::<RecordingGpu>::new();
    let mut q: DisposalQueue<RecordingGpu> = DisposalQueue::new();
    let mut a = Canvas::new(cache.get_or_init(&mut gpu).unwrap());
    let mut b = Canvas::new(cache.get_or_init(&mut gpu).unwrap());

    let ta = a.process_frame(&mut gpu, &mut q, [64.0, 64.0]).unwrap();
    let tb = b.process_frame(&mut gpu, &mut q, [32.0, 32.0]).unwrap();
    assert_ne!(ta, tb);
    assert_eq!(gpu.count(|c| matches!(c, GpuCommand::CreatePipeline)), 1);

    a.dispose(&mut q);
    b.dispose(&mut q);
    q.drain(&mut gpu);
    assert_eq!(gpu.live_resources(), 0);
}

// ── DisposalQueue ─────────────────────────────────────────────────────────

#[test]
fn queue_runs_tasks_in_submission_order() {
    let mut gpu = RecordingGpu::new();
    let mut q: DisposalQueue<RecordingGpu> = DisposalQueue::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for i in 0..3 {
        let log = Rc::clone(&log);
        q.defer(move |_| log.borrow_mut().push(i));
    }
    assert_eq!(q.len(), 3);
    assert_eq!(q.drain(&mut gpu), 3);
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
    assert!(q.is_empty());
    assert_eq!(q.drain(&mut gpu), 0);
}

#[test]
fn queued_task_sees_the_backend() {
    let mut gpu = RecordingGpu::new();
    let mut q: DisposalQueue<RecordingGpu> = DisposalQueue::new();
    let target = gpu.create_target(4, 4).unwrap();
    let texture: TextureId = gpu.target_texture(&target);
    q.retire_target(target);
    q.drain(&mut gpu);
    assert!(gpu.commands().contains(&GpuCommand::DestroyTarget { texture }));
}
