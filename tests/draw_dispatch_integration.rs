//! Draw dispatcher integration tests against the software canvas.

use std::sync::Arc;

use image::RgbaImage;

use aberredfx::components::color::{Color, LogicalColor};
use aberredfx::components::drawable::{Drawable, DrawableId};
use aberredfx::components::transform::Affine;
use aberredfx::error::{RenderError, ResourceKind};
use aberredfx::resources::drawables::DrawableSet;
use aberredfx::resources::rendertarget::Canvas;
use aberredfx::resources::store::ResourceStore;
use aberredfx::resources::texture::Flip;
use aberredfx::systems::render::DrawDispatcher;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn checker() -> RgbaImage {
    // R G
    // B W
    let mut img = RgbaImage::new(2, 2);
    img.put_pixel(0, 0, Color::RED.to_rgba8());
    img.put_pixel(1, 0, Color::GREEN.to_rgba8());
    img.put_pixel(0, 1, Color::BLUE.to_rgba8());
    img.put_pixel(1, 1, Color::WHITE.to_rgba8());
    img
}

fn draw(set: &DrawableSet, dispatcher: &mut DrawDispatcher, canvas: &mut Canvas, store: &ResourceStore) {
    let snapshot: Vec<Arc<Drawable>> = set.snapshot();
    let report = dispatcher.draw_all(&snapshot, Affine::IDENTITY, canvas, store);
    assert!(report.is_clean(), "unexpected skips: {:?}", report.skipped);
}

#[test]
fn test_rotated_rectangle_turns_about_its_center() {
    init_logger();
    let set = DrawableSet::from_drawables([
        Drawable::rectangle(1, 50.0, 50.0, 40.0, 20.0).with_rotation(-45.0)
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(100, 100);
    draw(&set, &mut dispatcher, &mut canvas, &ResourceStore::default());

    // The unrotated top-right corner (70, 40) ends up near (71.2, 57.1).
    let turn = Affine::rotation_about(45f32.to_radians(), 50.0, 50.0);
    let (cx, cy) = turn.apply(70.0, 40.0);
    assert!((cx - 71.213).abs() < 0.01, "corner x {cx}");
    assert!((cy - 57.071).abs() < 0.01, "corner y {cy}");

    // Just inside the turned corner.
    assert_eq!(canvas.pixel(69, 56), Color::WHITE);
    assert_eq!(canvas.pixel(50, 50), Color::WHITE);
    // Covered by the unrotated rectangle only.
    assert_eq!(canvas.pixel(70, 40), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(30, 59), Color::TRANSPARENT);
}

#[test]
fn test_drawables_paint_in_collection_order() {
    init_logger();
    let set = DrawableSet::from_drawables([
        Drawable::rectangle(1, 5.0, 5.0, 10.0, 10.0).with_color(LogicalColor::new(1.0, 0.0, 0.0, 1.0)),
        Drawable::oval(2, 5.0, 5.0, 4.0, 4.0).with_color(LogicalColor::new(0.0, 0.0, 1.0, 1.0)),
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(10, 10);
    draw(&set, &mut dispatcher, &mut canvas, &ResourceStore::default());

    assert_eq!(canvas.pixel(5, 5), Color::BLUE);
    assert_eq!(canvas.pixel(0, 0), Color::RED);
}

#[test]
fn test_recolor_takes_effect_on_next_pass() {
    init_logger();
    let set = DrawableSet::from_drawables([Drawable::rectangle(1, 2.0, 2.0, 4.0, 4.0)]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let store = ResourceStore::default();

    let mut canvas = Canvas::new(4, 4);
    draw(&set, &mut dispatcher, &mut canvas, &store);
    assert_eq!(canvas.pixel(1, 1), Color::WHITE);

    assert!(set.set_color(DrawableId(1), Some(LogicalColor::new(0.0, 1.0, 0.0, 1.0))));
    let mut canvas = Canvas::new(4, 4);
    draw(&set, &mut dispatcher, &mut canvas, &store);
    assert_eq!(canvas.pixel(1, 1), Color::GREEN);

    assert!(set.set_color(DrawableId(1), None));
    let mut canvas = Canvas::new(4, 4);
    draw(&set, &mut dispatcher, &mut canvas, &store);
    assert_eq!(canvas.pixel(1, 1), Color::WHITE);
}

#[test]
fn test_images_follow_their_flip() {
    init_logger();
    let mut store = ResourceStore::default();
    let texture = store.textures.load_from_image(checker());
    let set = DrawableSet::from_drawables([
        Drawable::image(1, texture, 4.0, 4.0, 4.0, 4.0),
        Drawable::image(2, texture, 12.0, 4.0, 4.0, 4.0).flipped(Flip::Horizontal),
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(16, 8);
    draw(&set, &mut dispatcher, &mut canvas, &store);

    assert_eq!(canvas.pixel(2, 2), Color::RED);
    assert_eq!(canvas.pixel(5, 2), Color::GREEN);
    assert_eq!(canvas.pixel(2, 5), Color::BLUE);
    assert_eq!(canvas.pixel(5, 5), Color::WHITE);

    assert_eq!(canvas.pixel(10, 2), Color::GREEN);
    assert_eq!(canvas.pixel(13, 2), Color::RED);
}

#[test]
fn test_bad_drawables_are_reported_and_skipped() {
    init_logger();
    let mut store = ResourceStore::default();
    let texture = store.textures.load_from_image(checker());
    store.textures.unload_texture(texture).unwrap();
    let set = DrawableSet::from_drawables([
        Drawable::text(1, "hello", "missing", 5.0, 5.0),
        Drawable::image(2, texture, 5.0, 5.0, 2.0, 2.0),
        Drawable::rectangle(3, f32::INFINITY, 5.0, 2.0, 2.0),
        Drawable::rectangle(4, 5.0, 5.0, 2.0, 2.0),
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(10, 10);
    let report = dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);

    assert_eq!(report.drawn, 1);
    assert_eq!(report.skipped.len(), 3);
    assert!(matches!(
        report.skipped[0],
        (DrawableId(1), RenderError::ResourceNotFound { kind: ResourceKind::Font, .. })
    ));
    assert!(matches!(
        report.skipped[1],
        (DrawableId(2), RenderError::ResourceUnavailable { kind: ResourceKind::Texture, .. })
    ));
    assert!(matches!(report.skipped[2], (DrawableId(3), RenderError::Unsupported(_))));
    assert_eq!(canvas.pixel(5, 5), Color::WHITE);
}

#[test]
fn test_rotation_pivots_on_drawable_center_not_frame_origin() {
    init_logger();
    let base = Affine::translation(32.0, 32.0);
    let set = DrawableSet::from_drawables([
        Drawable::rectangle(1, 16.0, 0.0, 4.0, 4.0).with_rotation(-90.0)
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(64, 64);
    let report = dispatcher.draw_all(&set.snapshot(), base, &mut canvas, &ResourceStore::default());
    assert!(report.is_clean());

    // A square turned a quarter about its own center covers the same spot.
    let (sx, sy) = base.apply(16.0, 0.0);
    assert_eq!((sx, sy), (48.0, 32.0));
    assert_eq!(canvas.pixel(47, 31), Color::WHITE);
    assert_eq!(canvas.pixel(49, 33), Color::WHITE);

    // Turning the whole frame about its origin would have swung it here.
    let (ox, oy) = base.append(Affine::rotation(90f32.to_radians())).apply(16.0, 0.0);
    assert!((ox - 32.0).abs() < 1e-3 && (oy - 48.0).abs() < 1e-3);
    let (ox, oy) = (ox.round() as u32, oy.round() as u32);
    assert_eq!(canvas.pixel(ox, oy), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(ox - 1, oy - 1), Color::TRANSPARENT);
}

#[test]
fn test_line_runs_between_extent_corners() {
    init_logger();
    // Endpoints (6, 8) and (14, 12).
    let set = DrawableSet::from_drawables([Drawable::line(1, 10.0, 10.0, 8.0, 4.0, 1.0)]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(20, 20);
    draw(&set, &mut dispatcher, &mut canvas, &ResourceStore::default());

    assert_eq!(canvas.pixel(6, 8), Color::WHITE);
    assert_eq!(canvas.pixel(10, 10), Color::WHITE);
    assert_eq!(canvas.pixel(13, 11), Color::WHITE);
    // Past both endpoints.
    assert_eq!(canvas.pixel(5, 7), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(15, 12), Color::TRANSPARENT);
    // The other diagonal of the extent stays empty.
    assert_eq!(canvas.pixel(6, 12), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(13, 8), Color::TRANSPARENT);
}

#[test]
fn test_rounded_rectangle_arc_is_corner_diameter() {
    init_logger();
    // Both span (2, 2) to (18, 18); one has 8 px corner arcs.
    let set = DrawableSet::from_drawables([
        Drawable::rounded_rectangle(1, 10.0, 10.0, 16.0, 16.0, 8.0, 8.0),
        Drawable::rounded_rectangle(2, 30.0, 10.0, 16.0, 16.0, 0.0, 0.0),
    ]);
    let mut dispatcher = DrawDispatcher::new(set.invalidations());
    let mut canvas = Canvas::new(40, 20);
    draw(&set, &mut dispatcher, &mut canvas, &ResourceStore::default());

    // Corner cut by a radius 4 quarter ellipse.
    assert_eq!(canvas.pixel(2, 2), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(2, 3), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(3, 2), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(3, 3), Color::WHITE);
    // Straight edges are untouched.
    assert_eq!(canvas.pixel(2, 9), Color::WHITE);
    assert_eq!(canvas.pixel(9, 17), Color::WHITE);
    // Zero arcs keep square corners.
    assert_eq!(canvas.pixel(22, 2), Color::WHITE);
    assert_eq!(canvas.pixel(37, 17), Color::WHITE);
}
