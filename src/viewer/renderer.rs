/*
 * Renderer Module
 *
 * Draws the glass snapshot: every visible bubble as a translucent circle at
 * its current projection, tinted by behavior. With debug on, transitioning
 * bubbles get an outline and every bubble is labelled with its stage.
 */

use nannou::prelude::*;
use tracing::warn;

use super::{to_window, Model};
use crate::geometry;
use crate::glass::BubbleSnapshot;

fn tint(snapshot: &BubbleSnapshot) -> (f32, f32, f32) {
    match snapshot.behavior {
        "immortal" => (1.0, 0.85, 0.4),
        "modal" => (0.6, 0.9, 0.7),
        "debug" => (1.0, 0.4, 0.4),
        _ => (0.55, 0.75, 1.0),
    }
}

fn draw_bubble(draw: &Draw, snapshot: &BubbleSnapshot, window_size: Vec2, show_debug: bool) {
    let visual = snapshot.visual;
    let centre = to_window(geometry::center_of(visual.drawn_position(), visual.size), window_size);
    let radius = visual.size / 2.0;
    let (r, g, b) = tint(snapshot);

    draw.ellipse()
        .xy(centre)
        .radius(radius)
        .color(rgba(r, g, b, visual.opacity * 0.6))
        .stroke(rgba(r, g, b, visual.opacity))
        .stroke_weight(1.5);

    if show_debug {
        if snapshot.transitioning {
            draw.ellipse()
                .xy(centre)
                .radius(radius + 4.0)
                .no_fill()
                .stroke(rgba(1.0, 0.5, 0.0, 0.8))
                .stroke_weight(1.0);
        }

        draw.text(&format!("{}\n{}", snapshot.id, snapshot.stage))
            .xy(centre)
            .color(WHITE)
            .font_size(10);
    }
}

// Render the model
pub fn view(app: &App, model: &Model, frame: Frame) {
    let draw = app.draw();
    draw.background().color(rgb(0.05, 0.07, 0.12));

    for snapshot in model.glass.snapshot() {
        if snapshot.visual.visible {
            draw_bubble(&draw, &snapshot, model.window_size, model.controls.show_debug);
        }
    }

    if let Err(err) = draw.to_frame(app, &frame) {
        warn!(error = %err, "failed to render frame");
    }

    if let Err(err) = model.egui.draw_to_frame(&frame) {
        warn!(error = %err, "failed to render controls");
    }
}
