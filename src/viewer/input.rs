/*
 * Input Module
 *
 * Turns nannou mouse events into glass input. Left click taps the bubble under
 * the cursor; holding the right button long-presses it, moving while held
 * drags it, and releasing cancels the gesture.
 */

use nannou::prelude::*;
use nannou::winit::event::{MouseButton, WindowEvent};
use tracing::warn;

use super::{to_space, Model};
use crate::error::BubbleError;
use crate::geometry::SpaceRect;

fn report(what: &str, result: Result<bool, BubbleError>) {
    if let Err(err) = result {
        warn!(input = what, error = %err, "could not dispatch input");
    }
}

// Mouse moved event handler
pub fn mouse_moved(_app: &App, model: &mut Model, pos: Point2) {
    model.mouse_position = vec2(pos.x, pos.y);

    if let Some(id) = model.held {
        let to = to_space(model.mouse_position, model.window_size);
        report("drag", model.glass.drag(id, to));
    }
}

// Mouse pressed event handler
pub fn mouse_pressed(_app: &App, model: &mut Model, button: MouseButton) {
    // Clicks on the control panel never reach the bubbles
    if model.egui.ctx().is_pointer_over_area() {
        return;
    }

    let point = to_space(model.mouse_position, model.window_size);
    let Some(bubble) = model.glass.bubble_at(point) else {
        return;
    };

    match button {
        MouseButton::Left => report("click", model.glass.click(bubble.id())),
        MouseButton::Right => {
            model.held = Some(bubble.id());
            report("long-press", model.glass.long_press(bubble.id(), point));
        }
        _ => {}
    }
}

// Mouse released event handler
pub fn mouse_released(_app: &App, model: &mut Model, button: MouseButton) {
    if button == MouseButton::Right {
        if let Some(id) = model.held.take() {
            report("pointer-cancel", model.glass.pointer_cancel(id));
        }
    }
}

pub fn resized(_app: &App, model: &mut Model, size: Vec2) {
    model.window_size = size;
    if let Err(err) = model.glass.resize(SpaceRect::from_size(size.x, size.y)) {
        warn!(error = %err, "could not resize the glass");
    }
}

// Handle raw window events for egui
pub fn raw_window_event(_app: &App, model: &mut Model, event: &WindowEvent) {
    model.egui.handle_raw_event(event);
}
