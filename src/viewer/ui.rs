/*
 * UI Module
 *
 * The egui control panel: pacing controls for the glass, one-shot actions,
 * and the current stage counts and frame statistics.
 */

use nannou_egui::{egui, Egui};

use super::{Controls, DebugInfo};
use crate::config::GlassConfig;

// Buttons pressed during this frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Actions {
    pub wake_all: bool,
    pub nudge: bool,
}

pub fn update_ui(egui: &mut Egui, controls: &mut Controls, debug_info: &DebugInfo) -> Actions {
    let mut actions = Actions::default();
    let ctx = egui.begin_frame();

    egui::Window::new("Glass Controls")
        .default_pos([10.0, 10.0])
        .show(&ctx, |ui| {
            ui.collapsing("Pacing", |ui| {
                ui.checkbox(&mut controls.autoplay, "Autoplay");
                ui.add(
                    egui::Slider::new(&mut controls.nudge_interval_ms, GlassConfig::get_nudge_interval_range())
                        .text("Nudge Interval (ms)"),
                );

                ui.horizontal(|ui| {
                    if ui.button("Wake All").clicked() {
                        actions.wake_all = true;
                    }
                    if ui.button("Nudge Now").clicked() {
                        actions.nudge = true;
                    }
                });
            });

            ui.collapsing("Population", |ui| {
                let counts = debug_info.counts;
                ui.label(format!("Died: {}", counts.died));
                ui.label(format!("Born: {}", counts.born));
                ui.label(format!("Grown: {}", counts.grown));
                ui.label(format!("Transitioning: {}", counts.transitioning));
                ui.label(format!("Active tweens: {}", debug_info.active_tweens));
            });

            ui.separator();
            ui.label(format!("FPS: {:.1}", debug_info.fps));
            ui.label(format!("Frame time: {:.2} ms", debug_info.frame_time.as_secs_f64() * 1000.0));

            ui.checkbox(&mut controls.show_debug, "Show Debug Info");
            ui.checkbox(&mut controls.paused, "Pause");
        });

    actions
}
