/*
 * Viewer Module
 *
 * A nannou window that projects a Glass and feeds pointer input back into it.
 * The engine never sees nannou types: the viewer converts between nannou's
 * centred, y-up window coordinates and the glass's top-left, y-down space.
 *
 * Each frame the glass is stepped by the real frame delta, which drives the
 * timeline and every bubble routine waiting on it.
 */

use std::rc::Rc;
use std::time::Duration;

use nannou::prelude::*;
use nannou_egui::Egui;
use serde::Deserialize;
use tracing::{info, warn};

use crate::behavior::{Behavior, DebugBehavior};
use crate::bubble::Bubble;
use crate::config::{BubbleConfig, GlassConfig};
use crate::error::BubbleError;
use crate::geometry::{Position, SpaceRect};
use crate::glass::{Glass, StageCounts};
use crate::ActorId;

pub mod input;
pub mod renderer;
pub mod ui;

/// Everything the viewer reads from its optional JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub bubble: BubbleConfig,
    pub glass: GlassConfig,
    pub bubbles: usize,
    pub with_immortal: bool,
    pub with_modal: bool,
    pub with_debug: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bubble: BubbleConfig::default(),
            glass: GlassConfig::default(),
            bubbles: 12,
            with_immortal: true,
            with_modal: true,
            with_debug: false,
        }
    }
}

impl ViewerConfig {
    // Read from the path in BUBBLES_CONFIG, falling back to the defaults
    pub fn load() -> Self {
        let Ok(path) = std::env::var("BUBBLES_CONFIG") else {
            return Self::default();
        };

        let parsed = std::fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|json| serde_json::from_str::<ViewerConfig>(&json).map_err(|err| err.to_string()))
            .and_then(|config| config.bubble.validate().map(|_| config).map_err(|err| err.to_string()));

        match parsed {
            Ok(config) => {
                info!(%path, "loaded viewer configuration");
                config
            }
            Err(err) => {
                warn!(%path, error = %err, "ignoring configuration file");
                Self::default()
            }
        }
    }
}

// Frame statistics shown in the control panel
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub fps: f32,
    pub frame_time: Duration,
    pub counts: StageCounts,
    pub active_tweens: usize,
}

// Panel state mirrored into the glass every frame
#[derive(Debug, Clone)]
pub struct Controls {
    pub paused: bool,
    pub autoplay: bool,
    pub nudge_interval_ms: u64,
    pub show_debug: bool,
}

pub struct Model {
    pub glass: Rc<Glass>,
    pub egui: Egui,
    pub controls: Controls,
    pub debug_info: DebugInfo,
    pub mouse_position: Vec2,
    // Bubble under a held right button, for long-press and drag
    pub held: Option<ActorId>,
    pub window_size: Vec2,
}

// Window coordinates (centred, y-up) to space coordinates (top-left, y-down)
pub fn to_space(point: Vec2, window_size: Vec2) -> Position {
    Position::new(point.x + window_size.x / 2.0, window_size.y / 2.0 - point.y)
}

pub fn to_window(position: Position, window_size: Vec2) -> Vec2 {
    vec2(position.x - window_size.x / 2.0, window_size.y / 2.0 - position.y)
}

fn populate(glass: &Glass, config: &ViewerConfig) -> Result<(), BubbleError> {
    let rect = glass.rect();
    let builder = || Bubble::builder().config(config.bubble.clone());

    for _ in 0..config.bubbles {
        glass.spawn_bubble(builder())?;
    }

    if config.with_immortal {
        // Centred, given the immortal bubble's fixed size
        let centre = Position::new(rect.width / 2.0 - 40.0, rect.height / 2.0 - 40.0);
        glass.spawn_bubble(builder().immortal(true).position(centre.x, centre.y))?;
    }

    if config.with_modal {
        glass.spawn_bubble(builder().behavior_key("modal"))?;
    }

    if config.with_debug {
        glass.spawn_bubble(builder().behavior(Behavior::Debug(DebugBehavior::default())))?;
    }

    Ok(())
}

// Initialize the model
pub fn model(app: &App) -> Model {
    let config = ViewerConfig::load();

    // Calculate window size based on monitor size (80% of monitor size)
    let (window_width, window_height) = match app.primary_monitor() {
        Some(monitor) => {
            let size = monitor.size();
            (size.width as f32 * 0.8, size.height as f32 * 0.8)
        }
        None => (1280.0, 800.0),
    };

    let window_id = app
        .new_window()
        .title("Bubbles")
        .size(window_width as u32, window_height as u32)
        .view(renderer::view)
        .mouse_moved(input::mouse_moved)
        .mouse_pressed(input::mouse_pressed)
        .mouse_released(input::mouse_released)
        .resized(input::resized)
        .raw_event(input::raw_window_event)
        .build()
        .expect("failed to open the viewer window");

    let window = app.window(window_id).expect("viewer window closed during setup");
    let egui = Egui::from_window(&window);

    let glass = Glass::new(SpaceRect::from_size(window_width, window_height), config.glass.clone());
    if let Err(err) = populate(&glass, &config) {
        warn!(error = %err, "could not populate the glass");
    }

    Model {
        glass,
        egui,
        controls: Controls {
            paused: false,
            autoplay: config.glass.autoplay,
            nudge_interval_ms: config.glass.nudge_interval_ms,
            show_debug: false,
        },
        debug_info: DebugInfo::default(),
        mouse_position: Vec2::ZERO,
        held: None,
        window_size: vec2(window_width, window_height),
    }
}

// Update the model
pub fn update(app: &App, model: &mut Model, update: Update) {
    model.debug_info.fps = app.fps();
    model.debug_info.frame_time = update.since_last;

    let actions = ui::update_ui(&mut model.egui, &mut model.controls, &model.debug_info);

    let glass = &model.glass;
    glass.pause(model.controls.paused);
    glass.set_autoplay(model.controls.autoplay);
    glass.set_nudge_interval(model.controls.nudge_interval_ms);

    if actions.wake_all {
        if let Err(err) = glass.wake_all() {
            warn!(error = %err, "wake all failed");
        }
    }

    if actions.nudge {
        if let Err(err) = glass.nudge() {
            warn!(error = %err, "nudge failed");
        }
    }

    if let Err(err) = glass.step(update.since_last) {
        warn!(error = %err, "frame step failed");
    }

    model.debug_info.counts = glass.stage_counts();
    model.debug_info.active_tweens = glass.timeline().active_tweens();
}
