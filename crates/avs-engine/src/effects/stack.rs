//! Effects that surface the framebuffer-model operations inside a pipeline:
//! clear, wrap, slide in/out, transition, overlay persists, buffer save.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::framebuffer::ops::{
    self, ClearBlendMode, ClearSettings, SlideDirection, SlideSettings, WrapSettings,
};
use crate::framebuffer::{BufferSlot, OverlayChannel};
use crate::params::ParamBlock;

fn parse_clear_blend(params: &ParamBlock, current: ClearBlendMode) -> ClearBlendMode {
    let token = params.get_string("blend", "");
    match token.to_ascii_lowercase().as_str() {
        "replace" => ClearBlendMode::Replace,
        "add" | "additive" => ClearBlendMode::Additive,
        "avg" | "average" => ClearBlendMode::Average,
        "default" | "defaultblend" => ClearBlendMode::DefaultBlend,
        _ => current,
    }
}

/// `Render / Clear screen` (plus the on-beat variant): fill or blend a solid
/// color into the frame.
pub struct ClearEffect {
    settings: ClearSettings,
    only_on_beat: bool,
}

impl Default for ClearEffect {
    fn default() -> Self {
        Self {
            settings: ClearSettings::default(),
            only_on_beat: false,
        }
    }
}

impl Effect for ClearEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("color") {
            let rgb = params.get_int("color", 0) as u32 & 0x00FF_FFFF;
            self.settings.argb = 0xFF00_0000 | rgb;
        }
        if params.contains("argb") {
            self.settings.argb = params.get_int("argb", self.settings.argb as i32) as u32;
        }
        self.settings.blend = parse_clear_blend(params, self.settings.blend);
        self.settings.first_frame_only =
            params.get_bool("first_frame_only", self.settings.first_frame_only);
        self.only_on_beat = params.get_bool("onbeat", self.only_on_beat);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        if self.settings.first_frame_only && context.frame_index > 0 {
            return true;
        }
        if self.only_on_beat && !context.audio_beat {
            return true;
        }
        ops::clear(context.framebuffer.data, &self.settings);
        true
    }
}

/// Copies the previous frame with toroidal offset.
#[derive(Default)]
pub struct WrapEffect {
    settings: WrapSettings,
}

impl Effect for WrapEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.settings.offset_x = params.get_int("ox", self.settings.offset_x);
        self.settings.offset_y = params.get_int("oy", self.settings.offset_y);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || context.previous.len() < context.required_bytes() {
            return true;
        }
        ops::wrap(
            context.framebuffer.data,
            context.previous,
            context.width,
            context.height,
            &self.settings,
        );
        true
    }
}

fn parse_direction(token: &str, current: SlideDirection) -> SlideDirection {
    match token.to_ascii_lowercase().as_str() {
        "left" => SlideDirection::Left,
        "right" => SlideDirection::Right,
        "up" => SlideDirection::Up,
        "down" => SlideDirection::Down,
        _ => current,
    }
}

/// Translates the previous frame into the current one; `outward` flips the
/// travel direction (slide-out).
pub struct SlideEffect {
    settings: SlideSettings,
    outward: bool,
}

impl SlideEffect {
    pub fn inward() -> Self {
        Self {
            settings: SlideSettings {
                direction: SlideDirection::Left,
                amount: 1,
            },
            outward: false,
        }
    }

    pub fn outward() -> Self {
        Self {
            outward: true,
            ..Self::inward()
        }
    }
}

impl Effect for SlideEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.settings.direction =
            parse_direction(&params.get_string("dir", ""), self.settings.direction);
        self.settings.amount = params.get_int("amount", self.settings.amount).max(0);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || context.previous.len() < context.required_bytes() {
            return true;
        }
        ops::slide(
            context.framebuffer.data,
            context.previous,
            context.width,
            context.height,
            &self.settings,
            self.outward,
        );
        true
    }
}

/// Crossfade between previous and current frame.
#[derive(Default)]
pub struct TransitionEffect {
    progress: f32,
}

impl Effect for TransitionEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.progress = params.get_float("progress", self.progress).clamp(0.0, 1.0);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || context.previous.len() < context.required_bytes() {
            return true;
        }
        ops::transition(context.framebuffer.data, context.previous, self.progress);
        true
    }
}

/// Schedules one of the three persistent overlay bands.
pub struct PersistEffect {
    channel: OverlayChannel,
    duration: i32,
    color: [u8; 3],
}

impl PersistEffect {
    pub fn new(channel: OverlayChannel) -> Self {
        Self {
            channel,
            duration: 30,
            color: [255, 255, 255],
        }
    }
}

impl Effect for PersistEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.duration = params.get_int("duration", self.duration).max(0);
        if params.contains("color") {
            let rgb = params.get_int("color", 0) as u32;
            self.color = [
                ((rgb >> 16) & 0xFF) as u8,
                ((rgb >> 8) & 0xFF) as u8,
                (rgb & 0xFF) as u8,
            ];
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        context
            .overlays
            .activate(self.channel, self.duration, self.color);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferSaveMode {
    Save,
    Restore,
    SaveThenRestore,
}

/// `Misc / Buffer Save`: copy the current frame to/from a named slot.
pub struct BufferSaveEffect {
    slot: BufferSlot,
    mode: BufferSaveMode,
}

impl Default for BufferSaveEffect {
    fn default() -> Self {
        Self {
            slot: BufferSlot::Buffer0,
            mode: BufferSaveMode::Save,
        }
    }
}

impl Effect for BufferSaveEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("buffer") {
            let index = params.get_int("buffer", 0).clamp(0, 7) as usize;
            if let Some(slot) = BufferSlot::from_index(index) {
                self.slot = slot;
            }
        }
        let mode = params.get_string("mode", "");
        self.mode = match mode.to_ascii_lowercase().as_str() {
            "save" => BufferSaveMode::Save,
            "restore" => BufferSaveMode::Restore,
            "save_restore" | "saverestore" => BufferSaveMode::SaveThenRestore,
            _ => self.mode,
        };
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        match self.mode {
            BufferSaveMode::Save => context.slots.save(self.slot, context.framebuffer.data),
            BufferSaveMode::Restore => {
                context.slots.restore(self.slot, context.framebuffer.data);
            }
            BufferSaveMode::SaveThenRestore => {
                context.slots.save(self.slot, context.framebuffer.data);
                context.slots.restore(self.slot, context.framebuffer.data);
            }
        }
        true
    }
}
