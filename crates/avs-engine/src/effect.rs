//! The uniform contract every kernel implements.

use crate::context::RenderContext;
use crate::params::ParamBlock;

/// A per-frame image/state transformer with typed parameters.
///
/// `set_params` must be idempotent: applying an equal block twice leaves
/// observable state unchanged. `render` runs once per frame and returns
/// `false` when the effect had to bail out (the pipeline keeps going; the
/// boolean is telemetry).
pub trait Effect {
    fn set_params(&mut self, params: &ParamBlock);
    fn render(&mut self, context: &mut RenderContext<'_>) -> bool;
}
