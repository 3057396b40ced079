pub mod comment;
pub mod custom_bpm;
pub mod gating;
pub mod set_render_mode;
pub mod transform_affine;
