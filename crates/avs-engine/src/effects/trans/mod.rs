pub mod blitter_feedback;
pub mod blur;
pub mod blur_box;
pub mod brightness;
pub mod channel_shift;
pub mod colorfade;
pub mod dynamic;
pub mod fast_brightness;
pub mod frame_warp;
pub mod mosaic;
pub mod multi_delay;
pub mod multiplier;
pub mod roto_blitter;
pub mod scatter;
pub mod unique_tone;
pub mod video_delay;
pub mod water;
pub mod water_bump;
pub mod zoom_rotate;
