//! Preset annotation. Renders nothing; the text survives round trips.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Default)]
pub struct CommentEffect {
    text: String,
}

impl CommentEffect {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Effect for CommentEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("comment") {
            self.text = params.get_string("comment", &self.text);
        }
    }

    fn render(&mut self, _context: &mut RenderContext<'_>) -> bool {
        true
    }
}
