//! Nested render list from binary presets: renders children in order.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Default)]
pub struct CompositeEffect {
    children: Vec<Box<dyn Effect>>,
}

impl CompositeEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Box<dyn Effect>) {
        self.children.push(effect);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Effect for CompositeEffect {
    fn set_params(&mut self, _params: &ParamBlock) {}

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        let mut all_ok = true;
        for child in &mut self.children {
            all_ok &= child.render(context);
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    struct Marker(u8, bool);

    impl Effect for Marker {
        fn set_params(&mut self, _params: &ParamBlock) {}
        fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
            context.framebuffer.data[0] = self.0;
            self.1
        }
    }

    #[test]
    fn children_render_in_order_and_results_and() {
        let mut composite = CompositeEffect::new();
        composite.push(Box::new(Marker(1, true)));
        composite.push(Box::new(Marker(2, false)));
        composite.push(Box::new(Marker(3, true)));
        let mut rig = TestRig::new(2, 2);
        let ok = rig.run(&mut composite);
        assert!(!ok);
        assert_eq!(rig.pixels[0], 3);
    }
}
