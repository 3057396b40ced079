//! Placeholder for effects the registry does not know. Keeps the raw
//! payload for diagnostics and renders nothing.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub struct UnknownEffect {
    token: String,
    payload: Vec<u8>,
}

impl UnknownEffect {
    pub fn new(token: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            token: token.into(),
            payload,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Effect for UnknownEffect {
    fn set_params(&mut self, _params: &ParamBlock) {}

    fn render(&mut self, _context: &mut RenderContext<'_>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn is_a_no_op_that_keeps_its_payload() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([9, 9, 9, 9]);
        let before = rig.pixels.clone();
        let mut effect = UnknownEffect::new("effect:42", vec![1, 2, 3]);
        assert!(rig.run(&mut effect));
        assert_eq!(rig.pixels, before);
        assert_eq!(effect.token(), "effect:42");
        assert_eq!(effect.payload(), &[1, 2, 3]);
    }
}
