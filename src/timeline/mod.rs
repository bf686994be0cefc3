pub(crate) mod check;
pub(crate) mod keyframe;
pub(crate) mod model;
pub(crate) mod precision;
pub(crate) mod unify;
