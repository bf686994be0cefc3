pub(crate) mod convert;
pub(crate) mod framerate;
pub(crate) mod timebase;
pub(crate) mod timecode;
