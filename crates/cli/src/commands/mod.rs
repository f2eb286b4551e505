pub mod channels;
pub mod reencode;
pub mod send;
