pub mod capability;
pub mod decision;
pub mod evidence;
pub mod session;
