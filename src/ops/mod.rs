pub mod ai;
pub mod dispatch;
pub mod mask;
pub mod orchestrator;
pub mod overlay;
