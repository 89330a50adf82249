pub mod gateway;
pub mod reconciler;
