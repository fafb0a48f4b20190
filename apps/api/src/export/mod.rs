// Export and playback adapters. Both only read finished track results.

pub mod font_metrics;
pub mod handlers;
pub mod pdf;
pub mod speech;
