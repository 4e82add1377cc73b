mod console;

use serde::Serialize;

use crate::cycles::{DisplayCycle, NavigationSummary};

pub use console::ConsoleRenderer;

/// Everything a view needs to draw the board for the selected cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub cycle: Option<DisplayCycle>,
    pub navigation: NavigationSummary,
}

/// Output side of the monitor. Implementations only draw; they never reach
/// back into monitor state.
pub trait UiRenderer: Send + Sync + 'static {
    fn render(&self, frame: &RenderFrame);

    /// Non-blocking operator notice, e.g. a failed poll.
    fn notice(&self, message: &str);
}
