use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::{AppState, Page};

// ---------------------------------------------------------------------------
// Left side panel – wizard progress
// ---------------------------------------------------------------------------

/// Render the list of pages on the current route, marking the active one.
pub fn page_list(ui: &mut Ui, state: &AppState) {
    ui.add_space(8.0);
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(RichText::new("QeVR").strong());
    });
    ui.separator();

    for page in Page::route(state.config.output.target) {
        if page == state.page {
            ui.label(RichText::new(format!("▶ {}", page.title())).strong());
        } else {
            ui.label(format!("    {}", page.title()));
        }
    }
}

// ---------------------------------------------------------------------------
// Bottom bar – errors and navigation
// ---------------------------------------------------------------------------

/// Render the last error and the Back / Next (or Quit) buttons.
pub fn nav_bar(ui: &mut Ui, state: &mut AppState) {
    ui.add_space(4.0);

    if let Some(msg) = &state.error_message {
        ui.label(RichText::new(msg).color(Color32::RED));
    }

    ui.with_layout(
        egui::Layout::right_to_left(egui::Align::Center),
        |ui: &mut Ui| {
            let busy = state.busy();

            // Right-to-left: the first button lands on the far right
            let next_label = if state.is_last_page() { "Quit" } else { "Next ▶" };
            if ui.add_enabled(!busy, egui::Button::new(next_label)).clicked() {
                state.go_next();
            }

            let first = state.page == Page::Intro;
            if ui
                .add_enabled(!busy && !first, egui::Button::new("◀ Back"))
                .clicked()
            {
                state.go_back();
            }
        },
    );

    ui.add_space(4.0);
}
