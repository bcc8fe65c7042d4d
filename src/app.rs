use eframe::egui;

use crate::state::AppState;
use crate::ui::{pages, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct QevrApp {
    pub state: AppState,
}

impl QevrApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for QevrApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll();

        // Keep repainting while a worker reports progress
        if self.state.busy() {
            ctx.request_repaint();
        }

        // ---- Left side panel: page list ----
        egui::SidePanel::left("page_list")
            .resizable(false)
            .default_width(140.0)
            .show(ctx, |ui| {
                panels::page_list(ui, &self.state);
            });

        // ---- Bottom panel: error line and navigation ----
        egui::TopBottomPanel::bottom("nav_bar").show(ctx, |ui| {
            panels::nav_bar(ui, &mut self.state);
        });

        // ---- Central panel: current page ----
        egui::CentralPanel::default().show(ctx, |ui| {
            pages::page_content(ui, &mut self.state);
        });

        if self.state.quit_requested {
            log::info!("Quit");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}
